//! 定义了歌词解析、位置查询与导出中使用的核心数据类型。

use std::fmt;

use quick_xml::{
    Error as QuickXmlErrorMain, encoding::EncodingError,
    events::attributes::AttrError as QuickXmlAttrError,
};
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use thiserror::Error;

/// 从歌曲开始计算的毫秒数。
pub type TimeMillis = u64;

/// 表示"无明确结束时间"的哨兵值，用于逐行歌词的最后一行。
pub const OPEN_END_MS: TimeMillis = TimeMillis::MAX;

/// 逐字歌词最后一个音节缺少结束信息时使用的默认时长（毫秒）。
pub const DEFAULT_FINAL_SYLLABLE_MS: u64 = 500;

//=============================================================================
// 1. 错误枚举
//=============================================================================

/// 定义歌词解析和处理过程中可能发生的各种错误。
///
/// 这些错误只在解析器内部流转，顶层的 `parse` 入口会把它们降级为空文档。
#[derive(Error, Debug)]
pub enum ConvertError {
    /// XML 解析错误，通常来自 `quick-xml` 库。
    #[error("XML 解析错误: {0}")]
    Xml(#[from] QuickXmlErrorMain),
    /// XML 属性解析错误，通常来自 `quick-xml` 库。
    #[error("XML 属性错误: {0}")]
    Attribute(#[from] QuickXmlAttrError),
    /// XML 文本编码或解码错误。
    #[error("文本编码或解码错误: {0}")]
    Encoding(#[from] EncodingError),
    /// 整数解析错误。
    #[error("解析错误: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    /// 无效的时间或时间区间。
    #[error("无效的时间: {0}")]
    InvalidTime(String),
    /// 无效的歌词格式。
    #[error("无效的歌词格式: {0}")]
    InvalidLyricFormat(String),
    /// 内部逻辑错误或未明确分类的错误。
    #[error("错误: {0}")]
    Internal(String),
}

//=============================================================================
// 2. 歌词格式枚举
//=============================================================================

/// 枚举：表示可被识别和解析的歌词格式。
///
/// 除内置格式外，调用方可以通过 `Custom` 注册自己的格式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum LyricFormat {
    /// `Timed Text Markup Language` 结构化格式。
    #[strum(serialize = "ttml", serialize = "xml")]
    Ttml,
    /// 标准 LRC 逐行格式。
    #[strum(serialize = "lrc")]
    Lrc,
    /// 逐字 LRC，一行内重复出现 `[mm:ss.xx]` 标签。
    #[strum(serialize = "word-lrc", serialize = "eslrc")]
    WordByWordLrc,
    /// 增强型 LRC，使用 `<mm:ss.xx>` 内联标签、`[bg:]` 背景行与 `v1:` 声部标记。
    #[strum(serialize = "enhanced-lrc", serialize = "elrc", serialize = "lrcx")]
    EnhancedLrc,
    /// `Lyricify Syllable` 格式，`word(start,duration)`。
    #[strum(serialize = "lys")]
    Lys,
    /// 调用方注册的自定义格式。
    #[strum(default)]
    Custom(String),
}

impl LyricFormat {
    /// 内置格式，按识别优先级从高到低排列。
    pub const BUILTIN: [LyricFormat; 5] = [
        LyricFormat::Ttml,
        LyricFormat::Lrc,
        LyricFormat::WordByWordLrc,
        LyricFormat::EnhancedLrc,
        LyricFormat::Lys,
    ];

    /// 创建一个自定义格式名。
    pub fn custom(name: impl Into<String>) -> Self {
        LyricFormat::Custom(name.into())
    }

    /// 返回格式的规范名称。
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            LyricFormat::Ttml => "ttml",
            LyricFormat::Lrc => "lrc",
            LyricFormat::WordByWordLrc => "word-lrc",
            LyricFormat::EnhancedLrc => "enhanced-lrc",
            LyricFormat::Lys => "lys",
            LyricFormat::Custom(name) => name,
        }
    }

    /// 是否为内置格式。
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, LyricFormat::Custom(_))
    }
}

impl fmt::Display for LyricFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LyricFormat::Ttml => write!(f, "TTML"),
            LyricFormat::Lrc => write!(f, "LRC"),
            LyricFormat::WordByWordLrc => write!(f, "Word-by-word LRC"),
            LyricFormat::EnhancedLrc => write!(f, "Enhanced LRC"),
            LyricFormat::Lys => write!(f, "Lyricify Syllable"),
            LyricFormat::Custom(name) => write!(f, "{name}"),
        }
    }
}

//=============================================================================
// 3. 歌词内部表示结构
//=============================================================================

/// 文本对齐提示，用于对唱类歌词的左右排布。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Alignment {
    /// 左对齐（主唱）。
    Start,
    /// 右对齐（对唱）。
    End,
    /// 未指定。
    #[default]
    Unspecified,
}

impl Alignment {
    /// 根据 `v1`/`v2` 这类声部标记得出对齐方式。
    #[must_use]
    pub fn from_voice(voice: &str) -> Self {
        match voice {
            "v1" => Alignment::Start,
            "v2" => Alignment::End,
            _ => Alignment::Unspecified,
        }
    }
}

/// 表示一个带时间信息的音节或单词。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Syllable {
    /// 音节文本。
    pub content: String,
    /// 开始时间（毫秒）。
    pub start: TimeMillis,
    /// 结束时间（毫秒）。
    pub end: TimeMillis,
}

impl Syllable {
    /// 创建一个新的音节。
    pub fn new(content: impl Into<String>, start: TimeMillis, end: TimeMillis) -> Self {
        Self {
            content: content.into(),
            start,
            end,
        }
    }

    /// 音节时长。
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// 逐行计时的歌词行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlainLine {
    content: String,
    translation: Option<String>,
    start: TimeMillis,
    end: TimeMillis,
}

impl PlainLine {
    /// 创建一个逐行歌词行。
    ///
    /// # 错误
    /// 当 `end < start` 时返回 `ConvertError::InvalidTime`。
    pub fn new(
        content: impl Into<String>,
        translation: Option<String>,
        start: TimeMillis,
        end: TimeMillis,
    ) -> Result<Self, ConvertError> {
        if end < start {
            return Err(ConvertError::InvalidTime(format!(
                "行结束时间 {end}ms 早于开始时间 {start}ms"
            )));
        }
        Ok(Self {
            content: content.into(),
            translation,
            start,
            end,
        })
    }

    /// 解析过程中使用的宽松构造，负时长会被钳制为 0。
    pub(crate) fn clamped(
        content: impl Into<String>,
        translation: Option<String>,
        start: TimeMillis,
        end: TimeMillis,
    ) -> Self {
        Self {
            content: content.into(),
            translation,
            start,
            end: end.max(start),
        }
    }

    /// 行文本。
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// 翻译文本。
    #[must_use]
    pub fn translation(&self) -> Option<&str> {
        self.translation.as_deref()
    }

    /// 开始时间。
    #[must_use]
    pub fn start(&self) -> TimeMillis {
        self.start
    }

    /// 结束时间。
    #[must_use]
    pub fn end(&self) -> TimeMillis {
        self.end
    }
}

/// 逐字（卡拉 OK）计时的歌词行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyllableLine {
    syllables: Vec<Syllable>,
    translation: Option<String>,
    is_accompaniment: bool,
    alignment: Alignment,
    start: TimeMillis,
    end: TimeMillis,
}

impl SyllableLine {
    /// 由音节列表创建逐字歌词行，开始与结束时间取自首尾音节。
    ///
    /// # 错误
    /// 音节列表为空，或任一音节（以及整行）的结束时间早于开始时间。
    pub fn new(syllables: Vec<Syllable>) -> Result<Self, ConvertError> {
        let (Some(first), Some(last)) = (syllables.first(), syllables.last()) else {
            return Err(ConvertError::InvalidLyricFormat(
                "逐字歌词行至少需要一个音节".to_string(),
            ));
        };
        if let Some(bad) = syllables.iter().find(|s| s.end < s.start) {
            return Err(ConvertError::InvalidTime(format!(
                "音节 '{}' 的结束时间 {}ms 早于开始时间 {}ms",
                bad.content, bad.end, bad.start
            )));
        }
        let (start, end) = (first.start, last.end);
        if end < start {
            return Err(ConvertError::InvalidTime(format!(
                "行结束时间 {end}ms 早于开始时间 {start}ms"
            )));
        }
        Ok(Self {
            syllables,
            translation: None,
            is_accompaniment: false,
            alignment: Alignment::Unspecified,
            start,
            end,
        })
    }

    /// 解析过程中使用的宽松构造：不检查音节时间，行结束时间取所有音节中最晚的结束时间。
    pub(crate) fn clamped(syllables: Vec<Syllable>) -> Option<Self> {
        let start = syllables.first()?.start;
        let end = syllables.iter().map(|s| s.end).fold(start, TimeMillis::max);
        Some(Self {
            syllables,
            translation: None,
            is_accompaniment: false,
            alignment: Alignment::Unspecified,
            start,
            end,
        })
    }

    /// 设置翻译。
    #[must_use]
    pub fn with_translation(mut self, translation: Option<String>) -> Self {
        self.translation = translation;
        self
    }

    /// 标记为背景人声（伴唱）行。
    #[must_use]
    pub fn with_accompaniment(mut self, is_accompaniment: bool) -> Self {
        self.is_accompaniment = is_accompaniment;
        self
    }

    /// 设置对齐方式。
    #[must_use]
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// 音节列表。
    #[must_use]
    pub fn syllables(&self) -> &[Syllable] {
        &self.syllables
    }

    /// 翻译文本。
    #[must_use]
    pub fn translation(&self) -> Option<&str> {
        self.translation.as_deref()
    }

    /// 是否为背景人声行。
    #[must_use]
    pub fn is_accompaniment(&self) -> bool {
        self.is_accompaniment
    }

    /// 对齐方式。
    #[must_use]
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// 开始时间。
    #[must_use]
    pub fn start(&self) -> TimeMillis {
        self.start
    }

    /// 结束时间。
    #[must_use]
    pub fn end(&self) -> TimeMillis {
        self.end
    }

    /// 将所有音节拼接为一行纯文本。
    #[must_use]
    pub fn text(&self) -> String {
        self.syllables
            .iter()
            .map(|s| s.content.as_str())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// 歌词行，逐行与逐字两种计时方式的和类型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LyricLine {
    /// 逐行计时。
    Plain(PlainLine),
    /// 逐字计时。
    Syllable(SyllableLine),
}

impl LyricLine {
    /// 开始时间。
    #[must_use]
    pub fn start(&self) -> TimeMillis {
        match self {
            LyricLine::Plain(line) => line.start,
            LyricLine::Syllable(line) => line.start,
        }
    }

    /// 结束时间。
    #[must_use]
    pub fn end(&self) -> TimeMillis {
        match self {
            LyricLine::Plain(line) => line.end,
            LyricLine::Syllable(line) => line.end,
        }
    }

    /// 持续时长。
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.end() - self.start()
    }

    /// 时间点 `time` 是否落在闭区间 `[start, end]` 内。
    #[must_use]
    pub fn contains(&self, time: TimeMillis) -> bool {
        self.start() <= time && time <= self.end()
    }

    /// 折叠为纯文本（已去除首尾空白）。
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            LyricLine::Plain(line) => line.content.trim().to_string(),
            LyricLine::Syllable(line) => line.text(),
        }
    }

    /// 翻译文本。
    #[must_use]
    pub fn translation(&self) -> Option<&str> {
        match self {
            LyricLine::Plain(line) => line.translation(),
            LyricLine::Syllable(line) => line.translation(),
        }
    }

    /// 是否为背景人声行，逐行歌词总是返回 `false`。
    #[must_use]
    pub fn is_accompaniment(&self) -> bool {
        match self {
            LyricLine::Plain(_) => false,
            LyricLine::Syllable(line) => line.is_accompaniment,
        }
    }

    /// 对齐方式。
    #[must_use]
    pub fn alignment(&self) -> Alignment {
        match self {
            LyricLine::Plain(_) => Alignment::Unspecified,
            LyricLine::Syllable(line) => line.alignment,
        }
    }

    /// 音节列表，逐行歌词返回空切片。
    #[must_use]
    pub fn syllables(&self) -> &[Syllable] {
        match self {
            LyricLine::Plain(_) => &[],
            LyricLine::Syllable(line) => &line.syllables,
        }
    }

    /// 对所有时间戳应用同一个映射，用于整体偏移。
    pub(crate) fn map_times(self, f: impl Fn(TimeMillis) -> TimeMillis) -> Self {
        match self {
            LyricLine::Plain(line) => {
                let start = f(line.start);
                let end = f(line.end);
                LyricLine::Plain(PlainLine::clamped(
                    line.content,
                    line.translation,
                    start,
                    end,
                ))
            }
            LyricLine::Syllable(mut line) => {
                for syl in &mut line.syllables {
                    syl.start = f(syl.start);
                    syl.end = f(syl.end).max(syl.start);
                }
                line.start = f(line.start);
                line.end = f(line.end).max(line.start);
                LyricLine::Syllable(line)
            }
        }
    }
}

impl From<PlainLine> for LyricLine {
    fn from(line: PlainLine) -> Self {
        LyricLine::Plain(line)
    }
}

impl From<SyllableLine> for LyricLine {
    fn from(line: SyllableLine) -> Self {
        LyricLine::Syllable(line)
    }
}

/// 表示歌曲的一位艺术家。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// 艺术家类型，例如 "artist"、"lyricist"。
    #[serde(rename = "type")]
    pub kind: String,
    /// 名称。
    pub name: String,
}

impl Artist {
    /// 创建一位艺术家。
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// 统一的歌词文档。
///
/// 构造完成后不可变；行按开始时间升序排列，允许相邻行的区间重叠。
/// 空文档（没有任何行）表示"没有歌词"。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LyricsDocument {
    lines: Vec<LyricLine>,
    title: String,
    id: String,
    artists: Vec<Artist>,
}

impl LyricsDocument {
    /// 由歌词行创建文档。
    #[must_use]
    pub fn new(lines: Vec<LyricLine>) -> Self {
        Self {
            lines,
            ..Default::default()
        }
    }

    /// 创建一个空文档。
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// 设置标题。
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// 设置标识符。
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// 设置艺术家列表。
    #[must_use]
    pub fn with_artists(mut self, artists: Vec<Artist>) -> Self {
        self.artists = artists;
        self
    }

    /// 所有歌词行。
    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    /// 标题。
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// 标识符。
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 艺术家列表。
    #[must_use]
    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    /// 行数。
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 是否没有任何歌词行。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 取出所有行，同时保留文档头信息。
    pub(crate) fn into_parts(self) -> (Vec<LyricLine>, LyricsDocument) {
        let Self {
            lines,
            title,
            id,
            artists,
        } = self;
        (
            lines,
            Self {
                lines: Vec::new(),
                title,
                id,
                artists,
            },
        )
    }

    /// 用新的歌词行替换当前文档的行。
    pub(crate) fn replace_lines(mut self, lines: Vec<LyricLine>) -> Self {
        self.lines = lines;
        self
    }
}

/// 从 `[key:value]` 头部标签中解析出的信息，仅供参考，不会合并进文档。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attributes {
    /// `[ar:]`
    pub artist: Option<String>,
    /// `[al:]`
    pub album: Option<String>,
    /// `[ti:]`
    pub title: Option<String>,
    /// `[offset:]`，毫秒。
    pub offset: Option<i64>,
    /// `[length:]`
    pub duration: Option<i64>,
}

/// 一次解析的完整结果。
#[derive(Debug, Clone, Default)]
pub struct ParsedSourceData {
    /// 解析出的文档。
    pub document: LyricsDocument,
    /// 头部标签信息。
    pub attributes: Attributes,
    /// 产生该结果的格式，未识别时为 `None`。
    pub source_format: Option<LyricFormat>,
    /// 解析过程中被丢弃或修正的内容说明。
    pub warnings: Vec<String>,
}

//=============================================================================
// 4. 选项
//=============================================================================

/// 音节时长格式中遇到无法解析的 `(start,duration)` 时的处理策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MalformedTokenPolicy {
    /// 丢弃整行，与其他格式的处理方式一致。
    #[default]
    DropLine,
    /// 用内容为 `"Error"`、时间为 0 的占位音节替代该音节，其余音节照常保留。
    Sentinel,
}

/// 解析选项。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingOptions {
    /// 逐字歌词最后一个音节缺少结束信息时的默认时长（毫秒）。
    pub final_syllable_fallback_ms: u64,
    /// 音节时长格式中的坏音节处理策略。
    pub malformed_token_policy: MalformedTokenPolicy,
    /// 是否自动应用 `[offset:]` 头部标签。
    pub apply_offset: bool,
}

impl Default for ParsingOptions {
    fn default() -> Self {
        Self {
            final_syllable_fallback_ms: DEFAULT_FINAL_SYLLABLE_MS,
            malformed_token_policy: MalformedTokenPolicy::default(),
            apply_offset: false,
        }
    }
}

/// 导出选项。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// 是否输出 `[ti:]`/`[ar:]` 头部。
    pub include_header: bool,
    /// 是否在两行之间的空白处输出单独的时间戳标记。
    pub gap_markers: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_header: true,
            gap_markers: true,
        }
    }
}
