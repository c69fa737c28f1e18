//! 歌词转换器核心模块
//!
//! 负责把原始文本交给合适的解析器：先用 [`FormatGuesser`] 猜测格式，再分派到注册的
//! [`LyricsParser`]。分派器在构建完成后不可变，可以在多个线程之间共享。

pub mod format_guesser;
pub mod generators;
pub mod parsers;
pub mod processors;
pub mod types;
pub mod utils;

use std::{collections::HashMap, fmt};

use regex::Regex;
use tracing::{debug, warn};

pub use format_guesser::FormatGuesser;
pub use types::{
    Alignment, Artist, Attributes, ConvertError, ExportOptions, LyricFormat, LyricLine,
    LyricsDocument, MalformedTokenPolicy, ParsedSourceData, ParsingOptions, PlainLine, Syllable,
    SyllableLine, TimeMillis,
};

/// 一种歌词格式的解析策略。
///
/// 任何签名为 `Fn(&str, &ParsingOptions) -> Result<ParsedSourceData, ConvertError>`
/// 的函数或闭包都自动实现了该 trait。
pub trait LyricsParser: Send + Sync {
    /// 解析整段文本。
    fn parse(
        &self,
        content: &str,
        options: &ParsingOptions,
    ) -> Result<ParsedSourceData, ConvertError>;
}

impl<F> LyricsParser for F
where
    F: Fn(&str, &ParsingOptions) -> Result<ParsedSourceData, ConvertError> + Send + Sync,
{
    fn parse(
        &self,
        content: &str,
        options: &ParsingOptions,
    ) -> Result<ParsedSourceData, ConvertError> {
        self(content, options)
    }
}

/// 自动识别格式并解析歌词的分派器。
pub struct AutoParser {
    guesser: FormatGuesser,
    parsers: HashMap<LyricFormat, Box<dyn LyricsParser>>,
    options: ParsingOptions,
}

/// [`AutoParser`] 的构建器，在内置格式之上叠加自定义格式。
pub struct AutoParserBuilder {
    guesser: FormatGuesser,
    parsers: HashMap<LyricFormat, Box<dyn LyricsParser>>,
    options: ParsingOptions,
}

impl Default for AutoParserBuilder {
    fn default() -> Self {
        let mut registry: HashMap<LyricFormat, Box<dyn LyricsParser>> = HashMap::new();
        registry.insert(LyricFormat::Ttml, Box::new(parsers::ttml_parser::parse_ttml));
        registry.insert(LyricFormat::Lrc, Box::new(parsers::lrc_parser::parse_lrc));
        registry.insert(
            LyricFormat::WordByWordLrc,
            Box::new(parsers::word_lrc_parser::parse_word_lrc),
        );
        registry.insert(
            LyricFormat::EnhancedLrc,
            Box::new(parsers::enhanced_lrc_parser::parse_enhanced_lrc),
        );
        registry.insert(LyricFormat::Lys, Box::new(parsers::lys_parser::parse_lys));

        Self {
            guesser: FormatGuesser::new(),
            parsers: registry,
            options: ParsingOptions::default(),
        }
    }
}

impl AutoParserBuilder {
    /// 设置解析选项。
    #[must_use]
    pub fn options(mut self, options: ParsingOptions) -> Self {
        self.options = options;
        self
    }

    /// 注册一个格式。新格式的检测优先于所有已注册的格式；
    /// 若格式已存在，其解析器会被替换。
    #[must_use]
    pub fn register<D, P>(mut self, format: LyricFormat, detector: D, parser: P) -> Self
    where
        D: Fn(&str) -> bool + Send + Sync + 'static,
        P: LyricsParser + 'static,
    {
        debug!(%format, "注册歌词格式");
        self.guesser = self.guesser.with_format(format.clone(), detector);
        self.parsers.insert(format, Box::new(parser));
        self
    }

    /// 用正则表达式作为检测器注册一个格式。
    #[must_use]
    pub fn register_regex<P>(self, format: LyricFormat, regex: Regex, parser: P) -> Self
    where
        P: LyricsParser + 'static,
    {
        self.register(format, move |text: &str| regex.is_match(text), parser)
    }

    /// 构建不可变的分派器。
    #[must_use]
    pub fn build(self) -> AutoParser {
        AutoParser {
            guesser: self.guesser,
            parsers: self.parsers,
            options: self.options,
        }
    }
}

impl AutoParser {
    /// 创建只包含内置格式、使用默认选项的分派器。
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// 返回一个预先注册了全部内置格式的构建器。
    #[must_use]
    pub fn builder() -> AutoParserBuilder {
        AutoParserBuilder::default()
    }

    /// 当前的解析选项。
    #[must_use]
    pub fn options(&self) -> &ParsingOptions {
        &self.options
    }

    /// 猜测文本的格式。
    #[must_use]
    pub fn guess_format(&self, content: &str) -> Option<&LyricFormat> {
        self.guesser.guess_format(content)
    }

    /// 解析文本。无法识别格式或解析失败时返回空文档。
    #[must_use]
    pub fn parse(&self, content: &str) -> LyricsDocument {
        self.parse_detailed(content).document
    }

    /// 解析文本并返回完整的解析结果。
    ///
    /// 此函数不会失败：无法识别格式时 `source_format` 为 `None`，
    /// 解析器出错时文档为空，错误信息记录在 `warnings` 中。
    #[must_use]
    pub fn parse_detailed(&self, content: &str) -> ParsedSourceData {
        let Some(format) = self.guess_format(content) else {
            debug!("未能识别歌词格式");
            return ParsedSourceData::default();
        };
        debug!(%format, "识别到歌词格式");

        match self.parse_with_format(content, format) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%format, "歌词解析失败: {e}");
                ParsedSourceData {
                    source_format: Some(format.clone()),
                    warnings: vec![e.to_string()],
                    ..Default::default()
                }
            }
        }
    }

    /// 跳过格式识别，直接使用指定格式的解析器。
    ///
    /// # 错误
    /// 格式未注册时返回 `ConvertError::InvalidLyricFormat`，解析器自身的错误原样返回。
    pub fn parse_with_format(
        &self,
        content: &str,
        format: &LyricFormat,
    ) -> Result<ParsedSourceData, ConvertError> {
        let parser = self.parsers.get(format).ok_or_else(|| {
            ConvertError::InvalidLyricFormat(format!("格式 '{format}' 没有注册解析器"))
        })?;

        let mut parsed = parser.parse(utils::strip_bom(content), &self.options)?;
        parsed.source_format.get_or_insert_with(|| format.clone());

        if self.options.apply_offset
            && let Some(offset) = parsed.attributes.offset
            && offset != 0
        {
            debug!(offset, "应用 [offset] 时间偏移");
            // 正的 offset 表示歌词提前出现
            let document = std::mem::take(&mut parsed.document);
            parsed.document = utils::apply_offset(document, offset.saturating_neg());
        }

        for warning in &parsed.warnings {
            debug!(%format, "{warning}");
        }
        Ok(parsed)
    }
}

impl Default for AutoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AutoParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoParser")
            .field("formats", &self.guesser)
            .field("options", &self.options)
            .finish()
    }
}
