//! # TTML 格式解析器
//!
//! 支持 Apple Music 风格的逐字 TTML：
//! - `<p begin end>` 为一行，带 `begin` 的 `<span>` 为音节，`<p>` 内没有计时 span 时视为逐行歌词；
//! - `ttm:role="x-bg"` 的 span 成为单独的背景人声行，`x-translation` 为翻译，`x-roman` 被忽略；
//! - `ttm:agent` 与第一个 `person` 类型的演唱者相同时左对齐，其他演唱者右对齐；
//! - `<amll:meta>` 中的 `musicName`、`artists` 和 `*Id` 填充文档的标题、艺术家与标识符。

use quick_xml::{
    Reader,
    encoding::Decoder,
    escape::resolve_predefined_entity,
    events::{BytesStart, Event},
};
use tracing::{debug, warn};

use crate::converter::{
    types::{
        Alignment, Artist, Attributes, ConvertError, LyricFormat, LyricLine, LyricsDocument,
        ParsedSourceData, ParsingOptions, PlainLine, Syllable, SyllableLine, TimeMillis,
    },
    utils::{normalize_text_whitespace, parse_time, push_syllable},
};

const DEFAULT_MAIN_AGENT: &str = "v1";

/// span 的种类，决定其中文本的去向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Syllable,
    Background,
    Translation,
    Roman,
    Untimed,
}

/// 正在构建的一行。
#[derive(Debug, Default)]
struct LineBuilder {
    begin: TimeMillis,
    end: TimeMillis,
    alignment: Alignment,
    syllables: Vec<Syllable>,
    leading: String,
    text: String,
    translation: String,
}

impl LineBuilder {
    /// 不带时间的文本并入前一个音节，出现在第一个音节之前时暂存为前导文本。
    fn push_untimed_text(&mut self, text: &str) {
        self.text.push_str(text);
        match self.syllables.last_mut() {
            Some(last) => last.content.push_str(text),
            None => self.leading.push_str(text),
        }
    }

    fn push_syllable_text(&mut self, text: &str) {
        self.text.push_str(text);
        match self.syllables.last_mut() {
            Some(last) => last.content.push_str(text),
            None => self.syllables.push(Syllable::new(text, self.begin, self.end)),
        }
    }

    fn take_translation(&mut self) -> Option<String> {
        Some(normalize_text_whitespace(&self.translation)).filter(|t| !t.is_empty())
    }

    /// 前导文本成为从行开始到第一个音节开始的音节。
    fn take_syllables(&mut self) -> Vec<Syllable> {
        let mut out = Vec::with_capacity(self.syllables.len() + 1);
        let leading = std::mem::take(&mut self.leading);
        if let Some(first) = self.syllables.first() {
            push_syllable(&mut out, &leading, self.begin.min(first.start), first.start);
        }
        for syl in self.syllables.drain(..) {
            push_syllable(&mut out, &syl.content, syl.start, syl.end);
        }
        out
    }
}

#[derive(Debug, Default)]
struct TtmlParser {
    main_agent: Option<String>,
    title: Option<String>,
    id: Option<String>,
    artists: Vec<Artist>,
    line: Option<LineBuilder>,
    background: Option<LineBuilder>,
    spans: Vec<SpanKind>,
    lines: Vec<LyricLine>,
    warnings: Vec<String>,
}

/// 解析 TTML 时间，支持时钟格式与带 `s` 后缀的秒数。
fn parse_ttml_time(text: &str) -> TimeMillis {
    let text = text.trim();
    parse_time(text.strip_suffix('s').unwrap_or(text))
}

fn attribute(
    e: &BytesStart<'_>,
    decoder: Decoder,
    key: &[u8],
) -> Result<Option<String>, ConvertError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.decode_and_unescape_value(decoder)?.into_owned()));
        }
    }
    Ok(None)
}

impl TtmlParser {
    fn target_line(&mut self) -> Option<&mut LineBuilder> {
        if self.spans.contains(&SpanKind::Background) {
            self.background.as_mut()
        } else {
            self.line.as_mut()
        }
    }

    fn on_start(
        &mut self,
        e: &BytesStart<'_>,
        decoder: Decoder,
        is_empty: bool,
    ) -> Result<(), ConvertError> {
        match e.name().as_ref() {
            b"ttm:agent" => {
                if self.main_agent.is_none()
                    && attribute(e, decoder, b"type")?.as_deref() == Some("person")
                {
                    self.main_agent = attribute(e, decoder, b"xml:id")?;
                }
            }
            b"amll:meta" => {
                let key = attribute(e, decoder, b"key")?.unwrap_or_default();
                let value = attribute(e, decoder, b"value")?.unwrap_or_default();
                self.on_meta(&key, value.trim());
            }
            b"p" if !is_empty => {
                let begin = attribute(e, decoder, b"begin")?.map_or(0, |t| parse_ttml_time(&t));
                let end = attribute(e, decoder, b"end")?.map_or(begin, |t| parse_ttml_time(&t));
                let alignment = match attribute(e, decoder, b"ttm:agent")? {
                    Some(agent) => {
                        let main = self.main_agent.as_deref().unwrap_or(DEFAULT_MAIN_AGENT);
                        if agent == main {
                            Alignment::Start
                        } else {
                            Alignment::End
                        }
                    }
                    None => Alignment::Unspecified,
                };
                self.spans.clear();
                self.background = None;
                self.line = Some(LineBuilder {
                    begin,
                    end,
                    alignment,
                    ..Default::default()
                });
            }
            b"span" if !is_empty && self.line.is_some() => {
                let kind = match attribute(e, decoder, b"ttm:role")?.as_deref() {
                    Some("x-bg") => SpanKind::Background,
                    Some("x-translation") => SpanKind::Translation,
                    Some("x-roman") => SpanKind::Roman,
                    _ => match attribute(e, decoder, b"begin")? {
                        Some(begin) => {
                            let start = parse_ttml_time(&begin);
                            let end = attribute(e, decoder, b"end")?
                                .map_or(start, |t| parse_ttml_time(&t));
                            if let Some(line) = self.target_line() {
                                line.syllables.push(Syllable::new("", start, end.max(start)));
                            }
                            SpanKind::Syllable
                        }
                        None => SpanKind::Untimed,
                    },
                };
                if kind == SpanKind::Background && self.background.is_none() {
                    let (begin, end, alignment) = self
                        .line
                        .as_ref()
                        .map_or((0, 0, Alignment::Unspecified), |l| (l.begin, l.end, l.alignment));
                    self.background = Some(LineBuilder {
                        begin,
                        end,
                        alignment,
                        ..Default::default()
                    });
                }
                self.spans.push(kind);
            }
            _ => {}
        }
        Ok(())
    }

    fn on_meta(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match key {
            "musicName" => {
                self.title.get_or_insert_with(|| value.to_string());
            }
            "artists" => self.artists.push(Artist::new("artist", value)),
            _ if key.ends_with("Id") => {
                self.id.get_or_insert_with(|| value.to_string());
            }
            _ => {}
        }
    }

    fn on_text(&mut self, text: &str) {
        let context = self
            .spans
            .iter()
            .rev()
            .copied()
            .find(|k| *k != SpanKind::Untimed);
        let Some(line) = self.target_line() else {
            return;
        };
        match context {
            Some(SpanKind::Syllable) => line.push_syllable_text(text),
            Some(SpanKind::Translation) => line.translation.push_str(text),
            Some(SpanKind::Roman) => {}
            Some(SpanKind::Background | SpanKind::Untimed) | None => line.push_untimed_text(text),
        }
    }

    fn on_end(&mut self, name: &[u8]) {
        match name {
            b"span" => {
                self.spans.pop();
            }
            b"p" => self.finish_line(),
            _ => {}
        }
    }

    fn finish_line(&mut self) {
        let Some(mut line) = self.line.take() else {
            return;
        };
        let translation = line.take_translation();
        let syllables = line.take_syllables();

        if syllables.is_empty() {
            let text = normalize_text_whitespace(&line.text);
            if text.is_empty() {
                debug!(begin = line.begin, "跳过空白的 TTML 行");
            } else {
                self.lines.push(LyricLine::Plain(PlainLine::clamped(
                    text,
                    translation,
                    line.begin,
                    line.end,
                )));
            }
        } else {
            self.push_syllable_line(syllables, translation, line.alignment, false);
        }

        if let Some(mut bg) = self.background.take() {
            let translation = bg.take_translation();
            let mut syllables = bg.take_syllables();
            if let Some(first) = syllables.first_mut()
                && let Some(stripped) = first.content.strip_prefix('(')
            {
                first.content = stripped.to_string();
            }
            if let Some(last) = syllables.last_mut()
                && let Some(stripped) = last.content.trim_end().strip_suffix(')')
            {
                last.content = stripped.to_string();
            }
            syllables.retain(|s| !s.content.trim().is_empty());
            if !syllables.is_empty() {
                self.push_syllable_line(syllables, translation, bg.alignment, true);
            }
        }
    }

    fn push_syllable_line(
        &mut self,
        syllables: Vec<Syllable>,
        translation: Option<String>,
        alignment: Alignment,
        is_background: bool,
    ) {
        match SyllableLine::new(syllables) {
            Ok(line) => self.lines.push(LyricLine::Syllable(
                line.with_translation(translation)
                    .with_alignment(alignment)
                    .with_accompaniment(is_background),
            )),
            Err(e) => {
                warn!("丢弃无效的 TTML 行: {e}");
                self.warnings.push(e.to_string());
            }
        }
    }

    fn into_parsed(mut self) -> ParsedSourceData {
        self.lines.sort_by_key(LyricLine::start);

        let attributes = Attributes {
            title: self.title.clone(),
            artist: (!self.artists.is_empty()).then(|| {
                self.artists
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join("/")
            }),
            ..Default::default()
        };

        let document = LyricsDocument::new(self.lines)
            .with_title(self.title.unwrap_or_default())
            .with_id(self.id.unwrap_or_default())
            .with_artists(self.artists);

        ParsedSourceData {
            document,
            attributes,
            source_format: Some(LyricFormat::Ttml),
            warnings: self.warnings,
        }
    }
}

/// 解析 TTML 格式内容到 `ParsedSourceData` 结构。
///
/// # 错误
/// XML 结构无效时返回 `ConvertError::Xml`。
pub fn parse_ttml(
    content: &str,
    _options: &ParsingOptions,
) -> Result<ParsedSourceData, ConvertError> {
    let mut reader = Reader::from_str(content);
    let decoder = reader.decoder();
    let mut parser = TtmlParser::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => parser.on_start(&e, decoder, false)?,
            Event::Empty(e) => parser.on_start(&e, decoder, true)?,
            Event::End(e) => parser.on_end(e.name().as_ref()),
            Event::Text(e) => {
                let text = e.decode()?;
                parser.on_text(&text);
            }
            Event::GeneralRef(e) => {
                if let Some(c) = e.resolve_char_ref()? {
                    parser.on_text(c.encode_utf8(&mut [0; 4]));
                } else {
                    let name = e.decode()?;
                    match resolve_predefined_entity(&name) {
                        Some(text) => parser.on_text(text),
                        None => debug!(entity = %name, "忽略未知的实体引用"),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(parser.into_parsed())
}
