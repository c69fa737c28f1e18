#![warn(missing_docs)]

//! # Synced Lyrics RS
//!
//! 一个用于解析、查询和导出同步歌词的 Rust 库。
//!
//! ## 主要功能
//!
//! - **格式识别**: 按优先级对整段文本运行检测器，自动判断 TTML、LRC、逐字 LRC、增强型 LRC 与 LYS。
//! - **歌词解析**: 所有格式都被解析为统一的 [`LyricsDocument`]，包含逐行与逐字两种歌词行。
//! - **位置查询**: 以二分查找回答"当前播放位置应高亮哪一行/哪几行"，适合每帧调用。
//! - **歌词导出**: 把文档导出为规范的 LRC 文本。
//!
//! ## 示例
//!
//! ```rust
//! let document = synced_lyrics_rs::parse("[00:01.00]Hello\n[00:01.00]你好\n[00:05.00]World");
//!
//! assert_eq!(document.len(), 2);
//! assert_eq!(document.lines()[0].translation(), Some("你好"));
//! assert_eq!(synced_lyrics_rs::query_active_line(&document, 3000), Some(0));
//!
//! let lrc = synced_lyrics_rs::export(&document);
//! assert!(lrc.contains("[00:00:01.000]Hello"));
//! ```
//!
//! ## 自定义格式
//!
//! ```rust
//! use synced_lyrics_rs::converter::{AutoParser, LyricFormat, ParsingOptions, ParsedSourceData};
//!
//! let parser = AutoParser::builder()
//!     .register(
//!         LyricFormat::custom("nothing"),
//!         |text: &str| text.starts_with("#NOTHING"),
//!         |_: &str, _: &ParsingOptions| -> Result<ParsedSourceData, synced_lyrics_rs::converter::ConvertError> {
//!             Ok(ParsedSourceData::default())
//!         },
//!     )
//!     .build();
//!
//! assert!(parser.parse("#NOTHING").is_empty());
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod query;

use std::sync::LazyLock;

pub use crate::{
    config::LyricsConfig,
    converter::{
        AutoParser, AutoParserBuilder, LyricFormat, LyricsParser,
        types::{
            Alignment, Artist, Attributes, ExportOptions, LyricLine, LyricsDocument,
            OPEN_END_MS, ParsedSourceData, ParsingOptions, PlainLine, Syllable, SyllableLine,
            TimeMillis,
        },
        utils::{format_time, parse_time},
    },
    error::{LyricsError, Result},
    query::{collect_active_lines, query_active_line, query_active_lines, query_primary_line},
};

/// 只包含内置格式的全局分派器。
static DEFAULT_PARSER: LazyLock<AutoParser> = LazyLock::new(AutoParser::new);

/// 自动识别格式并解析歌词。
///
/// 此函数不会失败：无法识别格式或解析失败时返回空文档。
#[must_use]
pub fn parse(text: &str) -> LyricsDocument {
    DEFAULT_PARSER.parse(text)
}

/// 自动识别格式并返回完整的解析结果（头部标签、格式与警告）。
#[must_use]
pub fn parse_detailed(text: &str) -> ParsedSourceData {
    DEFAULT_PARSER.parse_detailed(text)
}

/// 按格式名称（如 `"lrc"`、`"lys"`）解析，不做格式识别。
///
/// # 错误
/// 格式名称没有对应的内置解析器，或解析器返回错误时返回 `LyricsError`。
pub fn parse_as(text: &str, format_name: &str) -> Result<ParsedSourceData> {
    let format: LyricFormat = format_name
        .parse()
        .map_err(|_| LyricsError::Parser(format!("无效的格式名称: '{format_name}'")))?;
    Ok(DEFAULT_PARSER.parse_with_format(text, &format)?)
}

/// 使用默认选项把文档导出为 LRC 文本。
#[must_use]
pub fn export(document: &LyricsDocument) -> String {
    converter::generators::lrc_generator::generate_lrc(document)
}

/// 使用指定选项把文档导出为 LRC 文本。
#[must_use]
pub fn export_with_options(document: &LyricsDocument, options: ExportOptions) -> String {
    converter::generators::lrc_generator::generate_lrc_with_options(document, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_as_named_format() {
        let data = parse_as("[00:01.00]<00:01.00>Hi", "elrc").unwrap();
        assert_eq!(data.source_format, Some(LyricFormat::EnhancedLrc));

        let err = parse_as("[00:01.00]Hi", "krc").unwrap_err();
        assert!(matches!(err, LyricsError::Parser(_)));
    }

    #[test]
    fn test_export_then_parse_keeps_content() {
        let first = parse("[ti:Song]\n[00:01.00]Hello\n[00:01.00]你好\n[00:04.50]World\n[00:09.00]End");
        let second = parse(&export(&first));

        assert_eq!(first.len(), second.len());
        for (a, b) in first.lines().iter().zip(second.lines()) {
            assert_eq!(a.start(), b.start());
            assert_eq!(a.text(), b.text());
            assert_eq!(a.translation(), b.translation());
        }
    }
}
