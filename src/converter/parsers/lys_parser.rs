//! # LYS 格式解析器
//!
//! 每行由若干 `文本(开始,时长)` 组成，行首可以带一个 `[数字]` 属性标签：
//! 数字大于 5 表示背景人声，2、5、8 表示右对齐，其余为左对齐。

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::converter::{
    processors::metadata_processor::{parse_attribute_line, parse_attributes},
    types::{
        Alignment, ConvertError, LyricFormat, LyricLine, LyricsDocument, MalformedTokenPolicy,
        ParsedSourceData, ParsingOptions, Syllable, SyllableLine,
    },
    utils::push_syllable,
};

/// 遇到无法解析的音节时，`Sentinel` 策略使用的占位文本。
pub const SENTINEL_SYLLABLE_TEXT: &str = "Error";

// 匹配 LYS 行首的属性标签，如 `[4]`
static LYS_PROPERTY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d+)\]").expect("编译 LYS_PROPERTY_REGEX 失败"));

/// 匹配 LYS 音节的时间戳，如 `(100,200)`，也会匹配到内容不是数字的坏标签
static LYS_TIMESTAMP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?P<start>[^\s(),]*),(?P<duration>[^\s(),]*)\)")
        .expect("编译 LYS_TIMESTAMP_REGEX 失败")
});

/// 由属性标签得出 (是否背景人声, 对齐方式)。
fn line_properties(property: Option<u64>) -> (bool, Alignment) {
    match property {
        None => (false, Alignment::Start),
        Some(n) => {
            let alignment = if matches!(n, 2 | 5 | 8) {
                Alignment::End
            } else {
                Alignment::Start
            };
            (n > 5, alignment)
        }
    }
}

fn parse_token(start: &str, duration: &str) -> Result<(u64, u64), ConvertError> {
    let start: u64 = start.parse()?;
    let duration: u64 = duration.parse()?;
    let end = start.checked_add(duration).ok_or_else(|| {
        ConvertError::InvalidTime(format!("音节时间溢出: {start} + {duration}"))
    })?;
    Ok((start, end))
}

/// 解析单行 LYS 歌词文本。
fn parse_lys_line(
    line_str: &str,
    line_num: usize,
    policy: MalformedTokenPolicy,
) -> Result<LyricLine, ConvertError> {
    let (property, body) = match LYS_PROPERTY_REGEX.captures(line_str) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let property: u64 = caps[1].parse()?;
            (Some(property), &line_str[whole..])
        }
        None => (None, line_str),
    };
    let (is_background, alignment) = line_properties(property);

    let mut syllables: Vec<Syllable> = Vec::new();
    let mut has_sentinel = false;
    let mut last_match_end = 0;

    for ts_cap in LYS_TIMESTAMP_REGEX.captures_iter(body) {
        let Some(full_match) = ts_cap.get(0) else {
            continue;
        };
        let raw_text_slice = &body[last_match_end..full_match.start()];
        last_match_end = full_match.end();

        match parse_token(&ts_cap["start"], &ts_cap["duration"]) {
            Ok((start, end)) => {
                push_syllable(&mut syllables, raw_text_slice, start, end);
            }
            Err(e) => match policy {
                MalformedTokenPolicy::DropLine => {
                    return Err(ConvertError::InvalidLyricFormat(format!(
                        "第 {line_num} 行: 无效的音节时间 '{}': {e}",
                        full_match.as_str()
                    )));
                }
                MalformedTokenPolicy::Sentinel => {
                    warn!(line_num, "LYS 音节时间无效，使用占位音节: {e}");
                    has_sentinel = true;
                    syllables.push(Syllable::new(SENTINEL_SYLLABLE_TEXT, 0, 0));
                }
            },
        }
    }

    let line = if has_sentinel {
        SyllableLine::clamped(syllables)
    } else {
        SyllableLine::new(syllables).ok()
    };
    let line = line.ok_or_else(|| {
        ConvertError::InvalidLyricFormat(format!(
            "第 {line_num} 行: 发现了内容，但未能解析出任何有效的音节。"
        ))
    })?;

    Ok(LyricLine::Syllable(
        line.with_accompaniment(is_background)
            .with_alignment(alignment),
    ))
}

/// 解析 LYS 格式内容到 `ParsedSourceData` 结构。
pub fn parse_lys(
    content: &str,
    options: &ParsingOptions,
) -> Result<ParsedSourceData, ConvertError> {
    let attributes = parse_attributes(content.lines());
    let mut lines: Vec<LyricLine> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for (i, line_str) in content.lines().enumerate() {
        let line_num = i + 1;
        let trimmed_line = line_str.trim();

        if trimmed_line.is_empty() || parse_attribute_line(trimmed_line).is_some() {
            continue;
        }

        match parse_lys_line(trimmed_line, line_num, options.malformed_token_policy) {
            Ok(line) => lines.push(line),
            Err(e) => {
                warn!("LYS 行已跳过: {e}");
                warnings.push(format!("第 {line_num} 行: 解析失败，已跳过。错误: {e}"));
            }
        }
    }

    // 背景人声行可能早于它所属的主歌词行开始
    lines.sort_by_key(LyricLine::start);

    Ok(ParsedSourceData {
        document: LyricsDocument::new(lines),
        attributes,
        source_format: Some(LyricFormat::Lys),
        warnings,
    })
}
