//! # LRC 格式解析器

use std::{iter, sync::LazyLock};

use regex::Regex;
use tracing::debug;

use crate::converter::{
    processors::metadata_processor::{parse_attributes, remove_attributes},
    types::{
        ConvertError, LyricFormat, LyricLine, LyricsDocument, OPEN_END_MS, ParsedSourceData,
        ParsingOptions, PlainLine, TimeMillis,
    },
    utils::{TIME_PATTERN, normalize_text_whitespace, parse_time},
};

/// 用于匹配行内的每一个 `[时间]` 标签，捕获其中的时间文本
static LRC_TIMESTAMP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\[({TIME_PATTERN})\]")).expect("未能编译 LRC_TIMESTAMP_REGEX")
});

/// 一个时间标签与它所对应的文本。
struct TempLrcEntry {
    start: TimeMillis,
    text: String,
}

/// 配对后的条目。
struct PairedEntry {
    start: TimeMillis,
    text: String,
    translation: Option<String>,
}

/// 解析 LRC 格式内容到 `ParsedSourceData` 结构。
///
/// 同一物理行上的多个时间标签各自产生一行；紧邻的标签之间没有任何文本时，
/// 它们共享随后的文本。
pub fn parse_lrc(
    content: &str,
    _options: &ParsingOptions,
) -> Result<ParsedSourceData, ConvertError> {
    let attributes = parse_attributes(content.lines());
    let mut warnings: Vec<String> = Vec::new();
    let mut entries: Vec<TempLrcEntry> = Vec::new();

    for line in remove_attributes(content.lines()) {
        let line = line.trim();
        if line.is_empty() {
            continue; // 跳过空行
        }

        // (时间, 标签起始位置, 标签结束位置)
        let tags: Vec<(TimeMillis, usize, usize)> = LRC_TIMESTAMP_REGEX
            .captures_iter(line)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let time = caps.get(1)?;
                Some((parse_time(time.as_str()), whole.start(), whole.end()))
            })
            .collect();

        if !matches!(tags.first(), Some(&(_, 0, _))) {
            warnings.push(format!("LRC解析警告: 无法识别的行格式 '{line}'。"));
            continue;
        }

        let mut pending_starts = Vec::new();
        for (i, &(start, _, tag_end)) in tags.iter().enumerate() {
            let next_tag_start = tags.get(i + 1).map_or(line.len(), |&(_, s, _)| s);
            let raw_text = &line[tag_end..next_tag_start];
            pending_starts.push(start);

            // 紧邻的重复标签，等待后面的文本
            if raw_text.is_empty() && i + 1 < tags.len() {
                continue;
            }

            let text = normalize_text_whitespace(raw_text);
            for start in pending_starts.drain(..) {
                entries.push(TempLrcEntry {
                    start,
                    text: text.clone(),
                });
            }
        }
    }

    let mut paired = pair_entries(entries);

    // 稳定排序，时间相同的行保持出现顺序
    paired.sort_by_key(|e| e.start);

    let ends: Vec<TimeMillis> = paired
        .iter()
        .skip(1)
        .map(|e| e.start)
        .chain(iter::once(OPEN_END_MS))
        .collect();

    let mut lines = Vec::with_capacity(paired.len());
    for (entry, end) in paired.into_iter().zip(ends) {
        if entry.text.trim().is_empty() {
            debug!(start = entry.start, "跳过空白的 LRC 行");
            continue;
        }
        lines.push(LyricLine::Plain(PlainLine::clamped(
            entry.text,
            entry.translation,
            entry.start,
            end,
        )));
    }

    Ok(ParsedSourceData {
        document: LyricsDocument::new(lines),
        attributes,
        source_format: Some(LyricFormat::Lrc),
        warnings,
    })
}

/// 按提取顺序配对：紧随其后且开始时间完全相同的一行被视为翻译。
fn pair_entries(entries: Vec<TempLrcEntry>) -> Vec<PairedEntry> {
    let mut paired = Vec::with_capacity(entries.len());
    let mut iter = entries.into_iter().peekable();

    while let Some(current) = iter.next() {
        let translation = match iter.peek() {
            Some(next) if next.start == current.start => {
                iter.next().map(|t| t.text).filter(|t| !t.trim().is_empty())
            }
            _ => None,
        };
        paired.push(PairedEntry {
            start: current.start,
            text: current.text,
            translation,
        });
    }

    paired
}
