//! 增强型 LRC (Enhanced LRC) 格式解析器。
//!
//! 支持以下写法：
//! 1. `[line_time]v1: 前缀<word_time>word<word_time>word<end_time>`
//! 2. `[bg: <word_time>word<word_time>word]` 背景人声行
//!
//! 没有内联标签的文本会成为一个整行音节。每个音节的结束时间是同一行下一个音节的开始时间，
//! 最后一个音节在所有行解析完成后再确定结束时间。

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::converter::{
    processors::metadata_processor::{parse_attributes, remove_attributes},
    types::{
        Alignment, ConvertError, LyricFormat, LyricLine, LyricsDocument, ParsedSourceData,
        ParsingOptions, Syllable, SyllableLine, TimeMillis,
    },
    utils::{TIME_PATTERN, parse_time, syllables_from_segments},
};

/// 主歌词行，例如 `[00:12.34]text`
static LINE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\[({TIME_PATTERN})\](.*)$")).expect("编译 LINE_TIME_RE 失败")
});
/// 背景人声行，例如 `[bg: <00:12.34>ooh]`
static BACKGROUND_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[bg:\s*(.*)\]$").expect("编译 BACKGROUND_LINE_RE 失败"));
/// 逐字时间标签，例如 `<00:12.34>`
static WORD_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"<({TIME_PATTERN})>")).expect("编译 WORD_TIME_RE 失败")
});
/// 行首的声部标记，例如 `v1:`
static VOICE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(v\d+):\s*").expect("编译 VOICE_MARKER_RE 失败"));

/// 解析中的一行，结束时间尚未最终确定。
struct PendingLine {
    syllables: Vec<Syllable>,
    alignment: Alignment,
    is_background: bool,
    translation: Option<String>,
}

impl PendingLine {
    fn start(&self) -> TimeMillis {
        self.syllables.first().map_or(0, |s| s.start)
    }

    fn text(&self) -> String {
        self.syllables
            .iter()
            .map(|s| s.content.as_str())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// 解析增强型 LRC 格式内容到 `ParsedSourceData` 结构。
pub fn parse_enhanced_lrc(
    content: &str,
    options: &ParsingOptions,
) -> Result<ParsedSourceData, ConvertError> {
    let attributes = parse_attributes(content.lines());
    let mut warnings: Vec<String> = Vec::new();
    let mut pending: Vec<PendingLine> = Vec::new();
    let mut last_primary_start: Option<TimeMillis> = None;

    for line in remove_attributes(content.lines()) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = BACKGROUND_LINE_RE.captures(line) {
            let body = caps.get(1).map_or("", |m| m.as_str());
            let anchor = WORD_TIME_RE
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| parse_time(m.as_str()))
                .or(last_primary_start);

            let Some(anchor) = anchor else {
                warnings.push(format!("背景人声行前没有主歌词行，已忽略: '{line}'"));
                continue;
            };

            let syllables = parse_inline_syllables(body, anchor);
            if syllables.is_empty() {
                debug!(line, "跳过空白的背景人声行");
                continue;
            }
            pending.push(PendingLine {
                syllables,
                alignment: Alignment::Unspecified,
                is_background: true,
                translation: None,
            });
        } else if let Some(caps) = LINE_TIME_RE.captures(line) {
            let start = caps.get(1).map_or(0, |m| parse_time(m.as_str()));
            let mut body = caps.get(2).map_or("", |m| m.as_str());
            last_primary_start = Some(start);

            let mut alignment = Alignment::Unspecified;
            if let Some(voice) = VOICE_MARKER_RE.captures(body)
                && let (Some(whole), Some(marker)) = (voice.get(0), voice.get(1))
            {
                alignment = Alignment::from_voice(marker.as_str());
                body = &body[whole.end()..];
            }

            let syllables = parse_inline_syllables(body, start);
            if syllables.is_empty() {
                debug!(line, "跳过空白的歌词行");
                continue;
            }
            pending.push(PendingLine {
                syllables,
                alignment,
                is_background: false,
                translation: None,
            });
        } else {
            warnings.push(format!(
                "无法识别的行格式，已忽略: '{}'",
                line.chars().take(50).collect::<String>()
            ));
        }
    }

    propagate_background_alignment(&mut pending);
    let consumed = pair_translations(&mut pending);

    let kept: Vec<PendingLine> = pending
        .into_iter()
        .zip(consumed)
        .filter_map(|(line, is_translation)| (!is_translation).then_some(line))
        .collect();

    let lines = finalize_lines(kept, options.final_syllable_fallback_ms, &mut warnings);

    Ok(ParsedSourceData {
        document: LyricsDocument::new(lines),
        attributes,
        source_format: Some(LyricFormat::EnhancedLrc),
        warnings,
    })
}

/// 把一段行文本按 `<时间>` 标签切分为音节。
///
/// 第一个标签之前的文本是一个从 `line_start` 开始的音节，最后一个音节暂时是零时长。
fn parse_inline_syllables(body: &str, line_start: TimeMillis) -> Vec<Syllable> {
    let mut segments: Vec<(TimeMillis, &str)> = Vec::new();
    let mut cursor = 0;
    let mut current_start = line_start;

    for caps in WORD_TIME_RE.captures_iter(body) {
        let (Some(whole), Some(time)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        segments.push((current_start, &body[cursor..whole.start()]));
        current_start = parse_time(time.as_str());
        cursor = whole.end();
    }
    segments.push((current_start, &body[cursor..]));

    let last_start = segments.last().map_or(line_start, |(start, _)| *start);
    syllables_from_segments(&segments, last_start)
}

/// 背景人声行继承它之前最近一个主歌词行的对齐方式。
fn propagate_background_alignment(lines: &mut [PendingLine]) {
    let mut current = Alignment::Unspecified;
    for line in lines.iter_mut() {
        if line.is_background {
            line.alignment = current;
        } else {
            current = line.alignment;
        }
    }
}

/// 在主歌词行之间配对翻译，背景人声行不参与配对也不打断配对。
///
/// 返回每一行是否已作为翻译被合并。
fn pair_translations(lines: &mut [PendingLine]) -> Vec<bool> {
    let mut consumed = vec![false; lines.len()];
    let primary: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.is_background)
        .map(|(i, _)| i)
        .collect();

    let mut k = 0;
    while k < primary.len() {
        let current = primary[k];
        if let Some(&next) = primary.get(k + 1)
            && lines[next].start() == lines[current].start()
        {
            let translation = lines[next].text();
            lines[current].translation = Some(translation).filter(|t| !t.is_empty());
            consumed[next] = true;
            k += 2;
        } else {
            k += 1;
        }
    }

    consumed
}

/// 确定零时长末尾音节的结束时间，并构建最终的歌词行。
///
/// 末尾音节延伸到之后第一个开始得更晚的行，文档末尾则使用 `fallback_ms`。
fn finalize_lines(
    mut lines: Vec<PendingLine>,
    fallback_ms: u64,
    warnings: &mut Vec<String>,
) -> Vec<LyricLine> {
    let starts: Vec<(TimeMillis, bool)> = lines
        .iter()
        .map(|line| (line.start(), line.is_background))
        .collect();

    for (i, line) in lines.iter_mut().enumerate() {
        let is_background = line.is_background;
        if let Some(last) = line.syllables.last_mut()
            && last.end == last.start
        {
            // 主歌词行只以后续主歌词行为锚点
            last.end = starts[i + 1..]
                .iter()
                .filter(|(_, later_is_background)| is_background || !later_is_background)
                .map(|&(s, _)| s)
                .find(|&s| s > last.start)
                .unwrap_or_else(|| last.start.saturating_add(fallback_ms));
        }
    }

    let mut result = Vec::with_capacity(lines.len());
    for line in lines {
        match SyllableLine::new(line.syllables) {
            Ok(built) => result.push(LyricLine::Syllable(
                built
                    .with_translation(line.translation)
                    .with_accompaniment(line.is_background)
                    .with_alignment(line.alignment),
            )),
            Err(e) => {
                warn!("丢弃无效的增强型 LRC 行: {e}");
                warnings.push(e.to_string());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::types::DEFAULT_FINAL_SYLLABLE_MS;

    fn parse(content: &str) -> ParsedSourceData {
        parse_enhanced_lrc(content, &ParsingOptions::default()).expect("解析不应失败")
    }

    #[test]
    fn test_inline_tags_become_syllables() {
        let data = parse("[00:01.000]<00:01.000>Hel<00:01.300>lo <00:01.600>world<00:02.000>");
        let line = &data.document.lines()[0];
        let syllables = line.syllables();

        assert_eq!(syllables.len(), 3);
        assert_eq!(syllables[0].content, "Hel");
        assert_eq!((syllables[0].start, syllables[0].end), (1000, 1300));
        assert_eq!(syllables[1].content, "lo ");
        assert_eq!((syllables[2].start, syllables[2].end), (1600, 2000));
        assert_eq!(line.text(), "Hello world");
        assert_eq!(line.end(), 2000);
    }

    #[test]
    fn test_prefix_text_and_untagged_lines() {
        let data = parse("[00:01.00]Oh <00:01.50>yeah\n[00:03.00]Whole line");
        let lines = data.document.lines();

        assert_eq!(lines[0].syllables()[0].content, "Oh ");
        assert_eq!(lines[0].syllables()[0].start, 1000);
        assert_eq!(lines[0].syllables()[1].end, 3000, "末尾音节延伸到下一行开始");
        assert_eq!(lines[1].syllables().len(), 1);
        assert_eq!(lines[1].syllables()[0].content, "Whole line");
        assert_eq!(lines[1].end(), 3000 + DEFAULT_FINAL_SYLLABLE_MS);
    }

    #[test]
    fn test_voice_markers_set_alignment() {
        let data = parse("[00:01.00]v1: Left\n[00:02.00]v2:Right\n[00:03.00]v3: Other\n[00:04.00]None");
        let lines = data.document.lines();

        assert_eq!(lines[0].alignment(), Alignment::Start);
        assert_eq!(lines[0].text(), "Left");
        assert_eq!(lines[1].alignment(), Alignment::End);
        assert_eq!(lines[1].text(), "Right");
        assert_eq!(lines[2].alignment(), Alignment::Unspecified);
        assert_eq!(lines[3].alignment(), Alignment::Unspecified);
    }

    #[test]
    fn test_background_lines_inherit_alignment() {
        let content = "[00:01.00]v2: <00:01.00>Call\n\
                       [bg: <00:01.20>ooh<00:01.80>]\n\
                       [bg: ahh]\n\
                       [00:03.00]v1: Answer\n\
                       [bg: <00:03.50>yeah]";
        let data = parse(content);
        let lines = data.document.lines();

        assert_eq!(lines.len(), 5);
        assert!(lines[1].is_accompaniment());
        assert_eq!(lines[1].alignment(), Alignment::End);
        assert_eq!((lines[1].start(), lines[1].end()), (1200, 1800));
        assert_eq!(lines[2].start(), 1000, "无标签的背景行锚定在前一主歌词行");
        assert_eq!(lines[2].alignment(), Alignment::End);
        assert_eq!(lines[4].alignment(), Alignment::Start);
        assert!(!lines[3].is_accompaniment());
    }

    #[test]
    fn test_background_without_primary_is_dropped() {
        let data = parse("[bg: ooh]\n[00:01.00]Hello");
        assert_eq!(data.document.len(), 1);
        assert_eq!(data.warnings.len(), 1);
    }

    #[test]
    fn test_translation_pairs_skip_background_lines() {
        let content = "[00:01.00]v1: <00:01.00>Hello\n\
                       [bg: <00:01.20>ooh]\n\
                       [00:01.00]你好\n\
                       [00:03.00]Next";
        let data = parse(content);
        let lines = data.document.lines();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].translation(), Some("你好"));
        assert!(lines[1].is_accompaniment());
        assert_eq!(lines[1].translation(), None);
        assert_eq!(lines[2].text(), "Next");
    }

    #[test]
    fn test_background_line_does_not_end_primary_line() {
        let data = parse(
            "[00:01.00]<00:01.00>Hel<00:01.40>lo\n[bg: <00:01.50>ooh<00:02.00>]\n[00:04.00]Next",
        );
        let lines = data.document.lines();

        assert_eq!((lines[0].start(), lines[0].end()), (1000, 4000), "主歌词行延伸到下一主歌词行");
        assert_eq!((lines[1].start(), lines[1].end()), (1500, 2000));

        let document = &data.document;
        assert_eq!(crate::query::query_active_lines(document, 1800), vec![0, 1]);
        assert_eq!(crate::query::query_primary_line(document, 1800), Some(0));
    }

    #[test]
    fn test_background_last_syllable_uses_next_line() {
        let data = parse("[00:01.00]<00:01.00>Call\n[bg: <00:01.50>ooh]\n[bg: <00:02.50>ahh]\n[00:04.00]Next");
        let lines = data.document.lines();

        assert_eq!(lines[1].end(), 2500, "背景人声行可以以任意后续行为锚点");
        assert_eq!(lines[2].end(), 4000);
        assert_eq!(lines[0].end(), 4000);
    }

    #[test]
    fn test_blank_syllables_are_dropped() {
        let data = parse("[00:01.00]<00:01.00>A<00:01.20> <00:01.40>B");
        let syllables = data.document.lines()[0].syllables();

        assert_eq!(syllables.len(), 2);
        assert_eq!(syllables[0].content, "A ");
        assert_eq!(syllables[0].end, 1200);
        assert_eq!(syllables[1].content, "B");
    }

    #[test]
    fn test_file_order_is_preserved() {
        let data = parse("[00:05.00]Later\n[00:01.00]Earlier");
        let lines = data.document.lines();
        assert_eq!(lines[0].text(), "Later");
        assert_eq!(lines[1].text(), "Earlier");
    }

    #[test]
    fn test_custom_fallback_duration() {
        let options = ParsingOptions {
            final_syllable_fallback_ms: 1000,
            ..Default::default()
        };
        let data = parse_enhanced_lrc("[00:01.00]Solo", &options).unwrap();
        assert_eq!(data.document.lines()[0].end(), 2000);
    }
}
