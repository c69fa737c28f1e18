//! 逐字 LRC 格式解析器。
//!
//! 行首的 `[时间]` 打开一行，行内后续的 `[时间]` 标签标记后续音节的开始时间，例如
//! `[00:01.000]Hel[00:01.300]lo [00:01.600]world`。

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::converter::{
    processors::metadata_processor::{parse_attributes, remove_attributes},
    types::{
        ConvertError, LyricFormat, LyricLine, LyricsDocument, ParsedSourceData, ParsingOptions,
        Syllable, SyllableLine, TimeMillis,
    },
    utils::{TIME_PATTERN, is_cjk_char, parse_time, syllables_from_segments},
};

static LINE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\[({TIME_PATTERN})\](.*)$")).expect("编译 LINE_START_RE 失败")
});
static WORD_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\[({TIME_PATTERN})\]")).expect("编译 WORD_TIME_RE 失败")
});

/// 解析逐字 LRC 格式内容到 `ParsedSourceData` 结构。
pub fn parse_word_lrc(
    content: &str,
    options: &ParsingOptions,
) -> Result<ParsedSourceData, ConvertError> {
    let attributes = parse_attributes(content.lines());
    let mut warnings: Vec<String> = Vec::new();
    let mut parsed: Vec<Vec<Syllable>> = Vec::new();

    for line in remove_attributes(content.lines()) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = LINE_START_RE.captures(line) else {
            warnings.push(format!("无法识别的逐字 LRC 行，已忽略: '{line}'"));
            continue;
        };
        let start = caps.get(1).map_or(0, |m| parse_time(m.as_str()));
        let body = caps.get(2).map_or("", |m| m.as_str());

        let syllables = parse_word_syllables(body, start, options.final_syllable_fallback_ms);
        if syllables.is_empty() {
            debug!(line, "跳过空白的逐字 LRC 行");
            continue;
        }
        parsed.push(syllables);
    }

    let mut lines = Vec::with_capacity(parsed.len());
    let mut iter = parsed.into_iter().peekable();
    while let Some(current) = iter.next() {
        let paired_with_next = iter
            .peek()
            .is_some_and(|next| next.first().map(|s| s.start) == current.first().map(|s| s.start));

        let (original, translation) = if paired_with_next {
            let Some(next) = iter.next() else {
                break;
            };
            if first_is_original(&collapse(&current), &collapse(&next)) {
                (current, Some(collapse(&next)))
            } else {
                (next, Some(collapse(&current)))
            }
        } else {
            (current, None)
        };

        match SyllableLine::new(original) {
            Ok(line) => lines.push(LyricLine::Syllable(
                line.with_translation(translation.filter(|t| !t.is_empty())),
            )),
            Err(e) => {
                warn!("丢弃无效的逐字 LRC 行: {e}");
                warnings.push(e.to_string());
            }
        }
    }

    // 这种格式不保证原文与翻译的先后顺序，最后统一按开始时间稳定排序
    lines.sort_by_key(LyricLine::start);

    Ok(ParsedSourceData {
        document: LyricsDocument::new(lines),
        attributes,
        source_format: Some(LyricFormat::WordByWordLrc),
        warnings,
    })
}

fn parse_word_syllables(body: &str, line_start: TimeMillis, fallback_ms: u64) -> Vec<Syllable> {
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

    let last_end = current_start.saturating_add(fallback_ms);
    syllables_from_segments(&segments, last_end)
}

fn collapse(syllables: &[Syllable]) -> String {
    syllables
        .iter()
        .map(|s| s.content.as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

fn letters(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().filter(|c| c.is_alphabetic())
}

fn is_cjk_only(text: &str) -> bool {
    letters(text).next().is_some() && letters(text).all(is_cjk_char)
}

fn is_ascii_letters_only(text: &str) -> bool {
    letters(text).next().is_some() && letters(text).all(|c| c.is_ascii_alphabetic())
}

fn has_non_ascii_letters(text: &str) -> bool {
    letters(text).any(|c| !c.is_ascii())
}

/// 判断两行同时间的歌词中，先出现的一行是否为原文。
///
/// 只有一行是纯中日韩文字时，该行为原文；否则若一行只含 ASCII 字母而另一行含有非 ASCII 字母，
/// ASCII 一行为原文；其余情况以先出现的一行为原文。混合文字的原文可能被误判。
fn first_is_original(first: &str, second: &str) -> bool {
    let (first_cjk, second_cjk) = (is_cjk_only(first), is_cjk_only(second));
    if first_cjk != second_cjk {
        return first_cjk;
    }
    if is_ascii_letters_only(first) && has_non_ascii_letters(second) {
        return true;
    }
    if is_ascii_letters_only(second) && has_non_ascii_letters(first) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ParsedSourceData {
        parse_word_lrc(content, &ParsingOptions::default()).expect("解析不应失败")
    }

    #[test]
    fn test_embedded_tags_split_syllables() {
        let data = parse("[00:01.000]Hel[00:01.300]lo [00:01.600]world");
        let line = &data.document.lines()[0];
        let syllables = line.syllables();

        assert_eq!(syllables.len(), 3);
        assert_eq!((syllables[0].start, syllables[0].end), (1000, 1300));
        assert_eq!(syllables[1].content, "lo ");
        assert_eq!((syllables[2].start, syllables[2].end), (1600, 2100));
        assert_eq!(line.text(), "Hello world");
    }

    #[test]
    fn test_line_without_embedded_tags_is_one_syllable() {
        let data = parse("[00:02.00]Whole line");
        let syllables = data.document.lines()[0].syllables();

        assert_eq!(syllables.len(), 1);
        assert_eq!(syllables[0].content, "Whole line");
        assert_eq!(syllables[0].end, 2500);
    }

    #[test]
    fn test_translation_before_original_is_swapped() {
        let data = parse("[00:01.00]你[00:01.50]好\n[00:01.00]Hel[00:01.50]lo\n[00:03.00]Next");
        let lines = data.document.lines();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "你好");
        assert_eq!(lines[0].translation(), Some("Hello"));
    }

    #[test]
    fn test_cjk_line_wins_regardless_of_order() {
        let data = parse("[00:01.00]Hello\n[00:01.00]你好");
        assert_eq!(data.document.lines()[0].text(), "你好");
        assert_eq!(data.document.lines()[0].translation(), Some("Hello"));
    }

    #[test]
    fn test_ascii_line_beats_other_scripts() {
        let data = parse("[00:01.00]Привет\n[00:01.00]Hello");
        assert_eq!(data.document.lines()[0].text(), "Hello");
        assert_eq!(data.document.lines()[0].translation(), Some("Привет"));
    }

    #[test]
    fn test_first_line_wins_when_undecided() {
        let data = parse("[00:01.00]こんにちは\n[00:01.00]你好");
        assert_eq!(data.document.lines()[0].text(), "こんにちは");
        assert_eq!(data.document.lines()[0].translation(), Some("你好"));
    }

    #[test]
    fn test_output_is_sorted() {
        let data = parse("[00:05.00]B\n[00:01.00]A");
        let texts: Vec<String> = data.document.lines().iter().map(LyricLine::text).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn test_script_helpers() {
        assert!(is_cjk_only("你好，世界"));
        assert!(!is_cjk_only("你好 world"));
        assert!(!is_cjk_only("123"));
        assert!(is_ascii_letters_only("Hello, world!"));
        assert!(has_non_ascii_letters("Café"));
    }
}
