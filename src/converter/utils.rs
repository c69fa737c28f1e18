//! 包含时间编解码与音节处理等工具函数的模块。

use crate::converter::types::{LyricsDocument, OPEN_END_MS, Syllable, TimeMillis};

/// 时间标签内部的时间文本，例如 `01:23.45`、`1:02:03.456`。
pub(crate) const TIME_PATTERN: &str = r"\d+(?::\d+){1,2}(?:\.\d+)?";

/// 将文本时间戳解析为毫秒。
///
/// 支持 `H:MM:SS.fff`、`MM:SS.fff` 与 `SS[.fff]`。
/// 小数部分会被右侧补零或截断为 3 位，因此 `5` 和 `50` 都表示 500 毫秒，`05` 表示 50 毫秒。
///
/// 任何解析失败（空字符串、非数字、多于 3 段、溢出）都返回 0。
#[must_use]
pub fn parse_time(text: &str) -> TimeMillis {
    try_parse_time(text).unwrap_or(0)
}

fn try_parse_time(text: &str) -> Option<TimeMillis> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let (seconds_part, leading) = parts.split_last()?;

    let (secs_str, frac_str) = match seconds_part.split_once('.') {
        Some((secs, frac)) => (secs, Some(frac)),
        None => (*seconds_part, None),
    };

    let frac_ms = match frac_str {
        Some(frac) => {
            if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let mut digits: String = frac.chars().take(3).collect();
            while digits.len() < 3 {
                digits.push('0');
            }
            digits.parse::<u64>().ok()?
        }
        None => 0,
    };

    let total_secs = leading
        .iter()
        .try_fold(0u64, |acc, part| {
            acc.checked_mul(60)?.checked_add(parse_digits(part)?)
        })?
        .checked_mul(60)?
        .checked_add(parse_digits(secs_str)?)?;

    total_secs.checked_mul(1000)?.checked_add(frac_ms)
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// 将毫秒格式化为 `HH:MM:SS.mmm`。负数输出 `00:00:00.000`。
#[must_use]
pub fn format_time(ms: i64) -> String {
    if ms < 0 {
        return "00:00:00.000".to_string();
    }
    let ms = ms.unsigned_abs();
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// 去掉文本开头的 UTF-8 BOM。
#[must_use]
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// 规范化文本中的空白字符
pub fn normalize_text_whitespace(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    trimmed.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// 把两个时间标签之间的原始文本追加为一个音节。
///
/// 前导空白会转移为前一个音节的尾随空格；只包含空白的文本不会产生新音节。
/// 返回是否真的追加了音节。
pub(crate) fn push_syllable(
    syllables: &mut Vec<Syllable>,
    raw_text_slice: &str,
    start: TimeMillis,
    end: TimeMillis,
) -> bool {
    let has_leading_space = raw_text_slice.starts_with(char::is_whitespace);
    let has_trailing_space = raw_text_slice.ends_with(char::is_whitespace);
    let clean_text = raw_text_slice.trim();

    if has_leading_space
        && let Some(last_syllable) = syllables.last_mut()
        && !last_syllable.content.ends_with(' ')
    {
        last_syllable.content.push(' ');
    }

    if clean_text.is_empty() {
        return false;
    }

    let mut content = clean_text.to_string();
    if has_trailing_space {
        content.push(' ');
    }
    syllables.push(Syllable::new(content, start, end.max(start)));
    true
}

/// 由 `(开始时间, 原始文本)` 片段构建音节列表。
///
/// 每个片段的结束时间为下一个片段的开始时间，最后一个片段的结束时间为 `last_end`。
/// 结束时间在丢弃空白片段之前计算，因此空白片段仍然会截断前一个音节。
pub(crate) fn syllables_from_segments(
    segments: &[(TimeMillis, &str)],
    last_end: TimeMillis,
) -> Vec<Syllable> {
    let mut syllables = Vec::with_capacity(segments.len());
    for (i, (start, raw_text)) in segments.iter().enumerate() {
        let end = segments.get(i + 1).map_or(last_end, |(next, _)| *next);
        push_syllable(&mut syllables, raw_text, *start, end);
    }
    syllables
}

/// 辅助函数，用于安全地将偏移量应用到时间戳上，结果不会小于 0。
fn offset_timestamp(timestamp: TimeMillis, offset: i64) -> TimeMillis {
    if timestamp == OPEN_END_MS {
        return timestamp;
    }
    timestamp.saturating_add_signed(offset)
}

/// 对整个文档应用一个时间偏移，返回新的文档。
///
/// # 参数
/// * `document` - 要偏移的文档。
/// * `offset_ms` - 要应用的偏移量（毫秒）。正数表示延迟歌词，负数表示提前歌词。
///
/// 开放结尾的哨兵值保持不变。
#[must_use]
pub fn apply_offset(document: LyricsDocument, offset_ms: i64) -> LyricsDocument {
    if offset_ms == 0 {
        return document;
    }
    let (lines, document) = document.into_parts();
    let lines = lines
        .into_iter()
        .map(|line| line.map_times(|t| offset_timestamp(t, offset_ms)))
        .collect();
    document.replace_lines(lines)
}

/// 字符是否属于中日韩文字（含假名与谚文）。
pub(crate) fn is_cjk_char(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xF900..=0xFAFF
        | 0xAC00..=0xD7AF
        | 0x1100..=0x11FF
        | 0x3130..=0x318F
        | 0x20000..=0x2FA1F
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::types::{LyricLine, PlainLine, SyllableLine};

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}[00:01.00]A"), "[00:01.00]A");
        assert_eq!(strip_bom("[00:01.00]A"), "[00:01.00]A");
        assert_eq!(strip_bom("A\u{feff}"), "A\u{feff}");
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("01:02.5"), 62_500);
        assert_eq!(parse_time("01:02.50"), 62_500);
        assert_eq!(parse_time("01:02.05"), 62_050);
        assert_eq!(parse_time("01:02.123"), 62_123);
        assert_eq!(parse_time("01:02.12345"), 62_123);
        assert_eq!(parse_time("1:02:03.456"), 3_723_456);
        assert_eq!(parse_time("12"), 12_000);
        assert_eq!(parse_time("12.5"), 12_500);
        assert_eq!(parse_time("00:00"), 0);
    }

    #[test]
    fn test_parse_time_is_total() {
        for input in [
            "",
            "invalid",
            ":::",
            "1:2:3:4",
            "aa:bb.cc",
            "01:02.",
            "01:-2.00",
            "99999999999999999999:00",
            " : ",
        ] {
            assert_eq!(parse_time(input), 0, "输入 {input:?} 应解析为 0");
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00:00.000");
        assert_eq!(format_time(62_500), "00:01:02.500");
        assert_eq!(format_time(3_723_456), "01:02:03.456");
        assert_eq!(format_time(-1), "00:00:00.000");
        assert_eq!(format_time(i64::MIN), "00:00:00.000");
    }

    #[test]
    fn test_format_parse_round_trip() {
        let day = 24 * 3_600_000;
        let mut t = 0;
        while t < day {
            assert_eq!(parse_time(&format_time(t)), t as u64, "往返失败: {t}");
            t += 7_919;
        }
        assert_eq!(parse_time(&format_time(day - 1)), (day - 1) as u64);
    }

    #[test]
    fn test_push_syllable_moves_leading_space() {
        let mut syllables = vec![Syllable::new("previous", 0, 100)];

        assert!(push_syllable(&mut syllables, " word", 100, 200));
        assert_eq!(syllables[0].content, "previous ");
        assert_eq!(syllables[1].content, "word");
    }

    #[test]
    fn test_push_syllable_whitespace_only() {
        let mut syllables = vec![Syllable::new("previous", 0, 100)];

        assert!(!push_syllable(&mut syllables, "   ", 100, 200), "纯空格不应产生新音节");
        assert_eq!(syllables.len(), 1);
        assert_eq!(syllables[0].content, "previous ");

        let mut empty = Vec::new();
        assert!(!push_syllable(&mut empty, " ", 0, 10));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_syllables_from_segments_chains_end_times() {
        let segments = [(100, "He"), (300, "llo "), (500, " "), (700, "world")];
        let syllables = syllables_from_segments(&segments, 900);

        assert_eq!(syllables.len(), 3);
        assert_eq!((syllables[0].start, syllables[0].end), (100, 300));
        assert_eq!((syllables[1].start, syllables[1].end), (300, 500));
        assert_eq!(syllables[1].content, "llo ");
        assert_eq!((syllables[2].start, syllables[2].end), (700, 900));
    }

    #[test]
    fn test_normalize_text_whitespace() {
        assert_eq!(normalize_text_whitespace("  a   b \t c "), "a b c");
        assert_eq!(normalize_text_whitespace("   "), "");
    }

    #[test]
    fn test_apply_offset_saturates_and_keeps_open_end() {
        let plain = PlainLine::new("last", None, 1000, OPEN_END_MS).unwrap();
        let karaoke = SyllableLine::new(vec![
            Syllable::new("a", 200, 400),
            Syllable::new("b", 400, 800),
        ])
        .unwrap();
        let doc = LyricsDocument::new(vec![karaoke.into(), plain.into()]).with_title("t");

        let shifted = apply_offset(doc, -500);

        assert_eq!(shifted.title(), "t");
        let first = &shifted.lines()[0];
        assert_eq!(first.start(), 0);
        assert_eq!(first.end(), 300);
        assert_eq!(first.syllables()[0].end, 0);
        assert_eq!(first.syllables()[1].start, 0);
        assert_eq!(shifted.lines()[1].start(), 500);
        assert_eq!(shifted.lines()[1].end(), OPEN_END_MS);

        let delayed = apply_offset(shifted, 250);
        assert!(matches!(&delayed.lines()[1], LyricLine::Plain(p) if p.start() == 750));
    }

    #[test]
    fn test_is_cjk_char() {
        assert!(is_cjk_char('你'));
        assert!(is_cjk_char('あ'));
        assert!(is_cjk_char('한'));
        assert!(!is_cjk_char('a'));
        assert!(!is_cjk_char('é'));
    }
}
