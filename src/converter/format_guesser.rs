//! 歌词格式识别。
//!
//! 识别器是一个按优先级排列的 `(格式, 检测函数)` 列表，对整段文本依次检测，
//! 第一个命中的格式胜出。

use std::{fmt, sync::LazyLock};

use regex::Regex;

use crate::converter::{
    types::LyricFormat,
    utils::{TIME_PATTERN, strip_bom},
};

type Detector = Box<dyn Fn(&str) -> bool + Send + Sync>;

static TTML_NAMESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"xmlns(?::\w+)?\s*=\s*["']http://www\.w3\.org/ns/ttml"#)
        .expect("编译 TTML_NAMESPACE_REGEX 失败")
});

static LRC_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)^\s*\[{TIME_PATTERN}\]")).expect("编译 LRC_LINE_REGEX 失败")
});

static WORD_BY_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)\[{TIME_PATTERN}\][^\[\]\r\n]*[^\s\[\]][^\[\]\r\n]*\[{TIME_PATTERN}\]"
    ))
    .expect("编译 WORD_BY_WORD_REGEX 失败")
});

static ENHANCED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)<{TIME_PATTERN}>|^\s*\[bg:")).expect("编译 ENHANCED_REGEX 失败")
});

static LYS_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d+,\d+\)").expect("编译 LYS_TOKEN_REGEX 失败"));

fn detect_ttml(text: &str) -> bool {
    TTML_NAMESPACE_REGEX.is_match(text)
}

// 只有在文本里既没有逐字签名、也没有内联标签时才认为是普通 LRC。
fn detect_lrc(text: &str) -> bool {
    LRC_LINE_REGEX.is_match(text)
        && !WORD_BY_WORD_REGEX.is_match(text)
        && !ENHANCED_REGEX.is_match(text)
}

fn detect_word_by_word(text: &str) -> bool {
    WORD_BY_WORD_REGEX.is_match(text)
}

fn detect_enhanced(text: &str) -> bool {
    ENHANCED_REGEX.is_match(text)
}

fn detect_lys(text: &str) -> bool {
    LYS_TOKEN_REGEX.is_match(text)
}

/// 按优先级排列的格式识别器。
pub struct FormatGuesser {
    detectors: Vec<(LyricFormat, Detector)>,
}

impl FormatGuesser {
    /// 创建包含全部内置格式的识别器。
    #[must_use]
    pub fn new() -> Self {
        Self::empty()
            .with_format(LyricFormat::Lys, detect_lys)
            .with_format(LyricFormat::EnhancedLrc, detect_enhanced)
            .with_format(LyricFormat::WordByWordLrc, detect_word_by_word)
            .with_format(LyricFormat::Lrc, detect_lrc)
            .with_format(LyricFormat::Ttml, detect_ttml)
    }

    /// 创建不含任何格式的识别器。
    #[must_use]
    pub fn empty() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// 注册一个格式。新注册的格式排在最前面，拥有最高优先级。
    #[must_use]
    pub fn with_format<F>(mut self, format: LyricFormat, detector: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.detectors.insert(0, (format, Box::new(detector)));
        self
    }

    /// 用正则表达式注册一个格式，正则在文本任意位置命中即视为匹配。
    #[must_use]
    pub fn with_regex(self, format: LyricFormat, regex: Regex) -> Self {
        self.with_format(format, move |text| regex.is_match(text))
    }

    /// 猜测整段文本的格式，没有任何检测命中时返回 `None`。
    #[must_use]
    pub fn guess_format(&self, text: &str) -> Option<&LyricFormat> {
        let text = strip_bom(text);
        self.detectors
            .iter()
            .find(|(_, detect)| detect(text))
            .map(|(format, _)| format)
    }

    /// 按优先级列出所有已注册的格式。
    pub fn formats(&self) -> impl Iterator<Item = &LyricFormat> {
        self.detectors.iter().map(|(format, _)| format)
    }
}

impl Default for FormatGuesser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormatGuesser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.formats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTML: &str = r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttm="http://www.w3.org/ns/ttml#metadata"><body><div><p begin="00:01.000" end="00:02.000">Hi</p></div></body></tt>"#;

    #[test]
    fn test_builtin_priority_order() {
        let guesser = FormatGuesser::new();
        let formats: Vec<_> = guesser.formats().cloned().collect();
        assert_eq!(formats, LyricFormat::BUILTIN.to_vec());
    }

    #[test]
    fn test_guess_builtin_formats() {
        let guesser = FormatGuesser::new();
        let cases = [
            (TTML, LyricFormat::Ttml),
            ("[ti:Song]\n[00:01.00]Hello\n[00:03.00]World", LyricFormat::Lrc),
            ("[00:10.00][01:10.00]Chorus", LyricFormat::Lrc),
            (
                "[00:01.000]Hel[00:01.300]lo [00:01.600]world",
                LyricFormat::WordByWordLrc,
            ),
            (
                "[00:01.000]<00:01.000>Hel<00:01.300>lo",
                LyricFormat::EnhancedLrc,
            ),
            ("[00:01.00]v1: Hi\n[bg: ooh]", LyricFormat::EnhancedLrc),
            ("[4]Hello(100,200)world(300,300)", LyricFormat::Lys),
        ];
        for (text, expected) in cases {
            assert_eq!(guesser.guess_format(text), Some(&expected), "文本: {text}");
        }
    }

    #[test]
    fn test_structured_markup_wins_over_plain_lines() {
        let text = format!("[00:01.00]Hello\n{TTML}");
        assert_eq!(
            FormatGuesser::new().guess_format(&text),
            Some(&LyricFormat::Ttml)
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        let guesser = FormatGuesser::new();
        assert_eq!(guesser.guess_format(""), None);
        assert_eq!(guesser.guess_format("just some prose"), None);
        assert_eq!(guesser.guess_format("[ti:Only metadata]"), None);
    }

    #[test]
    fn test_custom_format_gets_first_refusal() {
        let guesser = FormatGuesser::new()
            .with_regex(
                LyricFormat::custom("yrc"),
                Regex::new(r"^\[\d+,\d+\]").expect("正则无效"),
            )
            .with_format(LyricFormat::custom("everything"), |_| true);

        assert_eq!(
            guesser.guess_format("[00:01.00]Hello"),
            Some(&LyricFormat::custom("everything"))
        );
        assert_eq!(guesser.formats().count(), 7);

        let yrc_only = FormatGuesser::new().with_regex(
            LyricFormat::custom("yrc"),
            Regex::new(r"^\[\d+,\d+\]").expect("正则无效"),
        );
        assert_eq!(
            yrc_only.guess_format("[1000,2000](1000,500,0)Hi"),
            Some(&LyricFormat::custom("yrc"))
        );
    }
}
