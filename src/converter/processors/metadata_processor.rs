//! 元数据处理器。
//!
//! 处理逐行类格式共有的 `[key:value]` 头部标签，与歌词正文的具体格式无关。

use std::sync::LazyLock;

use regex::Regex;
use strum_macros::EnumString;
use tracing::trace;

use crate::converter::types::Attributes;

/// 能被识别的头部标签。标签名区分大小写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum AttributeTag {
    /// 艺术家
    #[strum(serialize = "ar")]
    Artist,
    /// 标题
    #[strum(serialize = "ti")]
    Title,
    /// 专辑
    #[strum(serialize = "al")]
    Album,
    /// 时间偏移（毫秒）
    #[strum(serialize = "offset")]
    Offset,
    /// 歌曲时长
    #[strum(serialize = "length")]
    Length,
    /// 制作工具，只识别、不保存
    #[strum(serialize = "tool")]
    Tool,
}

static ATTRIBUTE_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<key>ar|ti|al|offset|length|tool):(?P<value>.*)\]$")
        .expect("编译 ATTRIBUTE_TAG_REGEX 失败")
});

/// 尝试把一行解析为可识别的头部标签。
#[must_use]
pub fn parse_attribute_line(line: &str) -> Option<(AttributeTag, &str)> {
    let caps = ATTRIBUTE_TAG_REGEX.captures(line.trim())?;
    let tag = caps.name("key")?.as_str().parse::<AttributeTag>().ok()?;
    let value = caps.name("value")?.as_str().trim();
    Some((tag, value))
}

/// 过滤掉所有可识别的头部标签行。
///
/// 格式不符或标签名无法识别的方括号行属于正文，会原样保留。
pub fn remove_attributes<'a, I>(lines: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| parse_attribute_line(line).is_none())
        .collect()
}

/// 从所有行中提取头部标签。
///
/// `offset` 与 `length` 按整数解析，失败时记为 0；同一标签出现多次时以最后一次为准。
pub fn parse_attributes<'a, I>(lines: I) -> Attributes
where
    I: IntoIterator<Item = &'a str>,
{
    let mut attributes = Attributes::default();

    for (tag, value) in lines.into_iter().filter_map(parse_attribute_line) {
        trace!(?tag, value, "解析到头部标签");
        match tag {
            AttributeTag::Artist => attributes.artist = Some(value.to_string()),
            AttributeTag::Title => attributes.title = Some(value.to_string()),
            AttributeTag::Album => attributes.album = Some(value.to_string()),
            AttributeTag::Offset => attributes.offset = Some(value.parse().unwrap_or(0)),
            AttributeTag::Length => attributes.duration = Some(value.parse().unwrap_or(0)),
            AttributeTag::Tool => {}
        }
    }

    attributes
}
