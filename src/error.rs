//! 定义了整个 `synced_lyrics_rs` 库的错误类型 `LyricsError`。
//!
//! 解析、导出和位置查询的入口本身不会失败；这里的错误只出现在加载配置、
//! 按名称指定格式解析等需要调用方处理失败的接口上。

use std::io;
use thiserror::Error;

use crate::converter::types::ConvertError;

/// 库的通用错误枚举。
#[derive(Error, Debug)]
pub enum LyricsError {
    /// JSON 解析失败 (源自 `serde_json::Error`)
    #[error("JSON 解析失败: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// XML 解析失败 (源自 `quick_xml::Error`)
    #[error("XML 解析失败: {0}")]
    XmlParse(#[from] quick_xml::Error),

    /// 整数解析失败 (源自 `std::num::ParseIntError`)
    #[error("整数解析失败: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// I/O 错误 (源自 `io::Error`)
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// 通用的歌词解析错误
    #[error("歌词解析失败: {0}")]
    Parser(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// `LyricsError` 的 `Result` 类型别名，方便在函数签名中使用。
pub type Result<T> = std::result::Result<T, LyricsError>;

impl From<ConvertError> for LyricsError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Xml(e) => Self::XmlParse(e),
            ConvertError::Attribute(e) => Self::XmlParse(e.into()),
            ConvertError::ParseInt(e) => Self::ParseInt(e),
            ConvertError::Encoding(e) => Self::Internal(format!("编码错误: {e}")),
            ConvertError::InvalidTime(s) | ConvertError::InvalidLyricFormat(s) => Self::Parser(s),
            ConvertError::Internal(s) => Self::Internal(s),
        }
    }
}
