//! 负责处理库的配置。
//!
//! 配置以 JSON 表示，缺失的字段使用默认值：
//!
//! ```json
//! {
//!   "parsing": { "final_syllable_fallback_ms": 500, "malformed_token_policy": "DropLine", "apply_offset": false },
//!   "export": { "include_header": true, "gap_markers": true }
//! }
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    converter::{
        AutoParser,
        types::{ExportOptions, ParsingOptions},
    },
    error::Result,
};

/// 解析与导出的全部配置项。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    /// 解析选项。
    pub parsing: ParsingOptions,
    /// 导出选项。
    pub export: ExportOptions,
}

impl LyricsConfig {
    /// 从 JSON 字符串读取配置。
    ///
    /// # 错误
    /// JSON 无效时返回 `LyricsError::JsonParse`。
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从文件读取配置。
    ///
    /// # 错误
    /// 文件无法读取或内容不是有效的 JSON 时返回错误。
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        info!("已从 {} 加载歌词配置", path.display());
        Ok(config)
    }

    /// 将配置序列化为格式化的 JSON。
    ///
    /// # 错误
    /// 序列化失败时返回 `LyricsError::JsonParse`。
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 用当前的解析选项构建一个分派器。
    #[must_use]
    pub fn build_parser(&self) -> AutoParser {
        AutoParser::builder().options(self.parsing.clone()).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{converter::types::MalformedTokenPolicy, error::LyricsError};

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = LyricsConfig::from_json_str(r#"{"export":{"gap_markers":false}}"#).unwrap();

        assert_eq!(config.parsing, ParsingOptions::default());
        assert!(config.export.include_header);
        assert!(!config.export.gap_markers);
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = LyricsConfig {
            parsing: ParsingOptions {
                final_syllable_fallback_ms: 800,
                malformed_token_policy: MalformedTokenPolicy::Sentinel,
                apply_offset: true,
            },
            export: ExportOptions::default(),
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(LyricsConfig::from_json_str(&json).unwrap(), config);
        assert_eq!(config.build_parser().options(), &config.parsing);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let result = LyricsConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(LyricsError::JsonParse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = LyricsConfig::load_from_path("/nonexistent/synced-lyrics/config.json");
        assert!(matches!(result, Err(LyricsError::Io(_))));
    }
}
