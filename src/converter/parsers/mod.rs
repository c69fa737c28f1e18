//! 歌词解析器模块

pub mod enhanced_lrc_parser;
pub mod lrc_parser;
pub mod lys_parser;
pub mod ttml_parser;
pub mod word_lrc_parser;
