//! 歌词处理器模块

pub mod metadata_processor;
