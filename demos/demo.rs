//! 用于演示 `synced_lyrics_rs` 库的核心功能。
//!
//! ## 如何运行
//!
//! ```bash
//! cargo run --example demo -- [歌词文件] [配置文件]
//! ```
//!
//! 不提供歌词文件时使用内置的增强型 LRC 样例。

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use synced_lyrics_rs::{LyricsConfig, export_with_options, query_active_lines};

const SAMPLE: &str = "[ti:Demo]
[00:01.00]v1: <00:01.00>Twin<00:01.40>kle <00:01.80>twin<00:02.20>kle<00:03.00>
[bg: <00:02.00>ooh<00:03.50>]
[00:01.00]一闪一闪
[00:04.00]v2: <00:04.00>lit<00:04.40>tle <00:04.80>star
";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let content = match args.next() {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("读取歌词文件 '{path}' 失败"))?,
        None => SAMPLE.to_string(),
    };
    let config = match args.next() {
        Some(path) => LyricsConfig::load_from_path(&path)
            .with_context(|| format!("加载配置文件 '{path}' 失败"))?,
        None => LyricsConfig::default(),
    };

    let parser = config.build_parser();
    let parsed = parser.parse_detailed(&content);
    let Some(format) = &parsed.source_format else {
        warn!("无法识别歌词格式，程序退出。");
        return Ok(());
    };
    for warning in &parsed.warnings {
        warn!("{warning}");
    }

    let document = &parsed.document;
    info!("识别为 {format} 格式，共 {} 行", document.len());
    for (i, line) in document.lines().iter().enumerate() {
        let kind = if line.is_accompaniment() { "背景" } else { "主唱" };
        info!(
            "#{i} [{} - {}] ({kind}, {:?}) {}",
            line.start(),
            line.end(),
            line.alignment(),
            line.text()
        );
    }

    for position in (0..6000).step_by(500) {
        let active = query_active_lines(document, position);
        let texts: Vec<String> = active
            .iter()
            .map(|&i| document.lines()[i].text())
            .collect();
        info!("{position:>5} ms -> {texts:?}");
    }

    println!("{}", export_with_options(document, config.export));
    Ok(())
}
