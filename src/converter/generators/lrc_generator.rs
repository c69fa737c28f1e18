//! LRC 格式生成器
//!
//! 把 `LyricsDocument` 导出为规范的逐行同步歌词文本，时间戳统一为 `[HH:MM:SS.mmm]`。

use std::fmt::{self, Write as FmtWrite};

use crate::converter::{
    types::{ExportOptions, LyricLine, LyricsDocument, TimeMillis},
    utils::format_time,
};

/// 将毫秒格式化为 `[HH:MM:SS.mmm]` 时间标签。
#[must_use]
pub fn format_lrc_time_ms(ms: TimeMillis) -> String {
    format!("[{}]", format_time(i64::try_from(ms).unwrap_or(-1)))
}

/// 生成 `[ti:]` 与 `[ar:]` 头部，值为空时不输出对应行。
fn write_header(output: &mut String, document: &LyricsDocument) -> fmt::Result {
    let title = document.title().trim();
    if !title.is_empty() {
        writeln!(output, "[ti:{title}]")?;
    }

    let artists = document
        .artists()
        .iter()
        .filter(|a| !a.name.trim().is_empty())
        .map(|a| format!("{}:{}", a.kind.trim(), a.name.trim()))
        .collect::<Vec<_>>()
        .join("/");
    if !artists.is_empty() {
        writeln!(output, "[ar:{artists}]")?;
    }
    Ok(())
}

/// 获取一行要导出的文本：逐字行拼接音节，逐行歌词原样输出。
fn get_line_text(line: &LyricLine) -> String {
    match line {
        LyricLine::Plain(plain) => plain.content().to_string(),
        LyricLine::Syllable(karaoke) => karaoke.text(),
    }
}

fn write_lrc(document: &LyricsDocument, options: ExportOptions) -> Result<String, fmt::Error> {
    let mut lrc_output = String::with_capacity(document.len() * 50);

    if options.include_header {
        write_header(&mut lrc_output, document)?;
    }

    let mut last_end: TimeMillis = 0;
    for line in document.lines() {
        if options.gap_markers && line.start() > last_end {
            writeln!(lrc_output, "{}", format_lrc_time_ms(last_end))?;
        }

        let timestamp = format_lrc_time_ms(line.start());
        writeln!(lrc_output, "{timestamp}{}", get_line_text(line))?;
        if let Some(translation) = line.translation() {
            writeln!(lrc_output, "{timestamp}{translation}")?;
        }

        last_end = line.end();
    }

    Ok(lrc_output)
}

/// 使用默认选项导出。
#[must_use]
pub fn generate_lrc(document: &LyricsDocument) -> String {
    generate_lrc_with_options(document, ExportOptions::default())
}

/// LRC 生成的主入口函数。
///
/// 空文档导出为空字符串；其余情况每行以 `\n` 结尾。
#[must_use]
pub fn generate_lrc_with_options(document: &LyricsDocument, options: ExportOptions) -> String {
    if document.is_empty() {
        return String::new();
    }
    // 写入 String 不会失败
    write_lrc(document, options).unwrap_or_default()
}
