//! 播放位置查询。
//!
//! 歌词行按开始时间升序排列，区间为闭区间 `[start, end]`，相邻行之间允许重叠。
//! 这些函数会在每一帧被调用，除了返回结果以外不做额外分配。

use std::ops::Range;

use crate::converter::types::{LyricLine, LyricsDocument, TimeMillis};

/// 二分查找第一个包含 `time` 的行。
///
/// 有多个候选时返回最靠前的一个；没有任何行包含 `time` 时返回插入位置
/// （`time` 晚于所有行时为 `lines.len()`）。
#[must_use]
pub fn first_highlight_index(lines: &[LyricLine], time: TimeMillis) -> usize {
    let (mut lo, mut hi) = (0, lines.len());
    let mut found = None;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let line = &lines[mid];
        if line.end() < time {
            lo = mid + 1;
        } else if line.start() > time {
            hi = mid;
        } else {
            found = Some(mid);
            hi = mid;
        }
    }

    found.unwrap_or(lo)
}

/// 从探测位置向两侧线性扩展得到的候选范围。
///
/// 向前扩展到第一个完全早于 `time` 的行为止，向后扩展到第一个完全晚于 `time` 的行为止。
fn candidate_range(lines: &[LyricLine], time: TimeMillis) -> Range<usize> {
    let probe = first_highlight_index(lines, time);

    let mut lo = probe.min(lines.len());
    while lo > 0 && lines[lo - 1].end() >= time {
        lo -= 1;
    }

    let mut hi = probe;
    while hi < lines.len() && lines[hi].start() <= time {
        hi += 1;
    }

    lo..hi.max(lo)
}

/// 找出所有包含 `time` 的行，按下标升序写入 `out`（会先清空）。
pub fn all_highlight_indices_into(lines: &[LyricLine], time: TimeMillis, out: &mut Vec<usize>) {
    out.clear();
    out.extend(candidate_range(lines, time).filter(|&i| lines[i].contains(time)));
}

/// 找出所有包含 `time` 的行，按下标升序返回。
#[must_use]
pub fn all_highlight_indices(lines: &[LyricLine], time: TimeMillis) -> Vec<usize> {
    let mut out = Vec::new();
    all_highlight_indices_into(lines, time, &mut out);
    out
}

/// 当前时间应高亮的行，没有任何行包含该时间时返回 `None`。
#[must_use]
pub fn query_active_line(document: &LyricsDocument, time: TimeMillis) -> Option<usize> {
    let lines = document.lines();
    let index = first_highlight_index(lines, time);
    lines
        .get(index)
        .filter(|line| line.contains(time))
        .map(|_| index)
}

/// 当前时间所有应高亮的行（例如主歌词与重叠的背景人声）。
#[must_use]
pub fn query_active_lines(document: &LyricsDocument, time: TimeMillis) -> Vec<usize> {
    all_highlight_indices(document.lines(), time)
}

/// 与 [`query_active_lines`] 相同，但复用调用方的缓冲区。
pub fn collect_active_lines(document: &LyricsDocument, time: TimeMillis, out: &mut Vec<usize>) {
    all_highlight_indices_into(document.lines(), time, out);
}

/// 当前时间第一个非背景人声的高亮行。
#[must_use]
pub fn query_primary_line(document: &LyricsDocument, time: TimeMillis) -> Option<usize> {
    let lines = document.lines();
    candidate_range(lines, time)
        .find(|&i| lines[i].contains(time) && !lines[i].is_accompaniment())
}
