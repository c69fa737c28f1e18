use std::{fmt::Write, hint::black_box};

use criterion::{Criterion, criterion_group, criterion_main};

use synced_lyrics_rs::{LyricsDocument, collect_active_lines, parse, query_active_line};

const LINE_COUNT: u64 = 2000;

/// 每行 3 秒，每两行插入一条与前一行重叠的背景人声。
fn build_document() -> LyricsDocument {
    let mut lys = String::new();
    for i in 0..LINE_COUNT {
        let start = i * 3000;
        let _ = writeln!(lys, "[4]Line{i}({start},2500)");
        if i % 2 == 0 {
            let _ = writeln!(lys, "[6]ooh({},1500)", start + 500);
        }
    }
    parse(&lys)
}

mod linear {
    use synced_lyrics_rs::{LyricsDocument, TimeMillis};

    pub fn active_lines(document: &LyricsDocument, time: TimeMillis, out: &mut Vec<usize>) {
        out.clear();
        out.extend(
            document
                .lines()
                .iter()
                .enumerate()
                .filter(|(_, line)| line.contains(time))
                .map(|(i, _)| i),
        );
    }
}

fn bench_position_query(c: &mut Criterion) {
    let document = build_document();
    let times: Vec<u64> = (0..LINE_COUNT * 3000).step_by(997).collect();
    let mut group = c.benchmark_group("Position Query Performance");

    group.bench_function("Single line", |b| {
        b.iter(|| {
            for &t in &times {
                black_box(query_active_line(black_box(&document), t));
            }
        })
    });

    group.bench_function("All lines, binary search", |b| {
        let mut out = Vec::new();
        b.iter(|| {
            for &t in &times {
                collect_active_lines(black_box(&document), t, &mut out);
                black_box(&out);
            }
        })
    });

    group.bench_function("All lines, linear scan", |b| {
        let mut out = Vec::new();
        b.iter(|| {
            for &t in &times {
                linear::active_lines(black_box(&document), t, &mut out);
                black_box(&out);
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_position_query);
criterion_main!(benches);
