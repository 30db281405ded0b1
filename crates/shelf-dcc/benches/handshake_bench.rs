//! Handshake parsing benchmarks.
//!
//! Run with: `cargo bench -p shelf-dcc`

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use shelf_dcc::{DccSend, parse_ctcp, unzip_first_entry};
use std::io::{Cursor, Write};

fn bench_parse_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake_parse");

    let quoted = "\x01DCC SEND \"Charles Dickens - Oliver Twist.epub\" 2919211093 6634 468095\x01";
    let bare = "\x01DCC SEND results.zip 2130706433 5000 12\x01";

    group.bench_function("quoted", |b| {
        b.iter(|| parse_ctcp(black_box(quoted)).map(DccSend::parse))
    });
    group.bench_function("bare", |b| {
        b.iter(|| parse_ctcp(black_box(bare)).map(DccSend::parse))
    });

    group.finish();
}

fn bench_unzip(c: &mut Criterion) {
    let listing: String = (0..2_000)
        .map(|i| format!("!Bot Author {i} - Title {i}.epub ::INFO:: 1.2MB\n"))
        .collect();

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("results.txt", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(listing.as_bytes()).unwrap();
    let archive = writer.finish().unwrap().into_inner();

    c.bench_function("unzip_first_entry_2000_lines", |b| {
        b.iter(|| unzip_first_entry(black_box(&archive)))
    });
}

criterion_group!(benches, bench_parse_handshake, bench_unzip);
criterion_main!(benches);
