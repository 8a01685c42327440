//! Message framing benchmarks
//!
//! Measures reassembly of helper stdout into messages for a large batch of
//! small responses and for a single large upload response, both fed in
//! pipe-sized chunks.

use criterion::{Criterion, criterion_group, criterion_main};
use imagehost_mcp::proxy::{FramingMode, MessageFramer};
use std::hint::black_box;

const PIPE_CHUNK: usize = 4096;

fn many_small_responses() -> Vec<u8> {
    (0..1000)
        .map(|id| format!("{{\"id\":\"{id}\",\"result\":{{\"url\":\"https://img.example/{id}.png\"}}}}\n"))
        .collect::<String>()
        .into_bytes()
}

fn one_large_response() -> Vec<u8> {
    // Roughly a base64 thumbnail inlined in a window listing
    let payload = "A".repeat(2 * 1024 * 1024);
    format!("{{\"id\":\"0\",\"result\":{{\"thumbnail\":\"{payload}\"}}}}\n").into_bytes()
}

fn feed_in_chunks(mode: FramingMode, input: &[u8]) -> usize {
    let mut framer = MessageFramer::with_mode(mode);
    input
        .chunks(PIPE_CHUNK)
        .map(|chunk| framer.feed(chunk).len())
        .sum()
}

fn bench_small_responses(c: &mut Criterion) {
    let input = many_small_responses();

    c.bench_function("frame_1000_small_newline", |b| {
        b.iter(|| feed_in_chunks(FramingMode::NewlineOnly, black_box(&input)));
    });

    c.bench_function("frame_1000_small_brace", |b| {
        b.iter(|| feed_in_chunks(FramingMode::BraceTerminated, black_box(&input)));
    });
}

fn bench_large_response(c: &mut Criterion) {
    let input = one_large_response();

    c.bench_function("frame_2mb_single_newline", |b| {
        b.iter(|| feed_in_chunks(FramingMode::NewlineOnly, black_box(&input)));
    });
}

criterion_group!(benches, bench_small_responses, bench_large_response);
criterion_main!(benches);
