use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mcpbridge_core::framing;
use mcpbridge_core::pool::BufferPool;
use mcpbridge_core::reassembler::Reassembler;
use std::sync::Arc;

fn whole_frame_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembler_whole_frame");

    for size in [16usize, 256, 4096, 65536] {
        let frame = framing::encode(&"x".repeat(size));
        group.bench_with_input(BenchmarkId::new("append_and_extract", size), &frame, |b, frame| {
            b.iter(|| {
                let pool = Arc::new(BufferPool::new());
                let mut r = Reassembler::new(pool).unwrap();
                r.append(black_box(frame)).unwrap();
                black_box(r.extract().unwrap());
            });
        });
    }

    group.finish();
}

fn chunked_delivery_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembler_chunked");

    let frame = framing::encode(&"x".repeat(4096));
    group.bench_function("single_byte_chunks_4k_frame", |b| {
        b.iter(|| {
            let pool = Arc::new(BufferPool::new());
            let mut r = Reassembler::new(pool).unwrap();
            let mut out = Vec::new();
            for byte in frame.iter() {
                r.append(std::slice::from_ref(byte)).unwrap();
                out.extend(r.extract().unwrap());
            }
            black_box(out);
        });
    });

    group.finish();
}

fn pipelined_frames_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembler_pipelined");

    for count in [10usize, 100, 1000] {
        let mut bytes = Vec::new();
        for i in 0..count {
            bytes.extend(framing::encode(&format!(r#"{{"id":{i}}}"#)));
        }

        group.bench_with_input(BenchmarkId::new("pipelined_frames", count), &bytes, |b, bytes| {
            b.iter(|| {
                let pool = Arc::new(BufferPool::new());
                let mut r = Reassembler::new(pool).unwrap();
                r.append(black_box(bytes)).unwrap();
                black_box(r.extract().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    whole_frame_benchmark,
    chunked_delivery_benchmark,
    pipelined_frames_benchmark
);
criterion_main!(benches);
