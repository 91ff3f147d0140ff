//! Throughput benchmarks for the framing hot paths.
//!
//! ```bash
//! cargo bench -p drats-frame
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use drats_frame::{bitstuff, compute_fcs, kiss_encode_frame, kiss_recv_frame};

fn payload(len: usize) -> Vec<u8> {
    // Mix in plenty of bytes that need escaping and long runs of ones.
    (0..len)
        .map(|i| match i % 7 {
            0 => 0xC0,
            1 => 0xDB,
            2 => 0xFF,
            _ => i as u8,
        })
        .collect()
}

fn bench_kiss(c: &mut Criterion) {
    let mut group = c.benchmark_group("kiss");
    for len in [64usize, 256, 1024] {
        let data = payload(len);
        let wire = kiss_encode_frame(&data, 0);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("encode", len), &data, |b, data| {
            b.iter(|| black_box(kiss_encode_frame(black_box(data), 0)))
        });
        group.bench_with_input(BenchmarkId::new("recv", len), &wire, |b, wire| {
            b.iter(|| black_box(kiss_recv_frame(black_box(wire))))
        });
    }
    group.finish();
}

fn bench_checksums(c: &mut Criterion) {
    let mut group = c.benchmark_group("ax25");
    for len in [64usize, 256, 1024] {
        let data = payload(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("fcs", len), &data, |b, data| {
            b.iter(|| black_box(compute_fcs(black_box(data))))
        });
        group.bench_with_input(BenchmarkId::new("bitstuff", len), &data, |b, data| {
            b.iter(|| black_box(bitstuff(black_box(data))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_kiss, bench_checksums);
criterion_main!(benches);
