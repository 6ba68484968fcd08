//! Benchmarks for frame decoding primitives

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use radarlink_core::bits::{transpose, transpose_in_place};
use radarlink_core::cursor::Cursor;

/// Generate a synthetic frame of interleaved u16 samples
fn generate_samples(n: usize) -> Vec<u16> {
    (0..n).map(|i| (i as u16).wrapping_mul(31) & 0x0FFF).collect()
}

fn bench_transpose(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose");

    // (chirps * samples) x rx for a 3-antenna frame
    for rows in [64 * 32, 64 * 128, 128 * 256].iter() {
        let rx = 3;
        let samples = generate_samples(rows * rx);

        group.bench_with_input(BenchmarkId::new("in_place", rows), rows, |b, &rows| {
            b.iter(|| {
                let mut data = samples.clone();
                transpose_in_place(black_box(&mut data), rows, rx).unwrap();
                black_box(data)
            });
        });

        group.bench_with_input(BenchmarkId::new("copy", rows), rows, |b, &rows| {
            let mut output = vec![0u16; samples.len()];
            b.iter(|| {
                transpose(black_box(&samples), &mut output, rows, rx).unwrap();
                black_box(&output);
            });
        });
    }

    group.finish();
}

fn bench_cursor_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_decode");

    for size in [1024usize, 16 * 1024, 256 * 1024].iter() {
        let bytes: Vec<u8> = generate_samples(*size / 2).iter().flat_map(|s| s.to_le_bytes()).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut samples = vec![0u16; bytes.len() / 2];
            b.iter(|| {
                let mut cursor = Cursor::new(black_box(&bytes));
                cursor.consume_into(&mut samples).unwrap();
                assert!(cursor.finished());
                black_box(&samples);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transpose, bench_cursor_decode);
criterion_main!(benches);
