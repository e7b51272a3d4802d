//! Benchmarks for indicator implementations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trading_core::traits::Indicator;
use trading_indicators::{Ema, Macd, MacdParams, StreamingMacd};

fn generate_test_data(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0)
        .collect()
}

fn benchmark_ema(c: &mut Criterion) {
    let mut group = c.benchmark_group("EMA");

    for size in [100, 1000, 10000].iter() {
        let data = generate_test_data(*size);

        group.bench_with_input(BenchmarkId::new("batch", size), &data, |b, data| {
            let ema = Ema::new(26);
            b.iter(|| ema.calculate(black_box(data)))
        });
    }

    group.finish();
}

fn benchmark_macd(c: &mut Criterion) {
    let mut group = c.benchmark_group("MACD");
    let params = MacdParams::default();

    for size in [100, 1000, 10000].iter() {
        let data = generate_test_data(*size);

        group.bench_with_input(BenchmarkId::new("batch", size), &data, |b, data| {
            let Ok(macd) = Macd::new(params) else { return };
            b.iter(|| macd.calculate(black_box(data)))
        });

        group.bench_with_input(BenchmarkId::new("rebuild", size), &data, |b, data| {
            let Ok(mut macd) = StreamingMacd::new(params) else { return };
            b.iter(|| {
                macd.rebuild(black_box(data));
                macd.last_two()
            })
        });
    }

    // Cost of folding one more close into a warm engine.
    group.bench_function("streaming_push", |b| {
        let Ok(mut macd) = StreamingMacd::new(params) else { return };
        macd.rebuild(&generate_test_data(100));
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            macd.push(black_box(100.0 + x.sin()))
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_ema, benchmark_macd);
criterion_main!(benches);
