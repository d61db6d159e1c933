//! Full recompute vs. incremental append over a context with the usual
//! indicator set.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use hquant_ser::{Calendar, Frequency, IndicatorDescriptor, IndicatorKind, Quote, SerContext, SerKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];
const KINDS: [IndicatorKind; 6] = [
    IndicatorKind::Ma,
    IndicatorKind::Ema,
    IndicatorKind::Rsi,
    IndicatorKind::Macd,
    IndicatorKind::Boll,
    IndicatorKind::Kd,
];

fn random_walk(n: usize, seed: u64) -> Vec<Quote> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            price += rng.gen_range(-1.0..1.0);
            let spread = rng.gen_range(0.0..0.5);
            Quote::new(
                (i as i64 + 1) * 60_000,
                price,
                price + spread,
                price - spread,
                price,
                rng.gen_range(100.0..1000.0),
            )
        })
        .collect()
}

fn context() -> SerContext {
    let mut ctx = SerContext::new(SerKey::new("BENCH", Frequency::ONE_MIN), Calendar::utc());
    for kind in KINDS {
        let _ = ctx.add_indicator(&IndicatorDescriptor::new(kind));
    }
    ctx
}

fn bench_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_ingest");
    for size in SIZES {
        let quotes = random_walk(size, 7);
        group.bench_with_input(BenchmarkId::from_parameter(size), &quotes, |b, quotes| {
            b.iter_batched(
                context,
                |mut ctx| {
                    let _ = ctx.ingest(black_box(quotes));
                    ctx
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_one");
    for size in SIZES {
        let quotes = random_walk(size + 1, 7);
        let (history, last) = quotes.split_at(size);
        let mut ctx = context();
        let _ = ctx.ingest(history);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            // re-appending the last bar rewrites it in place
            b.iter(|| {
                let _ = ctx.ingest(black_box(last));
                ctx.poll_events();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full, bench_append);
criterion_main!(benches);
