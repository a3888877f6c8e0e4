//! Benchmark for pool updates.
//!
//! TARGET: 100,000 accepted bets per second into one pool
//!
//! Run with: cargo bench --package furlong_betting --bench pool_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use furlong_betting::{compute_odds, Bet, Pool};

fn benchmark_compute_odds(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_odds");
    for outcomes in [4usize, 16, 64] {
        let stakes: Vec<u64> = (0..outcomes as u64).map(|i| (i + 1) * 100).collect();
        let total: u64 = stakes.iter().sum();
        group.bench_with_input(BenchmarkId::from_parameter(outcomes), &stakes, |b, stakes| {
            b.iter(|| black_box(compute_odds(black_box(stakes), black_box(total))));
        });
    }
    group.finish();
}

fn benchmark_add_bet(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_add_bet");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("thousand_bets", |b| {
        b.iter(|| {
            let pool = Pool::new(1, 4);
            for i in 0..1_000u64 {
                pool.add_bet(&Bet::new(i + 1, 1, 1, "bench", (i % 4) as usize, 10 + i % 7));
            }
            black_box(pool.odds())
        });
    });
    group.finish();
}

fn benchmark_payouts(c: &mut Criterion) {
    let pool = Pool::new(1, 4);
    for i in 0..1_000u64 {
        pool.add_bet(&Bet::new(i + 1, 1, 1, "bench", (i % 4) as usize, 10 + i % 7));
    }

    c.bench_function("payouts_1000_bets", |b| {
        b.iter(|| black_box(pool.payouts(black_box(2), 1)));
    });
}

criterion_group!(benches, benchmark_compute_odds, benchmark_add_bet, benchmark_payouts);
criterion_main!(benches);
