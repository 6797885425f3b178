//! # NSE Benchmarks
//!
//! | Operation | Runs per | Target |
//! |-----------|----------|--------|
//! | Proximity | round, per key | < 10µs |
//! | Estimate and deviation | control query | < 10µs |
//! | Claim validation | relayed claim | < 5ms |
//! | Proof-of-work search | own claim | grows 2x per bit |

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use nse_core::protocol::pow;
use nse_core::test_utils::{fixture_key, fixture_public_key};
use nse_core::{
    build_claim, calculate_proximity, estimate_and_deviation, unpack_claim, BuildOptions,
    UnpackOptions,
};

const CLAIM_TIME: u64 = 1_700_009_000;

// ============================================================================
// Domain math
// ============================================================================

fn bench_proximity(c: &mut Criterion) {
    let mut group = c.benchmark_group("proximity");
    let public_key = fixture_public_key();

    group.bench_function("round_time", |b| {
        b.iter(|| black_box(calculate_proximity(&public_key, black_box(CLAIM_TIME))))
    });

    group.finish();
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_and_deviation");

    for rounds in [1usize, 8, 64, 256] {
        let proximities: Vec<u8> = (0..rounds).map(|i| 8 + (i % 7) as u8).collect();
        group.throughput(Throughput::Elements(rounds as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rounds), &proximities, |b, p| {
            b.iter(|| black_box(estimate_and_deviation(p)))
        });
    }

    group.finish();
}

// ============================================================================
// Claim codec
// ============================================================================

fn bench_unpack_claim(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack_claim");
    group.measurement_time(Duration::from_secs(10));

    let options = UnpackOptions {
        min_proximity: 0,
        proof_of_work_bits: 4,
    };
    let claim = build_claim(
        &fixture_key(),
        CLAIM_TIME,
        BuildOptions {
            proof_of_work_bits: options.proof_of_work_bits,
            ..BuildOptions::default()
        },
    )
    .unwrap();

    group.bench_function("valid", |b| b.iter(|| black_box(unpack_claim(&claim, options).is_ok())));

    // Rejected by the pre-filter before any hashing.
    let filtered = UnpackOptions {
        min_proximity: 200,
        ..options
    };
    group.bench_function("below_min_proximity", |b| {
        b.iter(|| black_box(unpack_claim(&claim, filtered).is_err()))
    });

    group.finish();
}

fn bench_pow_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("pow_search");
    group.sample_size(20);

    for bits in [4u32, 8, 12] {
        group.bench_with_input(BenchmarkId::from_parameter(bits), &bits, |b, bits| {
            let mut body = vec![0u8; 600];
            b.iter(|| black_box(pow::search(*bits, &mut body, 11)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_proximity,
    bench_estimate,
    bench_unpack_claim,
    bench_pow_search
);
criterion_main!(benches);
