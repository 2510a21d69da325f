use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode};
use lookback_scan::{reference, DispatchOrder, EmulatedScanner, InclusiveScan, ScanConfig};
use rand::{Rng, SeedableRng};
use rand_hc::Hc128Rng;
use rayon::prelude::*;

const SEED: &[u8; 32] = b"LVXn6sWNasjDReRS2OZ9a0eY1aprVNYX";

/// Creates the specified number of random values small enough that the scan
/// never wraps.
fn create_random_values(count: usize, rng: &mut impl Rng) -> Vec<u64> {
    (0..count).map(|_| rng.gen_range(0..1_000)).collect()
}

/// Classic two-pass scan: reduce chunks in parallel, scan the chunk totals
/// sequentially, then fix up every chunk in parallel.
fn rayon_two_pass_scan(data: &mut [u64], chunk_size: usize) {
    let totals: Vec<u64> = data
        .par_chunks_mut(chunk_size)
        .map(|chunk| {
            reference::inclusive_scan_in_place(chunk);
            *chunk.last().unwrap()
        })
        .collect();
    let carries: Vec<u64> = totals
        .iter()
        .scan(0, |acc, &t| {
            let carry = *acc;
            *acc += t;
            Some(carry)
        })
        .collect();
    data.par_chunks_mut(chunk_size)
        .zip(carries)
        .for_each(|(chunk, carry)| chunk.iter_mut().for_each(|x| *x += carry));
}

pub fn scan_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scan comparison");
    group.sample_size(10);
    group.sampling_mode(SamplingMode::Flat);

    for count in [1u64 << 14, 1u64 << 16, 1u64 << 18] {
        let mut rng = Hc128Rng::from_seed(*SEED);
        let values = create_random_values(count as usize, &mut rng);

        group.bench_with_input(BenchmarkId::new("Sequential", count), &count, |b, _| {
            b.iter(|| {
                let mut data = values.clone();
                reference::inclusive_scan_in_place(&mut data);
                data
            })
        });

        group.bench_with_input(BenchmarkId::new("RayonTwoPass", count), &count, |b, _| {
            b.iter(|| {
                let mut data = values.clone();
                rayon_two_pass_scan(&mut data, 4096);
                data
            })
        });

        for dispatch in [DispatchOrder::InOrder, DispatchOrder::Shuffled { seed: 5 }] {
            let config = ScanConfig::default()
                .with_group_width(64)
                .with_resident_groups(8)
                .with_dispatch(dispatch);
            let scanner = EmulatedScanner::new(&config).unwrap();
            let name = match dispatch {
                DispatchOrder::InOrder => "EmulatedLookBack",
                _ => "EmulatedLookBackShuffled",
            };
            group.bench_with_input(BenchmarkId::new(name, count), &count, |b, _| {
                b.iter(|| {
                    let mut data = values.clone();
                    scanner.inclusive_scan(&mut data).unwrap();
                    data
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, scan_comparison);
criterion_main!(benches);
