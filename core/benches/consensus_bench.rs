// Benchmarks for the consensus voting engine's hot paths: weighted
// sampling, bag tallying, and chain-level poll application across a
// range of fork widths.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use consensus_core::consensus::bag::Bag;
use consensus_core::consensus::chain::{Block, Chain};
use consensus_core::consensus::params::Parameters;
use consensus_core::consensus::sampler;
use consensus_core::id::Id;

fn id(b: u8) -> Id {
    let mut bytes = [0u8; 32];
    bytes[31] = b;
    Id::from_bytes(bytes)
}

fn bench_sampler(c: &mut Criterion) {
    let weights: Vec<u64> = (1..=20u64).map(|w| w * 1_000_000).collect();

    c.bench_function("sampler/sample_k20_of_20", |b| {
        b.iter(|| sampler::sample(&weights, 20, 42).unwrap());
    });

    let mut group = c.benchmark_group("sampler/sample_scaling");
    for n in [10, 50, 200, 1000] {
        let weights: Vec<u64> = (1..=n as u64).collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| sampler::sample(&weights, 20.min(n), 7).unwrap());
        });
    }
    group.finish();
}

fn bench_bag(c: &mut Criterion) {
    c.bench_function("bag/add_count_and_mode", |b| {
        b.iter(|| {
            let mut bag = Bag::new();
            for i in 0..20u8 {
                bag.add_count(id(i % 4), 1);
            }
            bag.mode()
        });
    });
}

/// Builds a chain with `width` children under the root, each a leaf, and
/// returns it along with a bag voting unanimously for the first child.
fn setup_fork(width: usize) -> (Chain, Bag) {
    let params = Parameters::new(
        width.max(1) as u32,
        1,
        1,
        1,
        4,
        50,
        1_000,
        std::time::Duration::from_secs(30),
    )
    .unwrap();
    let root = id(0);
    let mut chain = Chain::initialize(params, root, 0);

    let mut bag = Bag::new();
    for i in 0..width {
        let child = id((i + 1) as u8);
        chain.add(Block::new(child, root, 1, vec![])).unwrap();
        if i == 0 {
            bag.add_count(child, width as u32);
        }
    }
    (chain, bag)
}

fn bench_chain_record_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain/record_poll_fork_width");
    for width in [2, 8, 32] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter_with_setup(
                || setup_fork(width),
                |(mut chain, bag)| {
                    chain.record_poll(&bag);
                },
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sampler, bench_bag, bench_chain_record_poll);
criterion_main!(benches);
