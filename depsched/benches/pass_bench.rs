use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use depsched::{run_pass, ChunkStack, ClusterIndex, Config, DepSet, Object};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct BenchObject {
    mutual: Vec<usize>,
    reads: Vec<usize>,
    handle: ClusterIndex,
}

impl Object for BenchObject {
    fn enumerate_mutable_dependencies(&self, out: &mut ChunkStack<'_, usize>) {
        for &dep in &self.mutual {
            out.push_back(dep).unwrap();
        }
    }

    fn enumerate_const_dependencies(&self, out: &mut DepSet, population: &[Self]) {
        for &dep in &self.reads {
            out.set(population[dep].cluster_handle().index());
        }
    }

    fn task(&mut self) {
        black_box(self.mutual.len() + self.reads.len());
    }

    fn cluster_handle(&self) -> ClusterIndex {
        self.handle
    }

    fn set_cluster_handle(&mut self, handle: ClusterIndex) {
        self.handle = handle;
    }
}

/// `Config::default`'s chunk pool is sized for small populations; scale it
/// with `num_objects` so the larger benchmarks don't spuriously hit
/// `ChunkPoolExhausted` (the pool backs the builder's worklist and every
/// cluster's member list at once, so it needs a multiple of the population).
fn config_for(num_objects: usize) -> Config {
    let mut config = Config::default();
    config.chunk_pool_size = (num_objects / 8 + 64).max(config.chunk_pool_size);
    config
}

fn generate_population(num_objects: usize, mutual_degree: usize, const_degree: usize, seed: u64) -> Vec<BenchObject> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_objects)
        .map(|_| {
            let mutual = (0..mutual_degree).map(|_| rng.gen_range(0..num_objects)).collect();
            let reads = (0..const_degree).map(|_| rng.gen_range(0..num_objects)).collect();
            BenchObject { mutual, reads, handle: ClusterIndex::NULL }
        })
        .collect()
}

fn bench_small_dense(c: &mut Criterion) {
    let mut group = c.benchmark_group("pass_small_dense");
    group.throughput(Throughput::Elements(2_048));
    group.bench_function("2048_objects_deg3", |b| {
        b.iter_batched(
            || generate_population(2_048, 3, 3, 42),
            |mut objects| black_box(run_pass(&mut objects, &config_for(objects.len())).unwrap()),
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

fn bench_large_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("pass_large_sparse");
    group.throughput(Throughput::Elements(100_000));
    group.bench_function("100000_objects_deg1", |b| {
        b.iter_batched(
            || generate_population(100_000, 1, 1, 7),
            |mut objects| black_box(run_pass(&mut objects, &config_for(objects.len())).unwrap()),
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

fn bench_no_mutable_edges(c: &mut Criterion) {
    // No mutable edges means every object is its own singleton cluster, so
    // the object count is capped by `depset::MAX_CLUSTERS` (80 under the
    // default `bitset-80` feature) — anything larger trips
    // `Error::CapacityExceeded` in the analyzer every single iteration.
    let mut group = c.benchmark_group("pass_singletons_dense_const");
    group.throughput(Throughput::Elements(64));
    group.bench_function("64_singletons_const_deg5", |b| {
        b.iter_batched(
            || generate_population(64, 0, 5, 99),
            |mut objects| black_box(run_pass(&mut objects, &config_for(objects.len())).unwrap()),
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_small_dense, bench_large_sparse, bench_no_mutable_edges);
criterion_main!(benches);
