//! Demo/benchmark driver for `depsched`.
//!
//! Flags for population size and mutual/const degree drive a uniform-random
//! dependency graph, followed by a report of cluster and group counts.
//! Population construction and random-graph generation have no place in
//! `depsched` itself, so they live in this external binary instead.

mod generate_population;

use std::time::Instant;

use clap::Parser;
use depsched::{run_pass, Config};
use generate_population::generate_population;
use rand::SeedableRng;

/// Runs one `depsched` pass over a randomly generated population and
/// reports how it was partitioned and scheduled.
#[derive(Parser, Debug)]
#[command(name = "depsched-bench")]
struct Args {
    /// Number of objects in the population.
    #[arg(long, default_value_t = 2048)]
    num_objects: usize,

    /// Mutable dependencies sampled per object.
    #[arg(long, default_value_t = 3)]
    dependencies_num: usize,

    /// Const dependencies sampled per object.
    #[arg(long, default_value_t = 3)]
    const_dependencies_num: usize,

    /// Worker threads the executor's pool runs on.
    #[arg(long, default_value_t = num_cpus::get())]
    worker_count: usize,

    /// Chunk pool size backing the pass's worklists and cluster member lists.
    #[arg(long, default_value_t = 1 << 16)]
    chunk_pool_size: usize,

    /// Fixed RNG seed, for reproducible graphs across runs.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() {
    let args = Args::parse();

    println!(
        "num_objects: {} dependencies_num: {} const_dependencies_num: {}",
        args.num_objects, args.dependencies_num, args.const_dependencies_num
    );

    let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);
    let mut objects =
        generate_population(args.num_objects, args.dependencies_num, args.const_dependencies_num, &mut rng);

    let config = Config::new(args.chunk_pool_size, args.worker_count);

    let started = Instant::now();
    let stats = run_pass(&mut objects, &config).expect("pass failed");
    let elapsed = started.elapsed();

    println!("clusters: {}", stats.num_clusters);
    println!("groups: {}", stats.num_groups);
    println!("largest cluster: {} objects", stats.largest_cluster);
    println!("largest group: {} clusters", stats.largest_group);
    println!(
        "phases (us): build={} analyze={} plan={} execute={}",
        stats.phase_durations[0].as_micros(),
        stats.phase_durations[1].as_micros(),
        stats.phase_durations[2].as_micros(),
        stats.phase_durations[3].as_micros(),
    );
    println!("wall time: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
}
