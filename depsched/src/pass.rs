//! `run_pass`: the top-level driver wiring the four phases together.

use std::time::Instant;

use crate::chunk::ChunkPool;
use crate::cluster::Builder;
use crate::config::Config;
use crate::error::Error;
use crate::object::{Object, ObjectRef};
use crate::stats::{Statistics, PHASE_ANALYZE, PHASE_BUILD, PHASE_EXECUTE, PHASE_PLAN};
use crate::{analyzer, executor, planner};

/// Runs one pass over `objects`: build clusters, analyze their const
/// dependencies, pack clusters into race-free groups, then execute every
/// group in order on a worker pool sized by `config.worker_count`.
///
/// Every object's [`crate::ClusterIndex`] must be [`crate::ClusterIndex::NULL`]
/// on entry (the population's resting state); on return every handle is
/// `NULL` again and every cluster's member list is empty, so the same
/// objects can be passed to another `run_pass` call immediately.
///
/// # Errors
///
/// Returns [`Error::CapacityExceeded`] if the mutable-dependency graph would
/// produce more clusters than either the 16-bit cluster-handle space or the
/// compiled-in [`crate::depset::MAX_CLUSTERS`] bitset width can represent,
/// or [`Error::ChunkPoolExhausted`] if `config.chunk_pool_size` is too small
/// for the worklists and cluster member lists a pass needs concurrently.
///
/// A panic inside a user [`Object::task`] is not caught here: it propagates
/// through the worker pool the same way a panic inside a `rayon::scope`
/// closure propagates to the scope's caller.
pub fn run_pass<O>(objects: &mut [O], config: &Config) -> Result<Statistics, Error>
where
    O: Object + Send + Sync,
{
    let mut stats = Statistics::default();

    let pool: ChunkPool<ObjectRef> = ChunkPool::new(config.chunk_pool_size);

    let build_span = tracing::debug_span!("cluster_build");
    let build_start = Instant::now();
    let mut clusters = {
        let _enter = build_span.enter();
        let builder = Builder::new(&pool);
        builder.build(objects)?
    };
    stats.phase_durations[PHASE_BUILD] = build_start.elapsed();
    stats.num_clusters = clusters.len();
    stats.largest_cluster = clusters.iter().map(|c| c.len()).max().unwrap_or(0);

    #[cfg(any(debug_assertions, feature = "invariant-checks"))]
    crate::cluster::verify_invariants(objects, &clusters, &pool)?;

    let analyze_span = tracing::debug_span!("dependency_analysis");
    let analyze_start = Instant::now();
    let dep_sets = {
        let _enter = analyze_span.enter();
        analyzer::analyze(objects, &clusters)?
    };
    stats.phase_durations[PHASE_ANALYZE] = analyze_start.elapsed();

    let plan_span = tracing::debug_span!("group_planning");
    let plan_start = Instant::now();
    let groups = {
        let _enter = plan_span.enter();
        planner::plan(&clusters, &dep_sets)
    };
    stats.phase_durations[PHASE_PLAN] = plan_start.elapsed();
    stats.num_groups = groups.len();
    stats.largest_group = groups.iter().map(|g| g.len()).max().unwrap_or(0);

    let execute_span = tracing::debug_span!("group_execution");
    let execute_start = Instant::now();
    {
        let _enter = execute_span.enter();
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count)
            .build()
            .expect("building the pass's worker pool");
        for group in &groups {
            executor::execute_group(objects, &mut clusters, group, &thread_pool);
        }
    }
    stats.phase_durations[PHASE_EXECUTE] = execute_start.elapsed();

    tracing::info!(
        num_clusters = stats.num_clusters,
        num_groups = stats.num_groups,
        largest_cluster = stats.largest_cluster,
        largest_group = stats.largest_group,
        total_micros = stats.total_duration().as_micros() as u64,
        "pass complete"
    );

    Ok(stats)
}
