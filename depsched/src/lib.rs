/*!
`depsched` partitions a population of dependency-linked objects into
independent scheduling units and runs a user-supplied task over every
object, in parallel where it is safe to do so and serially where it is not.

Each object in the population declares two kinds of relationship to its
peers:

* a **mutable dependency** — a peer it may read or write, and which must
  therefore execute on the same worker, in the same serial unit (a
  *cluster*);
* a **const dependency** — a peer it only reads, which only needs to have
  finished its own task first (a happens-before edge between clusters, not
  co-residency).

One call to [`run_pass`] computes the mutable-dependency graph's connected
components (clusters), the quotient graph over const edges between
clusters, a greedy packing of clusters into race-free execution groups, and
then dispatches every group's clusters onto a worker pool, one group after
another.

## Example

```
use depsched::{run_pass, Config, Object, ChunkStack, DepSet, ClusterIndex};

struct Counter {
    mutable_peers: Vec<usize>,
    handle: ClusterIndex,
    value: u32,
}

impl Object for Counter {
    fn enumerate_mutable_dependencies(&self, out: &mut ChunkStack<'_, usize>) {
        for &peer in &self.mutable_peers {
            out.push_back(peer).unwrap();
        }
    }

    fn enumerate_const_dependencies(&self, _out: &mut DepSet, _population: &[Self]) {}

    fn task(&mut self) {
        self.value += 1;
    }

    fn cluster_handle(&self) -> ClusterIndex {
        self.handle
    }

    fn set_cluster_handle(&mut self, handle: ClusterIndex) {
        self.handle = handle;
    }
}

let mut objects = vec![
    Counter { mutable_peers: vec![1], handle: ClusterIndex::NULL, value: 0 },
    Counter { mutable_peers: vec![0], handle: ClusterIndex::NULL, value: 0 },
];
let stats = run_pass(&mut objects, &Config::default()).unwrap();
assert_eq!(stats.num_clusters, 1);
assert!(objects.iter().all(|o| o.value == 1));
```

## Module map

* [`chunk`] — the pool-backed chunked LIFO the builder and executor both
  run on.
* [`object`] — the [`Object`] capability trait and [`ClusterIndex`].
* [`depset`] — the fixed-width per-cluster dependency bitset.
* [`cluster`] — [`cluster::Cluster`] and the single-threaded builder.
* [`concurrent_builder`] — optional experimental multi-threaded builder
  (feature `concurrent-builder`).
* [`analyzer`] — the dependency analyzer.
* [`planner`] — the group planner.
* [`executor`] — the group executor.
* [`pass`] — [`run_pass`], wiring the four phases together.
*/
#![allow(clippy::needless_range_loop)]

pub mod analyzer;
pub mod chunk;
pub mod cluster;
#[cfg(feature = "concurrent-builder")]
pub mod concurrent_builder;
pub mod config;
pub mod depset;
pub mod error;
pub mod executor;
pub mod object;
pub mod pass;
pub mod planner;
pub mod stats;

pub use chunk::{ChunkPool, ChunkStack};
pub use cluster::Cluster;
pub use config::Config;
pub use depset::{DepSet, MAX_CLUSTERS};
pub use error::{Error, Result};
pub use object::{ClusterIndex, Object, ObjectRef, MAX_CLUSTERS_HARD_CAP};
pub use pass::run_pass;
pub use planner::Group;
pub use stats::Statistics;
