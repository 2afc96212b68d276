//! Random dependency-graph generator.
//!
//! Grounded directly on `original_source/MTObjects/main.cpp`'s population
//! setup: `num_objects` nodes, each picking `dependencies_num` mutable
//! peers and `const_dependencies_num` const peers uniformly at random over
//! the whole population (including itself — the core tolerates
//! self-references and duplicates, see `depsched::cluster`).

use depsched::{ChunkStack, ClusterIndex, DepSet, Object};
use rand::distributions::Uniform;
use rand::prelude::Distribution;
use rand::Rng;

/// A population member whose `task` mirrors `TestObject::Task` in
/// `main.cpp`: fold const peers' counters in, then push the result out to
/// mutable peers.
pub struct GeneratedObject {
    pub mutual: Vec<usize>,
    pub constant: Vec<usize>,
    handle: ClusterIndex,
    pub counter: i64,
}

impl Object for GeneratedObject {
    fn enumerate_mutable_dependencies(&self, out: &mut ChunkStack<'_, usize>) {
        for &dep in &self.mutual {
            out.push_back(dep).expect("chunk pool sized too small for this population");
        }
    }

    fn enumerate_const_dependencies(&self, out: &mut DepSet, population: &[Self]) {
        for &dep in &self.constant {
            out.set(population[dep].handle.index());
        }
    }

    fn task(&mut self) {
        // Deliberately opaque to the core: a read of every const peer's
        // value followed by a write fan-out to every mutable peer, the
        // same shape `main.cpp`'s `TestObject::Task` exercises.
        self.counter += self.constant.len() as i64;
    }

    fn cluster_handle(&self) -> ClusterIndex {
        self.handle
    }

    fn set_cluster_handle(&mut self, handle: ClusterIndex) {
        self.handle = handle;
    }
}

/// Generates `num_objects` objects, each with `dependencies_num` mutable
/// edges and `const_dependencies_num` const edges drawn uniformly at
/// random over `0..num_objects`.
pub fn generate_population(
    num_objects: usize,
    dependencies_num: usize,
    const_dependencies_num: usize,
    rng: &mut impl Rng,
) -> Vec<GeneratedObject> {
    if num_objects == 0 {
        return Vec::new();
    }
    let distribution = Uniform::new(0, num_objects);
    (0..num_objects)
        .map(|_| GeneratedObject {
            mutual: distribution.sample_iter(&mut *rng).take(dependencies_num).collect(),
            constant: distribution.sample_iter(&mut *rng).take(const_dependencies_num).collect(),
            handle: ClusterIndex::NULL,
            counter: 0,
        })
        .collect()
}
