//! Cluster type and the single-threaded builder.
//!
//! Weighted-union algorithm over an arena of plain `Cluster` values, each
//! object carrying a `Cell`-like handle to its cluster rather than a
//! back-pointer.

use crate::chunk::{ChunkPool, ChunkStack};
use crate::error::Error;
use crate::object::{ClusterIndex, Object, ObjectRef, MAX_CLUSTERS_HARD_CAP};

/// One connected component of the mutable-dependency graph: an index plus
/// the sequence of object positions assigned to it, in the order they were
/// first visited.
pub struct Cluster<'p> {
    index: ClusterIndex,
    pub(crate) members: ChunkStack<'p, ObjectRef>,
}

impl<'p> Cluster<'p> {
    fn new(index: ClusterIndex, pool: &'p ChunkPool<ObjectRef>) -> Self {
        Cluster { index, members: ChunkStack::new(pool) }
    }

    pub fn index(&self) -> ClusterIndex {
        self.index
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.members.iter()
    }
}

/// Partitions `objects` into clusters by traversing the mutable-dependency
/// graph with a reusable worklist, merging components by weighted union
/// (the smaller component's objects are retagged and spliced into the
/// larger one's member list).
pub struct Builder<'p> {
    pool: &'p ChunkPool<ObjectRef>,
}

impl<'p> Builder<'p> {
    pub fn new(pool: &'p ChunkPool<ObjectRef>) -> Self {
        Builder { pool }
    }

    pub fn build<O: Object>(&self, objects: &mut [O]) -> Result<Vec<Cluster<'p>>, Error> {
        let mut clusters: Vec<Cluster<'p>> = Vec::new();
        let mut worklist: ChunkStack<'p, ObjectRef> = ChunkStack::new(self.pool);

        for start in 0..objects.len() {
            if !objects[start].cluster_handle().is_null() {
                continue;
            }

            let initial_index = clusters.len();
            if initial_index >= MAX_CLUSTERS_HARD_CAP {
                return Err(Error::CapacityExceeded { attempted: initial_index + 1, limit: MAX_CLUSTERS_HARD_CAP });
            }
            clusters.push(Cluster::new(ClusterIndex::new(initial_index), self.pool));
            worklist.push_back(start)?;
            let mut current = initial_index;

            while let Some(obj_idx) = worklist.pop_back() {
                let handle = objects[obj_idx].cluster_handle();
                if handle.is_null() {
                    clusters[current].members.push_back(obj_idx)?;
                    objects[obj_idx].set_cluster_handle(ClusterIndex::new(current));
                    objects[obj_idx].enumerate_mutable_dependencies(&mut worklist);
                } else if handle.index() == current {
                    // already absorbed into the component being built, nothing to do
                } else {
                    let other = handle.index();
                    // weighted union: retag and merge the smaller side into the larger;
                    // ties keep `current` so the just-created cluster never wins a tie
                    // it wasn't strictly bigger for.
                    let (small, big) = if clusters[other].members.len() > clusters[current].members.len() {
                        (current, other)
                    } else {
                        (other, current)
                    };

                    let lo = small.min(big);
                    let hi = small.max(big);
                    let (left, right) = clusters.split_at_mut(hi);
                    let (small_ref, big_ref) = if small == lo {
                        (&mut left[lo], &mut right[0])
                    } else {
                        (&mut right[0], &mut left[lo])
                    };

                    let moved: Vec<ObjectRef> = small_ref.members.iter().collect();
                    for obj in &moved {
                        objects[*obj].set_cluster_handle(ClusterIndex::new(big));
                    }
                    big_ref.members.merge(&mut small_ref.members);

                    current = big;
                    // the brand-new singleton created above for this traversal is, if it
                    // loses, still the tail of `clusters` (nothing else was pushed since):
                    // pop it to avoid leaving a hole in the common case.
                    if small == initial_index && clusters.len() - 1 == initial_index {
                        clusters.pop();
                    }
                }
            }
        }

        Ok(clusters)
    }
}

/// Debug-only post-condition: every cluster's object sequence is
/// duplicate-free and matches every member's handle, and every
/// mutable-dependency edge stays inside its cluster. Corresponds to
/// spec's `test_clusters_coherent` helper; wired into [`crate::run_pass`]
/// behind `cfg(any(debug_assertions, feature = "invariant-checks"))` since a
/// correct builder never trips it and it re-walks every mutable-dependency
/// edge a second time.
#[cfg(any(debug_assertions, feature = "invariant-checks"))]
pub fn verify_invariants<O: Object>(
    objects: &[O],
    clusters: &[Cluster<'_>],
    pool: &ChunkPool<ObjectRef>,
) -> Result<(), Error> {
    use std::collections::HashSet;

    for cluster in clusters {
        let mut seen = HashSet::with_capacity(cluster.len());
        for obj_idx in cluster.objects() {
            if !seen.insert(obj_idx) {
                return Err(Error::InvariantViolated("duplicate object in a cluster's member sequence"));
            }
            if objects[obj_idx].cluster_handle() != cluster.index() {
                return Err(Error::InvariantViolated("object's cluster handle does not match its cluster"));
            }
        }
    }

    let mut scratch: ChunkStack<'_, ObjectRef> = ChunkStack::new(pool);
    for obj in objects {
        obj.enumerate_mutable_dependencies(&mut scratch);
        let own_cluster = obj.cluster_handle();
        while let Some(peer) = scratch.pop_back() {
            if objects[peer].cluster_handle() != own_cluster {
                return Err(Error::InvariantViolated("mutable-dependency edge crosses cluster boundary"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct TestObject {
        mutual: Vec<ObjectRef>,
        constant: Vec<ObjectRef>,
        handle: ClusterIndex,
        ran: RefCell<bool>,
    }

    impl TestObject {
        fn new(mutual: Vec<ObjectRef>, constant: Vec<ObjectRef>) -> Self {
            TestObject { mutual, constant, handle: ClusterIndex::NULL, ran: RefCell::new(false) }
        }
    }

    impl Object for TestObject {
        fn enumerate_mutable_dependencies(&self, out: &mut ChunkStack<'_, ObjectRef>) {
            for &dep in &self.mutual {
                out.push_back(dep).unwrap();
            }
        }

        fn enumerate_const_dependencies(&self, out: &mut crate::depset::DepSet, population: &[Self]) {
            for &dep in &self.constant {
                out.set(population[dep].cluster_handle().index());
            }
        }

        fn task(&mut self) {
            *self.ran.borrow_mut() = true;
        }

        fn cluster_handle(&self) -> ClusterIndex {
            self.handle
        }

        fn set_cluster_handle(&mut self, handle: ClusterIndex) {
            self.handle = handle;
        }
    }

    #[test]
    fn disjoint_pairs_form_two_clusters() {
        let pool = ChunkPool::new(64);
        let mut objects = vec![
            TestObject::new(vec![1], vec![]),
            TestObject::new(vec![0], vec![]),
            TestObject::new(vec![3], vec![]),
            TestObject::new(vec![2], vec![]),
        ];
        let builder = Builder::new(&pool);
        let clusters = builder.build(&mut objects).unwrap();
        assert_eq!(clusters.len(), 2);
        for cluster in &clusters {
            assert_eq!(cluster.len(), 2);
        }
    }

    #[test]
    fn transitive_chain_forms_one_cluster() {
        let pool = ChunkPool::new(64);
        let mut objects = vec![
            TestObject::new(vec![1], vec![]),
            TestObject::new(vec![2], vec![]),
            TestObject::new(vec![], vec![]),
        ];
        let builder = Builder::new(&pool);
        let clusters = builder.build(&mut objects).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 3);
    }

    #[test]
    fn self_reference_and_duplicates_are_tolerated() {
        let pool = ChunkPool::new(64);
        let mut objects = vec![TestObject::new(vec![0, 0, 0], vec![])];
        let builder = Builder::new(&pool);
        let clusters = builder.build(&mut objects).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 1);
    }

    #[test]
    fn every_object_ends_up_with_a_non_null_handle() {
        let pool = ChunkPool::new(64);
        let mut objects = vec![
            TestObject::new(vec![], vec![]),
            TestObject::new(vec![2], vec![]),
            TestObject::new(vec![1], vec![]),
        ];
        let builder = Builder::new(&pool);
        let _clusters = builder.build(&mut objects).unwrap();
        for obj in &objects {
            assert!(!obj.cluster_handle().is_null());
        }
    }

    #[test]
    fn a_correctly_built_partition_passes_invariant_checks() {
        let pool = ChunkPool::new(64);
        let mut objects = vec![
            TestObject::new(vec![1], vec![]),
            TestObject::new(vec![0], vec![]),
            TestObject::new(vec![], vec![]),
        ];
        let builder = Builder::new(&pool);
        let clusters = builder.build(&mut objects).unwrap();
        assert!(verify_invariants(&objects, &clusters, &pool).is_ok());
    }

    #[test]
    fn a_handle_forged_after_the_fact_trips_the_checker() {
        let pool = ChunkPool::new(64);
        let mut objects = vec![
            TestObject::new(vec![1], vec![]),
            TestObject::new(vec![0], vec![]),
        ];
        let builder = Builder::new(&pool);
        let clusters = builder.build(&mut objects).unwrap();
        // simulate a bug: detach one member from its cluster after the fact
        objects[1].set_cluster_handle(ClusterIndex::new(999));
        assert!(verify_invariants(&objects, &clusters, &pool).is_err());
    }
}
