//! Group Planner: greedy rotating-start packing of clusters into
//! conflict-free execution groups.
//!
//! Deterministic and single-threaded — the packing itself is cheap relative
//! to the analysis and execution phases, so there is no parallel variant.

use crate::cluster::Cluster;
use crate::depset::DepSet;

/// A set of clusters that can run concurrently: none of them reads a
/// cluster another member of the group writes to (i.e. no member's
/// dependency set overlaps another member's presence in the group), and
/// none is itself read by anything already in the group.
pub struct Group {
    pub(crate) cluster_indices: Vec<usize>,
    members: DepSet,
    covered: DepSet,
}

impl Group {
    fn new() -> Self {
        Group { cluster_indices: Vec::new(), members: DepSet::new(), covered: DepSet::new() }
    }

    fn admits(&self, cluster_index: usize, dependencies: &DepSet) -> bool {
        !dependencies.intersects(&self.members) && !self.covered.contains(cluster_index)
    }

    fn insert(&mut self, cluster_index: usize, dependencies: &DepSet) {
        self.cluster_indices.push(cluster_index);
        self.members.set(cluster_index);
        self.covered.union_with(dependencies);
    }

    pub fn len(&self) -> usize {
        self.cluster_indices.len()
    }
}

/// Packs every non-empty cluster into a group, trying existing groups
/// starting from a rotating offset before opening a new one. The rotation
/// spreads the scan's starting point across calls so one early, broad
/// cluster doesn't become a magnet that every later cluster has to skip
/// past.
pub fn plan(clusters: &[Cluster<'_>], dep_sets: &[DepSet]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for (k, cluster) in clusters.iter().enumerate() {
        if cluster.is_empty() {
            continue;
        }
        let dependencies = &dep_sets[k];

        if groups.is_empty() {
            let mut group = Group::new();
            group.insert(k, dependencies);
            groups.push(group);
            continue;
        }

        let n = groups.len();
        let start = k % n;
        let mut placed = false;
        for step in 0..n {
            let g = (start + step) % n;
            if groups[g].admits(k, dependencies) {
                groups[g].insert(k, dependencies);
                placed = true;
                break;
            }
        }
        if !placed {
            let mut group = Group::new();
            group.insert(k, dependencies);
            groups.push(group);
        }
    }

    groups
}
