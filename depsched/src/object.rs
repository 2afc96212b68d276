use crate::chunk::ChunkStack;
use crate::depset::DepSet;

/// A participant is identified by its position in the slice `run_pass` was
/// given. There is no pointer graph: an object reaches its dependency peers
/// the same way the caller does, by index into that slice.
pub type ObjectRef = usize;

/// 16-bit handle assigned to an object by the cluster builder. `NULL` marks
/// "not yet assigned" and is the value every object must start a pass with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterIndex(u16);

/// Absolute ceiling imposed by the 16-bit handle, independent of whichever
/// `DepSet` bitset width is compiled in (`depset::MAX_CLUSTERS` is usually
/// the tighter of the two).
pub const MAX_CLUSTERS_HARD_CAP: usize = 0xFFFF;

impl ClusterIndex {
    pub const NULL: ClusterIndex = ClusterIndex(0xFFFF);

    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(index < MAX_CLUSTERS_HARD_CAP);
        ClusterIndex(index as u16)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_null(self) -> bool {
        self.0 == ClusterIndex::NULL.0
    }
}

impl Default for ClusterIndex {
    fn default() -> Self {
        ClusterIndex::NULL
    }
}

/// The capability a population member must expose to take part in a pass.
/// Exactly three operations beyond the cluster-handle slot: enumerate the
/// peers it must co-execute with, enumerate the clusters it merely reads,
/// and do its work.
pub trait Object {
    /// Append every peer `self` must share a cluster with — anyone it may
    /// mutate, or that may mutate it — to `out`. May contain duplicates and
    /// self-references; the builder tolerates both.
    fn enumerate_mutable_dependencies(&self, out: &mut ChunkStack<'_, ObjectRef>);

    /// Set the bit of every cluster `self` merely reads from, by looking up
    /// each read-only peer's handle in `population`. Called only once every
    /// object in `population` already carries a non-null cluster handle.
    fn enumerate_const_dependencies(&self, out: &mut DepSet, population: &[Self])
    where
        Self: Sized;

    /// Do the object's work for this pass. Runs with exclusive (`&mut`)
    /// access; nothing else touches this object concurrently while its
    /// cluster's group is executing.
    fn task(&mut self);

    fn cluster_handle(&self) -> ClusterIndex;

    fn set_cluster_handle(&mut self, handle: ClusterIndex);
}
