//! Group Executor: runs a plan's groups one after another, fanning each
//! group's clusters out across a worker pool.
//!
//! Within a group, the planner already guarantees no cluster reads what
//! another cluster in the group writes, so clusters run with no
//! synchronization between them; the next group only starts once the
//! current one's `rayon::scope` has joined, which is the inter-group
//! barrier, built on `rayon::scope` + `par_iter` fan-out.

use crate::cluster::Cluster;
use crate::object::{ClusterIndex, Object, ObjectRef};
use crate::planner::Group;
use rayon::prelude::*;

/// Raw-pointer wrapper letting disjoint indices of a slice be handed to
/// concurrent closures as `&mut`. Safe only because a group's clusters
/// partition the object population (invariant of `cluster::Builder`) and a
/// plan's groups partition the clusters (invariant of `planner::plan`): no
/// two concurrently running closures ever dereference the same index.
struct SyncPtr<T>(*mut T);

unsafe impl<T> Sync for SyncPtr<T> {}
unsafe impl<T> Send for SyncPtr<T> {}

impl<T> SyncPtr<T> {
    unsafe fn get_mut(&self, index: usize) -> &mut T {
        &mut *self.0.add(index)
    }
}

/// Runs one group: every cluster in it executes concurrently on the pool,
/// each cluster's member objects running `task()` serially, in insertion
/// order, on whichever worker picked up that cluster.
pub fn execute_group<O: Object + Send>(
    objects: &mut [O],
    clusters: &mut [Cluster<'_>],
    group: &Group,
    thread_pool: &rayon::ThreadPool,
) {
    let objects_ptr = SyncPtr(objects.as_mut_ptr());
    let clusters_ptr = SyncPtr(clusters.as_mut_ptr());

    thread_pool.install(|| {
        group.cluster_indices.par_iter().for_each(|&cluster_idx| {
            // SAFETY: `cluster_idx` values within one group are distinct and
            // index disjoint clusters; distinct clusters hold disjoint
            // object indices.
            let cluster = unsafe { clusters_ptr.get_mut(cluster_idx) };
            let member_indices: Vec<ObjectRef> = cluster.objects().collect();
            for obj_idx in member_indices {
                let obj = unsafe { objects_ptr.get_mut(obj_idx) };
                obj.task();
                obj.set_cluster_handle(ClusterIndex::NULL);
            }
            cluster.members.clear();
        });
    });
}
