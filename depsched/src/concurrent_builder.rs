//! Experimental multi-threaded cluster builder.
//!
//! Optional; gated behind the `concurrent-builder` feature and off by
//! default. Several workers race to claim objects into clusters via CAS on
//! each object's handle, and merge colliding clusters by acquiring a pair of
//! per-cluster mutexes in **ascending cluster-index order**.
//!
//! Lock order and merge direction are kept independent to avoid a deadlock
//! where both would resolve to the same mutex: lock order is always
//! ascending numeric cluster index, decided before either lock is taken;
//! merge direction ("absorb into whichever side currently has more
//! members") is decided only after both locks are held.
//!
//! Produces the same partition as [`crate::cluster::Builder::build`] modulo
//! cluster numbering.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::chunk::{ChunkPool, ChunkStack};
use crate::depset;
use crate::error::Error;
use crate::object::{ClusterIndex, Object, ObjectRef, MAX_CLUSTERS_HARD_CAP};

const UNCLAIMED: u32 = u32::MAX;

/// A cluster under construction: a member list behind its own mutex, plus
/// a union-find parent pointer used once the cluster has been merged away.
struct ConcurrentCluster {
    members: Mutex<Vec<ObjectRef>>,
    parent: AtomicU32,
}

impl ConcurrentCluster {
    fn new() -> Self {
        ConcurrentCluster { members: Mutex::new(Vec::new()), parent: AtomicU32::new(UNCLAIMED) }
    }
}

/// Resolves `index` to its current root, compressing the path as it goes.
fn find_root(clusters: &[ConcurrentCluster], mut index: usize) -> usize {
    loop {
        let parent = clusters[index].parent.load(Ordering::Acquire);
        if parent == UNCLAIMED {
            return index;
        }
        let grandparent = clusters[parent as usize].parent.load(Ordering::Acquire);
        if grandparent != UNCLAIMED {
            clusters[index].parent.store(grandparent, Ordering::Release);
        }
        index = parent as usize;
    }
}

/// Merges the clusters currently rooted at `a` and `b` and returns the
/// surviving root. Locks both member lists in ascending index order no
/// matter which root ends up absorbing the other, so two concurrent calls
/// racing over the same pair of clusters always agree on lock order and
/// cannot deadlock.
fn merge_roots(clusters: &[ConcurrentCluster], a: usize, b: usize) -> usize {
    if a == b {
        return a;
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let mut lo_guard = clusters[lo].members.lock().unwrap();
    let mut hi_guard = clusters[hi].members.lock().unwrap();

    if lo_guard.len() >= hi_guard.len() {
        lo_guard.append(&mut hi_guard);
        clusters[hi].parent.store(lo as u32, Ordering::Release);
        lo
    } else {
        hi_guard.append(&mut lo_guard);
        clusters[lo].parent.store(hi as u32, Ordering::Release);
        hi
    }
}

/// Claims `obj_idx` for `root`'s cluster if it is still unclaimed. Returns
/// `true` on a fresh claim (the caller should keep traversing from it).
fn try_claim(handles: &[AtomicU32], obj_idx: usize, root: u32) -> bool {
    handles[obj_idx].compare_exchange(UNCLAIMED, root, Ordering::AcqRel, Ordering::Acquire).is_ok()
}

/// Builds clusters over `objects` using up to `worker_count` racing
/// workers. On success, every object's cluster handle is set and the
/// returned vector holds one member list per surviving cluster root, in
/// arbitrary order (unlike the single-threaded builder, worker races mean
/// the concurrent builder makes no promise about cluster numbering
/// matching traversal order).
pub fn build_concurrent<O>(objects: &mut [O], worker_count: usize) -> Result<Vec<Vec<ObjectRef>>, Error>
where
    O: Object + Send + Sync,
{
    let n = objects.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let handles: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(UNCLAIMED)).collect();
    let clusters: Vec<ConcurrentCluster> = (0..n).map(|_| ConcurrentCluster::new()).collect();
    let worklist_pool: ChunkPool<ObjectRef> = ChunkPool::new((n / 4).max(16));

    let worker_count = worker_count.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .build()
        .map_err(|_| Error::InvariantViolated("failed to build concurrent builder's worker pool"))?;

    let objects_shared: &[O] = objects;
    pool.scope(|scope| {
        let chunk = ((n + worker_count - 1) / worker_count).max(1);
        for start in (0..n).step_by(chunk) {
            let end = (start + chunk).min(n);
            let handles = &handles;
            let clusters = &clusters;
            let worklist_pool = &worklist_pool;
            scope.spawn(move |_| {
                let mut worklist: ChunkStack<'_, ObjectRef> = ChunkStack::new(worklist_pool);
                for i in start..end {
                    if handles[i].load(Ordering::Acquire) != UNCLAIMED {
                        continue;
                    }
                    if !try_claim(handles, i, i as u32) {
                        continue;
                    }
                    clusters[i].members.lock().unwrap().push(i);
                    // `current` tracks which root this traversal is feeding;
                    // it moves whenever this traversal collides with (and
                    // merges into, or absorbs) another worker's cluster.
                    let mut current = i as u32;
                    worklist.push_back(i).expect("worklist pool exhausted");

                    while let Some(obj_idx) = worklist.pop_back() {
                        let observed = handles[obj_idx].load(Ordering::Acquire);
                        if observed == UNCLAIMED {
                            if try_claim(handles, obj_idx, current) {
                                let root = find_root(clusters, current as usize);
                                clusters[root].members.lock().unwrap().push(obj_idx);
                                objects_shared[obj_idx].enumerate_mutable_dependencies(&mut worklist);
                                continue;
                            }
                            // lost the race for `obj_idx`; fall through and
                            // reconcile with whoever won it, like the
                            // already-claimed case below.
                        }
                        let other_root = find_root(clusters, handles[obj_idx].load(Ordering::Acquire) as usize);
                        let my_root = find_root(clusters, current as usize);
                        current = if other_root == my_root { my_root as u32 } else { merge_roots(clusters, my_root, other_root) as u32 };
                    }
                }
            });
        }
    });

    let mut result = Vec::new();
    for i in 0..n {
        if find_root(&clusters, i) == i {
            let members = clusters[i].members.lock().unwrap().clone();
            if !members.is_empty() {
                result.push(members);
            }
        }
    }
    let limit = depset::MAX_CLUSTERS.min(MAX_CLUSTERS_HARD_CAP);
    if result.len() > limit {
        return Err(Error::CapacityExceeded { attempted: result.len(), limit });
    }

    for (cluster_idx, members) in result.iter().enumerate() {
        for &obj_idx in members {
            objects[obj_idx].set_cluster_handle(ClusterIndex::new(cluster_idx));
        }
    }

    Ok(result)
}
