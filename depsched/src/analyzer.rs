//! Dependency Analyzer: for every cluster, a bitset of the other clusters its
//! objects merely read from.
//!
//! Each cluster's bitset is written by exactly one task and nothing else
//! touches that memory while it is, so this is an embarrassingly parallel
//! map over clusters.

use crate::cluster::Cluster;
use crate::depset::{self, DepSet};
use crate::error::Error;
use crate::object::Object;
use rayon::prelude::*;

pub fn analyze<O: Object + Sync>(objects: &[O], clusters: &[Cluster<'_>]) -> Result<Vec<DepSet>, Error> {
    if clusters.len() > depset::MAX_CLUSTERS {
        return Err(Error::CapacityExceeded { attempted: clusters.len(), limit: depset::MAX_CLUSTERS });
    }

    let dep_sets = clusters
        .par_iter()
        .map(|cluster| {
            let mut set = DepSet::new();
            if cluster.is_empty() {
                return set;
            }
            for obj_idx in cluster.objects() {
                objects[obj_idx].enumerate_const_dependencies(&mut set, objects);
            }
            set.clear_bit(cluster.index().index());
            set
        })
        .collect();

    Ok(dep_sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkPool, ChunkStack};
    use crate::cluster::Builder;
    use crate::object::{ClusterIndex, ObjectRef};

    struct Reader {
        reads: Vec<ObjectRef>,
        handle: ClusterIndex,
    }

    impl Object for Reader {
        fn enumerate_mutable_dependencies(&self, _out: &mut ChunkStack<'_, ObjectRef>) {}

        fn enumerate_const_dependencies(&self, out: &mut DepSet, population: &[Self]) {
            for &dep in &self.reads {
                out.set(population[dep].cluster_handle().index());
            }
        }

        fn task(&mut self) {}

        fn cluster_handle(&self) -> ClusterIndex {
            self.handle
        }

        fn set_cluster_handle(&mut self, handle: ClusterIndex) {
            self.handle = handle;
        }
    }

    #[test]
    fn singleton_clusters_see_each_others_reads() {
        let pool = ChunkPool::new(16);
        let mut objects = vec![
            Reader { reads: vec![1], handle: ClusterIndex::NULL },
            Reader { reads: vec![0], handle: ClusterIndex::NULL },
            Reader { reads: vec![], handle: ClusterIndex::NULL },
        ];
        let builder = Builder::new(&pool);
        let clusters = builder.build(&mut objects).unwrap();
        assert_eq!(clusters.len(), 3);

        let dep_sets = analyze(&objects, &clusters).unwrap();
        let c0 = objects[0].cluster_handle().index();
        let c1 = objects[1].cluster_handle().index();
        assert!(dep_sets[c0].contains(c1));
        assert!(dep_sets[c1].contains(c0));
        assert!(!dep_sets[c0].contains(c0));
    }

    #[test]
    fn a_cluster_never_depends_on_itself() {
        let pool = ChunkPool::new(16);
        let mut objects = vec![
            Reader { reads: vec![1], handle: ClusterIndex::NULL },
            Reader { reads: vec![0], handle: ClusterIndex::NULL },
        ];
        let builder = Builder::new(&pool);
        let clusters = builder.build(&mut objects).unwrap();
        assert_eq!(clusters.len(), 1);
        let dep_sets = analyze(&objects, &clusters).unwrap();
        assert!(dep_sets[0].is_empty());
    }
}
