/// Runtime-tunable half of the scheduler's configuration.
///
/// The compile-time half — the `DepSet` bitset width and the chunk payload
/// size — is selected through Cargo features (`bitset-64`/`bitset-80`/
/// `bitset-128`, `chunk-payload-128`/`chunk-payload-256`/`chunk-payload-512`)
/// rather than here, since changing either changes the layout of types
/// shared across the whole crate and can't sensibly be a runtime value (see
/// `depset.rs`, `chunk.rs`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of chunks in the chunk pool backing every `ChunkStack` used
    /// during a pass (the builder's worklist and every cluster's member
    /// list). One chunk holds `chunk::CHUNK_PAYLOAD_BYTES / size_of::<T>()`
    /// object indices (computed in `ChunkPool::new`, `chunk.rs`).
    pub chunk_pool_size: usize,

    /// Size of the `rayon::ThreadPool` the executor runs groups on.
    /// Defaults to `num_cpus::get()`.
    pub worker_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_pool_size: 4096,
            worker_count: num_cpus::get(),
        }
    }
}

impl Config {
    pub fn new(chunk_pool_size: usize, worker_count: usize) -> Self {
        Config { chunk_pool_size, worker_count }
    }
}
