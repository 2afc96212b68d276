use thiserror::Error;

/// Everything that can stop a pass from completing.
///
/// A user task's own panic is *not* represented here: it propagates straight
/// through the worker pool, the same way a panic inside a `rayon::scope`
/// closure propagates to the caller of `scope`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("pass would create {attempted} clusters, exceeding the {limit} limit")]
    CapacityExceeded { attempted: usize, limit: usize },

    #[error("chunk pool exhausted: all {capacity} chunks in use")]
    ChunkPoolExhausted { capacity: usize },

    #[error("invariant violated: {0}")]
    InvariantViolated(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
