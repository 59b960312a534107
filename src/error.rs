use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Errors reported by pool construction and shutdown.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The OS refused to create a worker thread. Workers spawned before the
    /// failure have already been shut down and joined.
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
    /// Per-worker bookkeeping for the requested worker count could not be
    /// allocated. No thread was spawned.
    #[error("cannot allocate state for {threads_count} workers")]
    Allocation {
        threads_count: usize,
        #[source]
        source: TryReserveError,
    },
    /// Worker threads that terminated abnormally, observed while joining.
    #[error("{count} worker thread(s) panicked")]
    WorkerPanicked { count: usize },
}
