//! Pool configuration.

use serde::{Deserialize, Serialize};

/// Strategy for pinning background workers to CPU cores.
///
/// The calling thread, which acts as worker 0 during a dispatch, is never
/// pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinningStrategy {
    /// No pinning (standard OS scheduling).
    #[default]
    None,
    /// Worker i -> logical processor i, wrapping around.
    Linear,
    /// Worker i -> logical processor 2i, wrapping around, so that workers
    /// land on distinct physical cores on SMT machines.
    AvoidSMT,
}

impl PinningStrategy {
    /// Logical processor index for worker `worker` out of `available`.
    pub fn core_index(self, worker: usize, available: usize) -> Option<usize> {
        if available == 0 {
            return None;
        }
        match self {
            PinningStrategy::None => None,
            PinningStrategy::Linear => Some(worker % available),
            PinningStrategy::AvoidSMT => {
                let physical = available.div_ceil(2);
                Some((worker % physical) * 2)
            }
        }
    }
}

/// Configuration for a [`ThreadPool`](crate::ThreadPool).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Total number of workers, including the calling thread. 0 means one
    /// per logical CPU.
    pub threads_count: usize,
    /// How background workers are pinned.
    pub pinning: PinningStrategy,
    /// Background threads are named `<prefix>-<worker id>`.
    pub thread_name_prefix: String,
    /// Stack size of background threads. `None` keeps the std default.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads_count: 0,
            pinning: PinningStrategy::None,
            thread_name_prefix: "rangepool".to_string(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Configuration with a fixed number of workers.
    pub fn with_threads(threads_count: usize) -> Self {
        Self {
            threads_count,
            ..Default::default()
        }
    }

    /// Number of workers the pool will actually run.
    pub fn resolved_threads_count(&self) -> usize {
        if self.threads_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads_count
        }
    }
}
