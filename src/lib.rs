//! # rangepool - Parallel Loops over a Fixed Worker Pool
//!
//! A lightweight parallel-execution engine for latency-sensitive numeric
//! code. A pool of `T` workers repeatedly accepts a "process index `i` of
//! `[0, N)`" job and spreads the `N` indices across the workers, balancing
//! load by work stealing.
//!
//! ## Architecture
//!
//! - **Worker slots**: each worker owns a cache-line isolated range of the
//!   current job. It consumes indices from the front; idle workers steal from
//!   the back of their siblings' ranges. Claims are lock-free.
//! - **Command word**: a dispatch publishes the job and advances a 32-bit
//!   generation; parked workers wake on the change.
//! - **Completion word**: the last worker to finish wakes the dispatcher.
//! - **Wait primitive**: both words sleep on a futex on Linux, or on a
//!   mutex + condition variable elsewhere (or with the `condvar-wait`
//!   feature).
//!
//! The calling thread acts as worker 0 during a dispatch, so a pool of `T`
//! workers spawns `T - 1` background threads.
//!
//! An absent pool (`None`) is a first-class mode: every entry point in
//! [`compute`] then runs the loop sequentially on the calling thread, in
//! order.
//!
//! ## Example
//!
//! ```
//! use rangepool::{ThreadPool, compute};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let pool = ThreadPool::new(4).expect("spawn workers");
//! let sum = AtomicU64::new(0);
//!
//! compute::compute_2d(Some(&pool), 16, 16, |i, j| {
//!     sum.fetch_add((i * 16 + j) as u64, Ordering::Relaxed);
//! });
//!
//! assert_eq!(sum.load(Ordering::SeqCst), (0..256).sum::<u64>());
//! pool.shutdown().expect("shutdown");
//! ```

pub mod c_api;
pub mod compute;
pub mod config;
pub mod error;
mod job;
pub mod metrics;
pub mod pool;
pub mod slice;
pub mod slot;
pub mod wait;
mod worker;

pub use compute::Dispatch;
pub use config::{PinningStrategy, PoolConfig};
pub use error::PoolError;
pub use pool::ThreadPool;
pub use slot::RangeSnapshot;
pub use wait::{DefaultWait, WaitPrimitive};
