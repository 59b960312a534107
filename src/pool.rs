//! The thread pool: construction, dispatch and shutdown.
//!
//! A pool of `T` workers runs `T - 1` background threads. The thread calling
//! [`ThreadPool::compute_1d`] acts as worker 0 for the duration of the call,
//! so the range is partitioned across all `T` workers.
//!
//! Dispatch protocol:
//!
//! 1. take the dispatch lock (one dispatch at a time);
//! 2. split `[0, N)` into `T` contiguous slot ranges;
//! 3. publish the job, arm `active_workers = T` and the completion word;
//! 4. advance the command word and wake every worker;
//! 5. run worker 0's share, steal, check out;
//! 6. sleep on the completion word until `active_workers == 0`.
//!
//! Everything written in steps 2-3 happens-before the release store of the
//! command word in step 4, which every worker acquires before touching the
//! slots or the job.

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::job::Job;
use crate::slot::{self, RangeSnapshot, WorkerSlot};
use crate::wait::{DefaultWait, WaitPrimitive};
use crate::worker::{self, Worker};
use crossbeam::utils::{Backoff, CachePadded};
use log::{debug, error, trace, warn};
use std::any::Any;
use std::cell::UnsafeCell;
use std::collections::TryReserveError;
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "metrics")]
use crate::metrics::PoolMetrics;

/// Completion word while at least one worker is still running.
const BUSY: u32 = 1;
/// Completion word once the last worker checked out.
const IDLE: u32 = 0;

/// State shared between the dispatcher and the workers.
pub(crate) struct Shared<W: WaitPrimitive> {
    pub(crate) threads_count: usize,
    pub(crate) slots: Box<[CachePadded<WorkerSlot>]>,
    active_workers: CachePadded<AtomicUsize>,
    /// Written by the dispatcher before the command word advances, read by
    /// workers after they observe the new value.
    job: UnsafeCell<Job>,
    /// Command generation. Advances once per published job.
    pub(crate) command: CachePadded<W>,
    /// `BUSY` while `active_workers > 0`.
    completion: CachePadded<W>,
    /// First panic raised by a job callback during the current dispatch.
    panic: Mutex<Option<Box<dyn Any + Send>>>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: PoolMetrics,
}

// SAFETY: `job` is only written by the dispatcher while holding the dispatch
// lock (or `&mut ThreadPool`) and while no worker is running; workers read it
// after an acquire on the command word that follows the write. Its raw
// context pointer refers to a `Sync` closure.
unsafe impl<W: WaitPrimitive> Sync for Shared<W> {}
unsafe impl<W: WaitPrimitive> Send for Shared<W> {}

impl<W: WaitPrimitive> Shared<W> {
    fn new(threads_count: usize) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(threads_count)?;
        slots.extend((0..threads_count).map(|id| CachePadded::new(WorkerSlot::new(id))));
        let slots = slots.into_boxed_slice();

        Ok(Shared {
            threads_count,
            slots,
            active_workers: CachePadded::new(AtomicUsize::new(0)),
            job: UnsafeCell::new(Job::initialize()),
            command: CachePadded::new(W::new(0)),
            completion: CachePadded::new(W::new(IDLE)),
            panic: Mutex::new(None),
            #[cfg(feature = "metrics")]
            metrics: PoolMetrics::new(),
        })
    }

    /// Copy of the published job.
    ///
    /// # Safety
    /// Only call after observing the command generation that published it,
    /// and before checking out of that command.
    pub(crate) unsafe fn current_job(&self) -> Job {
        unsafe { *self.job.get() }
    }

    /// Publishes `job` to `workers` workers and wakes them.
    ///
    /// # Safety
    /// No worker may be running a previous command.
    unsafe fn publish(&self, job: Job, workers: usize) {
        unsafe {
            *self.job.get() = job;
        }
        self.active_workers.store(workers, Ordering::Relaxed);
        self.completion.store(BUSY);
        let generation = self.command.load().wrapping_add(1);
        self.command.set_and_wake_all(generation);
    }

    /// Checks one worker out of the current command.
    #[inline]
    pub(crate) fn check_out(&self) {
        if self.active_workers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.completion.set_and_wake_all(IDLE);
        }
    }

    /// Blocks until every worker checked out.
    ///
    /// Waits for the completion word rather than the counter: the word flips
    /// to `IDLE` only after the last worker is done with the counter, so the
    /// next dispatch can re-arm it without racing a late store.
    fn wait_for_completion(&self) {
        let backoff = Backoff::new();
        while !backoff.is_completed() {
            if self.completion.load() == IDLE {
                return;
            }
            backoff.snooze();
        }
        while self.completion.load() != IDLE {
            self.completion.wait(BUSY);
        }
        debug_assert_eq!(self.active_workers.load(Ordering::Acquire), 0);
    }

    /// Runs the job for one index, keeping a callback panic from unwinding
    /// through the worker.
    #[inline]
    pub(crate) fn run_index(&self, job: &Job, index: usize) {
        // SAFETY: the dispatcher keeps the closure alive until every worker
        // checked out.
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| unsafe { job.invoke(index) }));
        if let Err(payload) = result {
            let mut slot = self.panic.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(payload);
            }
        }
    }

    fn take_panic(&self) -> Option<Box<dyn Any + Send>> {
        self.panic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Fixed-size pool of workers executing 1-D index ranges.
///
/// The backend used to park threads is the `W` type parameter; the default
/// is chosen per platform (see [`crate::wait`]).
pub struct ThreadPool<W: WaitPrimitive = DefaultWait> {
    shared: Arc<Shared<W>>,
    workers: Vec<Worker>,
    dispatch_lock: Mutex<()>,
}

impl ThreadPool<DefaultWait> {
    /// Creates a pool with `threads_count` workers, the calling thread
    /// included. `0` means one worker per logical CPU.
    ///
    /// # Example
    ///
    /// ```
    /// use rangepool::ThreadPool;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let pool = ThreadPool::new(4).expect("spawn workers");
    /// let sum = AtomicUsize::new(0);
    /// pool.compute_1d(100, |i| {
    ///     sum.fetch_add(i, Ordering::Relaxed);
    /// });
    /// assert_eq!(sum.load(Ordering::SeqCst), 4950);
    /// ```
    pub fn new(threads_count: usize) -> Result<Self, PoolError> {
        Self::with_config(&PoolConfig::with_threads(threads_count))
    }
}

impl<W: WaitPrimitive> ThreadPool<W> {
    /// Creates a pool from `config`.
    ///
    /// Either every background worker is running and parked when this
    /// returns, or none is. A worker count too large to allocate state for
    /// fails with [`PoolError::Allocation`] before any thread is spawned.
    pub fn with_config(config: &PoolConfig) -> Result<Self, PoolError> {
        let threads_count = config.resolved_threads_count();
        let allocation = |source| PoolError::Allocation {
            threads_count,
            source,
        };
        let shared = Shared::<W>::new(threads_count).map_err(allocation)?;
        let mut workers = Vec::new();
        workers
            .try_reserve_exact(threads_count - 1)
            .map_err(allocation)?;
        let mut pool = ThreadPool {
            shared: Arc::new(shared),
            workers,
            dispatch_lock: Mutex::new(()),
        };

        let observed = pool.shared.command.load();
        for id in 1..threads_count {
            match Worker::spawn(id, Arc::clone(&pool.shared), config, observed) {
                Ok(worker) => pool.workers.push(worker),
                Err(source) => {
                    error!("failed to spawn worker {id} of {threads_count}: {source}");
                    // Dropping the partial pool shuts down and joins the
                    // workers spawned so far.
                    drop(pool);
                    return Err(PoolError::Spawn { worker: id, source });
                }
            }
        }

        pool.initialize();
        debug!(
            "thread pool ready: {threads_count} worker(s), pinning {:?}",
            config.pinning
        );
        Ok(pool)
    }

    /// Waits until every background worker has started and checked in.
    fn initialize(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        // SAFETY: `&mut self`, and no command was published yet.
        unsafe { self.shared.publish(Job::initialize(), self.workers.len()) };
        self.shared.wait_for_completion();
    }

    /// Number of workers, the calling thread included.
    pub fn threads_count(&self) -> usize {
        self.shared.threads_count
    }

    /// Calls `function(i)` once for every `i` in `0..range`.
    ///
    /// Indices are spread across all workers, the calling thread included;
    /// the order of calls is unspecified. Returns once every index has been
    /// processed. Concurrent calls from several threads are serialized.
    ///
    /// If `function` panics, the remaining indices still run and the first
    /// panic is resumed on the calling thread once all workers are idle.
    ///
    /// Calling `compute_1d` on the same pool from inside `function`
    /// deadlocks.
    pub fn compute_1d<F>(&self, range: usize, function: F)
    where
        F: Fn(usize) + Sync,
    {
        let guard = self
            .dispatch_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let shared = &*self.shared;
        trace!("dispatch: range {range} over {} worker(s)", shared.threads_count);

        #[cfg(feature = "metrics")]
        shared
            .metrics
            .dispatches
            .fetch_add(1, Ordering::Relaxed);

        let job = Job::compute_1d(&function);
        if self.workers.is_empty() {
            for index in 0..range {
                shared.run_index(&job, index);
            }
            #[cfg(feature = "metrics")]
            shared
                .metrics
                .own_claims
                .fetch_add(range as u64, Ordering::Relaxed);
        } else {
            for (id, worker_slot) in shared.slots.iter().enumerate() {
                worker_slot.assign(slot::partition(range, shared.threads_count, id));
            }

            // SAFETY: the dispatch lock is held and the previous dispatch
            // waited for every worker to check out.
            unsafe { shared.publish(job, shared.threads_count) };

            worker::execute(shared, 0, &job);
            shared.check_out();
            shared.wait_for_completion();
        }

        // `function` outlives every use by the workers from here on.
        if let Some(payload) = shared.take_panic() {
            drop(guard);
            panic::resume_unwind(payload);
        }
    }

    /// Current state of every worker slot.
    ///
    /// Safe to call from inside a job callback; values are only a sample.
    pub fn slot_snapshots(&self) -> Vec<RangeSnapshot> {
        self.shared.slots.iter().map(|slot| slot.snapshot()).collect()
    }

    /// Scheduling counters collected since construction.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> &PoolMetrics {
        &self.shared.metrics
    }

    /// Stops and joins every background worker.
    ///
    /// Returns an error if any worker thread terminated abnormally.
    pub fn shutdown(mut self) -> Result<(), PoolError> {
        match self.terminate() {
            0 => Ok(()),
            count => Err(PoolError::WorkerPanicked { count }),
        }
    }

    /// Publishes the shutdown command and joins the workers. Returns the
    /// number of workers that panicked. A second call is a no-op.
    fn terminate(&mut self) -> usize {
        if self.workers.is_empty() {
            return 0;
        }
        // SAFETY: `&mut self` rules out a dispatch in flight.
        unsafe { self.shared.publish(Job::shutdown(), 0) };

        let mut panicked = 0;
        for worker in self.workers.drain(..) {
            let id = worker.id();
            if worker.join().is_err() {
                warn!("worker {id} panicked");
                panicked += 1;
            }
        }
        debug!("thread pool shut down");
        panicked
    }
}

impl<W: WaitPrimitive> Drop for ThreadPool<W> {
    fn drop(&mut self) {
        self.terminate();
    }
}
