//! Worker thread implementation.
//!
//! Background workers park on the pool's command word. Each time it
//! advances they copy the published job and either check in
//! (initialize), drain their own range and steal from siblings (compute), or
//! leave the loop (shutdown).

use crate::config::PoolConfig;
use crate::job::{Job, JobKind};
use crate::pool::Shared;
use crate::wait::WaitPrimitive;
use crossbeam::utils::Backoff;
use log::{debug, warn};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

/// A background worker thread.
pub(crate) struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns worker `id`. `observed` is the command generation current at
    /// spawn time; the worker sleeps until it advances.
    pub(crate) fn spawn<W: WaitPrimitive>(
        id: usize,
        shared: Arc<Shared<W>>,
        config: &PoolConfig,
        observed: u32,
    ) -> io::Result<Self> {
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let pinning = config.pinning;

        let handle = builder.spawn(move || {
            // Pin worker to its core for better cache locality
            if let Some(core_ids) = core_affinity::get_core_ids() {
                if let Some(core) = pinning
                    .core_index(id, core_ids.len())
                    .and_then(|index| core_ids.get(index).copied())
                {
                    if !core_affinity::set_for_current(core) {
                        warn!("worker {id}: failed to pin to core {}", core.id);
                    }
                }
            }

            debug!("worker {id} started");
            Worker::run_loop(&shared, id, observed);
            debug!("worker {id} exiting");
        })?;

        Ok(Worker {
            id,
            handle: Some(handle),
        })
    }

    /// Idle -> Running -> Idle ... -> Terminated.
    fn run_loop<W: WaitPrimitive>(shared: &Shared<W>, id: usize, mut observed: u32) {
        loop {
            observed = wait_for_command(&*shared.command, observed);

            // SAFETY: the new generation was acquired above and this worker
            // has not checked out of it yet.
            let job = unsafe { shared.current_job() };
            match job.kind() {
                JobKind::Shutdown => return,
                JobKind::Initialize => {}
                JobKind::Compute1d => execute(shared, id, &job),
            }
            shared.check_out();
        }
    }

    /// Returns the worker's ID.
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Waits for the worker thread to finish.
    pub(crate) fn join(mut self) -> thread::Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.join()
        } else {
            Ok(())
        }
    }
}

/// Waits for the command word to move past `observed` and returns the new
/// generation. Spins briefly before parking.
fn wait_for_command<W: WaitPrimitive>(command: &W, observed: u32) -> u32 {
    let backoff = Backoff::new();
    loop {
        let current = command.load();
        if current != observed {
            return current;
        }
        if backoff.is_completed() {
            command.wait(observed);
        } else {
            backoff.snooze();
        }
    }
}

/// Drains worker `id`'s own range, then steals from every sibling.
///
/// Victims are visited starting from the worker just behind `id` and going
/// backwards, each drained before moving on. A slot whose length reached
/// zero stays empty for the rest of the dispatch, so one pass leaves every
/// slot drained.
pub(crate) fn execute<W: WaitPrimitive>(shared: &Shared<W>, id: usize, job: &Job) {
    let slots = &shared.slots;
    let own = &slots[id];

    while let Some(index) = own.try_claim_own() {
        shared.run_index(job, index);
        #[cfg(feature = "metrics")]
        shared.metrics.own_claims.fetch_add(1, Ordering::Relaxed);
    }

    let count = slots.len();
    for offset in 1..count {
        let victim = &slots[(id + count - offset) % count];
        #[cfg(feature = "metrics")]
        if victim.remaining() == 0 {
            shared.metrics.steals_empty.fetch_add(1, Ordering::Relaxed);
        }
        while let Some(index) = victim.try_steal() {
            shared.run_index(job, index);
            #[cfg(feature = "metrics")]
            shared
                .metrics
                .steals_success
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}
