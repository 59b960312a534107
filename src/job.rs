//! Job published to the workers once per command.
//!
//! A job is a type-erased `Fn(usize)` plus the command kind. The dispatcher
//! keeps the closure alive on its own stack and does not return before every
//! worker is done with it, so the job only needs to carry a borrowed pointer.

use std::ptr;

/// What the workers are asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Check in once after startup; no indices are processed.
    Initialize,
    /// Process the ranges stored in the worker slots.
    Compute1d,
    /// Leave the worker loop.
    Shutdown,
}

type Call = unsafe fn(*const (), usize);

/// Immutable snapshot of {call, context, kind}.
#[derive(Clone, Copy)]
pub(crate) struct Job {
    kind: JobKind,
    call: Call,
    context: *const (),
}

impl Job {
    pub(crate) fn initialize() -> Self {
        Job {
            kind: JobKind::Initialize,
            call: skip,
            context: ptr::null(),
        }
    }

    pub(crate) fn shutdown() -> Self {
        Job {
            kind: JobKind::Shutdown,
            call: skip,
            context: ptr::null(),
        }
    }

    /// Erases `function` into a job.
    ///
    /// The job borrows `function` without a lifetime; the caller must keep
    /// it alive until every worker finished invoking the job.
    pub(crate) fn compute_1d<F>(function: &F) -> Self
    where
        F: Fn(usize) + Sync,
    {
        Job {
            kind: JobKind::Compute1d,
            call: trampoline::<F>,
            context: function as *const F as *const (),
        }
    }

    pub(crate) fn kind(&self) -> JobKind {
        self.kind
    }

    /// Runs the job for `index`.
    ///
    /// # Safety
    /// The closure this job was built from must still be alive.
    #[inline]
    pub(crate) unsafe fn invoke(&self, index: usize) {
        unsafe { (self.call)(self.context, index) }
    }
}

unsafe fn trampoline<F: Fn(usize)>(context: *const (), index: usize) {
    let function = unsafe { &*(context as *const F) };
    function(index);
}

unsafe fn skip(_context: *const (), _index: usize) {}
