//! C API for the thread pool.
//!
//! A pool handle is an opaque pointer to a boxed [`ThreadPool`]. Every
//! compute function accepts a null handle and then runs the loop
//! sequentially on the calling thread, in order. Callbacks receive the opaque
//! `argument` untouched; they have no error channel and must not unwind.

#![allow(non_snake_case, non_camel_case_types)]

use crate::ThreadPool;
use crate::compute::{self, Dispatch};
use log::error;
use std::ffi::c_void;
use std::ptr;

pub type ThreadPool_Function1D = unsafe extern "C" fn(argument: *mut c_void, index: usize);
pub type ThreadPool_Function1DTiled =
    unsafe extern "C" fn(argument: *mut c_void, start: usize, len: usize);
pub type ThreadPool_Function2D = unsafe extern "C" fn(argument: *mut c_void, i: usize, j: usize);
pub type ThreadPool_Function2DTiled = unsafe extern "C" fn(
    argument: *mut c_void,
    i: usize,
    j: usize,
    len_i: usize,
    len_j: usize,
);

/// Caller-owned argument forwarded to every callback.
#[derive(Clone, Copy)]
struct Argument(*mut c_void);

// SAFETY: the C contract makes the caller responsible for `argument` being
// usable from every worker thread.
unsafe impl Send for Argument {}
unsafe impl Sync for Argument {}

impl Argument {
    fn get(self) -> *mut c_void {
        self.0
    }
}

/// Borrows a handle; null means no pool.
///
/// # Safety
/// `pool` must be null or a live handle.
unsafe fn borrow<'a>(pool: *mut ThreadPool) -> Option<&'a dyn Dispatch> {
    unsafe { pool.as_ref() }.map(|pool| pool as &dyn Dispatch)
}

#[unsafe(no_mangle)]
/// Creates a pool with `threads_count` workers (0 = one per CPU).
///
/// Returns null if a worker thread could not be created; no threads are
/// leaked in that case.
pub extern "C" fn ThreadPool_Create(threads_count: usize) -> *mut ThreadPool {
    match ThreadPool::new(threads_count) {
        Ok(pool) => Box::into_raw(Box::new(pool)),
        Err(err) => {
            error!("ThreadPool_Create({threads_count}) failed: {err}");
            ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
/// Shuts the pool down and frees it. Null is a no-op.
///
/// # Safety
/// `pool` must be null or a handle returned by `ThreadPool_Create` that has
/// not been destroyed yet, with no compute call in flight. Destroying the
/// same handle twice is undefined behavior.
pub unsafe extern "C" fn ThreadPool_Destroy(pool: *mut ThreadPool) {
    if pool.is_null() {
        return;
    }
    let pool = unsafe { Box::from_raw(pool) };
    if let Err(err) = pool.shutdown() {
        error!("ThreadPool_Destroy: {err}");
    }
}

#[unsafe(no_mangle)]
/// Number of workers in `pool`, or 1 for a null handle.
///
/// # Safety
/// `pool` must be null or a live handle.
pub unsafe extern "C" fn ThreadPool_GetThreadsCount(pool: *mut ThreadPool) -> usize {
    compute::threads_count(unsafe { borrow(pool) })
}

#[unsafe(no_mangle)]
/// Calls `function(argument, i)` for every `i` in `0..range`.
///
/// # Safety
/// `pool` must be null or a live handle; `function` must be safe to call
/// concurrently with `argument` from any thread.
pub unsafe extern "C" fn ThreadPool_Compute1D(
    pool: *mut ThreadPool,
    function: ThreadPool_Function1D,
    argument: *mut c_void,
    range: usize,
) {
    let argument = Argument(argument);
    compute::compute_1d(unsafe { borrow(pool) }, range, |index| unsafe {
        function(argument.get(), index)
    });
}

#[unsafe(no_mangle)]
/// Calls `function(argument, start, len)` for consecutive tiles of at most
/// `tile` indices covering `0..range`. `tile` must be non-zero.
///
/// # Safety
/// Same as [`ThreadPool_Compute1D`].
pub unsafe extern "C" fn ThreadPool_Compute1DTiled(
    pool: *mut ThreadPool,
    function: ThreadPool_Function1DTiled,
    argument: *mut c_void,
    range: usize,
    tile: usize,
) {
    let argument = Argument(argument);
    compute::compute_1d_tiled(unsafe { borrow(pool) }, range, tile, |start, len| unsafe {
        function(argument.get(), start, len)
    });
}

#[unsafe(no_mangle)]
/// Calls `function(argument, i, j)` over `0..range_i x 0..range_j`.
///
/// # Safety
/// Same as [`ThreadPool_Compute1D`].
pub unsafe extern "C" fn ThreadPool_Compute2D(
    pool: *mut ThreadPool,
    function: ThreadPool_Function2D,
    argument: *mut c_void,
    range_i: usize,
    range_j: usize,
) {
    let argument = Argument(argument);
    compute::compute_2d(unsafe { borrow(pool) }, range_i, range_j, |i, j| unsafe {
        function(argument.get(), i, j)
    });
}

#[unsafe(no_mangle)]
/// Calls `function(argument, i, j, len_i, len_j)` for every 2-D tile.
/// Tile sizes must be non-zero.
///
/// # Safety
/// Same as [`ThreadPool_Compute1D`].
pub unsafe extern "C" fn ThreadPool_Compute2DTiled(
    pool: *mut ThreadPool,
    function: ThreadPool_Function2DTiled,
    argument: *mut c_void,
    range_i: usize,
    range_j: usize,
    tile_i: usize,
    tile_j: usize,
) {
    let argument = Argument(argument);
    compute::compute_2d_tiled(
        unsafe { borrow(pool) },
        range_i,
        range_j,
        tile_i,
        tile_j,
        |i, j, len_i, len_j| unsafe { function(argument.get(), i, j, len_i, len_j) },
    );
}
