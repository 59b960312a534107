//! Parallel mutation of disjoint slice chunks.

use crate::compute::{self, Dispatch};

/// Raw view of a slice that hands out disjoint sub-slices to several threads.
struct UnsafeSlice<T> {
    ptr: *mut T,
    len: usize,
}

unsafe impl<T: Send> Send for UnsafeSlice<T> {}
unsafe impl<T: Send> Sync for UnsafeSlice<T> {}

impl<T> UnsafeSlice<T> {
    fn new(slice: &mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    /// # Safety
    /// `start + len <= self.len`, and no other live reference may overlap
    /// `[start, start + len)`.
    #[allow(clippy::mut_from_ref)]
    unsafe fn chunk_mut(&self, start: usize, len: usize) -> &mut [T] {
        debug_assert!(start + len <= self.len);
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(start), len) }
    }
}

/// Calls `function(offset, chunk)` for consecutive chunks of at most
/// `chunk_len` elements of `data`.
///
/// Without a pool the chunks are visited in order on the calling thread.
///
/// # Panics
/// Panics if `chunk_len` is zero.
///
/// # Example
///
/// ```
/// use rangepool::{ThreadPool, slice};
///
/// let pool = ThreadPool::new(2).unwrap();
/// let mut data = vec![1u32; 10];
/// slice::for_each_chunk_mut(Some(&pool), &mut data, 4, |offset, chunk| {
///     for (k, value) in chunk.iter_mut().enumerate() {
///         *value = (offset + k) as u32;
///     }
/// });
/// assert_eq!(data, (0..10).collect::<Vec<u32>>());
/// ```
pub fn for_each_chunk_mut<T, F>(
    pool: Option<&dyn Dispatch>,
    data: &mut [T],
    chunk_len: usize,
    function: F,
) where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    let len = data.len();
    let view = UnsafeSlice::new(data);
    compute::compute_1d_tiled(pool, len, chunk_len, |offset, count| {
        // Safety: tiles of compute_1d_tiled are disjoint and in bounds, and
        // `data` stays mutably borrowed until the call returns.
        let chunk = unsafe { view.chunk_mut(offset, count) };
        function(offset, chunk);
    });
}
