//! Loop-shape entry points.
//!
//! Every function takes an optional pool. `None` is a first-class mode, not
//! an error: the loop runs on the calling thread in its natural order
//! (increasing index, row-major for 2-D), exactly like a plain `for` loop.
//! With a pool, the shape is flattened into a 1-D index space and handed to
//! [`ThreadPool::compute_1d`]; call order is then unspecified.
//!
//! Pools are passed as `&dyn Dispatch`, so a pool on any wait backend can be
//! used here, and `None` needs no type annotation.
//!
//! Tiled shapes clip the last tile: for `range = 10, tile = 4` the tiles are
//! `(0, 4), (4, 4), (8, 2)`.

use crate::pool::ThreadPool;
use crate::wait::WaitPrimitive;

/// A pool the shape adapters can run a flattened loop on.
pub trait Dispatch: Sync {
    /// Number of workers, the calling thread included.
    fn threads_count(&self) -> usize;

    /// Calls `function(i)` once for every `i` in `0..range` and returns when
    /// all calls are done.
    fn dispatch(&self, range: usize, function: &(dyn Fn(usize) + Sync));
}

impl<W: WaitPrimitive> Dispatch for ThreadPool<W> {
    fn threads_count(&self) -> usize {
        ThreadPool::threads_count(self)
    }

    fn dispatch(&self, range: usize, function: &(dyn Fn(usize) + Sync)) {
        self.compute_1d(range, function);
    }
}

/// Number of workers `pool` runs on; 1 when there is no pool.
pub fn threads_count(pool: Option<&dyn Dispatch>) -> usize {
    pool.map_or(1, |pool| pool.threads_count())
}

/// Calls `function(i)` for `i` in `0..range`.
///
/// # Example
///
/// ```
/// use rangepool::compute;
/// use std::sync::Mutex;
///
/// let seen = Mutex::new(Vec::new());
/// compute::compute_1d(None, 5, |i| seen.lock().unwrap().push(i));
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
/// ```
pub fn compute_1d<F>(pool: Option<&dyn Dispatch>, range: usize, function: F)
where
    F: Fn(usize) + Sync,
{
    match pool {
        Some(pool) => pool.dispatch(range, &function),
        None => {
            for index in 0..range {
                function(index);
            }
        }
    }
}

/// Calls `function(start, len)` for consecutive tiles of at most `tile`
/// indices covering `0..range`. In parallel, linear index `t` is the tile
/// starting at `t * tile`.
///
/// # Panics
/// Panics if `tile` is zero.
pub fn compute_1d_tiled<F>(pool: Option<&dyn Dispatch>, range: usize, tile: usize, function: F)
where
    F: Fn(usize, usize) + Sync,
{
    assert!(tile != 0, "tile size must be non-zero");
    match pool {
        Some(pool) => pool.dispatch(range.div_ceil(tile), &|tile_index| {
            let start = tile_index * tile;
            function(start, tile.min(range - start));
        }),
        None => {
            for start in (0..range).step_by(tile) {
                function(start, tile.min(range - start));
            }
        }
    }
}

/// Calls `function(i, j)` for every `i` in `0..range_i` and `j` in
/// `0..range_j`. In parallel, index `k` maps to `(k / range_j, k % range_j)`.
pub fn compute_2d<F>(pool: Option<&dyn Dispatch>, range_i: usize, range_j: usize, function: F)
where
    F: Fn(usize, usize) + Sync,
{
    match pool {
        Some(pool) => pool.dispatch(flat_len(range_i, range_j), &|index| {
            function(index / range_j, index % range_j);
        }),
        None => {
            for i in 0..range_i {
                for j in 0..range_j {
                    function(i, j);
                }
            }
        }
    }
}

/// Calls `function(i, j, len_i, len_j)` for every 2-D tile of at most
/// `tile_i x tile_j` covering `0..range_i x 0..range_j`. In parallel, tiles
/// are numbered row-major.
///
/// # Panics
/// Panics if either tile dimension is zero.
pub fn compute_2d_tiled<F>(
    pool: Option<&dyn Dispatch>,
    range_i: usize,
    range_j: usize,
    tile_i: usize,
    tile_j: usize,
    function: F,
) where
    F: Fn(usize, usize, usize, usize) + Sync,
{
    assert!(tile_i != 0 && tile_j != 0, "tile sizes must be non-zero");
    match pool {
        Some(pool) => {
            let tile_range_i = range_i.div_ceil(tile_i);
            let tile_range_j = range_j.div_ceil(tile_j);
            pool.dispatch(flat_len(tile_range_i, tile_range_j), &|tile_index| {
                let index_i = (tile_index / tile_range_j) * tile_i;
                let index_j = (tile_index % tile_range_j) * tile_j;
                function(
                    index_i,
                    index_j,
                    tile_i.min(range_i - index_i),
                    tile_j.min(range_j - index_j),
                );
            });
        }
        None => {
            for i in (0..range_i).step_by(tile_i) {
                for j in (0..range_j).step_by(tile_j) {
                    function(i, j, tile_i.min(range_i - i), tile_j.min(range_j - j));
                }
            }
        }
    }
}

fn flat_len(range_i: usize, range_j: usize) -> usize {
    range_i
        .checked_mul(range_j)
        .unwrap_or_else(|| panic!("iteration space {range_i} x {range_j} overflows usize"))
}

impl<W: WaitPrimitive> ThreadPool<W> {
    /// Parallel version of [`compute_1d_tiled`].
    ///
    /// # Panics
    /// Panics if `tile` is zero.
    pub fn compute_1d_tiled<F>(&self, range: usize, tile: usize, function: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        compute_1d_tiled(Some(self), range, tile, function);
    }

    /// Parallel version of [`compute_2d`].
    pub fn compute_2d<F>(&self, range_i: usize, range_j: usize, function: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        compute_2d(Some(self), range_i, range_j, function);
    }

    /// Parallel version of [`compute_2d_tiled`].
    ///
    /// # Panics
    /// Panics if either tile dimension is zero.
    pub fn compute_2d_tiled<F>(
        &self,
        range_i: usize,
        range_j: usize,
        tile_i: usize,
        tile_j: usize,
        function: F,
    ) where
        F: Fn(usize, usize, usize, usize) + Sync,
    {
        compute_2d_tiled(Some(self), range_i, range_j, tile_i, tile_j, function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolConfig;
    use crate::wait::CondvarWait;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[test]
    fn test_threads_count_without_pool() {
        assert_eq!(threads_count(None), 1);
    }

    #[test]
    fn test_threads_count_with_pool() {
        let pool = ThreadPool::new(3).unwrap();
        assert_eq!(threads_count(Some(&pool)), 3);
    }

    #[test]
    fn test_sequential_1d_order() {
        let calls = Mutex::new(Vec::new());
        compute_1d(None, 5, |i| calls.lock().unwrap().push(i));
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_sequential_1d_stays_on_caller() {
        let caller = std::thread::current().id();
        compute_1d(None, 16, |_| assert_eq!(std::thread::current().id(), caller));
    }

    #[test]
    fn test_sequential_2d_order() {
        let calls = Mutex::new(Vec::new());
        compute_2d(None, 2, 3, |i, j| calls.lock().unwrap().push((i, j)));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn test_sequential_tiled_clipping() {
        let calls = Mutex::new(Vec::new());
        compute_1d_tiled(None, 10, 4, |start, len| calls.lock().unwrap().push((start, len)));
        assert_eq!(*calls.lock().unwrap(), vec![(0, 4), (4, 4), (8, 2)]);
    }

    #[test]
    fn test_parallel_tiled_clipping() {
        let pool = ThreadPool::new(3).unwrap();
        let calls = Mutex::new(BTreeSet::new());
        compute_1d_tiled(Some(&pool), 10, 4, |start, len| {
            calls.lock().unwrap().insert((start, len));
        });
        let expected: BTreeSet<_> = [(0, 4), (4, 4), (8, 2)].into_iter().collect();
        assert_eq!(*calls.lock().unwrap(), expected);
    }

    #[test]
    fn test_sequential_2d_tiled_clipping() {
        let calls = Mutex::new(Vec::new());
        compute_2d_tiled(None, 5, 3, 2, 2, |i, j, li, lj| {
            calls.lock().unwrap().push((i, j, li, lj));
        });
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                (0, 0, 2, 2),
                (0, 2, 2, 1),
                (2, 0, 2, 2),
                (2, 2, 2, 1),
                (4, 0, 1, 2),
                (4, 2, 1, 1),
            ]
        );
    }

    #[test]
    fn test_parallel_2d_matches_sequential() {
        let pool = ThreadPool::new(4).unwrap();
        let parallel = Mutex::new(BTreeSet::new());
        compute_2d(Some(&pool), 7, 5, |i, j| {
            assert!(parallel.lock().unwrap().insert((i, j)));
        });
        let sequential: BTreeSet<_> = (0..7).flat_map(|i| (0..5).map(move |j| (i, j))).collect();
        assert_eq!(*parallel.lock().unwrap(), sequential);
    }

    #[test]
    fn test_parallel_2d_tiled_matches_sequential() {
        let pool = ThreadPool::new(4).unwrap();
        let sequential = Mutex::new(BTreeSet::new());
        compute_2d_tiled(None, 9, 14, 4, 5, |i, j, li, lj| {
            sequential.lock().unwrap().insert((i, j, li, lj));
        });
        let parallel = Mutex::new(BTreeSet::new());
        compute_2d_tiled(Some(&pool), 9, 14, 4, 5, |i, j, li, lj| {
            assert!(parallel.lock().unwrap().insert((i, j, li, lj)));
        });
        assert_eq!(*parallel.lock().unwrap(), *sequential.lock().unwrap());
    }

    #[test]
    fn test_empty_shapes_never_call() {
        let pool = ThreadPool::new(2).unwrap();
        for pool in [None, Some(&pool as &dyn Dispatch)] {
            compute_1d(pool, 0, |_| panic!("called"));
            compute_1d_tiled(pool, 0, 3, |_, _| panic!("called"));
            compute_2d(pool, 0, 4, |_, _| panic!("called"));
            compute_2d(pool, 4, 0, |_, _| panic!("called"));
            compute_2d_tiled(pool, 3, 0, 2, 2, |_, _, _, _| panic!("called"));
        }
    }

    #[test]
    fn test_condvar_pool_through_entry_points() {
        let pool = ThreadPool::<CondvarWait>::with_config(&PoolConfig::with_threads(3)).unwrap();
        assert_eq!(threads_count(Some(&pool)), 3);

        let cells = Mutex::new(BTreeSet::new());
        compute_2d(Some(&pool), 4, 6, |i, j| {
            assert!(cells.lock().unwrap().insert((i, j)));
        });
        assert_eq!(cells.lock().unwrap().len(), 24);

        let mut data = vec![0usize; 20];
        crate::slice::for_each_chunk_mut(Some(&pool), &mut data, 6, |offset, chunk| {
            for (k, value) in chunk.iter_mut().enumerate() {
                *value = offset + k;
            }
        });
        assert_eq!(data, (0..20).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic(expected = "tile size must be non-zero")]
    fn test_zero_tile_panics() {
        compute_1d_tiled(None, 10, 0, |_, _| {});
    }
}
