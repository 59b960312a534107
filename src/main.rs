use rangepool::{ThreadPool, compute, slice};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

fn main() {
    println!("rangepool - parallel loops over a fixed worker pool\n");

    let num_threads = num_cpus::get();
    let pool = match ThreadPool::new(num_threads) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("Failed to create thread pool: {}", err);
            std::process::exit(1);
        }
    };
    println!("Initialized pool with {} workers\n", pool.threads_count());

    // Example 1: sequential fallback
    println!("Example 1: No pool, sequential on the caller");
    compute::compute_1d(None, 5, |i| println!("  index {}", i));
    println!();

    // Example 2: 1-D sum
    println!("Example 2: Parallel 1-D sum");
    let range = 10_000_000;
    let sum = AtomicU64::new(0);
    let start = Instant::now();
    pool.compute_1d(range, |i| {
        sum.fetch_add(i as u64, Ordering::Relaxed);
    });
    let duration = start.elapsed();
    let expected: u64 = (0..range as u64).sum();
    println!("  Processed {} indices in {:?}", range, duration);
    println!("  Sum result: {} (expected: {})\n", sum.load(Ordering::SeqCst), expected);

    // Example 3: imbalanced work is rebalanced by stealing
    println!("Example 3: Imbalanced workload");
    let heavy = AtomicUsize::new(0);
    let start = Instant::now();
    compute::compute_1d(Some(&pool), 1000, |i| {
        // The first tenth of the range is expensive.
        let rounds = if i < 100 { 100_000 } else { 100 };
        let mut x = i as u64;
        for _ in 0..rounds {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
        }
        std::hint::black_box(x);
        if rounds > 100 {
            heavy.fetch_add(1, Ordering::Relaxed);
        }
    });
    println!(
        "  {} heavy items finished in {:?}\n",
        heavy.load(Ordering::SeqCst),
        start.elapsed()
    );

    // Example 4: tiled 2-D matrix scale
    println!("Example 4: Tiled 2-D over a 512x512 matrix");
    let (rows, cols) = (512, 512);
    let mut matrix = vec![1.0f32; rows * cols];
    let start = Instant::now();
    slice::for_each_chunk_mut(Some(&pool), &mut matrix, cols, |offset, row| {
        let r = offset / cols;
        for (c, value) in row.iter_mut().enumerate() {
            *value *= (r + c) as f32;
        }
    });
    let touched = AtomicUsize::new(0);
    compute::compute_2d_tiled(Some(&pool), rows, cols, 64, 64, |_, _, len_i, len_j| {
        touched.fetch_add(len_i * len_j, Ordering::Relaxed);
    });
    println!(
        "  Scaled {} elements and visited {} tiled cells in {:?}\n",
        matrix.len(),
        touched.load(Ordering::SeqCst),
        start.elapsed()
    );

    println!("Shutting down pool...");
    match pool.shutdown() {
        Ok(_) => println!("Done!"),
        Err(e) => eprintln!("Shutdown error: {}", e),
    }
}
