use rangepool::{DefaultWait, PinningStrategy, PoolConfig, ThreadPool};
use std::sync::atomic::{AtomicUsize, Ordering};

fn pool_with(strategy: PinningStrategy, threads: usize) -> ThreadPool<DefaultWait> {
    let config = PoolConfig {
        threads_count: threads,
        pinning: strategy,
        ..Default::default()
    };
    ThreadPool::with_config(&config).unwrap()
}

#[test]
fn test_none_strategy() {
    let pool = pool_with(PinningStrategy::None, 4);
    assert_eq!(pool.threads_count(), 4);
    pool.shutdown().unwrap();
}

#[test]
fn test_linear_strategy() {
    let pool = pool_with(PinningStrategy::Linear, 2);
    assert_eq!(pool.threads_count(), 2);
    pool.shutdown().unwrap();
}

#[test]
fn test_avoid_smt_strategy() {
    // We can't easily verify the actual affinity from here without
    // platform-specific calls, but the pinned workers must still run.
    let pool = pool_with(PinningStrategy::AvoidSMT, 10);
    let executed = AtomicUsize::new(0);
    pool.compute_1d(100, |_| {
        executed.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(executed.load(Ordering::SeqCst), 100);
    pool.shutdown().unwrap();
}
