use rangepool::ThreadPool;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_callback_panic_reaches_caller() {
    let pool = ThreadPool::new(4).unwrap();
    let executed = AtomicUsize::new(0);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pool.compute_1d(100, |i| {
            if i == 57 {
                panic!("Intentional panic for testing");
            }
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }));

    let payload = result.expect_err("panic should propagate to the dispatcher");
    assert_eq!(
        payload.downcast_ref::<&str>().copied(),
        Some("Intentional panic for testing")
    );
    // Every other index still ran.
    assert_eq!(executed.load(Ordering::SeqCst), 99);
}

#[test]
fn test_pool_recovers_after_panic() {
    let pool = ThreadPool::new(3).unwrap();

    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        pool.compute_1d(30, |_| panic!("Boom"));
    }));

    let count = AtomicUsize::new(0);
    pool.compute_1d(30, |_| {
        count.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(count.load(Ordering::SeqCst), 30, "Subsequent dispatch failed to run");
    pool.shutdown().expect("workers survive callback panics");
}

#[test]
fn test_single_thread_panic_propagates() {
    let pool = ThreadPool::new(1).unwrap();
    let executed = AtomicUsize::new(0);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pool.compute_1d(10, |i| {
            if i == 2 {
                panic!("sequential");
            }
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }));
    assert!(result.is_err());
    // Same contract as with background workers: every other index ran.
    assert_eq!(executed.load(Ordering::SeqCst), 9);

    pool.compute_1d(3, |_| {
        executed.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(executed.load(Ordering::SeqCst), 12);
}
