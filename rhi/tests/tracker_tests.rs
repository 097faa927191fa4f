//! Integration tests for swapchain semaphore tracking across threads.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rstest::rstest;

use redlilium_rhi::{CountingSemaphoreTracker, SemaphoreTrackerChain};

/// A handle captured after K trackers signals exactly the first K.
#[rstest]
#[case::first(1)]
#[case::middle(2)]
#[case::last(4)]
fn test_handle_signals_first_k_trackers(#[case] k: usize) {
    common::init_logging();
    let chain = SemaphoreTrackerChain::new();
    let mut handles = Vec::new();
    for _ in 0..4 {
        handles.push(chain.create_handle());
        chain.add_required(1);
    }

    handles[k - 1].signal(1);
    for i in 0..4 {
        let expected = if i < k { 1 } else { 0 };
        assert_eq!(chain.tracker(i).unwrap().signalled(), expected, "tracker {i}");
    }
}

/// Work of a later epoch fans its signals out to the trackers of earlier
/// presentations that are still waiting.
#[test]
fn test_late_signal_releases_earlier_epoch() {
    common::init_logging();
    let chain = SemaphoreTrackerChain::new();
    let _first = chain.create_handle();
    chain.add_required(2);
    let second = chain.create_handle();
    chain.add_required(1);

    let first_tracker = chain.tracker(0).unwrap();
    let second_tracker = chain.tracker(1).unwrap();
    assert_eq!(first_tracker.required(), 2);
    assert_eq!(second_tracker.required(), 3);

    let released = Arc::new(AtomicBool::new(false));
    std::thread::scope(|s| {
        let waiter = {
            let tracker = Arc::clone(&first_tracker);
            let released = Arc::clone(&released);
            s.spawn(move || {
                tracker.wait_until_signalled();
                released.store(true, Ordering::SeqCst);
            })
        };

        second.signal(2);
        waiter.join().unwrap();
    });
    assert!(released.load(Ordering::SeqCst));
    assert!(!second_tracker.is_signalled());

    second.signal(1);
    assert!(second_tracker.is_signalled());
}

#[test]
fn test_waiter_blocks_until_last_signal() {
    let tracker = Arc::new(CountingSemaphoreTracker::new(2));
    let released = Arc::new(AtomicBool::new(false));

    let waiter = {
        let tracker = Arc::clone(&tracker);
        let released = Arc::clone(&released);
        std::thread::spawn(move || {
            tracker.wait_until_signalled();
            released.store(true, Ordering::SeqCst);
        })
    };

    tracker.signal(1);
    std::thread::sleep(Duration::from_millis(20));
    assert!(!released.load(Ordering::SeqCst));

    tracker.signal(1);
    waiter.join().unwrap();
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_concurrent_handles() {
    let chain = SemaphoreTrackerChain::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let handle = chain.create_handle();
            chain.add_required(4);
            handle
        })
        .collect();

    std::thread::scope(|s| {
        for handle in &handles {
            s.spawn(move || {
                for _ in 0..4 {
                    handle.signal(1);
                }
            });
        }
    });

    // Tracker k requires 4 * (k + 1) and is signalled by handles k..8
    for k in 0..chain.len() {
        let tracker = chain.tracker(k).unwrap();
        let signalled = 4 * (8 - k as u32);
        assert_eq!(tracker.required(), 4 * (k as u32 + 1), "tracker {k}");
        assert_eq!(tracker.signalled(), signalled, "tracker {k}");
        assert_eq!(tracker.is_signalled(), k < 4, "tracker {k}");
    }
    assert_eq!(chain.total_required(), 32);
}
