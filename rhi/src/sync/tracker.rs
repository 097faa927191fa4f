//! Counting semaphore tracker.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Counters {
    required: u32,
    signalled: u32,
}

impl Counters {
    fn is_satisfied(&self) -> bool {
        self.signalled >= self.required
    }
}

/// Blocks waiters until a required number of semaphores has been signalled.
///
/// A swapchain must only be presented once every semaphore that the work
/// before it waits on has been signalled. The executer counts these
/// semaphores while partitioning the frame and the submitting threads signal
/// them as batches reach the queue. The present path then calls
/// [`wait_until_signalled`](Self::wait_until_signalled).
///
/// `add_required`, `signal` and the wait check share one lock, so the
/// check-and-wait is atomic with respect to both counters.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use redlilium_rhi::CountingSemaphoreTracker;
///
/// let tracker = Arc::new(CountingSemaphoreTracker::new(2));
/// let signaller = Arc::clone(&tracker);
/// let thread = std::thread::spawn(move || signaller.signal(2));
///
/// tracker.wait_until_signalled();
/// assert!(tracker.is_signalled());
/// thread.join().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct CountingSemaphoreTracker {
    counters: Mutex<Counters>,
    condition: Condvar,
}

impl CountingSemaphoreTracker {
    /// Create a tracker requiring `initial_required` signals.
    pub fn new(initial_required: u32) -> Self {
        Self {
            counters: Mutex::new(Counters {
                required: initial_required,
                signalled: 0,
            }),
            condition: Condvar::new(),
        }
    }

    /// Increase the number of signals required before waiters are released.
    ///
    /// Waiters that already returned are not blocked again.
    pub fn add_required(&self, count: u32) {
        let mut counters = self.counters.lock();
        counters.required += count;
    }

    /// Record `count` signalled semaphores and wake all waiters if the
    /// required count is reached.
    pub fn signal(&self, count: u32) {
        let mut counters = self.counters.lock();
        let was_satisfied = counters.is_satisfied();
        counters.signalled += count;

        if counters.signalled > counters.required {
            log::warn!(
                "Semaphore tracker over-signalled ({} of {} required)",
                counters.signalled,
                counters.required
            );
        }

        if !was_satisfied && counters.is_satisfied() {
            // Wake after unlocking so waiters do not wake into a held lock
            drop(counters);
            self.condition.notify_all();
        }
    }

    /// Block the calling thread until the required count has been signalled.
    ///
    /// Returns immediately if it already has.
    pub fn wait_until_signalled(&self) {
        let mut counters = self.counters.lock();
        while !counters.is_satisfied() {
            self.condition.wait(&mut counters);
        }
    }

    /// Number of signals required.
    pub fn required(&self) -> u32 {
        self.counters.lock().required
    }

    /// Number of signals received so far.
    pub fn signalled(&self) -> u32 {
        self.counters.lock().signalled
    }

    /// Whether waiters would currently pass without blocking.
    pub fn is_signalled(&self) -> bool {
        self.counters.lock().is_satisfied()
    }
}

static_assertions::assert_impl_all!(CountingSemaphoreTracker: Send, Sync);
