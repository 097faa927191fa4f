//! Chain of semaphore trackers, one per presentation epoch.

use std::sync::Arc;

use parking_lot::Mutex;

use super::CountingSemaphoreTracker;

#[derive(Debug, Default)]
struct ChainState {
    trackers: Vec<Arc<CountingSemaphoreTracker>>,
    /// Required semaphores accumulated over all epochs so far.
    total_required: u32,
}

/// Ordered trackers for the presentation epochs of one frame.
///
/// Scopes are processed in a single forward pass while swapchains can be
/// presented at any point of the frame. Every presentation opens a new epoch
/// backed by a new tracker, seeded with the number of semaphores counted so
/// far. Work recorded for an epoch holds a [`SemaphoreTrackerHandle`] that
/// remembers how many trackers existed when it was issued, and fans each of
/// its signals out to all of them.
///
/// # Example
///
/// ```
/// use redlilium_rhi::SemaphoreTrackerChain;
///
/// let chain = SemaphoreTrackerChain::new();
/// let first = chain.create_handle();
/// chain.add_required(2);
/// let second = chain.create_handle();
/// chain.add_required(1);
///
/// // Seeded with the running total of the first epoch
/// assert_eq!(chain.current_tracker().unwrap().required(), 3);
///
/// first.signal(2);
/// assert!(chain.tracker(0).unwrap().is_signalled());
/// assert_eq!(chain.tracker(1).unwrap().signalled(), 0);
/// second.signal(1);
/// assert_eq!(chain.tracker(1).unwrap().signalled(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SemaphoreTrackerChain {
    state: Mutex<ChainState>,
}

impl SemaphoreTrackerChain {
    /// Create an empty chain.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a new epoch and return a handle for work belonging to it.
    ///
    /// The new tracker requires every semaphore counted so far.
    pub fn create_handle(self: &Arc<Self>) -> SemaphoreTrackerHandle {
        let mut state = self.state.lock();
        let tracker = Arc::new(CountingSemaphoreTracker::new(state.total_required));
        state.trackers.push(tracker);

        SemaphoreTrackerHandle {
            chain: Arc::clone(self),
            count_trackers: state.trackers.len(),
        }
    }

    /// Add required semaphores to the most recent epoch.
    pub fn add_required(&self, count: u32) {
        let mut state = self.state.lock();
        let Some(tracker) = state.trackers.last() else {
            log::warn!("Adding {count} required semaphores to an empty tracker chain");
            return;
        };
        tracker.add_required(count);
        state.total_required += count;
    }

    /// Signal `count` semaphores on each of the first `count_trackers` trackers.
    pub fn signal(&self, count_trackers: usize, count: u32) {
        // Clone the trackers out so waking waiters does not happen under the chain lock
        let trackers: Vec<_> = {
            let state = self.state.lock();
            state
                .trackers
                .iter()
                .take(count_trackers)
                .cloned()
                .collect()
        };
        for tracker in trackers {
            tracker.signal(count);
        }
    }

    /// The tracker of the most recent epoch.
    pub fn current_tracker(&self) -> Option<Arc<CountingSemaphoreTracker>> {
        self.state.lock().trackers.last().cloned()
    }

    /// Get the tracker of epoch `index`.
    pub fn tracker(&self, index: usize) -> Option<Arc<CountingSemaphoreTracker>> {
        self.state.lock().trackers.get(index).cloned()
    }

    /// Number of epochs opened so far.
    pub fn len(&self) -> usize {
        self.state.lock().trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().trackers.is_empty()
    }

    /// Required semaphores accumulated over all epochs.
    pub fn total_required(&self) -> u32 {
        self.state.lock().total_required
    }
}

/// Signals the trackers that existed when the handle was issued.
#[derive(Debug, Clone)]
pub struct SemaphoreTrackerHandle {
    chain: Arc<SemaphoreTrackerChain>,
    count_trackers: usize,
}

impl SemaphoreTrackerHandle {
    /// Signal `count` semaphores on every tracker captured by this handle.
    pub fn signal(&self, count: u32) {
        self.chain.signal(self.count_trackers, count);
    }

    /// Number of trackers captured by this handle.
    pub fn tracker_count(&self) -> usize {
        self.count_trackers
    }

    /// The chain this handle belongs to.
    pub fn chain(&self) -> &Arc<SemaphoreTrackerChain> {
        &self.chain
    }
}

static_assertions::assert_impl_all!(SemaphoreTrackerHandle: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tracker_seeded_with_zero() {
        let chain = SemaphoreTrackerChain::new();
        let handle = chain.create_handle();
        assert_eq!(handle.tracker_count(), 1);
        assert_eq!(chain.current_tracker().unwrap().required(), 0);
    }

    #[test]
    fn test_add_required_only_touches_latest() {
        let chain = SemaphoreTrackerChain::new();
        chain.create_handle();
        chain.add_required(2);
        chain.create_handle();
        chain.add_required(3);

        assert_eq!(chain.tracker(0).unwrap().required(), 2);
        assert_eq!(chain.tracker(1).unwrap().required(), 5);
        assert_eq!(chain.total_required(), 5);
    }

    #[test]
    fn test_handle_signals_captured_trackers_only() {
        let chain = SemaphoreTrackerChain::new();
        chain.create_handle();
        let second = chain.create_handle();
        chain.create_handle();
        assert_eq!(chain.len(), 3);

        second.signal(4);
        assert_eq!(chain.tracker(0).unwrap().signalled(), 4);
        assert_eq!(chain.tracker(1).unwrap().signalled(), 4);
        assert_eq!(chain.tracker(2).unwrap().signalled(), 0);
    }

    #[test]
    fn test_add_required_on_empty_chain_is_ignored() {
        let chain = SemaphoreTrackerChain::new();
        chain.add_required(3);
        assert!(chain.is_empty());
        assert_eq!(chain.total_required(), 0);
    }

    #[test]
    fn test_handle_keeps_chain_alive() {
        let handle = SemaphoreTrackerChain::new().create_handle();
        handle.signal(1);
        assert_eq!(handle.chain().tracker(0).unwrap().signalled(), 1);
    }
}
