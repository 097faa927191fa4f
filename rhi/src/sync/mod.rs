//! Swapchain synchronization tracking.
//!
//! A swapchain presents with a single binary semaphore that must only be
//! submitted after all GPU work it depends on has had its semaphores
//! signalled. This module counts those semaphores:
//!
//! - [`CountingSemaphoreTracker`] - blocks until N semaphores are signalled
//! - [`SemaphoreTrackerChain`] - one tracker per presentation epoch
//! - [`SemaphoreTrackerHandle`] - lets work signal the trackers of its epoch

mod chain;
mod tracker;

pub use chain::{SemaphoreTrackerChain, SemaphoreTrackerHandle};
pub use tracker::CountingSemaphoreTracker;
