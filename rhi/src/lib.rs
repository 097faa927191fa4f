//! # RedLilium RHI
//!
//! Frame graph execution for the RedLilium renderer: schedules the ordered
//! scopes of a frame into command list submissions.
//!
//! ## Overview
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`graph`] | [`FrameGraph`] and [`Scope`], the executer's input |
//! | [`executer`] | [`FrameGraphExecuter`], [`ExecuteGroup`], [`ExecuteGroupHandler`] |
//! | [`sync`] | [`CountingSemaphoreTracker`] and [`SemaphoreTrackerChain`] for swapchain presentation |
//! | [`backend`] | [`ExecuteBackend`] trait and the [`DummyBackend`] |
//! | [`limits`] | Per-device [`PlatformLimits`] and executer configuration |
//! | [`profiling`] | Optional Tracy instrumentation |
//!
//! Scopes that are cheap to record are merged into a single primary command
//! list; expensive scopes are split across several secondary command lists
//! recorded in parallel. Every swapchain gets a semaphore tracker that is
//! released once all work it depends on has been submitted.

pub mod backend;
pub mod error;
pub mod executer;
pub mod graph;
pub mod limits;
pub mod profiling;
pub mod sync;
pub mod types;

pub use backend::{
    CommandListDescriptor, CommandListLevel, DummyBackend, DummyCommandList, DummySubmission,
    ExecuteBackend, ExecuteContext, NativeCommandList, RecordedCommandList, RenderPassLayout,
    SubmitBatch,
};
pub use error::{ExecuterError, ExecuterResult};
pub use executer::{
    ExecuteGroup, ExecuteGroupHandler, ExecuteGroupKind, FrameGraphExecuter, HandlerKind,
};
pub use graph::{FrameGraph, Scope};
pub use limits::{DeviceDescriptor, DeviceFeatures, ExecuterDescriptor, PlatformLimits};
pub use sync::{CountingSemaphoreTracker, SemaphoreTrackerChain, SemaphoreTrackerHandle};
pub use types::{
    DeviceIndex, FenceId, GroupId, HardwareQueueClass, JobPolicy, SchedulingPolicy, ScopeId,
    SemaphoreId, SwapchainId,
};

/// RHI library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
