//! Backend abstraction consumed by the executer.
//!
//! The executer never touches native command lists or queues itself. It
//! talks to a backend through [`ExecuteBackend`]:
//!
//! - [`begin_command_list`](ExecuteBackend::begin_command_list) allocates a
//!   primary or secondary command list for an execute group
//! - [`record`](ExecuteBackend::record) records one scope (or a slice of its
//!   items) into that list
//! - [`submit`](ExecuteBackend::submit) hands a finished batch to the queue
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: records nothing, keeps submitted batches for inspection

mod dummy;

pub use dummy::{DummyBackend, DummyCommandList, DummySubmission};

use std::any::Any;
use std::ops::Range;

use crate::error::ExecuterResult;
use crate::graph::Scope;
use crate::types::{
    DeviceIndex, FenceId, GroupId, HardwareQueueClass, JobPolicy, ScopeId, SemaphoreId,
    SwapchainId,
};

/// Backend-owned command list, opaque to the executer.
pub type NativeCommandList = Box<dyn Any + Send>;

/// Level of a command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListLevel {
    /// Submitted directly to a queue. Primary groups record all of their
    /// scopes into one primary list.
    Primary,
    /// Executed from a primary list inside a render pass. Secondary groups
    /// split one scope across several of these.
    Secondary,
}

/// Parameters for allocating a command list.
#[derive(Debug, Clone, Copy)]
pub struct CommandListDescriptor<'a> {
    /// Debug label of the owning execute group.
    pub label: &'a str,
    pub level: CommandListLevel,
    pub queue_class: HardwareQueueClass,
    pub device_index: DeviceIndex,
    /// Position of the owning group in the frame.
    pub group_index: usize,
    /// Position of the list within its group.
    pub command_list_index: u32,
}

/// Everything a backend needs to record one scope into a command list.
#[derive(Debug, Clone)]
pub struct ExecuteContext<'a> {
    pub scope: &'a Scope,
    pub group_index: usize,
    pub level: CommandListLevel,
    pub command_list_index: u32,
    pub command_list_count: u32,
    /// Slice of the scope's estimated items this list records.
    pub items: Range<u32>,
    pub job_policy: JobPolicy,
}

/// A command list after recording, tagged with where it goes in the batch.
#[derive(Debug)]
pub struct RecordedCommandList {
    pub level: CommandListLevel,
    pub group_index: usize,
    /// Subpass of the batch's render pass this list is executed in.
    pub subpass: u32,
    /// Scopes recorded into this list, in order.
    pub scopes: Vec<ScopeId>,
    pub native: NativeCommandList,
}

/// How the command lists of a batch map onto render passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPassLayout {
    /// Every scope opens and closes its own render pass on one primary list.
    PerScope,
    /// One render pass shared by all lists; each execute group advances to
    /// the next subpass.
    Subpasses { count: u32 },
}

/// One queue submission produced by an execute group handler.
#[derive(Debug)]
pub struct SubmitBatch {
    pub group_id: GroupId,
    pub queue_class: HardwareQueueClass,
    pub device_index: DeviceIndex,
    pub render_pass: RenderPassLayout,
    pub command_lists: Vec<RecordedCommandList>,
    pub wait_semaphores: Vec<SemaphoreId>,
    pub signal_semaphores: Vec<SemaphoreId>,
    pub wait_fences: Vec<FenceId>,
    pub signal_fences: Vec<FenceId>,
    pub swapchains: Vec<SwapchainId>,
}

/// Native command list and queue primitives.
///
/// Implementations must be callable from several recording threads at once.
pub trait ExecuteBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Allocate and begin a command list.
    fn begin_command_list(
        &self,
        descriptor: &CommandListDescriptor<'_>,
    ) -> ExecuterResult<NativeCommandList>;

    /// Record one scope (or a slice of its items) into `command_list`.
    fn record(
        &self,
        command_list: &mut NativeCommandList,
        context: &ExecuteContext<'_>,
    ) -> ExecuterResult<()>;

    /// Submit a finished batch to its queue.
    fn submit(&self, batch: SubmitBatch) -> ExecuterResult<()>;
}
