//! Dummy backend for testing and development.
//!
//! This backend doesn't touch a GPU. Command lists are plain records of what
//! was recorded into them and every submitted batch is kept so tests can
//! inspect the final plan.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{ExecuterError, ExecuterResult};
use crate::types::{
    DeviceIndex, FenceId, GroupId, HardwareQueueClass, ScopeId, SemaphoreId, SwapchainId,
};

use super::{
    CommandListDescriptor, CommandListLevel, ExecuteBackend, ExecuteContext, NativeCommandList,
    RenderPassLayout, SubmitBatch,
};

/// Command list produced by the [`DummyBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyCommandList {
    pub label: String,
    pub level: CommandListLevel,
    pub subpass: u32,
    /// Recorded scopes with the item slice each one covered.
    pub recorded: Vec<(ScopeId, Range<u32>)>,
}

/// A batch as seen by the [`DummyBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummySubmission {
    pub group_id: GroupId,
    pub queue_class: HardwareQueueClass,
    pub device_index: DeviceIndex,
    pub render_pass: RenderPassLayout,
    pub command_lists: Vec<DummyCommandList>,
    pub wait_semaphores: Vec<SemaphoreId>,
    pub signal_semaphores: Vec<SemaphoreId>,
    pub wait_fences: Vec<FenceId>,
    pub signal_fences: Vec<FenceId>,
    pub swapchains: Vec<SwapchainId>,
}

/// Dummy execute backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    submissions: Mutex<Vec<DummySubmission>>,
    fail_submissions: AtomicBool,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following submission fail (for error path testing).
    pub fn set_fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::Release);
    }

    /// Batches submitted so far, in submission order.
    pub fn submissions(&self) -> Vec<DummySubmission> {
        self.submissions.lock().clone()
    }

    /// Forget all recorded submissions.
    pub fn clear(&self) {
        self.submissions.lock().clear();
    }
}

impl ExecuteBackend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy Backend"
    }

    fn begin_command_list(
        &self,
        descriptor: &CommandListDescriptor<'_>,
    ) -> ExecuterResult<NativeCommandList> {
        log::trace!(
            "DummyBackend: begin {:?} command list {} of group {} ({})",
            descriptor.level,
            descriptor.command_list_index,
            descriptor.group_index,
            descriptor.label
        );
        Ok(Box::new(DummyCommandList {
            label: descriptor.label.to_string(),
            level: descriptor.level,
            subpass: 0,
            recorded: Vec::new(),
        }))
    }

    fn record(
        &self,
        command_list: &mut NativeCommandList,
        context: &ExecuteContext<'_>,
    ) -> ExecuterResult<()> {
        let list = command_list
            .downcast_mut::<DummyCommandList>()
            .ok_or_else(|| {
                ExecuterError::RecordingFailed("foreign command list passed to DummyBackend".into())
            })?;
        log::trace!(
            "DummyBackend: record '{}' items {:?} into '{}'",
            context.scope.name(),
            context.items,
            list.label
        );
        list.recorded.push((context.scope.id(), context.items.clone()));
        Ok(())
    }

    fn submit(&self, batch: SubmitBatch) -> ExecuterResult<()> {
        if self.fail_submissions.load(Ordering::Acquire) {
            return Err(ExecuterError::SubmissionFailed(format!(
                "DummyBackend rejected batch for {}",
                batch.group_id
            )));
        }

        let command_lists = batch
            .command_lists
            .into_iter()
            .map(|recorded| {
                let subpass = recorded.subpass;
                recorded
                    .native
                    .downcast::<DummyCommandList>()
                    .map(|list| DummyCommandList { subpass, ..*list })
                    .map_err(|_| {
                        ExecuterError::SubmissionFailed(
                            "foreign command list passed to DummyBackend".into(),
                        )
                    })
            })
            .collect::<ExecuterResult<Vec<_>>>()?;

        log::trace!(
            "DummyBackend: submit {} on {:?} queue of device {}: {} command lists, {:?}",
            batch.group_id,
            batch.queue_class,
            batch.device_index,
            command_lists.len(),
            batch.render_pass
        );

        self.submissions.lock().push(DummySubmission {
            group_id: batch.group_id,
            queue_class: batch.queue_class,
            device_index: batch.device_index,
            render_pass: batch.render_pass,
            command_lists,
            wait_semaphores: batch.wait_semaphores,
            signal_semaphores: batch.signal_semaphores,
            wait_fences: batch.wait_fences,
            signal_fences: batch.signal_fences,
            swapchains: batch.swapchains,
        });
        Ok(())
    }
}
