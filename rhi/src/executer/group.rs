//! Execute groups: batches of scopes sharing command lists.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::backend::{
    CommandListDescriptor, CommandListLevel, ExecuteBackend, ExecuteContext, NativeCommandList,
};
use crate::error::ExecuterResult;
use crate::graph::Scope;
use crate::sync::SemaphoreTrackerHandle;
use crate::types::{DeviceIndex, GroupId, HardwareQueueClass, JobPolicy};

/// How an execute group maps its scopes onto command lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecuteGroupKind {
    /// One or more merged scopes recorded into a single primary command list.
    Primary,
    /// A single scope split across several secondary command lists.
    Secondary { command_list_count: u32 },
}

/// A contiguous range of scopes recorded and submitted together.
///
/// Groups live in the executer's per-frame arena and are addressed by their
/// position in it. Every command list of a group is recorded exactly once;
/// the group reports completion when the last one is stored.
#[derive(Debug)]
pub struct ExecuteGroup {
    index: usize,
    kind: ExecuteGroupKind,
    label: String,
    group_id: GroupId,
    device_index: DeviceIndex,
    queue_class: HardwareQueueClass,
    scopes: Range<usize>,
    job_policy: JobPolicy,
    semaphore_handle: Option<SemaphoreTrackerHandle>,
    tracker_signals: u32,
    command_lists: Mutex<Vec<Option<NativeCommandList>>>,
    remaining: AtomicU32,
    complete: AtomicBool,
}

impl ExecuteGroup {
    pub(crate) fn new(
        index: usize,
        kind: ExecuteGroupKind,
        scopes: Range<usize>,
        all_scopes: &[Scope],
        job_policy: JobPolicy,
        semaphore_handle: Option<SemaphoreTrackerHandle>,
        tracker_signals: u32,
    ) -> Self {
        let members = &all_scopes[scopes.clone()];
        assert!(!members.is_empty(), "execute group {index} has no scopes");
        if let ExecuteGroupKind::Secondary { command_list_count } = kind {
            assert!(members.len() == 1, "secondary group {index} must hold one scope");
            assert!(command_list_count > 0, "secondary group {index} has no command lists");
        }

        let first = &members[0];
        let label = match members.len() {
            1 => first.name().to_string(),
            n => format!("{}+{}", first.name(), n - 1),
        };
        let command_list_count = match kind {
            ExecuteGroupKind::Primary => 1,
            ExecuteGroupKind::Secondary { command_list_count } => command_list_count,
        };

        Self {
            index,
            kind,
            label,
            group_id: first.group_id(),
            device_index: first.device_index(),
            queue_class: first.queue_class(),
            scopes,
            job_policy,
            semaphore_handle,
            tracker_signals,
            command_lists: Mutex::new((0..command_list_count).map(|_| None).collect()),
            remaining: AtomicU32::new(command_list_count),
            complete: AtomicBool::new(false),
        }
    }

    /// Position in the frame's group list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> ExecuteGroupKind {
        self.kind
    }

    /// Debug label built from the scope names.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Group id of the first scope.
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn device_index(&self) -> DeviceIndex {
        self.device_index
    }

    pub fn queue_class(&self) -> HardwareQueueClass {
        self.queue_class
    }

    pub fn job_policy(&self) -> JobPolicy {
        self.job_policy
    }

    /// Indices of the scopes in the frame graph.
    pub fn scope_range(&self) -> Range<usize> {
        self.scopes.clone()
    }

    /// The scopes of this group, sliced out of the frame's scope list.
    pub fn scopes<'a>(&self, all_scopes: &'a [Scope]) -> &'a [Scope] {
        &all_scopes[self.scopes.clone()]
    }

    pub fn command_list_count(&self) -> u32 {
        match self.kind {
            ExecuteGroupKind::Primary => 1,
            ExecuteGroupKind::Secondary { command_list_count } => command_list_count,
        }
    }

    /// Handle of the presentation epoch this group was scheduled in.
    pub fn semaphore_handle(&self) -> Option<&SemaphoreTrackerHandle> {
        self.semaphore_handle.as_ref()
    }

    /// Semaphores this group signals on its tracker once submitted.
    pub fn tracker_signals(&self) -> u32 {
        self.tracker_signals
    }

    /// Whether every command list has been recorded.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Record command list `list_index` of this group.
    ///
    /// Returns `true` if this was the last outstanding list, i.e. the group
    /// became complete with this call.
    ///
    /// # Panics
    ///
    /// Panics if `list_index` is out of range or was already recorded.
    pub(crate) fn record_command_list(
        &self,
        list_index: u32,
        all_scopes: &[Scope],
        backend: &dyn ExecuteBackend,
    ) -> ExecuterResult<bool> {
        let command_list_count = self.command_list_count();
        assert!(
            list_index < command_list_count,
            "command list {list_index} out of range for group '{}'",
            self.label
        );

        let level = match self.kind {
            ExecuteGroupKind::Primary => CommandListLevel::Primary,
            ExecuteGroupKind::Secondary { .. } => CommandListLevel::Secondary,
        };
        let mut native = backend.begin_command_list(&CommandListDescriptor {
            label: &self.label,
            level,
            queue_class: self.queue_class,
            device_index: self.device_index,
            group_index: self.index,
            command_list_index: list_index,
        })?;

        for scope in self.scopes(all_scopes) {
            let items = match self.kind {
                ExecuteGroupKind::Primary => 0..scope.estimated_item_count(),
                ExecuteGroupKind::Secondary { command_list_count } => {
                    item_range(scope.estimated_item_count(), list_index, command_list_count)
                }
            };
            backend.record(
                &mut native,
                &ExecuteContext {
                    scope,
                    group_index: self.index,
                    level,
                    command_list_index: list_index,
                    command_list_count,
                    items,
                    job_policy: self.job_policy,
                },
            )?;
        }

        {
            let mut slots = self.command_lists.lock();
            let slot = &mut slots[list_index as usize];
            assert!(
                slot.is_none(),
                "command list {list_index} of group '{}' recorded twice",
                self.label
            );
            *slot = Some(native);
        }

        let finished = self.remaining.fetch_sub(1, Ordering::AcqRel) == 1;
        if finished {
            self.complete.store(true, Ordering::SeqCst);
        }
        Ok(finished)
    }

    /// Move the recorded command lists out, in list order.
    pub(crate) fn take_command_lists(&self) -> Vec<NativeCommandList> {
        self.command_lists
            .lock()
            .iter_mut()
            .filter_map(Option::take)
            .collect()
    }
}

/// Even slice of `item_count` items recorded by list `index` of `count`.
pub(crate) fn item_range(item_count: u32, index: u32, count: u32) -> Range<u32> {
    let slice = |i: u32| (u64::from(item_count) * u64::from(i) / u64::from(count)) as u32;
    slice(index)..slice(index + 1)
}

static_assertions::assert_impl_all!(ExecuteGroup: Send, Sync);
