//! Partition pass: splits the ordered scopes of a frame into execute groups.
//!
//! The pass walks the scopes once, front to back. Cheap scopes are merged
//! into a pending batch that becomes one [`Primary`](ExecuteGroupKind::Primary)
//! group; expensive scopes and subpass members become
//! [`Secondary`](ExecuteGroupKind::Secondary) groups split over several
//! command lists. The pending batch is flushed whenever merging one more
//! scope would break one of these rules:
//!
//! | Rule | Flush when |
//! |------|------------|
//! | Cost | merged cost + scope cost exceeds the threshold |
//! | Swapchains | merged swapchains exceed the per command list limit |
//! | Queue / device | the scope targets another queue class or device |
//! | Synchronization | the scope waits, or the previous scope signals |
//! | Isolation | the scope shares its group id with a neighbour, or costs at least the threshold |
//!
//! Alongside, the pass counts the semaphores each swapchain presentation
//! depends on (see [`crate::sync`]).

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

use crate::error::{ExecuterError, ExecuterResult};
use crate::graph::{FrameGraph, Scope};
use crate::limits::DeviceDescriptor;
use crate::sync::{CountingSemaphoreTracker, SemaphoreTrackerChain, SemaphoreTrackerHandle};
use crate::types::{
    DeviceIndex, FenceId, GroupId, HardwareQueueClass, JobPolicy, SchedulingPolicy, SwapchainId,
};

use super::group::{ExecuteGroup, ExecuteGroupKind};
use super::handler::ExecuteGroupHandler;

/// Result of partitioning one frame.
#[derive(Debug, Default)]
pub(crate) struct FramePlan {
    pub groups: Vec<ExecuteGroup>,
    pub handlers: Vec<ExecuteGroupHandler>,
    pub handler_lookup: HashMap<GroupId, usize>,
    pub semaphore_trackers: Option<Arc<SemaphoreTrackerChain>>,
    pub swapchain_trackers: Vec<(SwapchainId, Arc<CountingSemaphoreTracker>)>,
}

impl FramePlan {
    /// Trackers whose requirement exceeds every signal the frame can send them.
    ///
    /// A tracker `k` is only signalled by groups whose handle was captured
    /// after it was created, but it is seeded with the requirements of all
    /// earlier epochs. Returns `(tracker, reachable, required)` for each
    /// tracker that can never be released.
    pub fn unreachable_trackers(&self) -> Vec<(usize, u32, u32)> {
        let Some(chain) = &self.semaphore_trackers else {
            return Vec::new();
        };

        (0..chain.len())
            .filter_map(|k| {
                let required = chain.tracker(k)?.required();
                let reachable: u32 = self
                    .groups
                    .iter()
                    .filter(|group| {
                        group
                            .semaphore_handle()
                            .is_some_and(|handle| handle.tracker_count() > k)
                    })
                    .map(ExecuteGroup::tracker_signals)
                    .sum();
                (reachable < required).then_some((k, reachable, required))
            })
            .collect()
    }
}

/// Partition `graph` into execute groups and handlers.
pub(crate) fn partition(
    graph: &FrameGraph,
    devices: &BTreeMap<DeviceIndex, DeviceDescriptor>,
    policy: SchedulingPolicy,
) -> ExecuterResult<FramePlan> {
    let scopes = graph.scopes();
    if scopes.is_empty() {
        return Ok(FramePlan::default());
    }
    for device in graph.devices() {
        if !devices.contains_key(&device) {
            return Err(ExecuterError::MissingDeviceLimits(device));
        }
    }

    let mut partitioner = Partitioner::new(scopes, devices, policy.job_policy());
    match policy {
        SchedulingPolicy::Parallel => partitioner.run(),
        SchedulingPolicy::SerialLockstep => partitioner.run_lockstep(),
    }
    Ok(partitioner.finish())
}

/// A group decided by the pass, before its runtime state is built.
#[derive(Debug)]
struct PlannedGroup {
    kind: ExecuteGroupKind,
    scopes: Range<usize>,
    semaphore_handle: Option<SemaphoreTrackerHandle>,
}

/// Scopes waiting to be merged into one primary group.
#[derive(Debug)]
struct PendingBatch {
    scopes: Range<usize>,
    cost: u32,
    swapchains: u32,
    queue_class: HardwareQueueClass,
    device_index: DeviceIndex,
}

#[derive(Debug, Clone, Copy)]
struct FenceState {
    waited: bool,
    /// Scope that signals the fence, if it was seen signalled this epoch.
    signalled_by: Option<usize>,
}

struct Partitioner<'a> {
    scopes: &'a [Scope],
    devices: &'a BTreeMap<DeviceIndex, DeviceDescriptor>,
    job_policy: JobPolicy,
    planned: Vec<PlannedGroup>,
    pending: Option<PendingBatch>,

    chain: Option<Arc<SemaphoreTrackerChain>>,
    current_handle: Option<SemaphoreTrackerHandle>,
    fences: HashMap<FenceId, FenceState>,
    unwaited_fences: u32,
    /// Per scope: fences it signals that only the presentation engine waits on.
    presentation_signals: Vec<u32>,
    swapchain_trackers: Vec<(SwapchainId, Arc<CountingSemaphoreTracker>)>,
}

impl<'a> Partitioner<'a> {
    fn new(
        scopes: &'a [Scope],
        devices: &'a BTreeMap<DeviceIndex, DeviceDescriptor>,
        job_policy: JobPolicy,
    ) -> Self {
        Self {
            scopes,
            devices,
            job_policy,
            planned: Vec::new(),
            pending: None,
            chain: None,
            current_handle: None,
            fences: HashMap::new(),
            unwaited_fences: 0,
            presentation_signals: vec![0; scopes.len()],
            swapchain_trackers: Vec::new(),
        }
    }

    fn device(&self, index: DeviceIndex) -> &'a DeviceDescriptor {
        // Presence is checked before the pass starts
        &self.devices[&index]
    }

    fn is_subpass_member(&self, index: usize) -> bool {
        let group = self.scopes[index].group_id();
        let previous = index
            .checked_sub(1)
            .is_some_and(|i| self.scopes[i].group_id() == group);
        let next = self
            .scopes
            .get(index + 1)
            .is_some_and(|s| s.group_id() == group);
        previous || next
    }

    fn run(&mut self) {
        let scopes = self.scopes;
        let first_device = self.device(scopes[0].device_index());
        if first_device.features.signal_fence_from_cpu {
            let chain = SemaphoreTrackerChain::new();
            self.current_handle = Some(chain.create_handle());
            self.chain = Some(chain);
        }

        for (index, scope) in scopes.iter().enumerate() {
            let limits = &self.device(scope.device_index()).limits;

            let threshold = limits.command_list_cost_threshold(scope.estimated_item_count());
            let cost = limits.scope_cost(scope.estimated_item_count(), scope.attachment_count());
            let swapchains = scope.swapchains_to_present().len() as u32;
            let subpass_group = self.is_subpass_member(index);
            let isolate = subpass_group || cost >= threshold;

            // Flushing precedes semaphore tracking so the batch keeps the
            // handle of the epoch it was built in
            if let Some(pending) = &self.pending {
                let previous = &scopes[index - 1];
                let cost_overflow = pending.cost.saturating_add(cost) > threshold;
                let swapchain_overflow =
                    pending.swapchains + swapchains > limits.swap_chains_per_command_list;
                let queue_mismatch = pending.queue_class != scope.queue_class();
                let device_mismatch = pending.device_index != scope.device_index();
                let sync_boundary = scope.has_waits() || previous.has_signals();

                if cost_overflow
                    || swapchain_overflow
                    || queue_mismatch
                    || device_mismatch
                    || sync_boundary
                    || isolate
                {
                    log::trace!(
                        "Flushing before '{}' (cost: {cost_overflow}, swapchains: {swapchain_overflow}, \
                         queue: {queue_mismatch}, device: {device_mismatch}, sync: {sync_boundary}, \
                         isolate: {isolate})",
                        scope.name()
                    );
                    self.flush_pending();
                }
            }

            self.track_semaphores(index);

            if !isolate {
                let pending = self.pending.get_or_insert_with(|| PendingBatch {
                    scopes: index..index,
                    cost: 0,
                    swapchains: 0,
                    queue_class: scope.queue_class(),
                    device_index: scope.device_index(),
                });
                pending.scopes.end = index + 1;
                pending.cost = pending.cost.saturating_add(cost);
                pending.swapchains += swapchains;
                log::trace!("Merging '{}' (cost {cost} of {threshold})", scope.name());
            } else {
                let command_list_count = cost.div_ceil(threshold).max(1);
                log::trace!(
                    "Isolating '{}' into {command_list_count} secondary command lists (cost {cost} of {threshold})",
                    scope.name()
                );
                self.planned.push(PlannedGroup {
                    kind: ExecuteGroupKind::Secondary { command_list_count },
                    scopes: index..index + 1,
                    semaphore_handle: self.current_handle.clone(),
                });
            }
        }

        self.flush_pending();
    }

    /// One group per scope, no merging and no semaphore tracking.
    fn run_lockstep(&mut self) {
        for index in 0..self.scopes.len() {
            let kind = if self.is_subpass_member(index) {
                ExecuteGroupKind::Secondary {
                    command_list_count: 1,
                }
            } else {
                ExecuteGroupKind::Primary
            };
            self.planned.push(PlannedGroup {
                kind,
                scopes: index..index + 1,
                semaphore_handle: None,
            });
        }
    }

    fn flush_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.planned.push(PlannedGroup {
                kind: ExecuteGroupKind::Primary,
                scopes: pending.scopes,
                semaphore_handle: self.current_handle.clone(),
            });
        }
    }

    /// Count the semaphores swapchain presentation has to wait for.
    fn track_semaphores(&mut self, index: usize) {
        let Some(chain) = self.chain.clone() else {
            return;
        };
        let scopes = self.scopes;
        let scope = &scopes[index];

        let previous_presented = index
            .checked_sub(1)
            .is_some_and(|i| !scopes[i].swapchains_to_present().is_empty());
        if previous_presented {
            self.current_handle = Some(chain.create_handle());
        }

        for &fence in scope.signal_fences() {
            if let Entry::Vacant(entry) = self.fences.entry(fence) {
                entry.insert(FenceState {
                    waited: false,
                    signalled_by: Some(index),
                });
                self.unwaited_fences += 1;
            }
        }

        for &fence in scope.wait_fences() {
            match self.fences.entry(fence) {
                Entry::Occupied(mut entry) => {
                    if !entry.get().waited {
                        entry.get_mut().waited = true;
                        self.unwaited_fences -= 1;
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(FenceState {
                        waited: true,
                        signalled_by: None,
                    });
                }
            }
        }

        chain.add_required(scope.wait_count());

        for &swapchain in scope.swapchains_to_present() {
            // Fences nobody waited on are waited on by the presentation engine
            chain.add_required(self.unwaited_fences);
            for state in self.fences.values() {
                if let (false, Some(signaller)) = (state.waited, state.signalled_by) {
                    self.presentation_signals[signaller] += 1;
                }
            }
            self.unwaited_fences = 0;
            self.fences.clear();

            if let Some(tracker) = chain.current_tracker() {
                log::trace!(
                    "Swapchain {swapchain:?} presented by '{}' waits for {} semaphores",
                    scope.name(),
                    tracker.required()
                );
                self.swapchain_trackers.push((swapchain, tracker));
            }
        }
    }

    fn finish(self) -> FramePlan {
        let tracking = self.chain.is_some();
        let groups: Vec<_> = self
            .planned
            .into_iter()
            .enumerate()
            .map(|(index, planned)| {
                let tracker_signals = if tracking {
                    planned
                        .scopes
                        .clone()
                        .map(|s| self.scopes[s].wait_count() + self.presentation_signals[s])
                        .sum()
                } else {
                    0
                };
                ExecuteGroup::new(
                    index,
                    planned.kind,
                    planned.scopes,
                    self.scopes,
                    self.job_policy,
                    planned.semaphore_handle,
                    tracker_signals,
                )
            })
            .collect();

        let (handlers, handler_lookup) = build_handlers(&groups);

        FramePlan {
            groups,
            handlers,
            handler_lookup,
            semaphore_trackers: self.chain,
            swapchain_trackers: self.swapchain_trackers,
        }
    }
}

/// One handler per contiguous run of groups sharing a group id.
fn build_handlers(
    groups: &[ExecuteGroup],
) -> (Vec<ExecuteGroupHandler>, HashMap<GroupId, usize>) {
    let mut handlers = Vec::new();
    let mut lookup = HashMap::new();

    let mut start = 0;
    while start < groups.len() {
        let group_id = groups[start].group_id();
        let run = groups[start..]
            .iter()
            .take_while(|group| group.group_id() == group_id)
            .count();

        if lookup.insert(group_id, handlers.len()).is_some() {
            panic!("{group_id} is split across non-contiguous execute groups");
        }
        handlers.push(ExecuteGroupHandler::new(start..start + run, groups));
        start += run;
    }

    (handlers, lookup)
}
