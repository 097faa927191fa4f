//! Frame graph executer.
//!
//! The executer turns the ordered scopes of a [`FrameGraph`] into as few
//! queue submissions as the platform limits and the synchronization between
//! scopes allow.
//!
//! # Frame lifecycle
//!
//! | Call | Effect |
//! |------|--------|
//! | [`init`](FrameGraphExecuter::init) | Validate and store per-device limits (once) |
//! | [`begin`](FrameGraphExecuter::begin) | Partition the scopes into [`ExecuteGroup`]s and build handlers |
//! | [`record`](FrameGraphExecuter::record) | Record every command list, submitting handlers as they complete |
//! | [`end`](FrameGraphExecuter::end) | Release groups, handlers and semaphore trackers |
//!
//! Recording can also be driven externally with
//! [`record_group`](FrameGraphExecuter::record_group); every group that
//! finishes recording is passed to
//! [`execute_group`](FrameGraphExecuter::execute_group). Handlers submit in
//! the order they were created, so a later batch never reaches the queue
//! before an earlier one.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use redlilium_rhi::{
//!     DeviceDescriptor, DeviceIndex, DummyBackend, ExecuterDescriptor, FrameGraph,
//!     FrameGraphExecuter, SchedulingPolicy, Scope,
//! };
//!
//! let backend = Arc::new(DummyBackend::new());
//! let mut executer = FrameGraphExecuter::new(backend.clone(), SchedulingPolicy::Parallel);
//! executer.init(ExecuterDescriptor::new().with_device(DeviceIndex(0), DeviceDescriptor::new()))?;
//!
//! let mut graph = FrameGraph::new();
//! graph.add_scope(Scope::new("shadows").with_estimated_item_count(40));
//! graph.add_scope(Scope::new("opaque").with_estimated_item_count(60));
//!
//! executer.begin(Arc::new(graph))?;
//! executer.record()?;
//! executer.end()?;
//!
//! // Both scopes were merged into one submission
//! assert_eq!(backend.submissions().len(), 1);
//! # Ok::<(), redlilium_rhi::ExecuterError>(())
//! ```

mod group;
mod handler;
mod partition;

pub use group::{ExecuteGroup, ExecuteGroupKind};
pub use handler::{ExecuteGroupHandler, HandlerKind};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::backend::ExecuteBackend;
use crate::error::{ExecuterError, ExecuterResult};
use crate::graph::FrameGraph;
use crate::limits::ExecuterDescriptor;
use crate::sync::{CountingSemaphoreTracker, SemaphoreTrackerChain};
use crate::types::{JobPolicy, SchedulingPolicy, SwapchainId};

use partition::FramePlan;

/// State of the frame between `begin` and `end`.
struct Frame {
    graph: Arc<FrameGraph>,
    plan: FramePlan,
    /// Index of the next handler allowed to submit.
    submit_cursor: Mutex<usize>,
    recorded: AtomicBool,
}

/// Schedules the scopes of a frame graph into command list submissions.
pub struct FrameGraphExecuter {
    backend: Arc<dyn ExecuteBackend>,
    policy: SchedulingPolicy,
    descriptor: Option<ExecuterDescriptor>,
    frame: Option<Frame>,
}

impl FrameGraphExecuter {
    /// Create an executer. The scheduling policy is fixed for its lifetime.
    pub fn new(backend: Arc<dyn ExecuteBackend>, policy: SchedulingPolicy) -> Self {
        Self {
            backend,
            policy,
            descriptor: None,
            frame: None,
        }
    }

    /// Validate and store the per-device configuration.
    ///
    /// May be called again between frames to replace the configuration.
    pub fn init(&mut self, descriptor: ExecuterDescriptor) -> ExecuterResult<()> {
        if self.frame.is_some() {
            return Err(ExecuterError::FrameInProgress);
        }
        descriptor.validate()?;

        log::info!(
            "RedLilium RHI v{} frame graph executer initialized on {} ({} devices, {:?} scheduling)",
            crate::VERSION,
            self.backend.name(),
            descriptor.devices.len(),
            self.policy
        );
        self.descriptor = Some(descriptor);
        Ok(())
    }

    /// Start a frame: partition `graph` into execute groups and handlers.
    pub fn begin(&mut self, graph: Arc<FrameGraph>) -> ExecuterResult<()> {
        crate::profile_function!();

        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or(ExecuterError::NotInitialized)?;
        if self.frame.is_some() {
            return Err(ExecuterError::FrameInProgress);
        }

        let plan = {
            crate::profile_scope!("partition");
            partition::partition(&graph, &descriptor.devices, self.policy)?
        };

        log::debug!(
            "Partitioned {} scopes into {} execute groups and {} handlers ({} swapchain trackers)",
            graph.len(),
            plan.groups.len(),
            plan.handlers.len(),
            plan.swapchain_trackers.len()
        );
        crate::profile_plot!("execute_groups", plan.groups.len());
        for (tracker, reachable, required) in plan.unreachable_trackers() {
            log::warn!(
                "Semaphore tracker {tracker} requires {required} signals but at most {reachable} \
                 can reach it; its presentation will never be released"
            );
        }

        self.frame = Some(Frame {
            graph,
            plan,
            submit_cursor: Mutex::new(0),
            recorded: AtomicBool::new(false),
        });
        Ok(())
    }

    /// Record every command list of the frame.
    ///
    /// With [`JobPolicy::Parallel`] the primary groups and secondary command
    /// lists are recorded by a fixed set of scoped worker threads, one per
    /// available core, that pull work in group order; with
    /// [`JobPolicy::Serial`] everything is recorded in order on the calling
    /// thread. Completed groups are submitted as recording progresses.
    pub fn record(&self) -> ExecuterResult<()> {
        crate::profile_function!();

        let frame = self.frame()?;
        if frame.recorded.swap(true, Ordering::SeqCst) {
            return Err(ExecuterError::AlreadyRecorded);
        }

        let tasks: Vec<(&ExecuteGroup, u32)> = frame
            .plan
            .groups
            .iter()
            .flat_map(|group| (0..group.command_list_count()).map(move |list| (group, list)))
            .collect();

        match self.policy.job_policy() {
            JobPolicy::Serial => {
                for &(group, list) in &tasks {
                    self.record_command_list(frame, group, list)?;
                }
                Ok(())
            }
            JobPolicy::Parallel => {
                let workers = recording_threads(tasks.len());
                let next = AtomicUsize::new(0);
                log::trace!("Recording {} command lists on {workers} threads", tasks.len());

                std::thread::scope(|s| {
                    let handles: Vec<_> = (0..workers)
                        .map(|_| {
                            s.spawn(|| -> ExecuterResult<()> {
                                crate::set_thread_name!("frame graph recorder");
                                loop {
                                    let index = next.fetch_add(1, Ordering::Relaxed);
                                    let Some(&(group, list)) = tasks.get(index) else {
                                        return Ok(());
                                    };
                                    self.record_command_list(frame, group, list)?;
                                }
                            })
                        })
                        .collect();

                    let results: Vec<ExecuterResult<()>> = handles
                        .into_iter()
                        .map(|handle| {
                            handle
                                .join()
                                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                        })
                        .collect();
                    results.into_iter().collect()
                })
            }
        }
    }

    /// Record all command lists of one group on the calling thread.
    ///
    /// For callers driving recording themselves instead of using
    /// [`record`](Self::record). Returns whether the group completed.
    ///
    /// # Panics
    ///
    /// Panics if a command list of the group was already recorded.
    pub fn record_group(&self, index: usize) -> ExecuterResult<bool> {
        let frame = self.frame()?;
        let group = frame
            .plan
            .groups
            .get(index)
            .ok_or(ExecuterError::InvalidGroup(index))?;
        for list in 0..group.command_list_count() {
            self.record_command_list(frame, group, list)?;
        }
        Ok(group.is_complete())
    }

    fn record_command_list(
        &self,
        frame: &Frame,
        group: &ExecuteGroup,
        list: u32,
    ) -> ExecuterResult<()> {
        crate::profile_scope!("record_command_list");
        let completed =
            group.record_command_list(list, frame.graph.scopes(), self.backend.as_ref())?;
        if completed {
            self.execute_group(group.index())?;
        }
        Ok(())
    }

    /// Notify the executer that group `index` finished recording.
    ///
    /// Submits the group's handler if all of its groups are complete and
    /// every earlier handler has already submitted.
    ///
    /// # Panics
    ///
    /// Panics if no handler owns the group's id.
    pub fn execute_group(&self, index: usize) -> ExecuterResult<()> {
        let frame = self.frame()?;
        let group = frame
            .plan
            .groups
            .get(index)
            .ok_or(ExecuterError::InvalidGroup(index))?;

        let Some(&handler_index) = frame.plan.handler_lookup.get(&group.group_id()) else {
            panic!("no execute group handler registered for {}", group.group_id());
        };
        let handler = &frame.plan.handlers[handler_index];
        if handler.is_executed() || !handler.is_complete(&frame.plan.groups) {
            return Ok(());
        }

        self.retire_handlers(frame)
    }

    /// Submit complete handlers in creation order.
    fn retire_handlers(&self, frame: &Frame) -> ExecuterResult<()> {
        let groups = &frame.plan.groups;
        let mut cursor = frame.submit_cursor.lock();
        while let Some(handler) = frame.plan.handlers.get(*cursor) {
            if !handler.is_complete(groups) {
                break;
            }
            *cursor += 1;
            handler.end(groups, frame.graph.scopes(), self.backend.as_ref())?;
        }
        Ok(())
    }

    /// Finish the frame, releasing groups, handlers and trackers.
    pub fn end(&mut self) -> ExecuterResult<()> {
        let frame = self.frame.take().ok_or(ExecuterError::NoFrameInProgress)?;

        let pending = frame
            .plan
            .handlers
            .iter()
            .filter(|handler| !handler.is_executed())
            .count();
        if pending > 0 {
            log::warn!("Ending frame with {pending} handlers that never submitted");
        }

        crate::frame_mark!();
        Ok(())
    }

    fn frame(&self) -> ExecuterResult<&Frame> {
        self.frame.as_ref().ok_or(ExecuterError::NoFrameInProgress)
    }

    /// Execute groups of the current frame (empty outside a frame).
    pub fn groups(&self) -> &[ExecuteGroup] {
        self.frame
            .as_ref()
            .map_or(&[], |frame| frame.plan.groups.as_slice())
    }

    /// Handlers of the current frame, in submission order.
    pub fn handlers(&self) -> &[ExecuteGroupHandler] {
        self.frame
            .as_ref()
            .map_or(&[], |frame| frame.plan.handlers.as_slice())
    }

    /// Semaphore tracker chain of the current frame, if tracking is enabled.
    pub fn semaphore_trackers(&self) -> Option<&Arc<SemaphoreTrackerChain>> {
        self.frame.as_ref()?.plan.semaphore_trackers.as_ref()
    }

    /// Tracker a swapchain must wait on before presenting.
    ///
    /// If the swapchain is presented more than once this frame, the last
    /// presentation's tracker is returned.
    ///
    /// Each presentation after the first gets a tracker seeded with the
    /// requirements of every earlier presentation, while only work recorded
    /// after the previous presentation signals it. Such a tracker usually
    /// never reaches its requirement, so waiting on it blocks forever;
    /// [`begin`](Self::begin) logs a warning for every tracker in that state.
    pub fn semaphore_tracker_for(
        &self,
        swapchain: SwapchainId,
    ) -> Option<Arc<CountingSemaphoreTracker>> {
        self.swapchain_trackers()
            .iter()
            .rev()
            .find(|(id, _)| *id == swapchain)
            .map(|(_, tracker)| Arc::clone(tracker))
    }

    /// Every swapchain presentation of the current frame with its tracker.
    pub fn swapchain_trackers(&self) -> &[(SwapchainId, Arc<CountingSemaphoreTracker>)] {
        self.frame
            .as_ref()
            .map_or(&[], |frame| frame.plan.swapchain_trackers.as_slice())
    }

    /// Frame graph of the current frame.
    pub fn frame_graph(&self) -> Option<&Arc<FrameGraph>> {
        self.frame.as_ref().map(|frame| &frame.graph)
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn backend(&self) -> &Arc<dyn ExecuteBackend> {
        &self.backend
    }

    /// Configuration stored by [`init`](Self::init).
    pub fn descriptor(&self) -> Option<&ExecuterDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.descriptor.is_some()
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.frame.is_some()
    }
}

/// Worker threads used to record `task_count` command lists in parallel.
pub(crate) fn recording_threads(task_count: usize) -> usize {
    std::thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(task_count)
        .max(1)
}

impl fmt::Debug for FrameGraphExecuter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameGraphExecuter")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .field("initialized", &self.is_initialized())
            .field("groups", &self.groups().len())
            .field("handlers", &self.handlers().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(FrameGraphExecuter: Send, Sync);
