//! Execute group handlers: turn finished groups into queue submissions.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{
    CommandListLevel, ExecuteBackend, RecordedCommandList, RenderPassLayout, SubmitBatch,
};
use crate::error::ExecuterResult;
use crate::graph::Scope;
use crate::sync::SemaphoreTrackerHandle;
use crate::types::GroupId;

use super::group::{ExecuteGroup, ExecuteGroupKind};

/// Submission strategy of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// A single primary group; every scope manages its own render pass.
    Primary,
    /// Secondary groups (or several groups of one frame graph group); each
    /// group becomes one subpass of a shared render pass.
    Secondary,
}

/// Submits a contiguous run of groups sharing a group id.
///
/// The handler fires once, the first time all of its groups are complete.
#[derive(Debug)]
pub struct ExecuteGroupHandler {
    kind: HandlerKind,
    group_id: GroupId,
    groups: Range<usize>,
    semaphore_handle: Option<SemaphoreTrackerHandle>,
    executed: AtomicBool,
}

impl ExecuteGroupHandler {
    pub(crate) fn new(groups: Range<usize>, all_groups: &[ExecuteGroup]) -> Self {
        let members = &all_groups[groups.clone()];
        assert!(!members.is_empty(), "handler must own at least one group");

        let kind = match members {
            [group] if group.kind() == ExecuteGroupKind::Primary => HandlerKind::Primary,
            _ => HandlerKind::Secondary,
        };

        Self {
            kind,
            group_id: members[0].group_id(),
            groups,
            semaphore_handle: members[0].semaphore_handle().cloned(),
            executed: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Indices of the owned groups.
    pub fn group_range(&self) -> Range<usize> {
        self.groups.clone()
    }

    /// Whether the handler has submitted.
    pub fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    /// Whether every owned group has finished recording.
    pub fn is_complete(&self, all_groups: &[ExecuteGroup]) -> bool {
        all_groups[self.groups.clone()]
            .iter()
            .all(ExecuteGroup::is_complete)
    }

    /// Submit the owned groups as one batch.
    ///
    /// Does nothing if the handler already executed. After a successful
    /// submission the tracker handle is signalled with the semaphores the
    /// groups account for.
    pub(crate) fn end(
        &self,
        all_groups: &[ExecuteGroup],
        all_scopes: &[Scope],
        backend: &dyn ExecuteBackend,
    ) -> ExecuterResult<()> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        crate::profile_scope!("handler_submit");

        let groups = &all_groups[self.groups.clone()];
        let first = &groups[0];
        let render_pass = match self.kind {
            HandlerKind::Primary => RenderPassLayout::PerScope,
            HandlerKind::Secondary => RenderPassLayout::Subpasses {
                count: groups.len() as u32,
            },
        };

        let mut batch = SubmitBatch {
            group_id: self.group_id,
            queue_class: first.queue_class(),
            device_index: first.device_index(),
            render_pass,
            command_lists: Vec::new(),
            wait_semaphores: Vec::new(),
            signal_semaphores: Vec::new(),
            wait_fences: Vec::new(),
            signal_fences: Vec::new(),
            swapchains: Vec::new(),
        };

        let mut tracker_signals = 0;
        for (subpass, group) in groups.iter().enumerate() {
            let level = match group.kind() {
                ExecuteGroupKind::Primary => CommandListLevel::Primary,
                ExecuteGroupKind::Secondary { .. } => CommandListLevel::Secondary,
            };
            let scopes = group.scopes(all_scopes);
            let scope_ids: Vec<_> = scopes.iter().map(Scope::id).collect();

            for native in group.take_command_lists() {
                batch.command_lists.push(RecordedCommandList {
                    level,
                    group_index: group.index(),
                    subpass: subpass as u32,
                    scopes: scope_ids.clone(),
                    native,
                });
            }

            for scope in scopes {
                extend_unique(&mut batch.wait_semaphores, scope.wait_semaphores());
                extend_unique(&mut batch.signal_semaphores, scope.signal_semaphores());
                extend_unique(&mut batch.wait_fences, scope.wait_fences());
                extend_unique(&mut batch.signal_fences, scope.signal_fences());
                extend_unique(&mut batch.swapchains, scope.swapchains_to_present());
            }
            tracker_signals += group.tracker_signals();
        }

        log::trace!(
            "Submitting {:?} handler for {} ({} groups, {} command lists)",
            self.kind,
            self.group_id,
            groups.len(),
            batch.command_lists.len()
        );
        backend.submit(batch)?;

        if tracker_signals > 0 {
            if let Some(handle) = &self.semaphore_handle {
                handle.signal(tracker_signals);
            }
        }
        Ok(())
    }
}

fn extend_unique<T: Copy + PartialEq>(target: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !target.contains(item) {
            target.push(*item);
        }
    }
}

static_assertions::assert_impl_all!(ExecuteGroupHandler: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::graph::FrameGraph;
    use crate::sync::SemaphoreTrackerChain;
    use crate::types::{JobPolicy, SemaphoreId, SwapchainId};

    fn primary(index: usize, scopes: Range<usize>, graph: &FrameGraph) -> ExecuteGroup {
        ExecuteGroup::new(
            index,
            ExecuteGroupKind::Primary,
            scopes,
            graph.scopes(),
            JobPolicy::Serial,
            None,
            0,
        )
    }

    #[test]
    fn test_single_primary_group_gets_primary_handler() {
        let mut graph = FrameGraph::new();
        graph.add_scope(Scope::new("a"));
        let groups = vec![primary(0, 0..1, &graph)];
        let handler = ExecuteGroupHandler::new(0..1, &groups);
        assert_eq!(handler.kind(), HandlerKind::Primary);
    }

    #[test]
    fn test_subpass_run_gets_secondary_handler() {
        let mut graph = FrameGraph::new();
        graph.add_scope(Scope::new("gbuffer").with_group(GroupId(7)));
        graph.add_scope(Scope::new("lighting").with_group(GroupId(7)));
        let groups = vec![primary(0, 0..1, &graph), primary(1, 1..2, &graph)];
        let handler = ExecuteGroupHandler::new(0..2, &groups);
        assert_eq!(handler.kind(), HandlerKind::Secondary);
        assert_eq!(handler.group_id(), GroupId(7));
    }

    #[test]
    fn test_end_submits_once_and_signals_tracker() {
        let mut graph = FrameGraph::new();
        graph.add_scope(
            Scope::new("a")
                .with_wait_semaphore(SemaphoreId(1))
                .with_swapchain(SwapchainId(3)),
        );
        let chain = SemaphoreTrackerChain::new();
        let handle = chain.create_handle();
        chain.add_required(1);

        let backend = DummyBackend::new();
        let groups = vec![ExecuteGroup::new(
            0,
            ExecuteGroupKind::Primary,
            0..1,
            graph.scopes(),
            JobPolicy::Serial,
            Some(handle),
            1,
        )];
        let handler = ExecuteGroupHandler::new(0..1, &groups);

        assert!(!handler.is_complete(&groups));
        groups[0]
            .record_command_list(0, graph.scopes(), &backend)
            .unwrap();
        assert!(handler.is_complete(&groups));

        handler.end(&groups, graph.scopes(), &backend).unwrap();
        handler.end(&groups, graph.scopes(), &backend).unwrap();
        assert!(handler.is_executed());

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].render_pass, RenderPassLayout::PerScope);
        assert_eq!(submissions[0].wait_semaphores, vec![SemaphoreId(1)]);
        assert_eq!(submissions[0].swapchains, vec![SwapchainId(3)]);
        assert!(chain.current_tracker().unwrap().is_signalled());
    }

    #[test]
    fn test_secondary_batch_uses_one_subpass_per_group() {
        let mut graph = FrameGraph::new();
        graph.add_scope(Scope::new("gbuffer").with_group(GroupId(2)));
        graph.add_scope(Scope::new("lighting").with_group(GroupId(2)));
        let backend = DummyBackend::new();
        let groups: Vec<_> = (0..2)
            .map(|i| {
                ExecuteGroup::new(
                    i,
                    ExecuteGroupKind::Secondary {
                        command_list_count: 2,
                    },
                    i..i + 1,
                    graph.scopes(),
                    JobPolicy::Parallel,
                    None,
                    0,
                )
            })
            .collect();
        for group in &groups {
            for list in 0..2 {
                group
                    .record_command_list(list, graph.scopes(), &backend)
                    .unwrap();
            }
        }

        let handler = ExecuteGroupHandler::new(0..2, &groups);
        handler.end(&groups, graph.scopes(), &backend).unwrap();

        let submission = &backend.submissions()[0];
        assert_eq!(submission.render_pass, RenderPassLayout::Subpasses { count: 2 });
        let subpasses: Vec<_> = submission
            .command_lists
            .iter()
            .map(|list| list.subpass)
            .collect();
        assert_eq!(subpasses, vec![0, 0, 1, 1]);
    }
}
