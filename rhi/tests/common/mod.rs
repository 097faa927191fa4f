//! Common utilities for executer integration tests.
//!
//! Provides logging setup, executer construction over the dummy backend and
//! a representative frame graph.

#![allow(dead_code)]

use std::sync::Arc;

use redlilium_rhi::{
    DeviceDescriptor, DeviceIndex, DummyBackend, DummySubmission, ExecuterDescriptor, FenceId,
    FrameGraph, FrameGraphExecuter, GroupId, HardwareQueueClass, SchedulingPolicy, Scope, ScopeId,
    SemaphoreId, SwapchainId,
};

/// Install a test logger. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Descriptor with default limits for devices 0 and 1.
pub fn descriptor(signal_fence_from_cpu: bool) -> ExecuterDescriptor {
    let device = DeviceDescriptor::new().with_signal_fence_from_cpu(signal_fence_from_cpu);
    ExecuterDescriptor::new()
        .with_device(DeviceIndex(0), device)
        .with_device(DeviceIndex(1), device)
}

/// An initialized executer over a fresh dummy backend.
pub fn executer(
    policy: SchedulingPolicy,
    signal_fence_from_cpu: bool,
) -> (Arc<DummyBackend>, FrameGraphExecuter) {
    init_logging();
    let backend = Arc::new(DummyBackend::new());
    let mut executer = FrameGraphExecuter::new(backend.clone(), policy);
    executer
        .init(descriptor(signal_fence_from_cpu))
        .expect("default descriptor is valid");
    (backend, executer)
}

/// A scope well below the default cost threshold.
pub fn cheap(name: &str) -> Scope {
    Scope::new(name)
        .with_estimated_item_count(10)
        .with_attachment_count(1)
}

pub fn graph(scopes: impl IntoIterator<Item = Scope>) -> Arc<FrameGraph> {
    let mut graph = FrameGraph::new();
    for scope in scopes {
        graph.add_scope(scope);
    }
    Arc::new(graph)
}

pub const PRESENT_SWAPCHAIN: SwapchainId = SwapchainId(1);

/// A frame exercising every partition rule:
///
/// | Scope | Notes |
/// |-------|-------|
/// | upload | copy queue, signals a semaphore |
/// | shadows | waits on the upload, expensive |
/// | gbuffer, lighting | subpasses of one render pass |
/// | ssao | compute queue, signals a fence nobody waits on |
/// | transparent, ui | cheap graphics work |
/// | present | waits a semaphore, presents the swapchain |
pub fn mixed_frame() -> Arc<FrameGraph> {
    graph([
        Scope::new("upload")
            .with_queue_class(HardwareQueueClass::Copy)
            .with_estimated_item_count(5)
            .with_signal_semaphore(SemaphoreId(1)),
        Scope::new("shadows")
            .with_estimated_item_count(3000)
            .with_attachment_count(1)
            .with_wait_semaphore(SemaphoreId(1)),
        Scope::new("gbuffer")
            .with_group(GroupId(10))
            .with_estimated_item_count(100)
            .with_attachment_count(4),
        Scope::new("lighting")
            .with_group(GroupId(10))
            .with_estimated_item_count(50)
            .with_attachment_count(2),
        Scope::new("ssao")
            .with_queue_class(HardwareQueueClass::Compute)
            .with_estimated_item_count(20)
            .with_signal_fence(FenceId(1)),
        cheap("transparent").with_estimated_item_count(30),
        cheap("ui"),
        cheap("present")
            .with_wait_semaphore(SemaphoreId(2))
            .with_swapchain(PRESENT_SWAPCHAIN),
    ])
}

// ---------------------------------------------------------------------------
// Frame shapes
// ---------------------------------------------------------------------------

pub fn all_cheap_frame() -> Arc<FrameGraph> {
    graph((0..12).map(|i| cheap(&format!("pass{i}"))))
}

pub fn alternating_queues_frame() -> Arc<FrameGraph> {
    let queues = [
        HardwareQueueClass::Graphics,
        HardwareQueueClass::Compute,
        HardwareQueueClass::Copy,
    ];
    graph((0..9).map(|i| cheap(&format!("pass{i}")).with_queue_class(queues[i % 3])))
}

pub fn two_devices_frame() -> Arc<FrameGraph> {
    graph(
        [0, 1, 1, 0, 0, 1]
            .into_iter()
            .enumerate()
            .map(|(i, device)| cheap(&format!("pass{i}")).with_device(DeviceIndex(device))),
    )
}

pub fn signal_chain_frame() -> Arc<FrameGraph> {
    graph([
        cheap("a").with_signal_semaphore(SemaphoreId(1)),
        cheap("b")
            .with_wait_semaphore(SemaphoreId(1))
            .with_signal_fence(FenceId(1)),
        cheap("c")
            .with_wait_fence(FenceId(1))
            .with_signal_semaphore(SemaphoreId(2)),
        cheap("d").with_wait_semaphore(SemaphoreId(2)),
        cheap("e"),
        cheap("present").with_swapchain(PRESENT_SWAPCHAIN),
    ])
}

/// Zero-cost scopes around scopes costing exactly and just below the threshold.
pub fn threshold_boundary_frame() -> Arc<FrameGraph> {
    graph([
        Scope::new("empty0"),
        Scope::new("exact").with_estimated_item_count(250),
        Scope::new("empty1"),
        Scope::new("below").with_estimated_item_count(249),
        Scope::new("empty2"),
        Scope::new("attachments").with_attachment_count(31),
        Scope::new("one").with_estimated_item_count(1),
        Scope::new("empty3"),
    ])
}

pub fn several_presentations_frame() -> Arc<FrameGraph> {
    graph([
        cheap("scene").with_swapchain(SwapchainId(1)),
        cheap("mirror")
            .with_wait_semaphore(SemaphoreId(1))
            .with_swapchain(SwapchainId(2)),
        cheap("compute")
            .with_queue_class(HardwareQueueClass::Compute)
            .with_signal_fence(FenceId(1)),
        cheap("overlay").with_swapchain(SwapchainId(3)),
        cheap("debug").with_swapchain(SwapchainId(1)),
    ])
}

/// Scopes in the order they reached the queue, one entry per scope.
pub fn submitted_scope_order(submissions: &[DummySubmission]) -> Vec<ScopeId> {
    let mut order: Vec<ScopeId> = Vec::new();
    for submission in submissions {
        for list in &submission.command_lists {
            for (scope, _) in &list.recorded {
                if order.last() != Some(scope) {
                    order.push(*scope);
                }
            }
        }
    }
    order
}

/// Total number of items recorded for `scope` across all submissions.
pub fn recorded_items(submissions: &[DummySubmission], scope: ScopeId) -> u32 {
    submissions
        .iter()
        .flat_map(|submission| &submission.command_lists)
        .flat_map(|list| &list.recorded)
        .filter(|(id, _)| *id == scope)
        .map(|(_, items)| items.end - items.start)
        .sum()
}

/// Run one full frame.
pub fn run_frame(executer: &mut FrameGraphExecuter, graph: Arc<FrameGraph>) {
    executer.begin(graph).expect("begin");
    executer.record().expect("record");
    executer.end().expect("end");
}
