use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use redlilium_rhi::{
    DeviceDescriptor, DeviceIndex, DummyBackend, ExecuterDescriptor, FenceId, FrameGraph,
    FrameGraphExecuter, GroupId, HardwareQueueClass, SchedulingPolicy, Scope, SemaphoreId,
    SwapchainId,
};

/// A frame of `passes` scopes mixing cheap, expensive and subpass work.
fn build_frame(passes: u32) -> Arc<FrameGraph> {
    let mut graph = FrameGraph::new();
    for i in 0..passes {
        let scope = match i % 8 {
            0 => Scope::new(format!("upload_{i}"))
                .with_queue_class(HardwareQueueClass::Copy)
                .with_estimated_item_count(4)
                .with_signal_semaphore(SemaphoreId(u64::from(i))),
            1 => Scope::new(format!("shadows_{i}"))
                .with_estimated_item_count(4000)
                .with_attachment_count(1)
                .with_wait_semaphore(SemaphoreId(u64::from(i - 1))),
            2 | 3 => Scope::new(format!("gbuffer_{i}"))
                .with_group(GroupId(i / 8))
                .with_estimated_item_count(200)
                .with_attachment_count(4),
            4 => Scope::new(format!("compute_{i}"))
                .with_queue_class(HardwareQueueClass::Compute)
                .with_estimated_item_count(16)
                .with_signal_fence(FenceId(u64::from(i))),
            _ => Scope::new(format!("post_{i}"))
                .with_estimated_item_count(12)
                .with_attachment_count(1),
        };
        graph.add_scope(scope);
    }
    let last = Scope::new("present").with_swapchain(SwapchainId(0));
    graph.add_scope(last);
    Arc::new(graph)
}

fn executer(policy: SchedulingPolicy) -> (Arc<DummyBackend>, FrameGraphExecuter) {
    let backend = Arc::new(DummyBackend::new());
    let mut executer = FrameGraphExecuter::new(backend.clone(), policy);
    executer
        .init(ExecuterDescriptor::new().with_device(
            DeviceIndex(0),
            DeviceDescriptor::new().with_signal_fence_from_cpu(true),
        ))
        .unwrap();
    (backend, executer)
}

// ---------------------------------------------------------------------------
// Partition pass
// ---------------------------------------------------------------------------

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    for passes in [16, 64, 256] {
        let frame = build_frame(passes);
        group.bench_with_input(BenchmarkId::from_parameter(passes), &frame, |b, frame| {
            let (_, mut executer) = executer(SchedulingPolicy::Parallel);
            b.iter(|| {
                executer.begin(Arc::clone(frame)).unwrap();
                black_box(executer.groups().len());
                executer.end().unwrap();
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Full frame
// ---------------------------------------------------------------------------

fn bench_full_frame(c: &mut Criterion) {
    let frame = build_frame(64);
    for (name, policy) in [
        ("frame_64_passes_parallel", SchedulingPolicy::Parallel),
        ("frame_64_passes_lockstep", SchedulingPolicy::SerialLockstep),
    ] {
        c.bench_function(name, |b| {
            let (backend, mut executer) = executer(policy);
            b.iter(|| {
                executer.begin(Arc::clone(&frame)).unwrap();
                executer.record().unwrap();
                executer.end().unwrap();
                backend.clear();
            });
        });
    }
}

criterion_group!(benches, bench_partition, bench_full_frame);
criterion_main!(benches);
