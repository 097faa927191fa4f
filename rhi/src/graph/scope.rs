//! Scope type.

use crate::types::{
    DeviceIndex, FenceId, GroupId, HardwareQueueClass, ScopeId, SemaphoreId, SwapchainId,
};

/// One logical unit of GPU work (typically a render pass).
///
/// Scopes are produced by the frame graph after dependency resolution and
/// are read-only to the executer.
///
/// # Example
///
/// ```
/// use redlilium_rhi::{HardwareQueueClass, Scope, SemaphoreId};
///
/// let scope = Scope::new("shadows")
///     .with_queue_class(HardwareQueueClass::Graphics)
///     .with_estimated_item_count(1200)
///     .with_attachment_count(1)
///     .with_wait_semaphore(SemaphoreId(4));
/// assert_eq!(scope.name(), "shadows");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub(crate) id: ScopeId,
    name: String,
    queue_class: HardwareQueueClass,
    device_index: DeviceIndex,
    pub(crate) group_id: Option<GroupId>,
    estimated_item_count: u32,
    attachment_count: u32,
    wait_semaphores: Vec<SemaphoreId>,
    signal_semaphores: Vec<SemaphoreId>,
    wait_fences: Vec<FenceId>,
    signal_fences: Vec<FenceId>,
    swapchains_to_present: Vec<SwapchainId>,
}

impl Scope {
    /// Create a graphics scope on device 0 with no work and no synchronization.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ScopeId(0),
            name: name.into(),
            queue_class: HardwareQueueClass::Graphics,
            device_index: DeviceIndex(0),
            group_id: None,
            estimated_item_count: 0,
            attachment_count: 0,
            wait_semaphores: Vec::new(),
            signal_semaphores: Vec::new(),
            wait_fences: Vec::new(),
            signal_fences: Vec::new(),
            swapchains_to_present: Vec::new(),
        }
    }

    pub fn with_queue_class(mut self, queue_class: HardwareQueueClass) -> Self {
        self.queue_class = queue_class;
        self
    }

    pub fn with_device(mut self, device_index: DeviceIndex) -> Self {
        self.device_index = device_index;
        self
    }

    /// Put the scope into an explicit render-pass group.
    ///
    /// Adjacent scopes with the same group id become subpasses of one render
    /// pass. Scopes without an explicit group get a unique one when added to
    /// a [`FrameGraph`](super::FrameGraph).
    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_estimated_item_count(mut self, count: u32) -> Self {
        self.estimated_item_count = count;
        self
    }

    pub fn with_attachment_count(mut self, count: u32) -> Self {
        self.attachment_count = count;
        self
    }

    pub fn with_wait_semaphore(mut self, semaphore: SemaphoreId) -> Self {
        self.wait_semaphores.push(semaphore);
        self
    }

    pub fn with_signal_semaphore(mut self, semaphore: SemaphoreId) -> Self {
        self.signal_semaphores.push(semaphore);
        self
    }

    pub fn with_wait_fence(mut self, fence: FenceId) -> Self {
        self.wait_fences.push(fence);
        self
    }

    pub fn with_signal_fence(mut self, fence: FenceId) -> Self {
        self.signal_fences.push(fence);
        self
    }

    pub fn with_swapchain(mut self, swapchain: SwapchainId) -> Self {
        self.swapchains_to_present.push(swapchain);
        self
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue_class(&self) -> HardwareQueueClass {
        self.queue_class
    }

    pub fn device_index(&self) -> DeviceIndex {
        self.device_index
    }

    /// Render-pass group of this scope.
    ///
    /// # Panics
    ///
    /// Panics if the scope was never added to a frame graph and has no
    /// explicit group.
    pub fn group_id(&self) -> GroupId {
        self.group_id
            .expect("scope must be added to a FrameGraph before it is scheduled")
    }

    pub fn estimated_item_count(&self) -> u32 {
        self.estimated_item_count
    }

    pub fn attachment_count(&self) -> u32 {
        self.attachment_count
    }

    pub fn wait_semaphores(&self) -> &[SemaphoreId] {
        &self.wait_semaphores
    }

    pub fn signal_semaphores(&self) -> &[SemaphoreId] {
        &self.signal_semaphores
    }

    pub fn wait_fences(&self) -> &[FenceId] {
        &self.wait_fences
    }

    pub fn signal_fences(&self) -> &[FenceId] {
        &self.signal_fences
    }

    pub fn swapchains_to_present(&self) -> &[SwapchainId] {
        &self.swapchains_to_present
    }

    /// Whether the scope must wait on anything before it starts.
    pub fn has_waits(&self) -> bool {
        !self.wait_semaphores.is_empty() || !self.wait_fences.is_empty()
    }

    /// Whether the scope signals anything when it completes.
    pub fn has_signals(&self) -> bool {
        !self.signal_semaphores.is_empty() || !self.signal_fences.is_empty()
    }

    /// Number of wait primitives (semaphores and fences).
    pub fn wait_count(&self) -> u32 {
        (self.wait_semaphores.len() + self.wait_fences.len()) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_defaults() {
        let scope = Scope::new("main");
        assert_eq!(scope.queue_class(), HardwareQueueClass::Graphics);
        assert_eq!(scope.device_index(), DeviceIndex(0));
        assert!(!scope.has_waits());
        assert!(!scope.has_signals());
        assert_eq!(scope.wait_count(), 0);
    }

    #[test]
    fn test_scope_sync_queries() {
        let scope = Scope::new("composite")
            .with_wait_semaphore(SemaphoreId(1))
            .with_wait_fence(FenceId(2))
            .with_signal_fence(FenceId(3));
        assert!(scope.has_waits());
        assert!(scope.has_signals());
        assert_eq!(scope.wait_count(), 2);
    }

    #[test]
    #[should_panic(expected = "scope must be added to a FrameGraph")]
    fn test_group_id_requires_graph() {
        let _ = Scope::new("loose").group_id();
    }
}
