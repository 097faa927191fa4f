//! Identifier and enum types shared by the frame graph and the executer.

use std::fmt;

/// Index of a device in a multi-device setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIndex(pub u32);

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a contiguous run of scopes forming one render-pass/subpass chain.
///
/// Scopes that share a group id are recorded into one render pass, each scope
/// being one subpass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group{}", self.0)
    }
}

/// Identity of a scope inside a frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub u32);

/// A GPU-GPU semaphore referenced by scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreId(pub u64);

/// A fence that can be signalled and waited by the GPU or the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub u64);

/// A swapchain that a scope presents to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainId(pub u64);

/// Hardware queue family a scope runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HardwareQueueClass {
    /// Graphics queue (also capable of compute and copy).
    #[default]
    Graphics,
    /// Asynchronous compute queue.
    Compute,
    /// Transfer-only queue.
    Copy,
}

/// How the command lists of an execute group are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobPolicy {
    /// Command lists may be recorded on worker threads.
    #[default]
    Parallel,
    /// Command lists are recorded one after another on the calling thread.
    Serial,
}

/// Scheduling mode of a [`FrameGraphExecuter`](crate::FrameGraphExecuter).
///
/// Selected once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchedulingPolicy {
    /// Merge cheap scopes, split expensive ones and record in parallel.
    #[default]
    Parallel,
    /// Every scope gets a dedicated group with a single command list and
    /// groups are recorded serially.
    ///
    /// Used to keep the CPU and GPU in lock-step so a device fault can be
    /// attributed to exactly one scope.
    SerialLockstep,
}

impl SchedulingPolicy {
    /// Job policy handed to the execute groups built under this policy.
    pub fn job_policy(self) -> JobPolicy {
        match self {
            Self::Parallel => JobPolicy::Parallel,
            Self::SerialLockstep => JobPolicy::Serial,
        }
    }
}
