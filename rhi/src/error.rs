//! Executer error types.

use thiserror::Error;

use crate::types::DeviceIndex;

/// Errors reported by the frame graph executer.
///
/// Scheduling consistency failures (a group without a handler) are not
/// represented here: they indicate a bug in the partition pass and panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecuterError {
    /// A device's platform limits are malformed.
    #[error("invalid platform limits for device {device}: {reason}")]
    InvalidLimits {
        device: DeviceIndex,
        reason: &'static str,
    },
    /// A scope targets a device that has no registered limits.
    #[error("no platform limits registered for device {0}")]
    MissingDeviceLimits(DeviceIndex),
    /// `begin` was called before a successful `init`.
    #[error("executer has not been initialized")]
    NotInitialized,
    /// `begin` was called while the previous frame was not ended.
    #[error("a frame is already in progress")]
    FrameInProgress,
    /// A per-frame operation was called outside `begin`/`end`.
    #[error("no frame in progress")]
    NoFrameInProgress,
    /// `record` was called twice for the same frame.
    #[error("the current frame has already been recorded")]
    AlreadyRecorded,
    /// An execute group index does not exist in the current frame.
    #[error("execute group {0} does not exist in this frame")]
    InvalidGroup(usize),
    /// The backend failed to record a command list.
    #[error("command list recording failed: {0}")]
    RecordingFailed(String),
    /// The backend failed to submit a batch.
    #[error("queue submission failed: {0}")]
    SubmissionFailed(String),
}

pub type ExecuterResult<T> = Result<T, ExecuterError>;
