//! Per-device configuration of the executer.
//!
//! The executer's merge heuristic is driven by a handful of platform limits
//! that differ between devices (a discrete GPU tolerates bigger command lists
//! than a mobile part). They are handed over once through an
//! [`ExecuterDescriptor`] and validated in
//! [`FrameGraphExecuter::init`](crate::FrameGraphExecuter::init).
//!
//! # Example
//!
//! ```
//! use redlilium_rhi::{DeviceDescriptor, DeviceIndex, ExecuterDescriptor, PlatformLimits};
//!
//! let descriptor = ExecuterDescriptor::new().with_device(
//!     DeviceIndex(0),
//!     DeviceDescriptor::new().with_limits(PlatformLimits {
//!         command_list_cost_threshold_min: 500,
//!         ..PlatformLimits::default()
//!     }),
//! );
//! assert!(descriptor.validate().is_ok());
//! ```

use std::collections::BTreeMap;

use crate::error::{ExecuterError, ExecuterResult};
use crate::types::DeviceIndex;

/// Cost model limits used when partitioning scopes into command lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct PlatformLimits {
    /// Minimum cost a command list is allowed to accumulate before a new one
    /// is started.
    pub command_list_cost_threshold_min: u32,
    /// Upper bound on secondary command lists a single scope is split into
    /// (before cost weighting).
    pub command_lists_per_scope_max: u32,
    /// Cost of one draw/dispatch item.
    pub item_cost: u32,
    /// Cost of one attachment (load/store and layout work).
    pub attachment_cost: u32,
    /// Swapchains that may be presented from one command list.
    pub swap_chains_per_command_list: u32,
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            command_list_cost_threshold_min: 250,
            command_lists_per_scope_max: 16,
            item_cost: 1,
            attachment_cost: 8,
            swap_chains_per_command_list: 8,
        }
    }
}

impl PlatformLimits {
    /// Check the limits for values the partition pass cannot work with.
    pub fn validate(&self, device: DeviceIndex) -> ExecuterResult<()> {
        let reason = if self.command_list_cost_threshold_min == 0 {
            Some("command list cost threshold must be non-zero")
        } else if self.command_lists_per_scope_max == 0 {
            Some("command lists per scope must be non-zero")
        } else if self.swap_chains_per_command_list == 0 {
            Some("at least one swapchain per command list is required")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ExecuterError::InvalidLimits { device, reason }),
            None => Ok(()),
        }
    }

    /// Cost budget of one command list for a scope with `estimated_item_count` items.
    pub fn command_list_cost_threshold(&self, estimated_item_count: u32) -> u32 {
        self.command_list_cost_threshold_min.max(
            estimated_item_count.div_ceil(self.command_lists_per_scope_max),
        )
    }

    /// Weighted cost of a scope.
    pub fn scope_cost(&self, estimated_item_count: u32, attachment_count: u32) -> u32 {
        estimated_item_count
            .saturating_mul(self.item_cost)
            .saturating_add(attachment_count.saturating_mul(self.attachment_cost))
    }
}

/// Optional device capabilities relevant to scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct DeviceFeatures {
    /// The device can signal fences from the CPU. Swapchain semaphore
    /// tracking is only engaged on such devices.
    pub signal_fence_from_cpu: bool,
}

/// Configuration of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct DeviceDescriptor {
    pub limits: PlatformLimits,
    pub features: DeviceFeatures,
}

impl DeviceDescriptor {
    /// Create a descriptor with default limits and no optional features.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the platform limits.
    pub fn with_limits(mut self, limits: PlatformLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the device features.
    pub fn with_features(mut self, features: DeviceFeatures) -> Self {
        self.features = features;
        self
    }

    /// Enable or disable CPU-side fence signalling.
    pub fn with_signal_fence_from_cpu(mut self, enabled: bool) -> Self {
        self.features.signal_fence_from_cpu = enabled;
        self
    }
}

/// Executer configuration, keyed by device index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecuterDescriptor {
    pub devices: BTreeMap<DeviceIndex, DeviceDescriptor>,
}

impl ExecuterDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the configuration of a device.
    pub fn with_device(mut self, index: DeviceIndex, descriptor: DeviceDescriptor) -> Self {
        self.devices.insert(index, descriptor);
        self
    }

    /// Validate every registered device.
    ///
    /// An empty descriptor is rejected: nothing could ever be scheduled.
    pub fn validate(&self) -> ExecuterResult<()> {
        if self.devices.is_empty() {
            return Err(ExecuterError::MissingDeviceLimits(DeviceIndex::default()));
        }
        for (&index, device) in &self.devices {
            device.limits.validate(index)?;
        }
        Ok(())
    }
}
