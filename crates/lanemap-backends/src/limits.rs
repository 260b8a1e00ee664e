//! Device limits and fitting of logical geometry onto a physical range
//!
//! ```text
//! LaunchDims (what the tree asks for)
//!   │  threads: clamp to per-axis lane limit, shrink to work-group limit,
//!   │           round requested x lanes up to the group multiple when
//!   │           that still fits
//!   │  groups:  max(blocks, ceil(global / threads)), clamp to group limit
//!   ▼
//! NdRange (what the resource runs)
//! ```
//!
//! Required counts (`min_threads`, `min_blocks`, `global`) are never cut:
//! when they do not fit, fitting fails with a capacity error.

use crate::error::{BackendError, CapacityLevel, Result};
use crate::resource::{BlockDim, Dim3, GridDim, LaunchDims, NdRange};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Addressing limits of an execution resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLimits {
    /// Maximum lanes per work-group along each axis.
    pub max_local: Dim3,
    /// Maximum work-groups along each axis.
    pub max_groups: Dim3,
    /// Maximum lanes in one work-group across all axes.
    pub max_work_group_size: usize,
    /// Preferred multiple for lanes along x (sub-group width).
    pub group_multiple: usize,
    /// Total bytes the resource may hand out at once; `None` is unbounded.
    #[serde(default)]
    pub memory_capacity: Option<usize>,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self::host()
    }
}

impl DeviceLimits {
    /// Limits for the multi-core host resource.
    pub fn host() -> Self {
        Self {
            max_local: Dim3::new(1024, 1024, 64),
            max_groups: Dim3::new(i32::MAX as usize, 65_535, 65_535),
            max_work_group_size: 1024,
            group_multiple: 1,
            memory_capacity: None,
        }
    }

    /// Limits shaped like a typical accelerator: 32-wide sub-groups.
    pub fn accelerator() -> Self {
        Self {
            group_multiple: 32,
            ..Self::host()
        }
    }

    pub fn with_memory_capacity(mut self, bytes: usize) -> Self {
        self.memory_capacity = Some(bytes);
        self
    }

    /// Parse limits from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let limits: Self = serde_json::from_str(json).map_err(|err| BackendError::InvalidLimits(err.to_string()))?;
        limits.validate()?;
        Ok(limits)
    }

    /// Read limits from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| BackendError::InvalidLimits(format!("{}: {err}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| BackendError::InvalidLimits(err.to_string()))
    }

    fn validate(&self) -> Result<()> {
        let axes_positive = (0..3).all(|axis| self.max_local.get(axis) > 0 && self.max_groups.get(axis) > 0);
        if !axes_positive || self.max_work_group_size == 0 {
            return Err(BackendError::InvalidLimits(
                "every lane and group limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Fit logical geometry onto a physical range.
    ///
    /// `max_threads` further caps lanes per group (`0` leaves the device
    /// limit in place). Every axis of the result has at least one group and
    /// one lane.
    pub fn fit(&self, dims: &LaunchDims, max_threads: usize) -> Result<NdRange> {
        let group_cap = match max_threads {
            0 => self.max_work_group_size,
            cap => self.max_work_group_size.min(cap),
        }
        .max(1);

        let mut threads = [1usize; 3];
        for (axis, lanes) in threads.iter_mut().enumerate() {
            let available = self.max_local.get(axis).max(1);
            let required = dims.min_threads.get(axis);
            if required > available {
                return Err(BackendError::Capacity {
                    axis,
                    level: CapacityLevel::Lanes,
                    required,
                    available,
                });
            }
            *lanes = dims.threads.get(axis).clamp(1, available);
        }

        // Shrink z, then y, then x until the group fits, never below what is required.
        for axis in [2, 1, 0] {
            let others: usize = (0..3).filter(|&other| other != axis).map(|other| threads[other]).product();
            let allowed = (group_cap / others.max(1)).max(1);
            let floor = dims.min_threads.get(axis).max(1);
            if threads[axis] > allowed {
                threads[axis] = allowed.max(floor);
            }
        }

        let lanes: usize = threads.iter().product();
        if lanes > group_cap {
            let required = (0..3).map(|axis| dims.min_threads.get(axis).max(1)).product();
            return Err(BackendError::WorkGroupCapacity {
                required,
                available: group_cap,
            });
        }

        // Trees that never ask for x lanes run exactly one lane along x.
        let multiple = self.group_multiple.max(1);
        let rounded_x = threads[0].div_ceil(multiple) * multiple;
        if dims.threads.x > 0 && rounded_x <= self.max_local.x && rounded_x * threads[1] * threads[2] <= group_cap {
            threads[0] = rounded_x;
        }

        let mut groups = [1usize; 3];
        for (axis, count) in groups.iter_mut().enumerate() {
            let available = self.max_groups.get(axis).max(1);
            let from_global = dims.global.get(axis).div_ceil(threads[axis]);
            let required = dims.min_blocks.get(axis).max(from_global);
            if required > available {
                return Err(BackendError::Capacity {
                    axis,
                    level: CapacityLevel::Groups,
                    required,
                    available,
                });
            }
            *count = dims.blocks.get(axis).max(from_global).clamp(1, available);
        }

        Ok(NdRange::new(
            GridDim::new(
                to_u32(0, CapacityLevel::Groups, groups[0])?,
                to_u32(1, CapacityLevel::Groups, groups[1])?,
                to_u32(2, CapacityLevel::Groups, groups[2])?,
            ),
            BlockDim::new(
                to_u32(0, CapacityLevel::Lanes, threads[0])?,
                to_u32(1, CapacityLevel::Lanes, threads[1])?,
                to_u32(2, CapacityLevel::Lanes, threads[2])?,
            ),
        ))
    }
}

fn to_u32(axis: usize, level: CapacityLevel, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| BackendError::Capacity {
        axis,
        level,
        required: value,
        available: u32::MAX as usize,
    })
}
