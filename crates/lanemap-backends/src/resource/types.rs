//! Geometry and handle types shared by resources and the kernel engine

use serde::{Deserialize, Serialize};
use std::fmt;
use super::barrier::LaneBarrier;
use std::panic;

/// Handle to a buffer acquired from an execution resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
    /// Create a new buffer handle
    pub const fn new(id: u64) -> Self {
        BufferHandle(id)
    }

    /// Get the internal ID
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

/// A per-axis count or coordinate (axis 0 = x, 1 = y, 2 = z)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dim3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Dim3 {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self { x: 0, y: 0, z: 0 }
    }

    /// Value along `axis`; axes past z read as zero.
    pub const fn get(&self, axis: usize) -> usize {
        match axis {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => 0,
        }
    }

    /// Set the value along `axis`. Axes past z are ignored.
    pub fn set(&mut self, axis: usize, value: usize) {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            2 => self.z = value,
            _ => {}
        }
    }

    /// Pointwise maximum.
    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }

    /// Product of the three axes.
    pub fn volume(&self) -> usize {
        self.x.saturating_mul(self.y).saturating_mul(self.z)
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Logical launch geometry requested by a statement tree
///
/// `blocks`, `threads` and `global` are what the tree asks for along each
/// axis. `min_blocks` and `min_threads` are the part of that request a direct
/// mapping cannot do without; fitting fails rather than cut below them.
///
/// Sibling and nested requests always combine with [`LaunchDims::max`]: two
/// loops over 8 and 5 lanes need 8 lanes, not 13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchDims {
    pub blocks: Dim3,
    pub threads: Dim3,
    pub global: Dim3,
    pub min_blocks: Dim3,
    pub min_threads: Dim3,
}

impl LaunchDims {
    /// The identity of [`LaunchDims::max`].
    pub const fn zero() -> Self {
        Self {
            blocks: Dim3::zero(),
            threads: Dim3::zero(),
            global: Dim3::zero(),
            min_blocks: Dim3::zero(),
            min_threads: Dim3::zero(),
        }
    }

    /// Pointwise maximum of every field.
    pub fn max(self, other: Self) -> Self {
        Self {
            blocks: self.blocks.max(other.blocks),
            threads: self.threads.max(other.threads),
            global: self.global.max(other.global),
            min_blocks: self.min_blocks.max(other.min_blocks),
            min_threads: self.min_threads.max(other.min_threads),
        }
    }

    /// Ask for `count` groups along `axis`, all of them required.
    pub fn require_blocks(mut self, axis: usize, count: usize) -> Self {
        self.blocks.set(axis, self.blocks.get(axis).max(count));
        self.min_blocks.set(axis, self.min_blocks.get(axis).max(count));
        self
    }

    /// Ask for `count` lanes per group along `axis`, all of them required.
    pub fn require_threads(mut self, axis: usize, count: usize) -> Self {
        self.threads.set(axis, self.threads.get(axis).max(count));
        self.min_threads.set(axis, self.min_threads.get(axis).max(count));
        self
    }

    /// Ask for `count` groups along `axis`; fewer is acceptable.
    pub fn request_blocks(mut self, axis: usize, count: usize) -> Self {
        self.blocks.set(axis, self.blocks.get(axis).max(count));
        self
    }

    /// Ask for `count` lanes per group along `axis`; fewer is acceptable.
    pub fn request_threads(mut self, axis: usize, count: usize) -> Self {
        self.threads.set(axis, self.threads.get(axis).max(count));
        self
    }

    /// Ask for `count` lanes in total along `axis`.
    pub fn require_global(mut self, axis: usize, count: usize) -> Self {
        self.global.set(axis, self.global.get(axis).max(count));
        self
    }
}

impl fmt::Display for LaunchDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blocks={} threads={} global={}",
            self.blocks, self.threads, self.global
        )
    }
}

/// Three positive extents with `1` on unused axes.
macro_rules! extent3 {
    ($(#[$meta:meta])* $name:ident, $total:ident: $total_ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            pub x: u32,
            pub y: u32,
            pub z: u32,
        }

        impl $name {
            pub const fn new(x: u32, y: u32, z: u32) -> Self {
                Self { x, y, z }
            }

            /// Only `x` is used.
            pub const fn linear(x: u32) -> Self {
                Self { x, y: 1, z: 1 }
            }

            /// Extent along `axis`; axes past z count as 1.
            pub const fn get(&self, axis: usize) -> u32 {
                match axis {
                    0 => self.x,
                    1 => self.y,
                    2 => self.z,
                    _ => 1,
                }
            }

            pub const fn $total(&self) -> $total_ty {
                self.x as $total_ty * self.y as $total_ty * self.z as $total_ty
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::linear(1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}x{}x{}", self.x, self.y, self.z)
            }
        }
    };
}

extent3!(
    /// Work-groups along each axis.
    GridDim, total_groups: u64
);

extent3!(
    /// Lanes per work-group along each axis.
    BlockDim, total_lanes: u32
);

/// Physical launch: `grid` work-groups of `block` lanes each
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdRange {
    pub grid: GridDim,
    pub block: BlockDim,
}

impl NdRange {
    pub const fn new(grid: GridDim, block: BlockDim) -> Self {
        Self { grid, block }
    }

    /// 1D range covering `total` lanes with groups of `block_size`
    /// (at least one lane per group).
    pub const fn linear(total: u32, block_size: u32) -> Self {
        let block_size = if block_size == 0 { 1 } else { block_size };
        Self {
            grid: GridDim::linear(total.div_ceil(block_size)),
            block: BlockDim::linear(block_size),
        }
    }

    pub const fn total_groups(&self) -> u64 {
        self.grid.total_groups()
    }

    pub const fn lanes_per_group(&self) -> u32 {
        self.block.total_lanes()
    }

    pub const fn total_lanes(&self) -> u64 {
        self.grid.total_groups() * self.block.total_lanes() as u64
    }

    /// Lanes along `axis` across the whole grid.
    pub const fn global_range(&self, axis: usize) -> u64 {
        self.grid.get(axis) as u64 * self.block.get(axis) as u64
    }
}

impl fmt::Display for NdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid={}, block={}", self.grid, self.block)
    }
}

/// Coordinates of one lane inside a running [`NdRange`]
///
/// Lanes of a group that contains a barrier share a [`LaneBarrier`];
/// everywhere else [`LaneContext::barrier`] returns immediately.
#[derive(Debug, Clone, Copy)]
pub struct LaneContext<'a> {
    group_id: Dim3,
    local_id: Dim3,
    range: NdRange,
    barrier: Option<&'a LaneBarrier>,
}

impl<'a> LaneContext<'a> {
    pub const fn new(group_id: Dim3, local_id: Dim3, range: NdRange) -> Self {
        Self {
            group_id,
            local_id,
            range,
            barrier: None,
        }
    }

    /// Attach the barrier shared by every lane of this group.
    pub fn with_barrier(mut self, barrier: &'a LaneBarrier) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub const fn group_id(&self) -> Dim3 {
        self.group_id
    }

    pub const fn local_id(&self) -> Dim3 {
        self.local_id
    }

    pub const fn range(&self) -> NdRange {
        self.range
    }

    /// Work-group index along `axis`.
    pub const fn group(&self, axis: usize) -> usize {
        self.group_id.get(axis)
    }

    /// Lane index within the work-group along `axis`.
    pub const fn local(&self, axis: usize) -> usize {
        self.local_id.get(axis)
    }

    /// Work-groups along `axis`.
    pub const fn group_range(&self, axis: usize) -> usize {
        self.range.grid.get(axis) as usize
    }

    /// Lanes per work-group along `axis`.
    pub const fn local_range(&self, axis: usize) -> usize {
        self.range.block.get(axis) as usize
    }

    /// Lane index across the whole grid along `axis`.
    pub const fn global_id(&self, axis: usize) -> usize {
        self.group(axis) * self.local_range(axis) + self.local(axis)
    }

    pub const fn global_range(&self, axis: usize) -> usize {
        self.group_range(axis) * self.local_range(axis)
    }

    /// Linear lane index within the group, x fastest.
    pub const fn local_linear_index(&self) -> usize {
        let block = self.range.block;
        (self.local_id.z * block.y as usize + self.local_id.y) * block.x as usize + self.local_id.x
    }

    /// Linear group index within the grid, x fastest.
    pub const fn group_linear_index(&self) -> usize {
        let grid = self.range.grid;
        (self.group_id.z * grid.y as usize + self.group_id.y) * grid.x as usize + self.group_id.x
    }

    /// Block until every lane of the group reaches this point.
    ///
    /// If a sibling lane failed, this lane unwinds with a
    /// [`BarrierPoisoned`](super::BarrierPoisoned) payload instead.
    pub fn barrier(&self) {
        if let Some(barrier) = self.barrier {
            if let Err(poisoned) = barrier.wait() {
                panic::resume_unwind(Box::new(poisoned));
            }
        }
    }

    pub const fn has_barrier(&self) -> bool {
        self.barrier.is_some()
    }
}
