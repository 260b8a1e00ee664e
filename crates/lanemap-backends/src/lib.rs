//! Execution resources for lanemap kernels
//!
//! This crate provides:
//! - **Launch geometry**: [`LaunchDims`] requested by a statement tree and the
//!   [`NdRange`] a resource actually runs
//! - **Device limits**: [`DeviceLimits::fit`] turns one into the other
//! - **Resource trait**: [`ExecutionResource`] for buffers, staging,
//!   submission and synchronization
//! - **Resources**: [`HostResource`] (synchronous) and [`QueueResource`]
//!   (asynchronous submissions joined by `wait`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            lanemap-kernel launcher          │
//! │  calculate_dimensions → fit → stage → submit│
//! └─────────────────────┬───────────────────────┘
//!                       │ Arc<dyn ExecutionResource>
//!             ┌─────────┴─────────┐
//!             ▼                   ▼
//!       ┌───────────┐       ┌───────────┐
//!       │   Host    │       │   Queue   │
//!       └─────┬─────┘       └─────┬─────┘
//!             └──────┬────────────┘
//!                    ▼
//!          scheduler::run_range (rayon / scoped lanes)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use lanemap_backends::{DeviceLimits, ExecutionResource, HostResource, LaunchDims};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let host = HostResource::new();
//!
//! let dims = LaunchDims::zero().require_global(0, 1000).request_threads(0, 256);
//! let range = host.limits().fit(&dims, 0)?;
//! assert_eq!(range.grid.x, 4);
//!
//! let handle = lanemap_backends::upload(&host, &[1.0f32, 2.0, 3.0])?;
//! let values: Vec<f32> = lanemap_backends::download(&host, handle, 3)?;
//! assert_eq!(values, [1.0, 2.0, 3.0]);
//! host.release(handle)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod limits;
pub mod resource;
pub mod resources;

pub use error::{BackendError, CapacityLevel, Result};
pub use limits::DeviceLimits;
pub use resource::{
    download, upload, BarrierPoisoned, BlockDim, BufferHandle, Completion, Dim3, ExecutionResource, GridDim,
    LaneBarrier, LaneContext, LaneKernel, LaunchDims, NdRange, ScopedBuffer,
};
pub use resources::{HostResource, QueueResource};
