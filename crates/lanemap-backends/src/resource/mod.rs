//! Resource trait, geometry types and typed buffer helpers

mod barrier;
mod completion;
mod scoped;
mod traits;
mod types;

pub use barrier::{BarrierPoisoned, LaneBarrier};
pub use completion::{Completion, Ticket};
pub use scoped::ScopedBuffer;
pub use traits::{ExecutionResource, LaneKernel};
pub use types::{BlockDim, BufferHandle, Dim3, GridDim, LaneContext, LaunchDims, NdRange};

use crate::error::Result;
use bytemuck::Pod;

/// Acquire a buffer on `resource` and fill it with `data`.
pub fn upload<T: Pod>(resource: &dyn ExecutionResource, data: &[T]) -> Result<BufferHandle> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let handle = resource.acquire(bytes.len())?;
    if let Err(err) = resource.copy_to_buffer(handle, bytes) {
        let _ = resource.release(handle);
        return Err(err);
    }
    Ok(handle)
}

/// Read `len` elements of `T` from the start of a buffer.
pub fn download<T: Pod>(resource: &dyn ExecutionResource, handle: BufferHandle, len: usize) -> Result<Vec<T>> {
    let mut values = vec![<T as bytemuck::Zeroable>::zeroed(); len];
    resource.copy_from_buffer(handle, bytemuck::cast_slice_mut(&mut values))?;
    Ok(values)
}
