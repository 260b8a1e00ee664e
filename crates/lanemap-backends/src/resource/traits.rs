//! Execution resource trait
//!
//! The kernel engine reaches buffers, submission and synchronization only
//! through this trait, so a statement tree runs unchanged on any resource.

use super::completion::Completion;
use super::types::{BufferHandle, LaneContext, NdRange};
use crate::error::Result;
use crate::limits::DeviceLimits;
use std::any::Any;
use std::sync::Arc;

/// Work submitted to a resource: one call per lane of the range
pub trait LaneKernel: Send + Sync {
    /// True when lanes of one group wait on each other at a barrier. The
    /// resource must then run every lane of a group concurrently.
    fn uses_barrier(&self) -> bool;

    /// Run the kernel for one lane.
    fn run_lane(&self, lane: &LaneContext<'_>);
}

/// A place kernels run: memory plus a submission queue
///
/// # Architecture
///
/// ```text
/// ┌──────────────────────────────────────────────────┐
/// │               ExecutionResource                  │
/// │  - limits()            geometry fitting input    │
/// │  - acquire / release   scoped state buffers      │
/// │  - copy / stage        move data into buffers    │
/// │  - submit / wait       run an NdRange            │
/// └────────────────────┬─────────────────────────────┘
///                      │
///            ┌─────────┴─────────┐
///            ▼                   ▼
///     ┌─────────────┐     ┌─────────────┐
///     │    Host     │     │    Queue    │
///     │ (sync, rayon)│    │  (async)    │
///     └─────────────┘     └─────────────┘
/// ```
///
/// # Lifecycle of a launch
///
/// `acquire` → `stage` → `submit` → wait on the [`Completion`] → `release`.
/// Every successful `acquire` is matched by exactly one `release`, also when
/// a later step fails; [`crate::ScopedBuffer`] enforces this.
pub trait ExecutionResource: Send + Sync + 'static {
    /// Short name used in logs and launch reports.
    fn name(&self) -> &str;

    /// Addressing limits used to fit launch geometry.
    fn limits(&self) -> &DeviceLimits;

    // ============================================================================================
    // Buffers
    // ============================================================================================

    /// Acquire a zeroed buffer of `size` bytes.
    fn acquire(&self, size: usize) -> Result<BufferHandle>;

    /// Release a buffer. Releasing an unknown handle is an error.
    fn release(&self, handle: BufferHandle) -> Result<()>;

    /// Copy bytes into the start of a buffer.
    fn copy_to_buffer(&self, handle: BufferHandle, data: &[u8]) -> Result<()>;

    /// Copy bytes out of the start of a buffer.
    fn copy_from_buffer(&self, handle: BufferHandle, data: &mut [u8]) -> Result<()>;

    /// Size in bytes of an acquired buffer.
    fn buffer_size(&self, handle: BufferHandle) -> Result<usize>;

    /// Place an object in a buffer, replacing its bytes.
    fn stage(&self, handle: BufferHandle, object: Arc<dyn Any + Send + Sync>) -> Result<()>;

    /// Fetch the object previously staged in a buffer.
    fn fetch_staged(&self, handle: BufferHandle) -> Result<Arc<dyn Any + Send + Sync>>;

    // ============================================================================================
    // Execution
    // ============================================================================================

    /// Run `kernel` once per lane of `range`.
    ///
    /// Synchronous resources return after every lane finished. Asynchronous
    /// resources may return as soon as the work is queued; the kernel is
    /// dropped when it completes, before the returned [`Completion`] fires.
    fn submit(&self, range: NdRange, kernel: Arc<dyn LaneKernel>) -> Result<Completion>;

    /// Block until all submitted work has completed.
    ///
    /// Reports the first failure among submissions whose [`Completion`] was
    /// dropped unwaited; a failure claimed through [`Completion::wait`] is
    /// reported there only.
    fn wait(&self) -> Result<()>;
}
