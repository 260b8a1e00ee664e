//! Synchronous host resource
//!
//! Runs submitted ranges on the calling thread's rayon pool and returns
//! when every lane finished, so [`ExecutionResource::wait`] has nothing to do.

use super::memory::MemoryManager;
use super::scheduler;
use crate::error::Result;
use crate::limits::DeviceLimits;
use crate::resource::{BufferHandle, Completion, ExecutionResource, LaneKernel, NdRange};
use lanemap_tracing::performance::{record_transfer, Transfer};
use lanemap_tracing::{perf_span, timed_block};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;

/// Host resource executing lanes on rayon
#[derive(Clone)]
pub struct HostResource {
    memory: Arc<RwLock<MemoryManager>>,
    limits: DeviceLimits,
}

impl HostResource {
    /// Create a host resource with [`DeviceLimits::host`].
    ///
    /// ```rust
    /// use lanemap_backends::{ExecutionResource, HostResource};
    ///
    /// let host = HostResource::new();
    /// assert_eq!(host.name(), "host");
    /// ```
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::host())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            memory: Arc::new(RwLock::new(MemoryManager::new(limits.memory_capacity))),
            limits,
        }
    }

    /// Buffers acquired and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.memory.read().live_buffers()
    }
}

impl Default for HostResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionResource for HostResource {
    fn name(&self) -> &str {
        "host"
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn acquire(&self, size: usize) -> Result<BufferHandle> {
        self.memory.write().allocate(size)
    }

    fn release(&self, handle: BufferHandle) -> Result<()> {
        self.memory.write().free(handle)
    }

    fn copy_to_buffer(&self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        let (result, duration_us) = timed_block!("host_copy_to_buffer", {
            self.memory.write().copy_to_buffer(handle, data)
        });
        record_transfer(Transfer::ToBuffer, data.len(), duration_us);
        result
    }

    fn copy_from_buffer(&self, handle: BufferHandle, data: &mut [u8]) -> Result<()> {
        let (result, duration_us) = timed_block!("host_copy_from_buffer", {
            self.memory.read().copy_from_buffer(handle, data)
        });
        record_transfer(Transfer::FromBuffer, data.len(), duration_us);
        result
    }

    fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        self.memory.read().buffer_size(handle)
    }

    fn stage(&self, handle: BufferHandle, object: Arc<dyn Any + Send + Sync>) -> Result<()> {
        self.memory.write().stage(handle, object)
    }

    fn fetch_staged(&self, handle: BufferHandle) -> Result<Arc<dyn Any + Send + Sync>> {
        self.memory.read().staged(handle)
    }

    fn submit(&self, range: NdRange, kernel: Arc<dyn LaneKernel>) -> Result<Completion> {
        let _span = perf_span!("host_submit", groups = range.total_groups(), lanes = range.total_lanes());
        scheduler::run_range(&range, kernel.as_ref())?;
        Ok(Completion::done())
    }

    fn wait(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::resource::{download, upload, LaneContext};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn typed_upload_and_download() {
        let host = HostResource::new();
        let data = vec![1.5f32, -2.0, 3.25];
        let handle = upload(&host, &data).unwrap();
        assert_eq!(host.buffer_size(handle).unwrap(), 12);

        let back: Vec<f32> = download(&host, handle, 3).unwrap();
        assert_eq!(back, data);

        host.release(handle).unwrap();
        assert_eq!(host.live_buffers(), 0);
    }

    #[test]
    fn upload_into_exhausted_resource_fails_cleanly() {
        let host = HostResource::with_limits(DeviceLimits::host().with_memory_capacity(8));
        let err = upload(&host, &[0u64; 2]).unwrap_err();
        assert!(matches!(err, BackendError::ResourceAcquisition { requested: 16, .. }));
        assert_eq!(host.live_buffers(), 0);
    }

    struct Count(AtomicUsize);

    impl LaneKernel for Count {
        fn uses_barrier(&self) -> bool {
            false
        }

        fn run_lane(&self, _lane: &LaneContext<'_>) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn submit_completes_before_returning() {
        let host = HostResource::new();
        let kernel = Arc::new(Count(AtomicUsize::new(0)));
        let completion = host.submit(NdRange::linear(100, 32), kernel.clone()).unwrap();
        assert!(completion.is_complete());
        assert_eq!(kernel.0.load(Ordering::Relaxed), 128);
        host.wait().unwrap();
    }

    #[test]
    fn clones_share_memory() {
        let host = HostResource::new();
        let other = host.clone();
        let handle = host.acquire(4).unwrap();
        assert_eq!(other.live_buffers(), 1);
        other.release(handle).unwrap();
        assert_eq!(host.live_buffers(), 0);
    }
}
