//! Scoped buffer acquisition

use super::traits::ExecutionResource;
use super::types::BufferHandle;
use crate::error::Result;
use lanemap_tracing::perf_event;
use std::fmt;
use std::sync::Arc;

/// A buffer released back to its resource when dropped
pub struct ScopedBuffer {
    resource: Arc<dyn ExecutionResource>,
    handle: BufferHandle,
    size: usize,
}

impl ScopedBuffer {
    /// Acquire `size` bytes from `resource`.
    pub fn acquire(resource: &Arc<dyn ExecutionResource>, size: usize) -> Result<Self> {
        let handle = resource.acquire(size)?;
        perf_event!("buffer_acquired", resource = resource.name(), handle = handle.id(), bytes = size);
        Ok(Self {
            resource: Arc::clone(resource),
            handle,
            size,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn resource(&self) -> &Arc<dyn ExecutionResource> {
        &self.resource
    }
}

impl fmt::Debug for ScopedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedBuffer")
            .field("resource", &self.resource.name())
            .field("handle", &self.handle)
            .field("size", &self.size)
            .finish()
    }
}

impl Drop for ScopedBuffer {
    fn drop(&mut self) {
        match self.resource.release(self.handle) {
            Ok(()) => {
                perf_event!("buffer_released", resource = self.resource.name(), handle = self.handle.id());
            }
            Err(err) => {
                tracing::warn!(handle = %self.handle, error = %err, "failed to release scoped buffer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::limits::DeviceLimits;
    use crate::resources::HostResource;

    #[test]
    fn drop_releases_the_buffer() {
        let host = Arc::new(HostResource::new());
        let resource: Arc<dyn ExecutionResource> = host.clone();

        let buffer = ScopedBuffer::acquire(&resource, 32).unwrap();
        assert_eq!(host.live_buffers(), 1);
        assert_eq!(resource.buffer_size(buffer.handle()).unwrap(), buffer.size());

        drop(buffer);
        assert_eq!(host.live_buffers(), 0);
    }

    #[test]
    fn failed_acquire_holds_nothing() {
        let host = Arc::new(HostResource::with_limits(DeviceLimits::host().with_memory_capacity(16)));
        let resource: Arc<dyn ExecutionResource> = host.clone();

        let err = ScopedBuffer::acquire(&resource, 64).unwrap_err();
        assert!(matches!(err, BackendError::ResourceAcquisition { requested: 64, .. }));
        assert_eq!(host.live_buffers(), 0);
    }

    #[test]
    fn double_release_is_only_logged() {
        let host = Arc::new(HostResource::new());
        let resource: Arc<dyn ExecutionResource> = host.clone();

        let buffer = ScopedBuffer::acquire(&resource, 8).unwrap();
        resource.release(buffer.handle()).unwrap();
        drop(buffer);
        assert_eq!(host.live_buffers(), 0);
    }
}
