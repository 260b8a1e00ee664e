//! Buffer storage shared by the host and queue resources
//!
//! A buffer holds either raw bytes (written with `copy_to_buffer`) or one
//! staged object (written with `stage`). Staging keeps the buffer's byte
//! size for capacity accounting.

use crate::error::{BackendError, Result};
use crate::resource::BufferHandle;
use lanemap_tracing::perf_event;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

enum Allocation {
    Bytes(Vec<u8>),
    Staged {
        size: usize,
        object: Arc<dyn Any + Send + Sync>,
    },
}

impl Allocation {
    fn size(&self) -> usize {
        match self {
            Allocation::Bytes(bytes) => bytes.len(),
            Allocation::Staged { size, .. } => *size,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Allocation::Bytes(_) => "bytes",
            Allocation::Staged { .. } => "a staged object",
        }
    }
}

/// Buffer table with optional capacity accounting
pub struct MemoryManager {
    allocations: HashMap<u64, Allocation>,
    next_buffer_id: u64,
    capacity: Option<usize>,
    in_use: usize,
}

impl MemoryManager {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            allocations: HashMap::new(),
            next_buffer_id: 1,
            capacity,
            in_use: 0,
        }
    }

    /// Allocate a zeroed buffer.
    pub fn allocate(&mut self, size: usize) -> Result<BufferHandle> {
        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(self.in_use);
            if size > available {
                return Err(BackendError::acquisition(
                    size,
                    format!("{available} of {capacity} bytes available"),
                ));
            }
        }

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.allocations.insert(id, Allocation::Bytes(vec![0u8; size]));
        self.in_use += size;

        perf_event!("allocate", handle = id, bytes = size, in_use = self.in_use);
        Ok(BufferHandle::new(id))
    }

    /// Free a buffer.
    pub fn free(&mut self, handle: BufferHandle) -> Result<()> {
        let allocation = self
            .allocations
            .remove(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        self.in_use -= allocation.size();
        Ok(())
    }

    /// Copy data to the start of a byte buffer.
    pub fn copy_to_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        let buffer = self.bytes_mut(handle)?;
        if data.len() > buffer.len() {
            return Err(BackendError::BufferOutOfBounds {
                offset: 0,
                size: data.len(),
                buffer_size: buffer.len(),
            });
        }
        buffer[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy data from the start of a byte buffer.
    pub fn copy_from_buffer(&self, handle: BufferHandle, data: &mut [u8]) -> Result<()> {
        let buffer = match self.get(handle)? {
            Allocation::Bytes(bytes) => bytes,
            other => return Err(contents_error(handle, "bytes", other)),
        };
        if data.len() > buffer.len() {
            return Err(BackendError::BufferOutOfBounds {
                offset: 0,
                size: data.len(),
                buffer_size: buffer.len(),
            });
        }
        data.copy_from_slice(&buffer[..data.len()]);
        Ok(())
    }

    pub fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        Ok(self.get(handle)?.size())
    }

    /// Replace a buffer's contents with a staged object.
    pub fn stage(&mut self, handle: BufferHandle, object: Arc<dyn Any + Send + Sync>) -> Result<()> {
        let allocation = self
            .allocations
            .get_mut(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        let size = allocation.size();
        *allocation = Allocation::Staged { size, object };
        Ok(())
    }

    pub fn staged(&self, handle: BufferHandle) -> Result<Arc<dyn Any + Send + Sync>> {
        match self.get(handle)? {
            Allocation::Staged { object, .. } => Ok(Arc::clone(object)),
            other => Err(contents_error(handle, "a staged object", other)),
        }
    }

    /// Number of buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        self.allocations.len()
    }

    /// Bytes currently allocated.
    pub fn bytes_in_use(&self) -> usize {
        self.in_use
    }

    fn get(&self, handle: BufferHandle) -> Result<&Allocation> {
        self.allocations
            .get(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    fn bytes_mut(&mut self, handle: BufferHandle) -> Result<&mut Vec<u8>> {
        match self.allocations.get_mut(&handle.id()) {
            Some(Allocation::Bytes(bytes)) => Ok(bytes),
            Some(other) => Err(contents_error(handle, "bytes", other)),
            None => Err(BackendError::InvalidBufferHandle(handle.id())),
        }
    }
}

fn contents_error(handle: BufferHandle, expected: &'static str, found: &Allocation) -> BackendError {
    BackendError::BufferContents {
        handle: handle.id(),
        expected,
        found: found.kind(),
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(None)
    }
}
