//! Asynchronous queue resource
//!
//! Behaves like an accelerator queue: `submit` hands the range to a worker
//! thread and returns a [`Completion`] for it immediately, `wait` joins every
//! outstanding submission. Kernels are dropped on their worker thread once
//! they finish, before the completion fires, which is where launches give
//! their state buffers back.

use super::memory::MemoryManager;
use super::scheduler;
use crate::error::{BackendError, Result};
use crate::limits::DeviceLimits;
use crate::resource::{BufferHandle, Completion, ExecutionResource, LaneKernel, NdRange, Ticket};
use lanemap_tracing::performance::{record_transfer, Transfer};
use lanemap_tracing::{perf_event, timed_block};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct Submission {
    worker: Option<JoinHandle<()>>,
    ticket: Arc<Ticket>,
}

/// Queue resource running each submission on its own worker thread
pub struct QueueResource {
    memory: Arc<RwLock<MemoryManager>>,
    limits: DeviceLimits,
    pending: Mutex<Vec<Submission>>,
    submissions: AtomicU64,
}

impl QueueResource {
    /// Create a queue with [`DeviceLimits::accelerator`].
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::accelerator())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            memory: Arc::new(RwLock::new(MemoryManager::new(limits.memory_capacity))),
            limits,
            pending: Mutex::new(Vec::new()),
            submissions: AtomicU64::new(0),
        }
    }

    /// Submissions neither joined by [`ExecutionResource::wait`] nor claimed
    /// through their [`Completion`].
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn live_buffers(&self) -> usize {
        self.memory.read().live_buffers()
    }
}

impl Default for QueueResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionResource for QueueResource {
    fn name(&self) -> &str {
        "queue"
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
        let (result, duration_us) = timed_block!("queue_copy_to_buffer", {
            self.memory.write().copy_to_buffer(handle, data)
        });
        record_transfer(Transfer::ToBuffer, data.len(), duration_us);
        result
    }

    fn copy_from_buffer(&self, handle: BufferHandle, data: &mut [u8]) -> Result<()> {
        let (result, duration_us) = timed_block!("queue_copy_from_buffer", {
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
        let id = self.submissions.fetch_add(1, Ordering::Relaxed);
        let (completion, ticket) = Completion::pending();
        let worker_ticket = Arc::clone(&ticket);
        let worker = thread::Builder::new()
            .name(format!("lanemap-queue-{id}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| scheduler::run_range(&range, kernel.as_ref())))
                    .unwrap_or_else(|payload| Err(BackendError::from_panic(payload)));
                drop(kernel);
                worker_ticket.finish(result);
            })
            .map_err(|err| BackendError::submission(format!("failed to start queue worker: {err}")))?;

        perf_event!("queue_submit", submission = id, groups = range.total_groups());
        let mut pending = self.pending.lock();
        pending.retain(|submission| !submission.ticket.is_claimed());
        pending.push(Submission {
            worker: Some(worker),
            ticket,
        });
        Ok(completion)
    }

    fn wait(&self) -> Result<()> {
        let submissions = std::mem::take(&mut *self.pending.lock());
        let mut first_error = None;
        let mut held = Vec::new();
        for mut submission in submissions {
            if let Some(worker) = submission.worker.take() {
                if let Err(payload) = worker.join() {
                    first_error.get_or_insert(BackendError::from_panic(payload));
                }
            }
            match submission.ticket.sweep() {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                // Finished, but the completion's holder claims the outcome.
                None => held.push(submission),
            }
        }
        if !held.is_empty() {
            self.pending.lock().extend(held);
        }
        first_error.map_or(Ok(()), Err)
    }
}
