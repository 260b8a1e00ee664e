//! Execution resource implementations

mod host;
pub(crate) mod memory;
mod queue;
pub mod scheduler;

pub use host::HostResource;
pub use memory::MemoryManager;
pub use queue::QueueResource;
