//! Error types for kernel execution

use lanemap_backends::BackendError;

/// Result type for kernel execution
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors that can occur while running a kernel policy
///
/// Binding a closure to the wrong index type is not here: it is a compile error.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Geometry fitting, buffer, submission or lane failure from the resource
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The configured rayon pool could not be built
    #[error("thread pool construction failed: {0}")]
    ThreadPool(String),

    /// Runtime configuration could not be read
    #[error("invalid runtime configuration: {0}")]
    Config(String),
}

impl KernelError {
    /// True when a direct mapping did not fit the resource.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_capacity())
    }

    /// True when the resource refused a buffer.
    pub fn is_resource_acquisition(&self) -> bool {
        matches!(self, Self::Backend(BackendError::ResourceAcquisition { .. }))
    }
}
