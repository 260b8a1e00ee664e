//! Error types for resource operations

use crate::resource::BarrierPoisoned;
use std::fmt;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Which physical count a capacity error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CapacityLevel {
    /// Lanes per work-group along one axis.
    Lanes,
    /// Work-groups along one axis.
    Groups,
}

impl fmt::Display for CapacityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityLevel::Lanes => f.write_str("lanes per group"),
            CapacityLevel::Groups => f.write_str("groups"),
        }
    }
}

/// Errors that can occur while fitting, staging or running a launch
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A direct mapping needs more lanes or groups than the resource can address
    #[error("capacity exceeded on axis {axis}: {required} {level} required, {available} available")]
    Capacity {
        axis: usize,
        level: CapacityLevel,
        required: usize,
        available: usize,
    },

    /// The lanes required per work-group exceed the work-group size limit
    #[error("work-group capacity exceeded: {required} lanes required, {available} available")]
    WorkGroupCapacity { required: usize, available: usize },

    /// The resource refused an allocation
    #[error("resource acquisition failed for {requested} bytes: {reason}")]
    ResourceAcquisition { requested: usize, reason: String },

    /// Invalid buffer handle
    #[error("invalid buffer handle: {0}")]
    InvalidBufferHandle(u64),

    /// Buffer access out of bounds
    #[error("buffer access out of bounds: offset {offset} + size {size} > buffer size {buffer_size}")]
    BufferOutOfBounds {
        offset: usize,
        size: usize,
        buffer_size: usize,
    },

    /// The buffer holds a staged object, not raw bytes (or the reverse)
    #[error("buffer {handle} holds {found}, expected {expected}")]
    BufferContents {
        handle: u64,
        expected: &'static str,
        found: &'static str,
    },

    /// A staged object could not be viewed as the requested state type
    #[error("staged object in buffer {0} has an unexpected type")]
    StagedTypeMismatch(u64),

    /// The resource could not accept the submission
    #[error("submission failed: {0}")]
    Submission(String),

    /// A lane panicked while walking the statement tree
    #[error("lane panicked: {0}")]
    LanePanicked(String),

    /// Device limits could not be parsed
    #[error("invalid device limits: {0}")]
    InvalidLimits(String),
}

impl BackendError {
    /// Create a resource acquisition error
    pub fn acquisition(requested: usize, reason: impl Into<String>) -> Self {
        Self::ResourceAcquisition {
            requested,
            reason: reason.into(),
        }
    }

    /// Create a submission error
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// True for both capacity variants.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Capacity { .. } | Self::WorkGroupCapacity { .. })
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else if let Some(poisoned) = payload.downcast_ref::<BarrierPoisoned>() {
            poisoned.to_string()
        } else {
            "non-string panic payload".to_string()
        };
        Self::LanePanicked(message)
    }
}
