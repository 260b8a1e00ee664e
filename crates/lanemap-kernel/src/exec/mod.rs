//! Statement executors
//!
//! [`HostStatement`] walks the part of a kernel that runs on the calling
//! thread; [`LaneStatement`] walks the part submitted to a resource, once per
//! lane. Which implementation runs is decided by the statement's type.

pub mod host;
pub mod lane;
mod list;

pub use host::{HostContext, HostStatement};
pub use lane::LaneStatement;
