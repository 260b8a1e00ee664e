//! Loop-nest kernels as statement trees
//!
//! A kernel is written once as a type, a tree of statements such as
//! [`For`](statement::For), [`Lambda`](statement::Lambda) and
//! [`DeviceKernel`](statement::DeviceKernel), and runs unchanged on
//! sequential, parallel-host or lane-based resources. The tree is walked
//! twice: once to compute the launch geometry it needs, and once per lane to
//! bind each loop argument to that lane's position.
//!
//! # Architecture
//!
//! ```text
//! KernelPolicy::<Tree>::run(segments, bodies)
//!         │
//!         ▼
//!   HostStatement walk ── SeqExec / ParExec loops, host lambdas
//!         │
//!         ▼ DeviceKernelExt
//!   KernelLauncher: calculate_dimensions → fit → stage → submit → wait
//!         │
//!         ▼ one copy of LoopData per lane
//!   LaneStatement walk ── direct / strided mappings, masked passes, barriers
//! ```
//!
//! # Example
//!
//! ```rust
//! use lanemap_kernel::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), KernelError> {
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = {
//!     let hits = Arc::clone(&hits);
//!     move |_row: usize, _col: usize| {
//!         hits.fetch_add(1, Ordering::Relaxed);
//!     }
//! };
//!
//! type Tree = DeviceKernel<For<0, GroupX, For<1, LocalX, Lambda<0>>>>;
//! let report = KernelPolicy::<Tree>::run_on(
//!     Arc::new(HostResource::new()),
//!     (TypedRange::new(0usize, 8), TypedRange::new(0usize, 32)),
//!     (counter,),
//! )?;
//!
//! assert_eq!(hits.load(Ordering::Relaxed), 8 * 32);
//! assert_eq!(report.launches[0].range.grid.x, 8);
//! # Ok(())
//! # }
//! ```
//!
//! # Typed arguments
//!
//! Each segment declares the index type of its argument, and a lambda's
//! parameters must match. Binding a body that expects another index type is
//! rejected at compile time:
//!
//! ```compile_fail
//! use lanemap_kernel::prelude::*;
//!
//! index_value!(IIdx);
//! index_value!(JIdx);
//!
//! KernelPolicy::<For<0, SeqExec, Lambda<0>>>::run(
//!     (TypedRange::new(IIdx::new(0), IIdx::new(4)),),
//!     (|_j: JIdx| {},),
//! );
//! ```
//!
//! The matching body compiles and runs:
//!
//! ```rust
//! use lanemap_kernel::prelude::*;
//!
//! index_value!(IIdx);
//!
//! # fn main() -> Result<(), KernelError> {
//! KernelPolicy::<For<0, SeqExec, Lambda<0>>>::run(
//!     (TypedRange::new(IIdx::new(0), IIdx::new(4)),),
//!     (|i: IIdx| assert!(i.value() < 4),),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod exec;
pub mod forall;
pub mod index;
pub mod kernel;
pub mod launch;
pub mod policy;
pub mod segment;
pub mod statement;

pub use config::{ResourceKind, RuntimeConfig};
pub use data::{AllSegs, LaneMask, LoopData, Seg};
pub use error::{KernelError, Result};
pub use exec::{HostContext, HostStatement, LaneStatement};
pub use forall::{forall, forall_on};
pub use kernel::{KernelPolicy, KernelReport};
pub use launch::{KernelLauncher, LaunchPhase, LaunchReport};
pub use segment::{ListSegment, Segment, TypedRange};

/// Everything needed to write and run a kernel
pub mod prelude {
    pub use crate::data::{AllSegs, LaneMask, Seg};
    pub use crate::error::KernelError;
    pub use crate::forall::{forall, forall_on};
    pub use crate::index::IndexValue;
    pub use crate::index_value;
    pub use crate::kernel::{KernelPolicy, KernelReport};
    pub use crate::policy::*;
    pub use crate::segment::{ListSegment, Segment, TypedRange};
    pub use crate::statement::*;
    pub use lanemap_backends::{ExecutionResource, HostResource, QueueResource};
}
