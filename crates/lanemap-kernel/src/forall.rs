//! Single-segment loops
//!
//! Shorthand for the most common kernel: one segment, one body.

use crate::error::Result;
use crate::exec::HostStatement;
use crate::kernel::{KernelPolicy, KernelReport};
use crate::policy::{GlobalDirect, Launch};
use crate::segment::Segment;
use crate::statement::{DeviceKernelExt, For, Lambda};
use lanemap_backends::ExecutionResource;
use std::sync::Arc;

/// Run `body` for every value of `segment` under host policy `P`.
///
/// ```rust
/// use lanemap_kernel::prelude::*;
/// use std::sync::atomic::{AtomicI64, Ordering};
///
/// # fn main() -> Result<(), lanemap_kernel::KernelError> {
/// let sum = AtomicI64::new(0);
/// forall::<ParExec, _, _>(TypedRange::new(1i64, 101), |i| {
///     sum.fetch_add(i, Ordering::Relaxed);
/// })?;
/// assert_eq!(sum.load(Ordering::Relaxed), 5050);
/// # Ok(())
/// # }
/// ```
pub fn forall<P, Sg, F>(segment: Sg, body: F) -> Result<KernelReport>
where
    Sg: Segment,
    F: Fn(Sg::Index),
    For<0, P, Lambda<0>>: HostStatement<(Sg,), (F,)>,
{
    KernelPolicy::<For<0, P, Lambda<0>>>::run((segment,), (body,))
}

/// Launch `body` on `resource`, one lane per value of `segment`, in
/// work-groups of `BLOCK` lanes. Lanes past the end of the segment stay
/// inactive.
///
/// With `ASYNC` the call returns once the work is submitted; call
/// [`ExecutionResource::wait`] before reading its results.
pub fn forall_on<const BLOCK: usize, const ASYNC: bool, Sg, F>(
    resource: Arc<dyn ExecutionResource>,
    segment: Sg,
    body: F,
) -> Result<KernelReport>
where
    Sg: Segment,
    F: Fn(Sg::Index) + Clone + Send + Sync + 'static,
{
    KernelPolicy::<DeviceKernelExt<Launch<ASYNC, BLOCK>, For<0, GlobalDirect<0, BLOCK>, Lambda<0>>>>::run_on(
        resource,
        (segment,),
        (body,),
    )
}
