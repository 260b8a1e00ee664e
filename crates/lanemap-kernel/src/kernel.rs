//! Kernel policies
//!
//! `KernelPolicy<Body>` is the entry point: it builds the loop state from the
//! segment and body tuples and walks `Body` on the host. Device kernels
//! inside `Body` launch on the context's resource.

use crate::config::RuntimeConfig;
use crate::data::LoopData;
use crate::error::Result;
use crate::exec::{HostContext, HostStatement};
use crate::launch::LaunchReport;
use lanemap_backends::ExecutionResource;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Launches made by one kernel call, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KernelReport {
    pub launches: Vec<LaunchReport>,
}

impl KernelReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A statement tree bound to nothing yet
///
/// ```rust
/// use lanemap_kernel::prelude::*;
/// use std::sync::Mutex;
///
/// # fn main() -> Result<(), lanemap_kernel::KernelError> {
/// let visited = Mutex::new(Vec::new());
/// KernelPolicy::<For<1, SeqExec, For<0, SeqExec, Lambda<0>>>>::run_on(
///     std::sync::Arc::new(HostResource::new()),
///     (TypedRange::new(0usize, 2), TypedRange::new(10i32, 12)),
///     (|i: usize, j: i32| visited.lock().unwrap().push((i, j)),),
/// )?;
/// assert_eq!(visited.into_inner().unwrap(), [(0, 10), (1, 10), (0, 11), (1, 11)]);
/// # Ok(())
/// # }
/// ```
pub struct KernelPolicy<Body>(PhantomData<fn() -> Body>);

impl<Body> KernelPolicy<Body> {
    /// Run with the resource and pool described by the environment
    /// (see [`RuntimeConfig::from_env`]).
    ///
    /// The resource is private to this call, so asynchronous launches are
    /// waited for before returning and their lane failures reported here.
    pub fn run<S, B>(segments: S, bodies: B) -> Result<KernelReport>
    where
        Body: HostStatement<S, B>,
    {
        let context = HostContext::from_config(&RuntimeConfig::from_env()?)?;
        let outcome = Self::run_with(&context, segments, bodies);
        let drained = context.resource().wait();
        let report = outcome?;
        drained?;
        Ok(report)
    }

    pub fn run_on<S, B>(resource: Arc<dyn ExecutionResource>, segments: S, bodies: B) -> Result<KernelReport>
    where
        Body: HostStatement<S, B>,
    {
        Self::run_with(&HostContext::new(resource), segments, bodies)
    }

    pub fn run_with<S, B>(context: &HostContext, segments: S, bodies: B) -> Result<KernelReport>
    where
        Body: HostStatement<S, B>,
    {
        let mut data = LoopData::new(segments, bodies);
        Body::exec(&mut data, context)?;
        Ok(KernelReport {
            launches: context.take_reports(),
        })
    }
}
