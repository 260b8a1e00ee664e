//! Kernel launch
//!
//! [`KernelLauncher`] takes a lane statement from its logical geometry to a
//! finished (or detached) submission:
//!
//! ```text
//! Built → DimensionsComputed → ResourcesAcquired → Submitted → Synchronized
//!                                                            ↘ Detached
//! ```
//!
//! The loop state is staged in a buffer owned by a [`ScopedBuffer`] that
//! travels with the submitted kernel. Whichever way the launch ends, the
//! buffer is released exactly once: on an early error when the guard drops,
//! otherwise when the resource drops the kernel after its last lane.
//!
//! A synchronous launch waits on the
//! [`Completion`](lanemap_backends::Completion) of its own submission, not on
//! the resource as a whole, so concurrent launches on one queue each see
//! their own lanes finish.

use crate::data::LoopData;
use crate::error::Result;
use crate::exec::LaneStatement;
use crate::policy::LaunchPolicy;
use lanemap_backends::{
    BackendError, ExecutionResource, LaneContext, LaneKernel, LaunchDims, NdRange, ScopedBuffer,
};
use lanemap_tracing::performance::LaunchSample;
use lanemap_tracing::{perf_span, timed_block};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a launch is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchPhase {
    Built,
    DimensionsComputed,
    ResourcesAcquired,
    Submitted,
    Synchronized,
    Detached,
}

impl LaunchPhase {
    /// True once the launch can no longer fail.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Synchronized | Self::Detached)
    }
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Built => "built",
            Self::DimensionsComputed => "dimensions_computed",
            Self::ResourcesAcquired => "resources_acquired",
            Self::Submitted => "submitted",
            Self::Synchronized => "synchronized",
            Self::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// Outcome of one launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchReport {
    pub resource: String,
    /// Geometry the statement tree asked for.
    pub dims: LaunchDims,
    /// Range the resource ran.
    pub range: NdRange,
    pub asynchronous: bool,
    pub phase: LaunchPhase,
    /// Bytes acquired to stage the loop state.
    pub state_bytes: usize,
}

/// Drives one launch through its phases
pub struct KernelLauncher {
    resource: Arc<dyn ExecutionResource>,
    asynchronous: bool,
    max_threads: usize,
    phase: LaunchPhase,
}

impl KernelLauncher {
    pub fn new(resource: Arc<dyn ExecutionResource>, asynchronous: bool, max_threads: usize) -> Self {
        Self {
            resource,
            asynchronous,
            max_threads,
            phase: LaunchPhase::Built,
        }
    }

    pub fn for_policy<L: LaunchPolicy>(resource: Arc<dyn ExecutionResource>) -> Self {
        Self::new(resource, L::ASYNC, L::MAX_THREADS)
    }

    pub fn phase(&self) -> LaunchPhase {
        self.phase
    }

    fn advance(&mut self, next: LaunchPhase) {
        debug!(resource = self.resource.name(), from = %self.phase, to = %next, "launch phase");
        self.phase = next;
    }

    /// Run `Body` over `data` on the launcher's resource.
    ///
    /// Every lane starts from its own copy of `data` with `active = true`.
    pub fn launch<Body, S, B>(&mut self, data: &LoopData<S, B>) -> Result<LaunchReport>
    where
        Body: LaneStatement<S, B> + 'static,
        S: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
    {
        let _span = perf_span!("kernel_launch", resource = self.resource.name());

        let dims = Body::calculate_dimensions(data);
        let range = self
            .resource
            .limits()
            .fit(&dims, self.max_threads)
            .inspect_err(|err| warn!(resource = self.resource.name(), %dims, error = %err, "launch geometry does not fit"))?;
        debug!(%dims, %range, "launch geometry");
        self.advance(LaunchPhase::DimensionsComputed);

        let state_bytes = std::mem::size_of::<LoopData<S, B>>().max(1);
        let buffer = ScopedBuffer::acquire(&self.resource, state_bytes)?;
        self.resource.stage(buffer.handle(), Arc::new(data.clone()))?;
        let state = self
            .resource
            .fetch_staged(buffer.handle())?
            .downcast::<LoopData<S, B>>()
            .map_err(|_| BackendError::StagedTypeMismatch(buffer.handle().id()))?;
        self.advance(LaunchPhase::ResourcesAcquired);

        let kernel = StagedKernel::<Body, S, B> {
            state,
            _buffer: buffer,
            _body: PhantomData,
        };
        let (submitted, duration_us) = timed_block!("kernel_submit", {
            match self.resource.submit(range, Arc::new(kernel)) {
                Ok(completion) => {
                    self.advance(LaunchPhase::Submitted);
                    if self.asynchronous {
                        // The resource-wide wait reports this submission.
                        drop(completion);
                        Ok(())
                    } else {
                        completion.wait()
                    }
                }
                Err(err) => Err(err),
            }
        });
        submitted?;
        self.advance(if self.asynchronous {
            LaunchPhase::Detached
        } else {
            LaunchPhase::Synchronized
        });

        LaunchSample {
            resource: self.resource.name(),
            groups: range.total_groups(),
            lanes_per_group: u64::from(range.lanes_per_group()),
            asynchronous: self.asynchronous,
            elapsed_us: duration_us,
        }
        .record();

        Ok(LaunchReport {
            resource: self.resource.name().to_string(),
            dims,
            range,
            asynchronous: self.asynchronous,
            phase: self.phase,
            state_bytes,
        })
    }
}

impl fmt::Debug for KernelLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelLauncher")
            .field("resource", &self.resource.name())
            .field("asynchronous", &self.asynchronous)
            .field("max_threads", &self.max_threads)
            .field("phase", &self.phase)
            .finish()
    }
}

/// Staged loop state plus the buffer guard that keeps it alive
struct StagedKernel<Body, S, B> {
    state: Arc<LoopData<S, B>>,
    _buffer: ScopedBuffer,
    _body: PhantomData<fn() -> Body>,
}

impl<Body, S, B> LaneKernel for StagedKernel<Body, S, B>
where
    Body: LaneStatement<S, B>,
    S: Clone + Send + Sync,
    B: Clone + Send + Sync,
{
    fn uses_barrier(&self) -> bool {
        <Body as LaneStatement<S, B>>::USES_BARRIER
    }

    fn run_lane(&self, lane: &LaneContext<'_>) {
        let mut data = (*self.state).clone();
        Body::exec(&mut data, lane, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Launch, LocalX};
    use crate::segment::TypedRange;
    use crate::statement::{For, Lambda};
    use lanemap_backends::{DeviceLimits, HostResource, QueueResource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Counting = For<0, LocalX, Lambda<0>>;

    fn counter_data(len: usize, hits: &Arc<AtomicUsize>) -> LoopData<(TypedRange<usize>,), (impl Fn(usize) + Clone + Send + Sync + 'static,)> {
        let hits = Arc::clone(hits);
        LoopData::new((TypedRange::new(0, len),), (move |_i: usize| {
            hits.fetch_add(1, Ordering::Relaxed);
        },))
    }

    #[test]
    fn synchronous_launch_reaches_synchronized() {
        lanemap_tracing::init_test_tracing();
        let host = HostResource::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let data = counter_data(40, &hits);

        let mut launcher = KernelLauncher::for_policy::<Launch<false, 0>>(Arc::new(host.clone()));
        assert_eq!(launcher.phase(), LaunchPhase::Built);
        let report = launcher.launch::<Counting, _, _>(&data).unwrap();

        assert_eq!(report.phase, LaunchPhase::Synchronized);
        assert!(report.phase.is_final());
        assert_eq!(report.range.block.x, 40);
        assert_eq!(hits.load(Ordering::Relaxed), 40);
        assert_eq!(host.live_buffers(), 0);
    }

    #[test]
    fn asynchronous_launch_detaches_until_wait() {
        let queue = Arc::new(QueueResource::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let data = counter_data(64, &hits);

        let report = KernelLauncher::new(queue.clone(), true, 0)
            .launch::<Counting, _, _>(&data)
            .unwrap();
        assert_eq!(report.phase, LaunchPhase::Detached);
        assert!(report.asynchronous);

        queue.wait().unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 64);
        assert_eq!(queue.live_buffers(), 0);
    }

    #[test]
    fn geometry_failure_stops_before_acquiring() {
        let host = HostResource::with_limits(DeviceLimits::host());
        let hits = Arc::new(AtomicUsize::new(0));
        let data = counter_data(5000, &hits);

        let mut launcher = KernelLauncher::new(Arc::new(host.clone()), false, 0);
        let err = launcher.launch::<Counting, _, _>(&data).unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(launcher.phase(), LaunchPhase::Built);
        assert_eq!(host.live_buffers(), 0);
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn report_serializes_phase_names() {
        let json = serde_json::to_string(&LaunchPhase::DimensionsComputed).unwrap();
        assert_eq!(json, "\"dimensions_computed\"");
        assert_eq!(LaunchPhase::Detached.to_string(), "detached");
    }
}
