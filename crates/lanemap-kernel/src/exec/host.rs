//! Host statement executors

use crate::config::RuntimeConfig;
use crate::data::{BodyAt, LambdaArgs, LaneMask, LoopBody, LoopData};
use crate::error::Result;
use crate::exec::lane::LaneStatement;
use crate::launch::{KernelLauncher, LaunchReport};
use crate::policy::{LaunchPolicy, ParExec, ParRegion, SeqExec, SeqRegion};
use crate::segment::SegmentAt;
use crate::statement::{DeviceKernelExt, For, Lambda, MaskedLambda, Region, SyncThreads};
use lanemap_backends::ExecutionResource;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// A statement that runs on the calling thread (or the rayon pool)
pub trait HostStatement<S, B> {
    fn exec(data: &mut LoopData<S, B>, ctx: &HostContext) -> Result<()>;
}

/// What host statements need: the resource kernels launch on, the pool
/// parallel loops run in, and the reports of finished launches.
pub struct HostContext {
    resource: Arc<dyn ExecutionResource>,
    pool: Option<Arc<rayon::ThreadPool>>,
    launches: Mutex<Vec<LaunchReport>>,
}

impl HostContext {
    pub fn new(resource: Arc<dyn ExecutionResource>) -> Self {
        Self {
            resource,
            pool: None,
            launches: Mutex::new(Vec::new()),
        }
    }

    /// Run `ParExec` loops and `ParRegion` bodies in `pool` instead of the
    /// global rayon pool.
    pub fn with_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let context = Self::new(config.build_resource()?);
        Ok(match config.build_pool()? {
            Some(pool) => context.with_pool(Arc::new(pool)),
            None => context,
        })
    }

    pub fn resource(&self) -> &Arc<dyn ExecutionResource> {
        &self.resource
    }

    pub fn pool(&self) -> Option<&rayon::ThreadPool> {
        self.pool.as_deref()
    }

    pub(crate) fn record(&self, report: LaunchReport) {
        self.launches.lock().push(report);
    }

    /// Reports of every launch since the last call.
    pub fn take_reports(&self) -> Vec<LaunchReport> {
        std::mem::take(&mut *self.launches.lock())
    }

    fn install<R: Send>(&self, work: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("resource", &self.resource.name())
            .field("pool_threads", &self.pool.as_ref().map(|pool| pool.current_num_threads()))
            .field("launches", &self.launches.lock().len())
            .finish()
    }
}

impl<const ARG: usize, Body, S, B> HostStatement<S, B> for For<ARG, SeqExec, Body>
where
    S: SegmentAt<ARG>,
    Body: HostStatement<S, B>,
{
    fn exec(data: &mut LoopData<S, B>, ctx: &HostContext) -> Result<()> {
        let len = data.segment_length::<ARG>();
        for i in 0..len {
            data.assign_offset::<ARG>(i);
            Body::exec(data, ctx)?;
        }
        Ok(())
    }
}

impl<const ARG: usize, Body, S, B> HostStatement<S, B> for For<ARG, ParExec, Body>
where
    S: SegmentAt<ARG> + Clone + Send + Sync,
    B: Clone + Send + Sync,
    Body: HostStatement<S, B>,
{
    fn exec(data: &mut LoopData<S, B>, ctx: &HostContext) -> Result<()> {
        let len = data.segment_length::<ARG>();
        let shared = &*data;
        ctx.install(|| {
            (0..len).into_par_iter().try_for_each(|i| {
                let mut local = shared.clone();
                local.assign_offset::<ARG>(i);
                Body::exec(&mut local, ctx)
            })
        })
    }
}

impl<const L: usize, A, S, B> HostStatement<S, B> for Lambda<L, A>
where
    B: BodyAt<L>,
    A: LambdaArgs<S>,
    <B as BodyAt<L>>::Body: LoopBody<<A as LambdaArgs<S>>::Values>,
{
    #[inline]
    fn exec(data: &mut LoopData<S, B>, _ctx: &HostContext) -> Result<()> {
        data.invoke::<L, A>();
        Ok(())
    }
}

impl<const L: usize, S, B> HostStatement<S, B> for MaskedLambda<L>
where
    B: BodyAt<L>,
    <B as BodyAt<L>>::Body: LoopBody<(LaneMask,)>,
{
    #[inline]
    fn exec(data: &mut LoopData<S, B>, _ctx: &HostContext) -> Result<()> {
        data.body::<L>().invoke((LaneMask::host(*data.offsets()),));
        Ok(())
    }
}

impl<Body, S, B> HostStatement<S, B> for Region<SeqRegion, Body>
where
    Body: HostStatement<S, B>,
{
    fn exec(data: &mut LoopData<S, B>, ctx: &HostContext) -> Result<()> {
        Body::exec(data, ctx)
    }
}

impl<Body, S, B> HostStatement<S, B> for Region<ParRegion, Body>
where
    S: Send,
    B: Send,
    Body: HostStatement<S, B>,
{
    fn exec(data: &mut LoopData<S, B>, ctx: &HostContext) -> Result<()> {
        ctx.install(|| Body::exec(data, ctx))
    }
}

// Parallel host loops join before returning, so there is nothing to wait for.
impl<S, B> HostStatement<S, B> for SyncThreads {
    #[inline]
    fn exec(_data: &mut LoopData<S, B>, _ctx: &HostContext) -> Result<()> {
        Ok(())
    }
}

impl<L, Body, S, B> HostStatement<S, B> for DeviceKernelExt<L, Body>
where
    L: LaunchPolicy,
    Body: LaneStatement<S, B> + 'static,
    S: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn exec(data: &mut LoopData<S, B>, ctx: &HostContext) -> Result<()> {
        let report = KernelLauncher::for_policy::<L>(Arc::clone(ctx.resource())).launch::<Body, S, B>(data)?;
        ctx.record(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::TypedRange;
    use lanemap_backends::HostResource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> HostContext {
        HostContext::new(Arc::new(HostResource::new()))
    }

    #[test]
    fn sequential_loop_visits_in_order() {
        let seen = Mutex::new(Vec::new());
        let mut data = LoopData::new((TypedRange::new(3i64, 7),), (|i: i64| seen.lock().push(i),));
        <For<0, SeqExec, Lambda<0>> as HostStatement<_, _>>::exec(&mut data, &context()).unwrap();
        assert_eq!(*seen.lock(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn parallel_loop_covers_every_index_once() {
        let hits: Vec<AtomicUsize> = (0..64).map(|_| AtomicUsize::new(0)).collect();
        let bump = |i: usize| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        };
        let mut data = LoopData::new((TypedRange::new(0usize, 64),), (bump,));
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        let ctx = context().with_pool(Arc::new(pool));

        <Region<ParRegion, For<0, ParExec, Lambda<0>>> as HostStatement<_, _>>::exec(&mut data, &ctx).unwrap();
        assert!(hits.iter().all(|hit| hit.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn masked_lambda_on_host_is_always_active() {
        let masks = Mutex::new(Vec::new());
        let mut data = LoopData::new((TypedRange::new(0usize, 2),), (|mask: LaneMask| masks.lock().push(mask),));
        <(For<0, SeqExec, (MaskedLambda<0>, SyncThreads)>,) as HostStatement<_, _>>::exec(&mut data, &context()).unwrap();

        let masks = masks.into_inner();
        assert_eq!(masks.len(), 2);
        assert!(masks.iter().all(|mask| mask.active));
        assert_eq!(masks[1].offsets.get(0), 1);
    }

    #[test]
    fn context_debug_names_resource() {
        let ctx = context();
        assert!(format!("{ctx:?}").contains("host"));
        assert!(ctx.take_reports().is_empty());
    }
}
