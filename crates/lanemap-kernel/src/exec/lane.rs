//! Lane statement executors
//!
//! Every lane of a launch walks the same statement tree with its own copy of
//! the loop state. `active` starts true and is cleared by direct mappings
//! whose lane lies past the end of the segment, and by the extra pass of
//! strided loops. Inactive lanes keep walking so that every lane of a group
//! reaches the same barriers; only [`MaskedLambda`] bodies run for them.

use crate::data::{BodyAt, LambdaArgs, LaneMask, LoopBody, LoopData};
use crate::policy::{axis, GlobalDirect, GroupDirect, GroupLoop, LocalDirect, LocalLoop, SeqExec};
use crate::segment::SegmentAt;
use crate::statement::{For, Lambda, MaskedLambda, Region, SyncThreads};
use lanemap_backends::{LaneContext, LaunchDims};

/// A statement that runs inside launched lanes
pub trait LaneStatement<S, B> {
    /// True when a [`SyncThreads`] sits anywhere below this statement.
    const USES_BARRIER: bool = false;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool);

    /// Geometry this statement and its children need.
    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims;
}

/// Visit `start, start + stride, ...` below `len`, then make one masked pass
/// if some other lane needed one more step than this one.
///
/// Every lane of the axis makes `ceil(len / stride)` passes, which keeps
/// barriers below the loop balanced.
#[inline]
fn strided<const ARG: usize, Body, S, B>(
    data: &mut LoopData<S, B>,
    lane: &LaneContext<'_>,
    active: bool,
    start: usize,
    stride: usize,
) where
    S: SegmentAt<ARG>,
    Body: LaneStatement<S, B>,
{
    let len = data.segment_length::<ARG>();
    let stride = stride.max(1);
    let mut i = start;
    let mut steps = 0;
    while i < len {
        data.assign_offset::<ARG>(i);
        Body::exec(data, lane, active);
        i += stride;
        steps += 1;
    }
    if steps * stride < len {
        data.assign_offset::<ARG>(i);
        Body::exec(data, lane, false);
    }
}

/// Lanes or groups a strided loop asks for.
#[inline]
const fn strided_request(len: usize, cap: usize) -> usize {
    if cap == 0 || len < cap {
        len
    } else {
        cap
    }
}

impl<const ARG: usize, Body, S, B> LaneStatement<S, B> for For<ARG, SeqExec, Body>
where
    S: SegmentAt<ARG>,
    Body: LaneStatement<S, B>,
{
    const USES_BARRIER: bool = <Body as LaneStatement<S, B>>::USES_BARRIER;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        let len = data.segment_length::<ARG>();
        for i in 0..len {
            data.assign_offset::<ARG>(i);
            Body::exec(data, lane, active);
        }
    }

    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
        Body::calculate_dimensions(data)
    }
}

impl<const ARG: usize, const DIM: usize, const BLOCK: usize, Body, S, B> LaneStatement<S, B>
    for For<ARG, GlobalDirect<DIM, BLOCK>, Body>
where
    S: SegmentAt<ARG>,
    Body: LaneStatement<S, B>,
{
    const USES_BARRIER: bool = <Body as LaneStatement<S, B>>::USES_BARRIER;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        let len = data.segment_length::<ARG>();
        let i = lane.global_id(axis::<DIM>());
        data.assign_offset::<ARG>(i);
        Body::exec(data, lane, active && i < len);
    }

    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
        let len = data.segment_length::<ARG>();
        let own = LaunchDims::zero()
            .require_global(axis::<DIM>(), len)
            .request_threads(DIM, BLOCK);
        Body::calculate_dimensions(data).max(own)
    }
}

impl<const ARG: usize, const DIM: usize, Body, S, B> LaneStatement<S, B> for For<ARG, GroupDirect<DIM>, Body>
where
    S: SegmentAt<ARG>,
    Body: LaneStatement<S, B>,
{
    const USES_BARRIER: bool = <Body as LaneStatement<S, B>>::USES_BARRIER;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        let len = data.segment_length::<ARG>();
        let i = lane.group(axis::<DIM>());
        data.assign_offset::<ARG>(i);
        Body::exec(data, lane, active && i < len);
    }

    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
        let len = data.segment_length::<ARG>();
        Body::calculate_dimensions(data).max(LaunchDims::zero().require_blocks(axis::<DIM>(), len))
    }
}

impl<const ARG: usize, const DIM: usize, Body, S, B> LaneStatement<S, B> for For<ARG, LocalDirect<DIM>, Body>
where
    S: SegmentAt<ARG>,
    Body: LaneStatement<S, B>,
{
    const USES_BARRIER: bool = <Body as LaneStatement<S, B>>::USES_BARRIER;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        let len = data.segment_length::<ARG>();
        let i = lane.local(axis::<DIM>());
        data.assign_offset::<ARG>(i);
        Body::exec(data, lane, active && i < len);
    }

    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
        let len = data.segment_length::<ARG>();
        Body::calculate_dimensions(data).max(LaunchDims::zero().require_threads(axis::<DIM>(), len))
    }
}

impl<const ARG: usize, const DIM: usize, const GROUPS: usize, Body, S, B> LaneStatement<S, B>
    for For<ARG, GroupLoop<DIM, GROUPS>, Body>
where
    S: SegmentAt<ARG>,
    Body: LaneStatement<S, B>,
{
    const USES_BARRIER: bool = <Body as LaneStatement<S, B>>::USES_BARRIER;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        let dim = axis::<DIM>();
        strided::<ARG, Body, S, B>(data, lane, active, lane.group(dim), lane.group_range(dim));
    }

    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
        let groups = strided_request(data.segment_length::<ARG>(), GROUPS);
        Body::calculate_dimensions(data).max(LaunchDims::zero().request_blocks(axis::<DIM>(), groups))
    }
}

impl<const ARG: usize, const DIM: usize, const LANES: usize, Body, S, B> LaneStatement<S, B>
    for For<ARG, LocalLoop<DIM, LANES>, Body>
where
    S: SegmentAt<ARG>,
    Body: LaneStatement<S, B>,
{
    const USES_BARRIER: bool = <Body as LaneStatement<S, B>>::USES_BARRIER;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        let dim = axis::<DIM>();
        strided::<ARG, Body, S, B>(data, lane, active, lane.local(dim), lane.local_range(dim));
    }

    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
        let lanes = strided_request(data.segment_length::<ARG>(), LANES);
        Body::calculate_dimensions(data).max(LaunchDims::zero().request_threads(axis::<DIM>(), lanes))
    }
}

impl<const L: usize, A, S, B> LaneStatement<S, B> for Lambda<L, A>
where
    B: BodyAt<L>,
    A: LambdaArgs<S>,
    <B as BodyAt<L>>::Body: LoopBody<<A as LambdaArgs<S>>::Values>,
{
    #[inline]
    fn exec(data: &mut LoopData<S, B>, _lane: &LaneContext<'_>, active: bool) {
        if active {
            data.invoke::<L, A>();
        }
    }

    fn calculate_dimensions(_data: &LoopData<S, B>) -> LaunchDims {
        LaunchDims::zero()
    }
}

impl<const L: usize, S, B> LaneStatement<S, B> for MaskedLambda<L>
where
    B: BodyAt<L>,
    <B as BodyAt<L>>::Body: LoopBody<(LaneMask,)>,
{
    #[inline]
    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        let mask = LaneMask {
            active,
            group: lane.group_id(),
            local: lane.local_id(),
            offsets: *data.offsets(),
        };
        data.body::<L>().invoke((mask,));
    }

    fn calculate_dimensions(_data: &LoopData<S, B>) -> LaunchDims {
        LaunchDims::zero()
    }
}

impl<S, B> LaneStatement<S, B> for SyncThreads {
    const USES_BARRIER: bool = true;

    #[inline]
    fn exec(_data: &mut LoopData<S, B>, lane: &LaneContext<'_>, _active: bool) {
        lane.barrier();
    }

    fn calculate_dimensions(_data: &LoopData<S, B>) -> LaunchDims {
        LaunchDims::zero()
    }
}

impl<R, Body, S, B> LaneStatement<S, B> for Region<R, Body>
where
    Body: LaneStatement<S, B>,
{
    const USES_BARRIER: bool = <Body as LaneStatement<S, B>>::USES_BARRIER;

    fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
        Body::exec(data, lane, active);
    }

    fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
        Body::calculate_dimensions(data)
    }
}
