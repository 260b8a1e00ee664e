//! Lane scheduling on the host
//!
//! Groups are independent and run on rayon. Lanes of a group run on rayon
//! too, unless the kernel waits at barriers: then every lane of the group
//! gets its own scoped thread sharing one [`LaneBarrier`], and groups run one
//! after another so the number of live threads stays at one group's worth.
//! A lane that panics poisons the barrier, so its siblings unwind instead of
//! waiting for it forever.

use crate::error::{BackendError, Result};
use crate::resource::{BarrierPoisoned, Dim3, LaneBarrier, LaneContext, LaneKernel, NdRange};
use lanemap_tracing::perf_span;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Run `kernel` for every lane of `range`, returning once all lanes finished.
pub fn run_range(range: &NdRange, kernel: &dyn LaneKernel) -> Result<()> {
    let total_groups = range.total_groups() as usize;
    let lanes_per_group = range.lanes_per_group() as usize;
    let _span = perf_span!(
        "run_range",
        groups = total_groups,
        lanes_per_group = lanes_per_group,
        barrier = kernel.uses_barrier()
    );

    if kernel.uses_barrier() {
        (0..total_groups).try_for_each(|group| run_group_with_barrier(range, kernel, group))
    } else {
        (0..total_groups).into_par_iter().try_for_each(|group| {
            let group_id = group_coords(range, group);
            (0..lanes_per_group).into_par_iter().try_for_each(|lane| {
                let context = LaneContext::new(group_id, lane_coords(range, lane), *range);
                panic::catch_unwind(AssertUnwindSafe(|| kernel.run_lane(&context))).map_err(BackendError::from_panic)
            })
        })
    }
}

fn run_group_with_barrier(range: &NdRange, kernel: &dyn LaneKernel, group: usize) -> Result<()> {
    let lanes_per_group = range.lanes_per_group() as usize;
    let group_id = group_coords(range, group);
    let barrier = LaneBarrier::new(lanes_per_group);

    thread::scope(|scope| {
        let handles = (0..lanes_per_group)
            .map(|lane| {
                let barrier = &barrier;
                thread::Builder::new()
                    .name(format!("lanemap-lane-{group}-{lane}"))
                    .spawn_scoped(scope, move || {
                        let context = LaneContext::new(group_id, lane_coords(range, lane), *range).with_barrier(barrier);
                        panic::catch_unwind(AssertUnwindSafe(|| kernel.run_lane(&context))).inspect_err(|_| barrier.poison())
                    })
                    .map_err(|err| {
                        barrier.poison();
                        BackendError::submission(format!("failed to spawn lane thread: {err}"))
                    })
            })
            .collect::<Vec<_>>();

        // Lanes released by the poisoned barrier report only when nothing else failed.
        let mut failure = None;
        let mut released = None;
        for handle in handles {
            let payload = match handle {
                Err(err) => {
                    failure.get_or_insert(err);
                    continue;
                }
                Ok(handle) => match handle.join() {
                    Ok(Ok(())) => continue,
                    Ok(Err(payload)) | Err(payload) => payload,
                },
            };
            let slot = if payload.is::<BarrierPoisoned>() {
                &mut released
            } else {
                &mut failure
            };
            slot.get_or_insert(BackendError::from_panic(payload));
        }
        failure.or(released).map_or(Ok(()), Err)
    })
}

/// Decompose a linear group index, x fastest.
fn group_coords(range: &NdRange, group: usize) -> Dim3 {
    let per_row = range.grid.x as usize;
    let per_slice = per_row * range.grid.y as usize;
    Dim3::new(group % per_row, (group % per_slice) / per_row, group / per_slice)
}

/// Decompose a linear lane index within a group, x fastest.
fn lane_coords(range: &NdRange, lane: usize) -> Dim3 {
    let per_row = range.block.x as usize;
    let per_slice = per_row * range.block.y as usize;
    Dim3::new(lane % per_row, (lane % per_slice) / per_row, lane / per_slice)
}
