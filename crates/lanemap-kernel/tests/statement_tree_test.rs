//! Statement tree integration tests
//!
//! Geometry combination, lane coverage, masked passes, barriers and
//! iteration order, run end to end through `KernelPolicy`.

use lanemap_kernel::prelude::*;
use lanemap_kernel::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn host() -> Arc<dyn ExecutionResource> {
    Arc::new(HostResource::new())
}

fn counters(len: usize) -> Arc<Vec<AtomicUsize>> {
    Arc::new((0..len).map(|_| AtomicUsize::new(0)).collect())
}

fn all_once(hits: &[AtomicUsize]) -> bool {
    hits.iter().all(|hit| hit.load(Ordering::Relaxed) == 1)
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn test_sibling_loops_share_lanes() -> Result<()> {
    lanemap_tracing::init_test_tracing();
    type Tree = DeviceKernel<(For<0, LocalX, Lambda<0, Seg<0>>>, For<1, LocalX, Lambda<1, Seg<1>>>)>;

    let report = KernelPolicy::<Tree>::run_on(
        host(),
        (TypedRange::new(0usize, 8), TypedRange::new(0usize, 5)),
        (|_i: usize| {}, |_j: usize| {}),
    )?;

    let launch = &report.launches[0];
    assert_eq!(launch.dims.threads.x, 8);
    assert_eq!(launch.range.block.x, 8);
    Ok(())
}

#[test]
fn test_nested_axes_combine_independently() -> Result<()> {
    type Tree = DeviceKernel<For<0, GroupY, For<1, LocalX, For<2, LocalY, Lambda<0>>>>>;

    let report = KernelPolicy::<Tree>::run_on(
        host(),
        (TypedRange::new(0usize, 3), TypedRange::new(0usize, 16), TypedRange::new(0usize, 4)),
        (|_g: usize, _x: usize, _y: usize| {},),
    )?;

    let range = report.launches[0].range;
    assert_eq!((range.grid.x, range.grid.y, range.grid.z), (1, 3, 1));
    assert_eq!((range.block.x, range.block.y, range.block.z), (16, 4, 1));
    Ok(())
}

#[test]
fn test_direct_mapping_beyond_capacity_fails() {
    type Tree = DeviceKernel<For<0, LocalX, Lambda<0>>>;

    let resource = HostResource::new();
    let err = KernelPolicy::<Tree>::run_on(
        Arc::new(resource.clone()),
        (TypedRange::new(0usize, 2000),),
        (|_i: usize| {},),
    )
    .unwrap_err();

    assert!(err.is_capacity());
    assert_eq!(resource.live_buffers(), 0);
}

// ============================================================================
// Coverage
// ============================================================================

#[test]
fn test_group_and_local_direct_cover_each_pair_once() -> Result<()> {
    type Tree = DeviceKernel<For<0, GroupX, For<1, LocalX, Lambda<0>>>>;

    let hits = counters(6 * 40);
    let body = {
        let hits = Arc::clone(&hits);
        move |i: usize, j: usize| {
            hits[i * 40 + j].fetch_add(1, Ordering::Relaxed);
        }
    };
    KernelPolicy::<Tree>::run_on(host(), (TypedRange::new(0usize, 6), TypedRange::new(0usize, 40)), (body,))?;

    assert!(all_once(&hits));
    Ok(())
}

#[test]
fn test_capped_strided_loops_cover_each_pair_once() -> Result<()> {
    type Tree = DeviceKernel<For<0, GroupLoop<0, 2>, For<1, LocalLoop<0, 16>, Lambda<0>>>>;

    let hits = counters(7 * 50);
    let body = {
        let hits = Arc::clone(&hits);
        move |i: usize, j: usize| {
            hits[i * 50 + j].fetch_add(1, Ordering::Relaxed);
        }
    };
    let report = KernelPolicy::<Tree>::run_on(
        Arc::new(QueueResource::new()),
        (TypedRange::new(0usize, 7), TypedRange::new(0usize, 50)),
        (body,),
    )?;

    assert_eq!(report.launches[0].range.grid.x, 2);
    assert!(all_once(&hits));
    Ok(())
}

#[test]
fn test_global_direct_covers_ragged_length() -> Result<()> {
    type Tree = DeviceKernel<For<0, GlobalX<64>, Lambda<0>>>;

    let hits = counters(1000);
    let body = {
        let hits = Arc::clone(&hits);
        move |i: usize| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        }
    };
    let report = KernelPolicy::<Tree>::run_on(host(), (TypedRange::new(0usize, 1000),), (body,))?;

    assert_eq!(report.launches[0].range.grid.x, 16);
    assert!(all_once(&hits));
    Ok(())
}

#[test]
fn test_list_segment_lanes_past_end_stay_inactive() -> Result<()> {
    type Tree = DeviceKernel<For<0, LocalX, Lambda<0>>>;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let body = {
        let seen = Arc::clone(&seen);
        move |value: u32| seen.lock().unwrap().push(value)
    };
    let report = KernelPolicy::<Tree>::run_on(
        Arc::new(QueueResource::new()),
        (ListSegment::new(vec![9u32, 4, 7]),),
        (body,),
    )?;

    // The queue rounds groups up to 32 lanes.
    assert_eq!(report.launches[0].range.block.x, 32);
    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![4, 7, 9]);
    Ok(())
}

#[test]
fn test_parallel_host_loop_launches_per_iteration() -> Result<()> {
    type Tree = For<0, ParExec, DeviceKernel<For<1, LocalX, Lambda<0>>>>;

    let hits = counters(4 * 16);
    let body = {
        let hits = Arc::clone(&hits);
        move |i: usize, j: usize| {
            hits[i * 16 + j].fetch_add(1, Ordering::Relaxed);
        }
    };
    let report = KernelPolicy::<Tree>::run_on(host(), (TypedRange::new(0usize, 4), TypedRange::new(0usize, 16)), (body,))?;

    assert_eq!(report.launches.len(), 4);
    assert!(all_once(&hits));
    Ok(())
}

// ============================================================================
// Masking
// ============================================================================

#[test]
fn test_strided_lanes_make_equal_masked_passes() -> Result<()> {
    type Tree = DeviceKernel<For<0, LocalLoop<0, 4>, MaskedLambda<0>>>;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let body = {
        let calls = Arc::clone(&calls);
        move |mask: LaneMask| calls.lock().unwrap().push((mask.local.x, mask.active))
    };
    let report = KernelPolicy::<Tree>::run_on(host(), (TypedRange::new(0usize, 10),), (body,))?;
    assert_eq!(report.launches[0].range.block.x, 4);

    let calls = calls.lock().unwrap().clone();
    for lane in 0..4 {
        assert_eq!(calls.iter().filter(|call| call.0 == lane).count(), 3, "lane {lane}");
    }
    assert_eq!(calls.iter().filter(|call| call.1).count(), 10);
    Ok(())
}

#[test]
fn test_inactive_lanes_skip_plain_lambdas() -> Result<()> {
    type Tree = DeviceKernel<For<0, LocalLoop<0, 4>, Lambda<0>>>;

    let hits = counters(10);
    let body = {
        let hits = Arc::clone(&hits);
        move |i: usize| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        }
    };
    KernelPolicy::<Tree>::run_on(host(), (TypedRange::new(0usize, 10),), (body,))?;

    assert!(all_once(&hits));
    Ok(())
}

// ============================================================================
// Barriers
// ============================================================================

#[test]
fn test_sync_threads_orders_phases() -> Result<()> {
    type Tree = DeviceKernel<For<0, LocalX, (Lambda<0>, SyncThreads, Lambda<1>)>>;

    let written = counters(8);
    let observed = Arc::new(Mutex::new(Vec::new()));
    let write = {
        let written = Arc::clone(&written);
        move |i: usize| written[i].store(1, Ordering::SeqCst)
    };
    let read = {
        let written = Arc::clone(&written);
        let observed = Arc::clone(&observed);
        move |_i: usize| {
            let total: usize = written.iter().map(|slot| slot.load(Ordering::SeqCst)).sum();
            observed.lock().unwrap().push(total);
        }
    };
    KernelPolicy::<Tree>::run_on(host(), (TypedRange::new(0usize, 8),), (write, read))?;

    let observed = observed.lock().unwrap().clone();
    assert_eq!(observed, vec![8; 8]);
    Ok(())
}

#[test]
fn test_strided_barriers_stay_balanced() -> Result<()> {
    type Tree = DeviceKernel<For<0, LocalLoop<0, 4>, (Lambda<0>, SyncThreads)>>;

    let hits = counters(10);
    let body = {
        let hits = Arc::clone(&hits);
        move |i: usize| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        }
    };
    // Lanes 2 and 3 only reach their third barrier through the masked pass.
    KernelPolicy::<Tree>::run_on(host(), (TypedRange::new(0usize, 10),), (body,))?;

    assert!(all_once(&hits));
    Ok(())
}

// ============================================================================
// Order
// ============================================================================

type Triple = (usize, usize, usize);

const KJI_ORDER: [Triple; 8] = [
    (0, 1, 2),
    (1, 1, 2),
    (0, 2, 2),
    (1, 2, 2),
    (0, 1, 3),
    (1, 1, 3),
    (0, 2, 3),
    (1, 2, 3),
];

fn ijk_segments() -> (TypedRange<usize>, TypedRange<usize>, TypedRange<usize>) {
    (TypedRange::new(0, 2), TypedRange::new(1, 3), TypedRange::new(2, 4))
}

#[test]
fn test_sequential_host_order_is_k_j_i() -> Result<()> {
    type Tree = For<2, SeqExec, For<1, SeqExec, For<0, SeqExec, Lambda<0>>>>;

    let seen = Mutex::new(Vec::new());
    KernelPolicy::<Tree>::run_on(host(), ijk_segments(), (|i: usize, j: usize, k: usize| {
        seen.lock().unwrap().push((i, j, k))
    },))?;

    assert_eq!(seen.into_inner().unwrap(), KJI_ORDER);
    Ok(())
}

#[test]
fn test_sequential_lane_order_matches_host() -> Result<()> {
    type Tree = DeviceKernel<For<2, SeqExec, For<1, SeqExec, For<0, SeqExec, Lambda<0>>>>>;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let body = {
        let seen = Arc::clone(&seen);
        move |i: usize, j: usize, k: usize| seen.lock().unwrap().push((i, j, k))
    };
    let report = KernelPolicy::<Tree>::run_on(host(), ijk_segments(), (body,))?;

    assert_eq!(report.launches[0].range.total_lanes(), 1);
    assert_eq!(*seen.lock().unwrap(), KJI_ORDER);
    Ok(())
}

#[test]
fn test_reordered_nest_visits_same_points() -> Result<()> {
    type Tree = For<0, SeqExec, For<1, SeqExec, For<2, SeqExec, Lambda<0>>>>;

    let seen = Mutex::new(Vec::new());
    KernelPolicy::<Tree>::run_on(host(), ijk_segments(), (|i: usize, j: usize, k: usize| {
        seen.lock().unwrap().push((i, j, k))
    },))?;

    let seen = seen.into_inner().unwrap();
    assert_ne!(seen, KJI_ORDER);
    assert_eq!(seen[0], (0, 1, 2));
    assert_eq!(seen[1], (0, 1, 3));

    let mut sorted = seen.clone();
    sorted.sort_unstable();
    let mut expected = KJI_ORDER.to_vec();
    expected.sort_unstable();
    assert_eq!(sorted, expected);
    Ok(())
}

#[test]
fn test_lambda_selects_and_reorders_arguments() -> Result<()> {
    type Tree = For<1, SeqExec, For<0, SeqExec, Lambda<0, (Seg<1>, Seg<0>)>>>;

    let seen = Mutex::new(Vec::new());
    KernelPolicy::<Tree>::run_on(
        host(),
        (TypedRange::new(0usize, 2), TypedRange::new(-1i64, 1)),
        (|j: i64, i: usize| seen.lock().unwrap().push((j, i)),),
    )?;

    assert_eq!(seen.into_inner().unwrap(), vec![(-1, 0), (-1, 1), (0, 0), (0, 1)]);
    Ok(())
}
