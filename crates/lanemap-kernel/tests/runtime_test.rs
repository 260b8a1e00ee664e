//! Asynchronous launches and environment-driven runtime selection

use lanemap_kernel::prelude::*;
use lanemap_kernel::{HostContext, LaunchPhase, Result, RuntimeConfig};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Tests in this file read or write process-wide environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn counting_body(total: &Arc<AtomicUsize>) -> impl Fn(usize) + Clone + Send + Sync + 'static {
    let total = Arc::clone(total);
    move |_i: usize| {
        total.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_async_launches_complete_on_wait() -> Result<()> {
    lanemap_tracing::init_test_tracing();
    type Tree = (DeviceKernelAsync<For<0, LocalX, Lambda<0>>>, DeviceKernelAsync<For<0, GroupX, Lambda<0>>>);

    let queue = Arc::new(QueueResource::new());
    let total = Arc::new(AtomicUsize::new(0));
    let report = KernelPolicy::<Tree>::run_on(queue.clone(), (TypedRange::new(0usize, 100),), (counting_body(&total),))?;

    assert_eq!(report.launches.len(), 2);
    assert!(report.launches.iter().all(|launch| launch.phase == LaunchPhase::Detached));

    queue.wait()?;
    assert_eq!(total.load(Ordering::Relaxed), 200);
    assert_eq!(queue.pending(), 0);
    assert_eq!(queue.live_buffers(), 0);
    Ok(())
}

#[test]
fn test_concurrent_synchronous_launches_on_one_queue_each_finish() -> Result<()> {
    type Tree = DeviceKernel<For<0, LocalX, Lambda<0>>>;

    let queue: Arc<dyn ExecutionResource> = Arc::new(QueueResource::new());
    std::thread::scope(|scope| {
        let launches: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                scope.spawn(move || -> Result<usize> {
                    let total = Arc::new(AtomicUsize::new(0));
                    let slow = {
                        let total = Arc::clone(&total);
                        move |_i: usize| {
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            total.fetch_add(1, Ordering::SeqCst);
                        }
                    };
                    let report = KernelPolicy::<Tree>::run_on(queue, (TypedRange::new(0usize, 16),), (slow,))?;
                    assert_eq!(report.launches[0].phase, LaunchPhase::Synchronized);
                    Ok(total.load(Ordering::SeqCst))
                })
            })
            .collect();

        for launch in launches {
            assert_eq!(launch.join().expect("launch thread panicked")?, 16);
        }
        Ok(())
    })
}

#[test]
fn test_launch_thread_cap_limits_group_size() -> Result<()> {
    type Tree = DeviceKernelExt<Launch<false, 64>, For<0, LocalLoopX, Lambda<0>>>;

    let total = Arc::new(AtomicUsize::new(0));
    let report = KernelPolicy::<Tree>::run_on(
        Arc::new(HostResource::new()),
        (TypedRange::new(0usize, 500),),
        (counting_body(&total),),
    )?;

    assert_eq!(report.launches[0].range.block.x, 64);
    assert_eq!(total.load(Ordering::Relaxed), 500);
    Ok(())
}

#[test]
fn test_context_from_config_uses_dedicated_pool() -> Result<()> {
    let config = RuntimeConfig::default().with_threads(2);
    let context = HostContext::from_config(&config)?;
    assert_eq!(context.pool().map(|pool| pool.current_num_threads()), Some(2));

    let total = Arc::new(AtomicUsize::new(0));
    KernelPolicy::<Region<ParRegion, For<0, ParExec, Lambda<0>>>>::run_with(
        &context,
        (TypedRange::new(0usize, 64),),
        (counting_body(&total),),
    )?;
    assert_eq!(total.load(Ordering::Relaxed), 64);
    Ok(())
}

#[test]
fn test_run_reads_resource_from_environment() -> Result<()> {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    env::set_var("LANEMAP_RESOURCE", "queue");
    env::set_var("LANEMAP_THREADS", "3");

    let total = Arc::new(AtomicUsize::new(0));
    let result = KernelPolicy::<DeviceKernel<For<0, LocalX, Lambda<0>>>>::run(
        (TypedRange::new(0usize, 10),),
        (counting_body(&total),),
    );

    env::remove_var("LANEMAP_RESOURCE");
    env::remove_var("LANEMAP_THREADS");

    let report = result?;
    assert_eq!(report.launches[0].resource, "queue");
    assert_eq!(report.launches[0].range.block.x, 32);
    assert_eq!(total.load(Ordering::Relaxed), 10);
    Ok(())
}

#[test]
fn test_run_waits_for_asynchronous_launches_on_its_resource() -> Result<()> {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    env::set_var("LANEMAP_RESOURCE", "queue");

    let total = Arc::new(AtomicUsize::new(0));
    let slow = {
        let total = Arc::clone(&total);
        move |_i: usize| {
            std::thread::sleep(std::time::Duration::from_millis(10));
            total.fetch_add(1, Ordering::SeqCst);
        }
    };
    let result = KernelPolicy::<DeviceKernelAsync<For<0, LocalX, Lambda<0>>>>::run((TypedRange::new(0usize, 8),), (slow,));
    let failing = KernelPolicy::<DeviceKernelAsync<For<0, LocalX, Lambda<0>>>>::run(
        (TypedRange::new(0usize, 8),),
        (|i: usize| assert!(i != 5, "detached lane 5 failed"),),
    );

    env::remove_var("LANEMAP_RESOURCE");

    let report = result?;
    assert_eq!(report.launches[0].phase, LaunchPhase::Detached);
    assert_eq!(total.load(Ordering::SeqCst), 8);

    let err = failing.unwrap_err();
    assert!(err.to_string().contains("detached lane 5 failed"));
    Ok(())
}

#[test]
fn test_invalid_environment_is_reported() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    env::set_var("LANEMAP_RESOURCE", "fpga");

    let result = forall::<SeqExec, _, _>(TypedRange::new(0usize, 4), |_i| {});

    env::remove_var("LANEMAP_RESOURCE");
    let err = result.unwrap_err();
    assert!(err.to_string().contains("fpga"));
}
