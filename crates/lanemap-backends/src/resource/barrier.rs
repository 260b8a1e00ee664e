//! Work-group barrier that a failing lane can poison

use parking_lot::{Condvar, Mutex};

/// Returned to lanes waiting at a barrier after a sibling lane failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("work-group barrier poisoned by a failed lane")]
pub struct BarrierPoisoned;

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    poisoned: bool,
}

/// Reusable barrier for the lanes of one work-group
///
/// Behaves like [`std::sync::Barrier`] until [`LaneBarrier::poison`] is
/// called; from then on every current and future [`LaneBarrier::wait`]
/// returns [`BarrierPoisoned`] instead of blocking.
#[derive(Debug)]
pub struct LaneBarrier {
    lanes: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl LaneBarrier {
    pub fn new(lanes: usize) -> Self {
        Self {
            lanes: lanes.max(1),
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                poisoned: false,
            }),
            released: Condvar::new(),
        }
    }

    /// Block until every lane arrives or the barrier is poisoned.
    pub fn wait(&self) -> Result<(), BarrierPoisoned> {
        let mut state = self.state.lock();
        if state.poisoned {
            return Err(BarrierPoisoned);
        }

        state.arrived += 1;
        if state.arrived == self.lanes {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(());
        }

        let generation = state.generation;
        while state.generation == generation && !state.poisoned {
            self.released.wait(&mut state);
        }
        if state.generation == generation {
            Err(BarrierPoisoned)
        } else {
            Ok(())
        }
    }

    /// Release every waiting lane with [`BarrierPoisoned`].
    pub fn poison(&self) {
        let mut state = self.state.lock();
        state.poisoned = true;
        self.released.notify_all();
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.lock().poisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn releases_each_generation_together() {
        let barrier = LaneBarrier::new(4);
        let arrived = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for round in 1..=3 {
                        arrived.fetch_add(1, Ordering::SeqCst);
                        barrier.wait().unwrap();
                        assert!(arrived.load(Ordering::SeqCst) >= round * 4);
                        barrier.wait().unwrap();
                    }
                });
            }
        });
        assert!(!barrier.is_poisoned());
    }

    #[test]
    fn poison_wakes_waiting_lanes() {
        let barrier = LaneBarrier::new(3);

        thread::scope(|scope| {
            let waiters: Vec<_> = (0..2).map(|_| scope.spawn(|| barrier.wait())).collect();
            thread::sleep(std::time::Duration::from_millis(20));
            barrier.poison();
            for waiter in waiters {
                assert_eq!(waiter.join().unwrap(), Err(BarrierPoisoned));
            }
        });

        assert_eq!(barrier.wait(), Err(BarrierPoisoned));
    }
}
