//! Collective synchronization for a fixed group of rank-distinguished
//! workers.
//!
//! The transfer engine needs exactly three collective operations: a full
//! barrier, a maximum-reduction over one value per worker, and a group-wide
//! abort. They live behind the [`Collective`] trait so the engine can run
//! over any runtime that provides them; [`LocalCollective`] implements the
//! trait for worker threads inside one process.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use copy_error::CollectiveError;

pub trait Collective {
    /// Zero-based identity of this worker within the group.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Block until every worker in the group has arrived.
    fn barrier(&self) -> Result<(), CollectiveError>;

    /// Combine one value per worker into the group-wide maximum, returned
    /// to every caller.
    fn reduce_max(&self, value: f64) -> Result<f64, CollectiveError>;

    /// Mark the group failed, releasing all current and future waiters
    /// with [`CollectiveError::Aborted`].
    fn abort(&self);
}

/// In-process collective group over shared generation-counted state.
///
/// Barriers and reductions both follow the same scheme: arrivals are
/// counted under one mutex, the last worker to arrive bumps a generation
/// counter and wakes the rest. An abort flips a flag checked by every
/// waiter, so no worker can hang on a barrier waiting for a dead peer.
pub struct LocalCollective {
    rank: usize,
    shared: Arc<Shared>,
}

struct Shared {
    size: usize,
    state: Mutex<State>,
    cvar: Condvar,
}

#[derive(Default)]
struct State {
    aborted: bool,
    barrier_arrived: usize,
    barrier_generation: u64,
    reduce_values: Vec<f64>,
    reduce_result: f64,
    reduce_generation: u64,
}

impl LocalCollective {
    /// Create a group of `size` connected handles, one per rank.
    pub fn group(size: usize) -> Vec<LocalCollective> {
        assert!(size > 0, "group size must be non-zero");

        let shared = Arc::new(Shared {
            size,
            state: Mutex::new(State::default()),
            cvar: Condvar::new(),
        });
        (0..size)
            .map(|rank| LocalCollective {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, CollectiveError> {
        self.shared
            .state
            .lock()
            .map_err(|_| CollectiveError::Poisoned)
    }
}

impl Collective for LocalCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        let mut state = self.lock()?;
        if state.aborted {
            return Err(CollectiveError::Aborted);
        }

        let generation = state.barrier_generation;
        state.barrier_arrived += 1;
        if state.barrier_arrived == self.shared.size {
            state.barrier_arrived = 0;
            state.barrier_generation += 1;
            self.shared.cvar.notify_all();
            return Ok(());
        }

        while state.barrier_generation == generation && !state.aborted {
            state = self
                .shared
                .cvar
                .wait(state)
                .map_err(|_| CollectiveError::Poisoned)?;
        }
        if state.aborted {
            Err(CollectiveError::Aborted)
        } else {
            Ok(())
        }
    }

    fn reduce_max(&self, value: f64) -> Result<f64, CollectiveError> {
        let mut state = self.lock()?;
        if state.aborted {
            return Err(CollectiveError::Aborted);
        }

        let generation = state.reduce_generation;
        state.reduce_values.push(value);
        if state.reduce_values.len() == self.shared.size {
            let max = state
                .reduce_values
                .drain(..)
                .fold(f64::NEG_INFINITY, f64::max);
            state.reduce_result = max;
            state.reduce_generation += 1;
            self.shared.cvar.notify_all();
            return Ok(max);
        }

        while state.reduce_generation == generation && !state.aborted {
            state = self
                .shared
                .cvar
                .wait(state)
                .map_err(|_| CollectiveError::Poisoned)?;
        }
        if state.aborted {
            Err(CollectiveError::Aborted)
        } else {
            Ok(state.reduce_result)
        }
    }

    fn abort(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.aborted = true;
            self.shared.cvar.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn group_assigns_ranks_in_order() {
        let group = LocalCollective::group(3);
        let ranks: Vec<usize> = group.iter().map(|g| g.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(group.iter().all(|g| g.size() == 3));
    }

    #[test]
    fn barrier_releases_only_after_all_arrive() {
        let group = LocalCollective::group(4);
        let arrived = AtomicUsize::new(0);

        thread::scope(|s| {
            let arrived = &arrived;
            for member in &group {
                s.spawn(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    member.barrier().unwrap();
                    assert_eq!(arrived.load(Ordering::SeqCst), 4);
                });
            }
        });
    }

    #[test]
    fn reduce_max_returns_slowest_time_to_every_rank() {
        let group = LocalCollective::group(4);
        let times = [0.5, 1.2, 0.9, 1.2];

        thread::scope(|s| {
            let handles: Vec<_> = group
                .iter()
                .zip(times)
                .map(|(member, time)| s.spawn(move || member.reduce_max(time)))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap().unwrap(), 1.2);
            }
        });
    }

    #[test]
    fn consecutive_reductions_do_not_bleed() {
        let group = LocalCollective::group(2);

        thread::scope(|s| {
            let handles: Vec<_> = group
                .iter()
                .enumerate()
                .map(|(rank, member)| {
                    s.spawn(move || {
                        let first = member.reduce_max(rank as f64).unwrap();
                        let second =
                            member.reduce_max(10.0 + rank as f64).unwrap();
                        (first, second)
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), (1.0, 11.0));
            }
        });
    }

    #[test]
    fn abort_unblocks_waiting_barrier() {
        let group = LocalCollective::group(2);

        thread::scope(|s| {
            let waiter = s.spawn(|| group[0].barrier());
            group[1].abort();
            assert_eq!(waiter.join().unwrap(), Err(CollectiveError::Aborted));
        });
    }

    #[test]
    fn collectives_fail_fast_after_abort() {
        let group = LocalCollective::group(2);
        group[0].abort();

        assert_eq!(group[1].barrier(), Err(CollectiveError::Aborted));
        assert_eq!(group[1].reduce_max(1.0), Err(CollectiveError::Aborted));
    }

    #[test]
    fn single_worker_group_never_blocks() {
        let group = LocalCollective::group(1);
        group[0].barrier().unwrap();
        assert_eq!(group[0].reduce_max(0.25).unwrap(), 0.25);
    }
}
