use crate::core::lock_manager::LockManager;
use crate::core::restart::RestartPolicy;
use crate::core::stress::StressConfig;
use crate::core::tracked_thread::TaskTracker;
use crate::core::types::{TimestampClock, TxnId};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Shared context of one simulation
///
/// Every runner, restart task and the detector hold an `Arc<Engine>`; there
/// is no process-wide state, so independent simulations can run side by
/// side.
pub struct Engine {
    pub(crate) manager: LockManager,
    pub(crate) clock: TimestampClock,
    pub(crate) stress: StressConfig,
    pub(crate) restart: RestartPolicy,
    pub(crate) tracker: Arc<TaskTracker>,
    pub(crate) stats: Stats,
    /// Identities that hit the restart cap; never touched under the lock table
    pub(crate) abandoned: Mutex<Vec<TxnId>>,
}

/// Counters kept over a run
#[derive(Debug, Default)]
pub struct Stats {
    pub(crate) deadlocks: AtomicUsize,
    pub(crate) restarts: AtomicUsize,
    pub(crate) mid_flight_aborts: AtomicUsize,
}

/// Outcome of a whole simulation
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Report {
    /// Identities that committed, ascending
    pub committed: Vec<TxnId>,
    /// Identities that gave up after reaching the restart cap, ascending
    pub abandoned: Vec<TxnId>,
    /// Number of cycles broken by the detector
    pub deadlocks: usize,
    /// Number of fresh instances launched by the restart protocol
    pub restarts: usize,
    /// Number of attempts that observed their abort flag
    pub mid_flight_aborts: usize,
    /// Wall-clock duration of the run in milliseconds
    pub elapsed_ms: u128,
}

impl Engine {
    pub fn new(manager: LockManager, stress: StressConfig, restart: RestartPolicy) -> Arc<Self> {
        Arc::new(Engine {
            manager,
            clock: TimestampClock::new(),
            stress,
            restart,
            tracker: TaskTracker::new(),
            stats: Stats::default(),
            abandoned: Mutex::new(Vec::new()),
        })
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.manager
    }

    pub fn clock(&self) -> &TimestampClock {
        &self.clock
    }

    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.tracker
    }

    pub fn deadlocks(&self) -> usize {
        self.stats.deadlocks.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> usize {
        self.stats.restarts.load(Ordering::SeqCst)
    }

    pub fn abandoned(&self) -> Vec<TxnId> {
        let mut ids = self.abandoned.lock().clone();
        ids.sort_unstable();
        ids
    }

    /// Summarize the run so far
    pub fn report(&self, elapsed: Duration) -> Report {
        Report {
            committed: self.manager.completed(),
            abandoned: self.abandoned(),
            deadlocks: self.deadlocks(),
            restarts: self.restarts(),
            mid_flight_aborts: self.stats.mid_flight_aborts.load(Ordering::SeqCst),
            elapsed_ms: elapsed.as_millis(),
        }
    }
}
