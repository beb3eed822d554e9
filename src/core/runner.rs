use crate::core::engine::Engine;
use crate::core::lock_manager::{RESOURCE_A, RESOURCE_B};
use crate::core::logger::LogEntry;
use crate::core::tracked_thread::TrackedThread;
use crate::core::transaction::Transaction;
use crate::core::types::{Events, ResourceId, TxnId};
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// How one attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The attempt committed its identity
    Committed,
    /// The attempt ran to the end but the identity was already committed
    AlreadyCommitted,
    /// The attempt observed its abort flag and was abandoned
    Aborted,
}

/// Order in which a transaction takes the two resources
///
/// Even identities take A then B, odd identities B then A. The asymmetry is
/// what makes circular waits possible.
pub fn acquisition_order(id: TxnId) -> [ResourceId; 2] {
    if id % 2 == 0 {
        [RESOURCE_A, RESOURCE_B]
    } else {
        [RESOURCE_B, RESOURCE_A]
    }
}

impl Engine {
    /// Run a transaction instance on its own tracked thread
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned
    pub fn launch(self: &Arc<Self>, txn: Arc<Transaction>) -> Result<TrackedThread<AttemptOutcome>> {
        let engine = Arc::clone(self);
        TrackedThread::spawn(&self.tracker, format!("txn-{}", txn.id()), move || {
            engine.run_attempt(&txn)
        })
    }

    /// Drive one attempt through acquire, compute, release and commit
    ///
    /// The abort flag is re-checked after every step that may block or
    /// sleep. An aborted attempt simply returns: the detector has already
    /// revoked its resources and scheduled the restart.
    pub fn run_attempt(&self, txn: &Arc<Transaction>) -> AttemptOutcome {
        let manager = &self.manager;
        let [first, second] = acquisition_order(txn.id());

        self.narrate(Events::Started, txn);
        self.stress.step_delay();

        if self.check_aborted(txn) {
            return AttemptOutcome::Aborted;
        }
        if !manager.acquire(txn, first) {
            return self.abandon(txn);
        }

        if self.check_aborted(txn) {
            return AttemptOutcome::Aborted;
        }
        self.stress.step_delay();
        if !manager.acquire(txn, second) {
            return self.abandon(txn);
        }

        // compute
        self.stress.step_delay();

        if self.check_aborted(txn) {
            return AttemptOutcome::Aborted;
        }
        manager.release(txn, first);
        self.stress.step_delay();
        manager.release(txn, second);
        self.stress.step_delay();

        if manager.finalize(txn) {
            AttemptOutcome::Committed
        } else {
            AttemptOutcome::AlreadyCommitted
        }
    }

    fn check_aborted(&self, txn: &Transaction) -> bool {
        if txn.is_aborted() {
            self.abandon(txn);
            return true;
        }
        false
    }

    fn abandon(&self, txn: &Transaction) -> AttemptOutcome {
        self.stats.mid_flight_aborts.fetch_add(1, Ordering::SeqCst);
        self.narrate(Events::AbortedMidFlight, txn);
        AttemptOutcome::Aborted
    }

    pub(crate) fn narrate(&self, event: Events, txn: &Transaction) {
        self.manager
            .logger()
            .log(LogEntry::new(event).txn(txn.id(), txn.instance(), txn.attempt()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lock_manager::LockManager;
    use crate::core::logger::EventLogger;
    use crate::core::restart::RestartPolicy;
    use crate::core::stress::StressConfig;
    use std::time::Duration;

    fn engine() -> Arc<Engine> {
        let manager =
            LockManager::two_resources(Duration::from_millis(5), Arc::new(EventLogger::disabled()));
        Engine::new(manager, StressConfig::none(), RestartPolicy::default())
    }

    #[test]
    fn test_acquisition_order_by_parity() {
        assert_eq!(acquisition_order(0), [RESOURCE_A, RESOURCE_B]);
        assert_eq!(acquisition_order(1), [RESOURCE_B, RESOURCE_A]);
        assert_eq!(acquisition_order(4), [RESOURCE_A, RESOURCE_B]);
    }

    #[test]
    fn test_uncontended_attempt_commits() {
        let engine = engine();
        let txn = Transaction::new(0, engine.clock().tick());
        assert_eq!(engine.run_attempt(&txn), AttemptOutcome::Committed);

        let manager = engine.lock_manager();
        assert_eq!(manager.completed(), vec![0]);
        assert!(manager.owner_of(RESOURCE_A).is_none());
        assert!(manager.owner_of(RESOURCE_B).is_none());
        assert!(manager.wait_records().is_empty());
    }

    #[test]
    fn test_duplicate_identity_commits_once() {
        let engine = engine();
        let first = Transaction::new(2, engine.clock().tick());
        let duplicate = Transaction::new(2, engine.clock().tick());
        assert_eq!(engine.run_attempt(&first), AttemptOutcome::Committed);
        assert_eq!(
            engine.run_attempt(&duplicate),
            AttemptOutcome::AlreadyCommitted
        );
    }

    #[test]
    fn test_aborted_instance_never_acquires() {
        let engine = engine();
        let txn = Transaction::new(1, engine.clock().tick());
        txn.abort();
        assert_eq!(engine.run_attempt(&txn), AttemptOutcome::Aborted);
        assert!(engine.lock_manager().owner_of(RESOURCE_B).is_none());
        assert!(engine.lock_manager().completed().is_empty());
    }

    #[test]
    fn test_launch_runs_on_tracked_thread() {
        let engine = engine();
        let handle = engine
            .launch(Transaction::new(3, engine.clock().tick()))
            .unwrap();
        engine.tracker().wait_idle();
        assert_eq!(handle.join().unwrap(), AttemptOutcome::Committed);
        assert!(engine.lock_manager().is_completed(3));
    }
}
