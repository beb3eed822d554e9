use crate::core::detector::{BrokenCycle, Detector};
use crate::core::lock_manager::LockTable;
use crate::core::logger::LogEntry;
use crate::core::transaction::Transaction;
use crate::core::types::{DeadlockInfo, Events};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Pick the victim of a cycle: the member with the greatest timestamp
///
/// On equal timestamps the member listed last wins, which for the pairwise
/// sweep is the later record in registry order.
pub fn select_victim(cycle: &[Arc<Transaction>]) -> Option<&Arc<Transaction>> {
    cycle.iter().max_by_key(|t| t.timestamp())
}

impl Detector {
    /// Break a detected cycle
    ///
    /// `cycle` lists the members in wait order: each waits on a resource
    /// owned by the next, the last on one owned by the first. Must be called
    /// inside the critical section.
    ///
    /// # Returns
    /// `None` if a member was already aborted, which happens when the same
    /// cycle is seen again before the earlier abort has propagated
    pub(crate) fn break_cycle(
        &self,
        table: &mut LockTable,
        cycle: Vec<Arc<Transaction>>,
    ) -> Option<BrokenCycle> {
        if cycle.iter().any(|t| t.is_aborted()) {
            return None;
        }
        let victim = Arc::clone(select_victim(&cycle)?);
        let info = self.extract_deadlock_info(table, &cycle, &victim);

        let manager = self.engine.lock_manager();
        manager
            .logger()
            .log(LogEntry::new(Events::DeadlockDetected).cycle(info.cycle.clone()));

        // Reserve the restart slot before the victim can wake up and exit
        let slot = self.engine.tracker().reserve();
        if !manager.abort_victim(table, &victim) {
            return None;
        }
        self.engine.stats.deadlocks.fetch_add(1, Ordering::SeqCst);

        Some(BrokenCycle { info, victim, slot })
    }

    fn extract_deadlock_info(
        &self,
        table: &LockTable,
        cycle: &[Arc<Transaction>],
        victim: &Transaction,
    ) -> DeadlockInfo {
        let waiting_for = cycle
            .iter()
            .filter_map(|t| table.registry().waiting_on(t).map(|r| (t.id(), r)))
            .collect();

        DeadlockInfo {
            cycle: cycle.iter().map(|t| t.id()).collect(),
            waiting_for,
            victim: victim.id(),
            victim_timestamp: victim.timestamp(),
            strategy: self.config.strategy,
            detected_at: Utc::now().to_rfc3339(),
        }
    }
}
