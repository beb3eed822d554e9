use crate::core::detector::{BrokenCycle, Detector};
use crate::core::lock_manager::LockTable;
use std::sync::Arc;

impl Detector {
    /// Compare every unordered pair of wait records for a direct 2-cycle
    ///
    /// Records i and j form a cycle when i's transaction waits on a resource
    /// owned by j's transaction and j's waits on one owned by i's. Only
    /// cycles of length two are found. Each pair is checked against the live
    /// ownership state, so once a victim is aborted its resources no longer
    /// match later pairs of the same sweep.
    pub(crate) fn sweep_pairwise(&self, table: &mut LockTable) -> Vec<BrokenCycle> {
        let records = table.registry().records().to_vec();
        let mut broken = Vec::new();

        for (i, first) in records.iter().enumerate() {
            for second in &records[i + 1..] {
                if first.txn.same_instance(&second.txn) {
                    continue;
                }
                let circular = table.owned_by(first.resource, &second.txn)
                    && table.owned_by(second.resource, &first.txn);
                if !circular {
                    continue;
                }

                let cycle = vec![Arc::clone(&first.txn), Arc::clone(&second.txn)];
                if let Some(found) = self.break_cycle(table, cycle) {
                    broken.push(found);
                }
            }
        }

        broken
    }
}

#[cfg(test)]
mod tests {
    use crate::core::detector::{Detector, DetectorConfig};
    use crate::core::engine::Engine;
    use crate::core::lock_manager::{LockManager, RESOURCE_A, RESOURCE_B};
    use crate::core::logger::EventLogger;
    use crate::core::restart::RestartPolicy;
    use crate::core::stress::StressConfig;
    use crate::core::transaction::Transaction;
    use crate::core::types::Timestamp;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> Arc<Engine> {
        let manager =
            LockManager::two_resources(Duration::from_millis(5), Arc::new(EventLogger::disabled()));
        Engine::new(manager, StressConfig::none(), RestartPolicy::default())
    }

    /// Build the table state of a 2-cycle without running any thread:
    /// `a` holds A and waits on B, `b` holds B and waits on A
    fn staged_cycle(engine: &Engine, a: &Arc<Transaction>, b: &Arc<Transaction>) {
        let manager = engine.lock_manager();
        assert!(manager.acquire(a, RESOURCE_A));
        assert!(manager.acquire(b, RESOURCE_B));
        let mut table = manager.lock_table();
        table.registry_mut().register(a, RESOURCE_B);
        table.registry_mut().register(b, RESOURCE_A);
    }

    #[test]
    fn test_pairwise_aborts_younger() {
        let engine = engine();
        let older = Transaction::new(0, Timestamp::from_raw(1));
        let younger = Transaction::new(1, Timestamp::from_raw(2));
        staged_cycle(&engine, &older, &younger);

        let detector = Detector::new(Arc::clone(&engine), DetectorConfig::default());
        let mut table = engine.lock_manager().lock_table();
        let broken = detector.sweep_pairwise(&mut table);

        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].info.victim, 1);
        assert_eq!(broken[0].info.cycle, vec![0, 1]);
        assert!(younger.is_aborted());
        assert!(!older.is_aborted());
        assert!(table.owner(RESOURCE_B).is_none());
        assert!(table.owned_by(RESOURCE_A, &older));
        assert_eq!(table.registry().summary(), vec![(0, RESOURCE_B)]);
    }

    #[test]
    fn test_second_sweep_is_noop() {
        let engine = engine();
        let a = Transaction::new(0, Timestamp::from_raw(3));
        let b = Transaction::new(1, Timestamp::from_raw(2));
        staged_cycle(&engine, &a, &b);

        let detector = Detector::new(Arc::clone(&engine), DetectorConfig::default());
        let mut table = engine.lock_manager().lock_table();
        assert_eq!(detector.sweep_pairwise(&mut table).len(), 1);
        assert!(a.is_aborted());
        assert!(detector.sweep_pairwise(&mut table).is_empty());
        assert_eq!(engine.deadlocks(), 1);
    }

    #[test]
    fn test_no_cycle_without_mutual_ownership() {
        let engine = engine();
        let holder = Transaction::new(0, Timestamp::from_raw(1));
        let w1 = Transaction::new(1, Timestamp::from_raw(2));
        let w2 = Transaction::new(2, Timestamp::from_raw(3));
        let manager = engine.lock_manager();
        assert!(manager.acquire(&holder, RESOURCE_A));
        {
            let mut table = manager.lock_table();
            table.registry_mut().register(&w1, RESOURCE_A);
            table.registry_mut().register(&w2, RESOURCE_A);
        }

        let detector = Detector::new(Arc::clone(&engine), DetectorConfig::default());
        let mut table = manager.lock_table();
        assert!(detector.sweep_pairwise(&mut table).is_empty());
        assert!(!w1.is_aborted() && !w2.is_aborted());
    }
}
