use deadlock_sim::{DetectionStrategy, RESOURCE_A, RESOURCE_B, RestartPolicy};
mod common;
use common::{DEADLOCK_TIMEOUT, expect_deadlock, force_two_cycle, start_detector};

#[test]
fn test_two_transaction_deadlock_aborts_younger() {
    let harness = start_detector(DetectionStrategy::Pairwise, RestartPolicy::default());
    let (t0, t1) = force_two_cycle(&harness.engine);

    let info = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(info.strategy, DetectionStrategy::Pairwise);
    assert_eq!(info.cycle.len(), 2);
    assert!(info.cycle.contains(&0) && info.cycle.contains(&1));
    assert_eq!(info.waiting_for.len(), 2);
    assert!(info.waiting_for.contains(&(0, RESOURCE_B)));
    assert!(info.waiting_for.contains(&(1, RESOURCE_A)));

    // Exactly the instance with the greater timestamp is the victim
    assert!(t1.timestamp() > t0.timestamp());
    assert_eq!(info.victim, 1);
    assert_eq!(info.victim_timestamp, t1.timestamp());
    assert!(t1.is_aborted());
    assert!(!t0.is_aborted());

    harness.engine.tracker().wait_idle();

    // The victim was restarted and every identity committed once
    let manager = harness.engine.lock_manager();
    assert_eq!(manager.completed(), vec![0, 1]);
    assert!(harness.engine.restarts() >= 1);
    assert!(manager.wait_records().is_empty());
    assert!(manager.owner_of(RESOURCE_A).is_none());
    assert!(manager.owner_of(RESOURCE_B).is_none());

    // Any later cycle involves the restarted instance, which is always the youngest
    while let Ok(later) = harness.rx.try_recv() {
        assert_eq!(later.victim, 1);
    }

    harness.handle.stop().unwrap();
}

#[test]
fn test_graph_strategy_breaks_same_deadlock() {
    let harness = start_detector(DetectionStrategy::WaitForGraph, RestartPolicy::default());
    let (t0, t1) = force_two_cycle(&harness.engine);

    let info = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(info.strategy, DetectionStrategy::WaitForGraph);
    assert_eq!(info.victim, 1);
    assert!(t1.is_aborted());
    assert!(!t0.is_aborted());

    harness.engine.tracker().wait_idle();
    assert_eq!(harness.engine.lock_manager().completed(), vec![0, 1]);
    harness.handle.stop().unwrap();
}

#[test]
fn test_restart_cap_abandons_victim() {
    let harness = start_detector(
        DetectionStrategy::Pairwise,
        RestartPolicy {
            max_restarts: Some(0),
            backoff: std::time::Duration::ZERO,
        },
    );
    force_two_cycle(&harness.engine);

    let info = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(info.victim, 1);

    harness.engine.tracker().wait_idle();
    assert_eq!(harness.engine.lock_manager().completed(), vec![0]);
    assert_eq!(harness.engine.abandoned(), vec![1]);
    assert_eq!(harness.engine.restarts(), 0);
    assert!(harness.engine.lock_manager().wait_records().is_empty());
    harness.handle.stop().unwrap();
}
