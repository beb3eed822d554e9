use deadlock_sim::{
    DeadlockInfo, DetectionStrategy, DetectorConfig, RestartPolicy, Simulation, StressConfig,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn fast_simulation(strategy: DetectionStrategy) -> Simulation {
    Simulation::new()
        .console(false)
        .stress(StressConfig {
            max_step_delay_ms: 30,
            max_startup_delay_ms: 10,
        })
        .detector(DetectorConfig {
            interval: Duration::from_millis(50),
            strategy,
        })
        .poll_interval(Duration::from_millis(10))
}

fn committed_ids(log: &str) -> Vec<u64> {
    let mut ids = log
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("log line is JSON"))
        .filter(|entry| entry["event"] == "Committed")
        .filter_map(|entry| entry["txn_id"].as_u64())
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids
}

#[test]
fn test_five_transactions_all_commit_once() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("scenario.log");

    let detected = Arc::new(Mutex::new(Vec::<DeadlockInfo>::new()));
    let sink = Arc::clone(&detected);

    let report = fast_simulation(DetectionStrategy::Pairwise)
        .with_log(&log_path)
        .callback(move |info| sink.lock().unwrap().push(info))
        .run()
        .expect("simulation failed");

    assert_eq!(report.committed, vec![0, 1, 2, 3, 4]);
    assert!(report.abandoned.is_empty());
    assert!(report.restarts >= report.deadlocks);

    // Every identity committed exactly once in the event log
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(committed_ids(&log), vec![0, 1, 2, 3, 4]);

    // Every broken cycle was a pair with one victim taken from it
    for info in detected.lock().unwrap().iter() {
        assert_eq!(info.cycle.len(), 2);
        assert!(info.cycle.contains(&info.victim));
    }
}

#[test]
fn test_five_transactions_with_graph_strategy() {
    let report = fast_simulation(DetectionStrategy::WaitForGraph)
        .run()
        .expect("simulation failed");

    assert_eq!(report.committed, vec![0, 1, 2, 3, 4]);
    assert!(report.abandoned.is_empty());
}

#[test]
fn test_backoff_still_commits_everything() {
    let report = fast_simulation(DetectionStrategy::Pairwise)
        .restart_policy(RestartPolicy {
            max_restarts: None,
            backoff: Duration::from_millis(5),
        })
        .run()
        .expect("simulation failed");

    assert_eq!(report.committed, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_single_transaction_never_deadlocks() {
    let report = fast_simulation(DetectionStrategy::Pairwise)
        .transactions(1)
        .run()
        .expect("simulation failed");

    assert_eq!(report.committed, vec![0]);
    assert_eq!(report.deadlocks, 0);
    assert_eq!(report.restarts, 0);
    assert_eq!(report.mid_flight_aborts, 0);
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(Simulation::new().console(false).transactions(0).run().is_err());
    assert!(
        Simulation::new()
            .console(false)
            .poll_interval(Duration::ZERO)
            .run()
            .is_err()
    );
}
