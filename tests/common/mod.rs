use deadlock_sim::{
    DeadlockInfo, DetectionStrategy, Detector, DetectorConfig, DetectorHandle, Engine,
    EventLogger, LockManager, RESOURCE_A, RESOURCE_B, RestartPolicy, StressConfig, Transaction,
    TrackedThread,
};
use std::sync::{Arc, Barrier, mpsc};
use std::time::Duration;

#[allow(dead_code)]
pub const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(3);
#[allow(dead_code)]
pub const NO_DEADLOCK_TIMEOUT: Duration = Duration::from_millis(300);
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(50);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[allow(dead_code)]
pub struct DetectorHarness {
    pub engine: Arc<Engine>,
    pub rx: mpsc::Receiver<DeadlockInfo>,
    pub handle: DetectorHandle,
}

#[allow(dead_code)]
pub fn start_detector(strategy: DetectionStrategy, policy: RestartPolicy) -> DetectorHarness {
    let manager = LockManager::two_resources(POLL_INTERVAL, Arc::new(EventLogger::disabled()));
    let engine = Engine::new(manager, StressConfig::none(), policy);

    let (tx, rx) = mpsc::channel::<DeadlockInfo>();
    let tx = std::sync::Mutex::new(tx);
    let handle = Detector::new(
        Arc::clone(&engine),
        DetectorConfig {
            interval: SWEEP_INTERVAL,
            strategy,
        },
    )
    .with_callback(Arc::new(move |info: DeadlockInfo| {
        let _ = tx.lock().unwrap().send(info);
    }))
    .expect("Failed to start dispatcher")
    .spawn()
    .expect("Failed to start detector");

    DetectorHarness { engine, rx, handle }
}

#[allow(dead_code)]
pub fn expect_deadlock(h: &DetectorHarness, timeout: Duration) -> DeadlockInfo {
    match h.rx.recv_timeout(timeout) {
        Ok(info) => info,
        Err(_) => panic!("No deadlock detected within {timeout:?}"),
    }
}

#[allow(dead_code)]
pub fn assert_no_deadlock(h: &DetectorHarness, timeout: Duration) {
    assert!(
        h.rx.recv_timeout(timeout).is_err(),
        "Unexpected deadlock detected"
    );
}

#[allow(dead_code)]
/// Body of one hand-driven transaction: take `first`, meet the other side at
/// the barrier, take `second`, then release and commit
fn locked_pair(engine: &Engine, txn: &Arc<Transaction>, first: usize, second: usize, barrier: &Barrier) {
    let manager = engine.lock_manager();
    assert!(manager.acquire(txn, first));
    barrier.wait();
    if !manager.acquire(txn, second) {
        return;
    }
    manager.release(txn, first);
    manager.release(txn, second);
    manager.finalize(txn);
}

/// Force the classic circular wait: transaction 0 holds A and wants B,
/// transaction 1 holds B and wants A. Transaction 1 is created last and so
/// carries the greater timestamp.
#[allow(dead_code)]
pub fn force_two_cycle(engine: &Arc<Engine>) -> (Arc<Transaction>, Arc<Transaction>) {
    let t0 = Transaction::new(0, engine.clock().tick());
    let t1 = Transaction::new(1, engine.clock().tick());
    let barrier = Arc::new(Barrier::new(2));

    for (txn, first, second) in [
        (Arc::clone(&t0), RESOURCE_A, RESOURCE_B),
        (Arc::clone(&t1), RESOURCE_B, RESOURCE_A),
    ] {
        let engine_clone = Arc::clone(engine);
        let barrier = Arc::clone(&barrier);
        TrackedThread::spawn(engine.tracker(), format!("forced-{}", txn.id()), move || {
            locked_pair(&engine_clone, &txn, first, second, &barrier)
        })
        .expect("Failed to spawn transaction thread");
    }

    (t0, t1)
}
