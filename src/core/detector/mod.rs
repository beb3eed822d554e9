pub mod deadlock_handling;
mod graph;
mod pairwise;

use crate::core::engine::Engine;
use crate::core::lock_manager::LockTable;
use crate::core::tracked_thread::TaskGuard;
use crate::core::transaction::Transaction;
use crate::core::types::{DeadlockInfo, DetectionStrategy};
use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default pause between two sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Callback invoked for every broken cycle
pub type DeadlockCallback = Arc<dyn Fn(DeadlockInfo) + Send + Sync>;

/// Configuration for the deadlock detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Pause between two sweeps
    pub interval: Duration,
    /// Cycle search run on each sweep
    pub strategy: DetectionStrategy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            interval: DEFAULT_SWEEP_INTERVAL,
            strategy: DetectionStrategy::Pairwise,
        }
    }
}

/// Background dispatcher for asynchronous callback execution
///
/// Runs a dedicated thread that receives deadlock events through a channel
/// and executes the registered callback, so user code never runs inside the
/// detector's sweep. Dropping the dispatcher waits for queued events to be
/// delivered.
struct Dispatcher {
    sender: Option<Sender<DeadlockInfo>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    fn new(callback: DeadlockCallback) -> Result<Self> {
        let (tx, rx) = unbounded::<DeadlockInfo>();
        let thread_handle = thread::Builder::new()
            .name("deadlock-dispatcher".into())
            .spawn(move || {
                while let Ok(info) = rx.recv() {
                    callback(info);
                }
            })
            .context("Failed to spawn dispatcher thread")?;

        Ok(Dispatcher {
            sender: Some(tx),
            thread_handle: Some(thread_handle),
        })
    }

    fn send(&self, info: DeadlockInfo) {
        // Dropped if the dispatcher thread is gone
        if let Some(sender) = &self.sender {
            let _ = sender.send(info);
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the dispatcher loop
        self.sender.take();
        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            eprintln!("Warning: deadlock callback panicked");
        }
    }
}

/// A cycle broken during a sweep, waiting to be reported and restarted
pub(crate) struct BrokenCycle {
    pub(crate) info: DeadlockInfo,
    pub(crate) victim: Arc<Transaction>,
    pub(crate) slot: TaskGuard,
}

/// Periodic deadlock detector
///
/// Each sweep runs under the lock table's critical section, looks for
/// circular waits among the wait records and breaks every cycle it finds by
/// aborting the member with the greatest timestamp. Reporting and restarting
/// the victims happens after the critical section is left.
pub struct Detector {
    engine: Arc<Engine>,
    config: DetectorConfig,
    dispatcher: Option<Dispatcher>,
}

impl Detector {
    pub fn new(engine: Arc<Engine>, config: DetectorConfig) -> Self {
        Detector {
            engine,
            config,
            dispatcher: None,
        }
    }

    /// Set a callback to be invoked for every broken cycle
    ///
    /// # Errors
    /// Returns an error if the dispatcher thread cannot be spawned
    pub fn with_callback(mut self, callback: DeadlockCallback) -> Result<Self> {
        self.dispatcher = Some(Dispatcher::new(callback)?);
        Ok(self)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run one sweep
    ///
    /// # Returns
    /// One entry per cycle broken during this sweep
    pub fn sweep(&self) -> Vec<DeadlockInfo> {
        let manager = self.engine.lock_manager();
        let broken = {
            let mut table = manager.lock_table();
            self.find_and_break(&mut table)
        };

        let mut infos = Vec::with_capacity(broken.len());
        for BrokenCycle { info, victim, slot } in broken {
            if let Some(dispatcher) = &self.dispatcher {
                dispatcher.send(info.clone());
            }
            if let Err(e) = self.engine.restart(victim, slot) {
                eprintln!("Failed to restart transaction [{}]: {e:?}", info.victim);
            }
            infos.push(info);
        }
        infos
    }

    fn find_and_break(&self, table: &mut LockTable) -> Vec<BrokenCycle> {
        if table.registry().len() < 2 {
            return Vec::new();
        }
        match self.config.strategy {
            DetectionStrategy::Pairwise => self.sweep_pairwise(table),
            DetectionStrategy::WaitForGraph => self.sweep_graph(table),
        }
    }

    /// Start sweeping on a background thread
    ///
    /// # Errors
    /// Returns an error if the detector thread cannot be spawned
    pub fn spawn(self) -> Result<DetectorHandle> {
        let (stop_tx, stop_rx) = unbounded::<()>();
        let interval = self.config.interval;
        let thread = thread::Builder::new()
            .name("deadlock-detector".into())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.sweep();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .context("Failed to spawn detector thread")?;

        Ok(DetectorHandle {
            stop_tx,
            thread: Some(thread),
        })
    }
}

/// Handle to a running detector thread; stops it when dropped
pub struct DetectorHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl DetectorHandle {
    /// Stop sweeping and wait for the detector thread to exit
    ///
    /// # Errors
    /// Returns an error if the detector thread panicked
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let _ = self.stop_tx.send(());
        thread
            .join()
            .map_err(|_| anyhow!("Deadlock detector thread panicked"))
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            eprintln!("Warning: {e:?}");
        }
    }
}
