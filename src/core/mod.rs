// Core types
pub mod types;
pub use types::*;

// Data model
pub mod registry;
pub mod resource;
pub mod transaction;

// Logging functionality
pub mod logger;

// Graph implementation
pub mod graph;

// Locking, running, restarting
pub mod engine;
pub mod lock_manager;
pub mod restart;
pub mod runner;
pub mod stress;
pub mod tracked_thread;

// Deadlock detector
pub mod detector;

use crate::core::detector::{DeadlockCallback, Detector, DetectorConfig};
use crate::core::engine::{Engine, Report};
use crate::core::lock_manager::{DEFAULT_POLL_INTERVAL, LockManager};
use crate::core::logger::EventLogger;
use crate::core::restart::RestartPolicy;
use crate::core::stress::StressConfig;
use crate::core::transaction::Transaction;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of transactions in the classic scenario
pub const DEFAULT_TRANSACTIONS: usize = 5;

/// Everything a simulation run can be tuned with
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Transactions launched, with identities `0..transactions`
    pub transactions: usize,
    /// Random delays between steps and launches
    pub stress: StressConfig,
    /// Sweep interval and cycle search
    pub detector: DetectorConfig,
    /// Upper bound between two re-checks of a blocked acquire
    pub poll_interval: Duration,
    /// Retry cap and backoff for aborted transactions
    pub restart: RestartPolicy,
    /// Print colored narration to stdout
    pub console: bool,
    /// Optional JSON-lines event log
    pub log_path: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            transactions: DEFAULT_TRANSACTIONS,
            stress: StressConfig::default(),
            detector: DetectorConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            restart: RestartPolicy::default(),
            console: true,
            log_path: None,
        }
    }
}

impl SimulationConfig {
    /// Reject settings the simulation cannot run with
    ///
    /// # Errors
    /// Returns an error if there is no transaction or an interval is zero
    pub fn validate(&self) -> Result<()> {
        if self.transactions == 0 {
            bail!("at least one transaction is required");
        }
        if self.detector.interval.is_zero() {
            bail!("detector interval must be greater than zero");
        }
        if self.poll_interval.is_zero() {
            bail!("poll interval must be greater than zero");
        }
        Ok(())
    }
}

/// Simulation builder
///
/// ```no_run
/// use deadlock_sim::Simulation;
///
/// let report = Simulation::new()
///     .console(false)
///     .callback(|info| println!("broke cycle {:?}", info.cycle))
///     .run()
///     .unwrap();
/// assert_eq!(report.committed, vec![0, 1, 2, 3, 4]);
/// ```
pub struct Simulation {
    config: SimulationConfig,
    callback: Option<DeadlockCallback>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Create a new simulation with default settings
    ///
    /// By default:
    /// - Five transactions, 0..=300 ms step delay, 0..=100 ms startup delay
    /// - Pairwise detection every 500 ms
    /// - Unbounded immediate restarts
    /// - Console narration on, no log file, no callback
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        Simulation {
            config,
            callback: None,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn transactions(mut self, count: usize) -> Self {
        self.config.transactions = count;
        self
    }

    pub fn stress(mut self, stress: StressConfig) -> Self {
        self.config.stress = stress;
        self
    }

    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.config.restart = policy;
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Activate the JSON event log
    ///
    /// If the path contains "{timestamp}", it will be replaced with the
    /// current timestamp.
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config.log_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set a callback to be invoked for every deadlock the detector breaks
    ///
    /// The callback runs on a dispatcher thread, after the victim has been
    /// aborted.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(crate::DeadlockInfo) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Build the shared context without starting anything
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the logger
    /// cannot be created
    pub fn build(&self) -> Result<Arc<Engine>> {
        self.config.validate()?;
        let logger = EventLogger::new(self.config.console, self.config.log_path.as_ref())
            .context("Failed to initialize logger")?;
        let manager = LockManager::two_resources(self.config.poll_interval, Arc::new(logger));
        Ok(Engine::new(manager, self.config.stress, self.config.restart))
    }

    /// Run the scenario to completion
    ///
    /// Starts the detector, launches every transaction with a random pause
    /// between launches, waits until every attempt (restarts included) has
    /// finished, then stops the detector.
    ///
    /// # Errors
    /// Returns an error if setup fails or a thread cannot be spawned
    pub fn run(self) -> Result<Report> {
        let engine = self.build()?;
        let started = Instant::now();

        let mut detector = Detector::new(Arc::clone(&engine), self.config.detector);
        if let Some(callback) = self.callback {
            detector = detector.with_callback(callback)?;
        }
        let detector = detector.spawn()?;

        for id in 0..self.config.transactions {
            let txn = Transaction::new(id, engine.clock().tick());
            engine
                .launch(txn)
                .with_context(|| format!("Failed to launch transaction [{id}]"))?;
            self.config.stress.startup_delay();
        }

        engine.tracker().wait_idle();
        detector.stop()?;
        engine.lock_manager().logger().flush()?;

        Ok(engine.report(started.elapsed()))
    }
}
