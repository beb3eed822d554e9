//! # deadlock-sim
//!
//! Deadlock formation, detection and recovery in a two-resource locking
//! scenario.
//!
//! Transactions take resources A and B in opposing orders (even identities
//! A then B, odd identities B then A), so circular waits form naturally. A
//! background detector sweeps the wait-for registry at a fixed interval,
//! aborts the youngest member of every cycle it finds, and the victim is
//! relaunched as a fresh instance until its identity commits.
//!
//! ## Features
//!
//! - Blocking acquire/release with a wait-for registry
//! - Pairwise 2-cycle sweep, or a full wait-for graph search
//! - Victim abort with forced release and automatic restart
//! - Optional restart cap and exponential backoff
//! - Colored console narration and JSON-lines event log

mod core;
pub use crate::core::{
    DEFAULT_TRANSACTIONS, Simulation, SimulationConfig,
    detector::{DEFAULT_SWEEP_INTERVAL, DeadlockCallback, Detector, DetectorConfig, DetectorHandle},
    engine::{Engine, Report},
    lock_manager::{DEFAULT_POLL_INTERVAL, LockManager, LockTable, RESOURCE_A, RESOURCE_B},
    logger::{EventLogger, LogEntry},
    registry::{WaitForRegistry, WaitRecord},
    resource::Resource,
    restart::RestartPolicy,
    runner::{AttemptOutcome, acquisition_order},
    stress::StressConfig,
    tracked_thread::{TaskGuard, TaskTracker, TrackedThread},
    transaction::Transaction,
    types::{
        DeadlockInfo, DetectionStrategy, Events, InstanceId, ResourceId, Timestamp,
        TimestampClock, TxnId,
    },
};

pub const BANNER: &str = r#"
  ┌─┐ ┌──  ┌─┐ ┌─┐ ┬   ┌─┐ ┌── ┬┌
  │ │ ├─   ├─┤ │ │ │   │ │ │   ├┴┐
  └─┘ └──  ┴ ┴ └─┘ ┴─┘ └─┘ └── ┴ ┴  sim
"#;
