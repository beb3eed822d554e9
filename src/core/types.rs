use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction identifier type
///
/// Stable across restarts: a restarted instance carries the same `TxnId`
/// as the instance it replaces.
pub type TxnId = usize;

/// Resource identifier type
///
/// Index of a resource inside its lock manager.
pub type ResourceId = usize;

/// Identifies one incarnation of a transaction
pub type InstanceId = u64;

// Global counter for assigning unique instance IDs
static INSTANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-wide unique instance identifier
pub fn next_instance_id() -> InstanceId {
    INSTANCE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Logical creation time of a transaction instance
///
/// Only the relative order carries meaning. The deadlock detector aborts the
/// cycle member with the greatest timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from a raw tick value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw tick value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of transaction timestamps
///
/// Each call to [`TimestampClock::tick`] returns a strictly greater value than
/// the previous one, so a restarted instance is always "younger" than the
/// instance it replaces.
#[derive(Debug)]
pub struct TimestampClock {
    counter: AtomicU64,
}

impl Default for TimestampClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampClock {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Issue the next timestamp
    pub fn tick(&self) -> Timestamp {
        Timestamp(self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

/// Represents the type of state transition that occurred
///
/// Every transition of the locking protocol is narrated with one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Events {
    /// An attempt started running
    Started,
    /// Transaction is blocked waiting for a resource
    Waiting,
    /// Transaction took a free resource
    Acquired,
    /// Transaction took a resource after waiting for it
    AcquiredAfterWait,
    /// Transaction released a resource
    Released,
    /// Transaction committed
    Committed,
    /// A circular wait was found
    DeadlockDetected,
    /// Transaction was chosen as victim and aborted
    Aborted,
    /// Runner observed its abort flag and abandoned the attempt
    AbortedMidFlight,
    /// A fresh instance is being launched for an aborted transaction
    Restarting,
    /// Restart was not needed because the transaction already committed
    RestartSkipped,
    /// Restart cap reached, the transaction is abandoned
    GaveUp,
}

impl Events {
    /// Console color category used when narrating this event
    pub fn color(&self) -> &'static str {
        match self {
            Events::Started => "\x1b[37m",
            Events::Waiting => "\x1b[33m",
            Events::Acquired | Events::AcquiredAfterWait => "\x1b[32m",
            Events::Released | Events::Restarting => "\x1b[38;5;19m",
            Events::Committed => "\x1b[4;34m",
            Events::DeadlockDetected | Events::Aborted | Events::AbortedMidFlight => "\x1b[31m",
            Events::RestartSkipped => "\x1b[36m",
            Events::GaveUp => "\x1b[1;31m",
        }
    }
}

/// Which cycle search the detector runs on each sweep
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DetectionStrategy {
    /// Compare every pair of wait records for a direct 2-cycle
    #[default]
    Pairwise,
    /// Build the full wait-for graph and search for cycles of any length
    WaitForGraph,
}

/// Represents the result of a deadlock detection
///
/// Passed to the deadlock callback after the victim has been aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockInfo {
    /// Transactions forming the cycle, in wait order
    pub cycle: Vec<TxnId>,

    /// For each cycle member, the resource it was blocked on
    pub waiting_for: Vec<(TxnId, ResourceId)>,

    /// Transaction that was aborted to break the cycle
    pub victim: TxnId,

    /// Timestamp of the aborted instance
    pub victim_timestamp: Timestamp,

    /// Search that found the cycle
    pub strategy: DetectionStrategy,

    /// ISO-8601 formatted timestamp indicating when the deadlock was detected
    pub detected_at: String,
}
