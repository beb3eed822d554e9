use crate::core::types::{InstanceId, Timestamp, TxnId, next_instance_id};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One incarnation of a logical transaction
///
/// The `id` survives restarts; everything else is per instance. Instances are
/// shared as `Arc<Transaction>` between the runner, the lock table and the
/// detector.
pub struct Transaction {
    id: TxnId,
    instance: InstanceId,
    timestamp: Timestamp,
    attempt: u32,
    /// Only ever transitioned false -> true, while holding the lock table
    aborted: AtomicBool,
}

impl Transaction {
    /// Create the first instance of a transaction
    pub fn new(id: TxnId, timestamp: Timestamp) -> Arc<Self> {
        Arc::new(Transaction {
            id,
            instance: next_instance_id(),
            timestamp,
            attempt: 0,
            aborted: AtomicBool::new(false),
        })
    }

    /// Create the instance that replaces an aborted one
    pub fn restart_of(previous: &Transaction, timestamp: Timestamp) -> Arc<Self> {
        Arc::new(Transaction {
            id: previous.id,
            instance: next_instance_id(),
            timestamp,
            attempt: previous.attempt + 1,
            aborted: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Number of restarts that preceded this instance
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Set the abort flag
    ///
    /// # Returns
    /// `true` if this call performed the transition, `false` if the instance
    /// was already aborted
    pub(crate) fn abort(&self) -> bool {
        !self.aborted.swap(true, Ordering::SeqCst)
    }

    /// Whether `other` is this very instance
    pub fn same_instance(&self, other: &Transaction) -> bool {
        self.instance == other.instance
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("instance", &self.instance)
            .field("timestamp", &self.timestamp)
            .field("attempt", &self.attempt)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
