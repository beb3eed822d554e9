//! Wait-For Registry
//!
//! Records "transaction T is blocked on resource R" facts. The registry has no
//! locking of its own: it lives inside the lock table and is only touched
//! while the global critical section is held.

use crate::core::transaction::Transaction;
use crate::core::types::{ResourceId, TxnId};
use std::sync::Arc;

/// A transaction blocked on a resource
#[derive(Debug, Clone)]
pub struct WaitRecord {
    pub txn: Arc<Transaction>,
    pub resource: ResourceId,
}

impl WaitRecord {
    pub fn new(txn: Arc<Transaction>, resource: ResourceId) -> Self {
        WaitRecord { txn, resource }
    }
}

/// Ordered collection of wait records
#[derive(Debug, Default)]
pub struct WaitForRegistry {
    records: Vec<WaitRecord>,
}

impl WaitForRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register that `txn` is blocked on `resource`
    ///
    /// A second registration of the same instance on the same resource is
    /// ignored.
    pub fn register(&mut self, txn: &Arc<Transaction>, resource: ResourceId) {
        if self.contains(txn, resource) {
            return;
        }
        self.records
            .push(WaitRecord::new(Arc::clone(txn), resource));
    }

    /// Remove the record of `txn` waiting on `resource`, if any
    pub fn remove(&mut self, txn: &Transaction, resource: ResourceId) {
        self.records
            .retain(|r| !(r.txn.same_instance(txn) && r.resource == resource));
    }

    /// Remove every record belonging to `txn`
    pub fn remove_transaction(&mut self, txn: &Transaction) {
        self.records.retain(|r| !r.txn.same_instance(txn));
    }

    pub fn contains(&self, txn: &Transaction, resource: ResourceId) -> bool {
        self.records
            .iter()
            .any(|r| r.txn.same_instance(txn) && r.resource == resource)
    }

    /// Resource the given instance is blocked on, if it is waiting at all
    pub fn waiting_on(&self, txn: &Transaction) -> Option<ResourceId> {
        self.records
            .iter()
            .find(|r| r.txn.same_instance(txn))
            .map(|r| r.resource)
    }

    pub fn records(&self) -> &[WaitRecord] {
        &self.records
    }

    /// `(id, resource)` pairs in registry order
    pub fn summary(&self) -> Vec<(TxnId, ResourceId)> {
        self.records
            .iter()
            .map(|r| (r.txn.id(), r.resource))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
