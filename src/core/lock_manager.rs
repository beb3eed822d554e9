//! Blocking acquire/release over a fixed set of resources
//!
//! All shared state (resource ownership, the Wait-For Registry and the
//! completed-set) lives in a single [`LockTable`] behind one mutex. Waiters
//! block on the condition variable of the resource they want, paired with
//! that same mutex, and re-check their condition at least every
//! `poll_interval`.

use crate::core::logger::{EventLogger, LogEntry};
use crate::core::registry::WaitForRegistry;
use crate::core::resource::Resource;
use crate::core::transaction::Transaction;
use crate::core::types::{Events, ResourceId, TxnId};
use fxhash::FxHashSet;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;

/// First resource of the two-resource scenario
pub const RESOURCE_A: ResourceId = 0;
/// Second resource of the two-resource scenario
pub const RESOURCE_B: ResourceId = 1;

/// Default interval between re-checks of a blocked acquire
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// State guarded by the global critical section
pub struct LockTable {
    /// Current owner per resource, indexed by `ResourceId`
    owners: Vec<Option<Arc<Transaction>>>,
    registry: WaitForRegistry,
    completed: FxHashSet<TxnId>,
}

impl LockTable {
    fn new(resource_count: usize) -> Self {
        LockTable {
            owners: vec![None; resource_count],
            registry: WaitForRegistry::new(),
            completed: FxHashSet::default(),
        }
    }

    pub fn owner(&self, resource: ResourceId) -> Option<&Arc<Transaction>> {
        self.owners.get(resource).and_then(Option::as_ref)
    }

    /// Whether `resource` is owned by exactly this instance
    pub fn owned_by(&self, resource: ResourceId, txn: &Transaction) -> bool {
        self.owner(resource).is_some_and(|o| o.same_instance(txn))
    }

    pub fn registry(&self) -> &WaitForRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn registry_mut(&mut self) -> &mut WaitForRegistry {
        &mut self.registry
    }

    pub fn is_completed(&self, id: TxnId) -> bool {
        self.completed.contains(&id)
    }
}

/// Exposes blocking acquire/release operations on a set of resources
pub struct LockManager {
    resources: Vec<Resource>,
    table: Mutex<LockTable>,
    poll_interval: Duration,
    logger: Arc<EventLogger>,
}

impl LockManager {
    /// Create a lock manager owning one resource per name
    pub fn new<S: AsRef<str>>(names: &[S], poll_interval: Duration, logger: Arc<EventLogger>) -> Self {
        let resources = names
            .iter()
            .enumerate()
            .map(|(id, name)| Resource::new(id, name.as_ref()))
            .collect::<Vec<_>>();
        LockManager {
            table: Mutex::new(LockTable::new(resources.len())),
            resources,
            poll_interval,
            logger,
        }
    }

    /// Lock manager for the scenario: resources "A" and "B"
    pub fn two_resources(poll_interval: Duration, logger: Arc<EventLogger>) -> Self {
        Self::new(&["A", "B"], poll_interval, logger)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// # Panics
    /// Panics if `id` does not name a resource of this manager
    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id]
    }

    pub fn logger(&self) -> &Arc<EventLogger> {
        &self.logger
    }

    /// Enter the global critical section
    pub fn lock_table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock()
    }

    /// Acquire `resource` for `txn`, blocking while another instance owns it
    ///
    /// # Returns
    /// * `true` - the caller now owns the resource
    /// * `false` - the caller was aborted; it must abandon its attempt
    ///
    /// # Panics
    /// Panics if `resource` does not name a resource of this manager
    pub fn acquire(&self, txn: &Arc<Transaction>, resource: ResourceId) -> bool {
        let res = &self.resources[resource];
        let mut table = self.table.lock();

        if txn.is_aborted() {
            table.registry.remove(txn, resource);
            return false;
        }

        match table.owner(resource).map(|owner| owner.same_instance(txn)) {
            None => {
                table.owners[resource] = Some(Arc::clone(txn));
                self.narrate(Events::Acquired, txn, res);
                return true;
            }
            Some(true) => return true,
            Some(false) => {}
        }

        table.registry.register(txn, resource);
        self.narrate(Events::Waiting, txn, res);

        loop {
            res.released.wait_for(&mut table, self.poll_interval);

            if txn.is_aborted() {
                // Ownership was already revoked by the detector
                table.registry.remove(txn, resource);
                return false;
            }

            if table.owners[resource].is_none() {
                table.owners[resource] = Some(Arc::clone(txn));
                table.registry.remove(txn, resource);
                self.narrate(Events::AcquiredAfterWait, txn, res);
                return true;
            }
        }
    }

    /// Release `resource` if `txn` is its current owner; no-op otherwise
    pub fn release(&self, txn: &Transaction, resource: ResourceId) {
        let mut table = self.table.lock();
        self.release_locked(&mut table, txn, resource);
    }

    fn release_locked(&self, table: &mut LockTable, txn: &Transaction, resource: ResourceId) -> bool {
        if !table.owned_by(resource, txn) {
            return false;
        }
        table.owners[resource] = None;
        let res = &self.resources[resource];
        self.narrate(Events::Released, txn, res);
        res.released.notify_all();
        true
    }

    /// Mark the transaction's identity as committed
    ///
    /// # Returns
    /// `true` exactly once per identity, `false` for every later call
    pub fn finalize(&self, txn: &Transaction) -> bool {
        let mut table = self.table.lock();
        if !table.completed.insert(txn.id()) {
            return false;
        }
        self.logger.log(
            LogEntry::new(Events::Committed).txn(txn.id(), txn.instance(), txn.attempt()),
        );
        true
    }

    /// Abort `victim` and revoke everything it holds
    ///
    /// Sets the abort flag, releases every resource the victim owns, drops
    /// all its wait records and wakes every waiter so the victim observes its
    /// abort and others can claim the freed resources. Must be called from
    /// inside the critical section.
    ///
    /// # Returns
    /// `true` if the victim was not already aborted
    pub fn abort_victim(&self, table: &mut LockTable, victim: &Transaction) -> bool {
        if !victim.abort() {
            return false;
        }
        self.logger.log(
            LogEntry::new(Events::Aborted).txn(victim.id(), victim.instance(), victim.attempt()),
        );

        for resource in 0..self.resources.len() {
            self.release_locked(table, victim, resource);
        }
        table.registry.remove_transaction(victim);

        for res in &self.resources {
            res.released.notify_all();
        }
        true
    }

    pub fn is_completed(&self, id: TxnId) -> bool {
        self.table.lock().is_completed(id)
    }

    /// Current owner of `resource`
    pub fn owner_of(&self, resource: ResourceId) -> Option<Arc<Transaction>> {
        self.table.lock().owner(resource).cloned()
    }

    /// Snapshot of the registry as `(id, resource)` pairs
    pub fn wait_records(&self) -> Vec<(TxnId, ResourceId)> {
        self.table.lock().registry.summary()
    }

    /// Committed identities in ascending order
    pub fn completed(&self) -> Vec<TxnId> {
        let mut ids = self
            .table
            .lock()
            .completed
            .iter()
            .copied()
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    fn narrate(&self, event: Events, txn: &Transaction, res: &Resource) {
        self.logger.log(
            LogEntry::new(event)
                .txn(txn.id(), txn.instance(), txn.attempt())
                .resource(res.id(), res.name()),
        );
    }
}
