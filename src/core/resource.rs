use crate::core::types::ResourceId;
use parking_lot::Condvar;

/// A shared exclusive-access token
///
/// Ownership itself lives in the lock table so that it is only ever read or
/// written under the global critical section. The resource carries the
/// condition variable its waiters block on.
pub struct Resource {
    id: ResourceId,
    name: String,
    /// Signalled when the resource is released or a waiter is aborted
    pub(crate) released: Condvar,
}

impl Resource {
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Resource {
            id,
            name: name.into(),
            released: Condvar::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
