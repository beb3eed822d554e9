use crate::core::engine::Engine;
use crate::core::runner::AttemptOutcome;
use crate::core::tracked_thread::{TaskGuard, TrackedThread};
use crate::core::transaction::Transaction;
use crate::core::types::Events;
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// Largest exponent applied to the backoff base
const MAX_BACKOFF_SHIFT: u32 = 16;

/// How aborted transactions are relaunched
///
/// The default retries forever and immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestartPolicy {
    /// Maximum number of restarts per identity, `None` for unbounded
    pub max_restarts: Option<u32>,
    /// Base delay before a restart, doubled for every further restart
    pub backoff: Duration,
}

impl RestartPolicy {
    /// Delay before launching restart number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() || attempt == 0 {
            return Duration::ZERO;
        }
        let shift = (attempt - 1).min(MAX_BACKOFF_SHIFT);
        self.backoff.saturating_mul(1u32 << shift)
    }

    /// Whether restart number `attempt` is still allowed
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_restarts.is_none_or(|max| attempt <= max)
    }
}

impl Engine {
    /// Relaunch an aborted instance on a thread occupying `slot`
    ///
    /// `slot` must have been reserved before the victim could observe its
    /// abort, so the tracker never reports idle in between.
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned
    pub fn restart(
        self: &Arc<Self>,
        victim: Arc<Transaction>,
        slot: TaskGuard,
    ) -> Result<TrackedThread<Option<AttemptOutcome>>> {
        let engine = Arc::clone(self);
        TrackedThread::spawn_reserved(slot, format!("txn-{}-restart", victim.id()), move || {
            engine.run_restart(&victim)
        })
    }

    /// Restart protocol for one aborted instance
    ///
    /// # Returns
    /// The outcome of the fresh attempt, or `None` if no attempt was made
    /// (already committed, or restart cap reached)
    pub fn run_restart(&self, victim: &Transaction) -> Option<AttemptOutcome> {
        let attempt = victim.attempt() + 1;
        thread::sleep(self.restart.backoff_for(attempt));

        let fresh = {
            let table = self.manager.lock_table();
            if table.is_completed(victim.id()) {
                self.narrate(Events::RestartSkipped, victim);
                return None;
            }
            if !self.restart.allows(attempt) {
                self.narrate(Events::GaveUp, victim);
                None
            } else {
                let fresh = Transaction::restart_of(victim, self.clock.tick());
                self.narrate(Events::Restarting, &fresh);
                Some(fresh)
            }
        };

        let Some(fresh) = fresh else {
            self.abandoned.lock().push(victim.id());
            return None;
        };

        self.stats.restarts.fetch_add(1, Ordering::SeqCst);
        Some(self.run_attempt(&fresh))
    }
}
