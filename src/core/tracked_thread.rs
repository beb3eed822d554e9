use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Counts live transaction tasks so the entry point can wait for all of them
///
/// A task slot is reserved *before* its thread is spawned, which keeps the
/// count above zero while an aborted attempt hands over to its restart.
/// Reserving is a plain atomic increment and takes no lock, so it may happen
/// inside the lock table's critical section.
#[derive(Default)]
pub struct TaskTracker {
    live: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl TaskTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of tasks currently reserved or running
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Block until no task is running
    pub fn wait_idle(&self) {
        let mut guard = self.idle_lock.lock();
        while self.live.load(Ordering::SeqCst) > 0 {
            self.idle.wait(&mut guard);
        }
    }

    /// Reserve a slot for a task about to be spawned
    pub fn reserve(self: &Arc<Self>) -> TaskGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            tracker: Arc::clone(self),
        }
    }

    fn leave(&self) {
        if self.live.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _guard = self.idle_lock.lock();
            self.idle.notify_all();
        }
    }
}

/// A reserved tracker slot, released when dropped
pub struct TaskGuard {
    tracker: Arc<TaskTracker>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tracker.leave();
    }
}

/// A wrapper around std::thread::JoinHandle whose lifetime is counted by a
/// [`TaskTracker`]
pub struct TrackedThread<T>(JoinHandle<T>);

impl<T> TrackedThread<T>
where
    T: Send + 'static,
{
    /// Spawn a named thread counted by `tracker`
    ///
    /// # Errors
    /// Returns an error if the OS refuses to create the thread
    pub fn spawn<F>(tracker: &Arc<TaskTracker>, name: String, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::spawn_reserved(tracker.reserve(), name, f)
    }

    /// Spawn a named thread into a slot reserved earlier
    ///
    /// The slot is released when the thread ends, or right away if the
    /// thread cannot be created.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to create the thread
    pub fn spawn_reserved<F>(guard: TaskGuard, name: String, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _guard = guard;
                f()
            })
            .context("Failed to spawn transaction thread")?;
        Ok(TrackedThread(handle))
    }

    /// Wait for the thread to finish and return its result.
    pub fn join(self) -> thread::Result<T> {
        self.0.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_idle_waits_for_all_tasks() {
        let tracker = TaskTracker::new();
        let done = Arc::new(Mutex::new(0));

        for i in 0..4u64 {
            let done = Arc::clone(&done);
            TrackedThread::spawn(&tracker, format!("task-{i}"), move || {
                thread::sleep(Duration::from_millis(10 * i));
                *done.lock() += 1;
            })
            .unwrap();
        }

        tracker.wait_idle();
        assert_eq!(*done.lock(), 4);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn test_nested_spawn_keeps_tracker_busy() {
        let tracker = TaskTracker::new();
        let done = Arc::new(Mutex::new(false));

        let inner_tracker = Arc::clone(&tracker);
        let flag = Arc::clone(&done);
        TrackedThread::spawn(&tracker, "outer".into(), move || {
            TrackedThread::spawn(&inner_tracker, "inner".into(), move || {
                thread::sleep(Duration::from_millis(50));
                *flag.lock() = true;
            })
            .unwrap();
        })
        .unwrap();

        tracker.wait_idle();
        assert!(*done.lock());
    }

    #[test]
    fn test_reserved_slot_counts_before_spawn() {
        let tracker = TaskTracker::new();
        let slot = tracker.reserve();
        assert_eq!(tracker.live(), 1);

        TrackedThread::spawn_reserved(slot, "reserved".into(), || {
            thread::sleep(Duration::from_millis(20));
        })
        .unwrap();
        tracker.wait_idle();
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn test_panicking_task_is_still_counted_out() {
        let tracker = TaskTracker::new();
        let handle = TrackedThread::<()>::spawn(&tracker, "panics".into(), || {
            panic!("boom");
        })
        .unwrap();
        assert!(handle.join().is_err());
        tracker.wait_idle();
        assert_eq!(tracker.live(), 0);
    }
}
