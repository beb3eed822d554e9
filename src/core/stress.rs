// Randomized delays injected between protocol steps
// They widen the race window so opposing lock orders actually collide.

use rand::{Rng, rng};
use std::thread;
use std::time::Duration;

/// Configuration options for the injected delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    /// Maximum delay between two steps of an attempt, in milliseconds
    pub max_step_delay_ms: u64,
    /// Maximum delay between two transaction launches, in milliseconds
    pub max_startup_delay_ms: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        StressConfig {
            max_step_delay_ms: 300,
            max_startup_delay_ms: 100,
        }
    }
}

impl StressConfig {
    /// No delays at all
    pub fn none() -> Self {
        StressConfig {
            max_step_delay_ms: 0,
            max_startup_delay_ms: 0,
        }
    }

    /// Pause between two steps of an attempt
    pub fn step_delay(&self) {
        apply_delay(0, self.max_step_delay_ms);
    }

    /// Pause between two transaction launches
    pub fn startup_delay(&self) {
        apply_delay(0, self.max_startup_delay_ms);
    }
}

/// Apply a delay to the current thread
pub fn apply_delay(min_ms: u64, max_ms: u64) {
    if max_ms == 0 {
        return;
    }
    let delay_ms = if min_ms >= max_ms {
        min_ms
    } else {
        rng().random_range(min_ms..=max_ms)
    };
    thread::sleep(Duration::from_millis(delay_ms));
}
