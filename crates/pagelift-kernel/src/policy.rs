//! Idle eviction policy.

use std::time::Duration;

/// Process-wide idle eviction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    /// Time between idle checks.
    pub poll_interval: Duration,
    /// A resource unused for longer than this is evicted.
    pub idle_threshold: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            idle_threshold: Duration::from_secs(120),
        }
    }
}

impl IdlePolicy {
    pub fn new(poll_interval: Duration, idle_threshold: Duration) -> Self {
        Self {
            poll_interval,
            idle_threshold,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_idle_threshold(mut self, threshold: Duration) -> Self {
        self.idle_threshold = threshold;
        self
    }

    /// True when a resource idle for `idle` should be evicted.
    pub fn is_expired(&self, idle: Duration) -> bool {
        idle > self.idle_threshold
    }
}
