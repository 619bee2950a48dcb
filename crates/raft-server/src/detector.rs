//! # detector
//!
//! why: notice a leader sending heartbeats late, usually a sign of a slow disk stalling the loop
//! relations: owned by filter.rs, which feeds it outbound heartbeats; only logs, never drops
//! what: TimeoutDetector

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct TimeoutDetector {
    max_gap: Duration,
    last_seen: HashMap<u64, Instant>,
}

impl TimeoutDetector {
    pub fn new(max_gap: Duration) -> Self {
        Self {
            max_gap,
            last_seen: HashMap::new(),
        }
    }

    /// Record an event for `id` now; see [`observe_at`](Self::observe_at)
    pub fn observe(&mut self, id: u64) -> Option<Duration> {
        self.observe_at(id, Instant::now())
    }

    /// Record an event for `id` at `now`
    ///
    /// returns how far the gap since the previous event overshot the limit,
    /// or None when it was on time (or this is the first event)
    pub fn observe_at(&mut self, id: u64, now: Instant) -> Option<Duration> {
        let previous = self.last_seen.insert(id, now)?;
        let gap = now.saturating_duration_since(previous);
        (gap > self.max_gap).then(|| gap - self.max_gap)
    }

    /// Forget all history, e.g. after losing leadership
    pub fn reset(&mut self) {
        self.last_seen.clear();
    }
}
