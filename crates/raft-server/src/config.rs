//! # config
//!
//! why: tune the run loop's timing and queue bounds
//! relations: consumed by node.rs at start, heartbeat tolerance feeds detector.rs
//! what: RaftNodeConfig with defaults, json loading and validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{RaftNodeError, Result};

/// Configuration for the run loop of one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaftNodeConfig {
    /// This member's id; must be non-zero
    pub node_id: u64,

    /// Interval between engine ticks in milliseconds.
    /// Heartbeats go out on this cadence while leading.
    pub heartbeat_interval_ms: u64,

    /// Apply units the pipeline may hold before the loop blocks on hand-off
    pub apply_queue_capacity: usize,

    /// Read states buffered for readers; extra ones are dropped
    pub read_state_queue_capacity: usize,

    /// A heartbeat gap above `heartbeat_tolerance * heartbeat_interval` is reported
    pub heartbeat_tolerance: u32,
}

impl Default for RaftNodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            heartbeat_interval_ms: 100,
            // hand-off is effectively synchronous with one slot
            apply_queue_capacity: 1,
            read_state_queue_capacity: 1,
            heartbeat_tolerance: 2,
        }
    }
}

impl RaftNodeConfig {
    pub fn new(node_id: u64) -> Self {
        Self {
            node_id,
            ..Self::default()
        }
    }

    /// Load a configuration from a json file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RaftNodeError::Config(format!("reading {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| RaftNodeError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Longest acceptable gap between two heartbeats to the same peer
    pub fn max_heartbeat_gap(&self) -> Duration {
        self.heartbeat_interval() * self.heartbeat_tolerance
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id == 0 {
            return Err(RaftNodeError::Config("node_id must be non-zero".into()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(RaftNodeError::Config("heartbeat_interval_ms must be positive".into()));
        }
        if self.apply_queue_capacity == 0 {
            return Err(RaftNodeError::Config("apply_queue_capacity must be positive".into()));
        }
        if self.read_state_queue_capacity == 0 {
            return Err(RaftNodeError::Config(
                "read_state_queue_capacity must be positive".into(),
            ));
        }
        if self.heartbeat_tolerance == 0 {
            return Err(RaftNodeError::Config("heartbeat_tolerance must be positive".into()));
        }
        Ok(())
    }
}
