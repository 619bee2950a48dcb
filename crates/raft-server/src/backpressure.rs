//! # backpressure
//!
//! why: keep the engine's membership view from running ahead of the state machine
//! relations: called by node.rs, which then awaits the round's ApplyWaiter before advancing
//! what: requires_apply_barrier

use raft_core::{LogEntry, Ready};

/// true iff any committed entry of `ready` changes membership
pub fn requires_apply_barrier(ready: &Ready) -> bool {
    ready.committed_entries.iter().any(LogEntry::is_conf_change)
}
