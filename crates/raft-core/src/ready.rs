//! # ready
//!
//! why: one round's worth of work the engine hands to the server
//! relations: built from node.rs, log.rs and message.rs types; consumed once by raft-server
//! what: Ready batch

use crate::log::{LogEntry, Snapshot};
use crate::message::Message;
use crate::node::{HardState, ReadState, SoftState};

/// Output of one consensus round
///
/// consumed exactly once by the run loop, never mutated after production
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ready {
    /// leadership transition, if any happened this round
    pub soft_state: Option<SoftState>,
    /// term/vote/commit to persist, if changed
    pub hard_state: Option<HardState>,
    pub read_states: Vec<ReadState>,
    /// unstable entries that must be persisted
    pub entries: Vec<LogEntry>,
    /// snapshot that must be persisted
    pub snapshot: Option<Snapshot>,
    /// entries committed by quorum, ready to apply
    pub committed_entries: Vec<LogEntry>,
    /// outbound messages, sent only after persistence
    pub messages: Vec<Message>,
}

impl Ready {
    /// true when applying this batch would have no effect
    pub fn is_empty(&self) -> bool {
        self.soft_state.is_none()
            && self.hard_state.is_none()
            && self.read_states.is_empty()
            && self.entries.is_empty()
            && self.snapshot.is_none()
            && self.committed_entries.is_empty()
            && self.messages.is_empty()
    }

    /// whether there is anything for the apply pipeline
    pub fn has_apply_work(&self) -> bool {
        !self.committed_entries.is_empty() || self.snapshot.is_some()
    }

    /// Highest index this batch commits, from the committed tail or the snapshot
    pub fn committed_index(&self) -> Option<u64> {
        let from_entries = self.committed_entries.last().map(|e| e.index);
        let from_snapshot = self.snapshot.as_ref().map(|s| s.metadata.index);
        from_entries.max(from_snapshot)
    }
}
