//! # recovery
//!
//! why: rebuild membership from disk at startup, and force a lone survivor back to a quorum of one
//! relations: reads raft-storage, uses membership.rs and safety.rs; runs before the loop starts
//! what: RecoveredState, recover_membership, restart_as_standalone

use raft_core::{HardState, LogEntry, Member, MemberIdSet, Snapshot};
use raft_storage::Storage;

use crate::error::Result;
use crate::membership::reconstruct;
use crate::safety::synthesize_safety_entries;

/// What a member finds on disk when it restarts
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredState {
    pub hard_state: HardState,
    pub snapshot: Option<Snapshot>,
    /// log entries after the snapshot
    pub entries: Vec<LogEntry>,
    /// membership implied by the snapshot plus `entries`
    pub members: MemberIdSet,
}

impl RecoveredState {
    /// index of the last entry, or of the snapshot when the log is empty
    pub fn last_index(&self) -> u64 {
        self.entries
            .last()
            .map(|e| e.index)
            .unwrap_or_else(|| self.snapshot_index())
    }

    fn snapshot_index(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |s| s.metadata.index)
    }
}

/// Load persisted state and reconstruct membership for a normal restart
pub fn recover_membership(storage: &dyn Storage) -> Result<RecoveredState> {
    let hard_state = storage.load_hard_state()?;
    let snapshot = storage.load_snapshot()?.filter(|s| !s.is_empty());
    let snapshot_index = snapshot.as_ref().map_or(0, |s| s.metadata.index);

    let entries: Vec<LogEntry> = storage
        .load_log()?
        .into_iter()
        .filter(|e| e.index > snapshot_index)
        .collect();
    let members = reconstruct(snapshot.as_ref(), &entries)?;

    tracing::info!(
        term = hard_state.term,
        commit = hard_state.commit,
        snapshot_index,
        entries = entries.len(),
        members = ?members.to_vec(),
        "recovered raft state"
    );

    Ok(RecoveredState {
        hard_state,
        snapshot,
        entries,
        members,
    })
}

/// Restart `self_member` as the only voter of its cluster
///
/// drops uncommitted entries, appends config changes removing every other
/// member (adding self if needed), persists and flushes them, and commits up
/// to the new tail. Recovery aborts on a malformed config change rather than
/// guessing membership.
pub fn restart_as_standalone(
    storage: &mut dyn Storage,
    self_member: &Member,
) -> Result<RecoveredState> {
    let mut state = recover_membership(storage)?;
    let commit = state.hard_state.commit.max(state.snapshot_index());

    if let Some(pos) = state.entries.iter().position(|e| e.index > commit) {
        tracing::warn!(
            commit,
            discarded = state.entries.len() - pos,
            "discarding uncommitted log entries"
        );
        storage.truncate_log_from(commit + 1)?;
        state.entries.truncate(pos);
        state.members = reconstruct(state.snapshot.as_ref(), &state.entries)?;
    }

    let safety = synthesize_safety_entries(
        &state.members,
        self_member,
        state.hard_state.term,
        state.last_index(),
    )?;

    let mut hard_state = state.hard_state;
    hard_state.commit = safety.last().map_or(commit, |e| e.index);

    tracing::info!(
        node_id = self_member.id,
        previous_members = ?state.members.to_vec(),
        appended = safety.len(),
        commit = hard_state.commit,
        "forcing standalone restart"
    );

    storage.persist(Some(&hard_state), &safety, None)?;
    storage.force_flush()?;

    state.entries.extend(safety);
    state.hard_state = hard_state;
    state.members = reconstruct(state.snapshot.as_ref(), &state.entries)?;
    Ok(state)
}
