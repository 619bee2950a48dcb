//! # safety
//!
//! why: let a member restarted alone regain quorum instead of waiting for peers that are gone
//! relations: fed by membership.rs, used by recovery.rs when restarting standalone
//! what: synthesize_safety_entries

use raft_core::{CodecError, ConfChange, ConfChangeType, LogEntry, Member, MemberIdSet};

/// Config change entries shrinking `known` down to `self_member`
///
/// adds self first when it is missing, then removes every other id in
/// ascending order. Entries take `base_term` and consecutive indexes after
/// `base_index`. Self is never removed; a set that is already just self
/// yields nothing.
pub fn synthesize_safety_entries(
    known: &MemberIdSet,
    self_member: &Member,
    base_term: u64,
    base_index: u64,
) -> Result<Vec<LogEntry>, CodecError> {
    let mut changes = Vec::with_capacity(known.len() + 1);

    if !known.contains(self_member.id) {
        let add = ConfChange::new(ConfChangeType::AddNode, self_member.id)
            .with_context(self_member.encode()?);
        changes.push(add);
    }
    changes.extend(
        known
            .iter()
            .filter(|&id| id != self_member.id)
            .map(|id| ConfChange::new(ConfChangeType::RemoveNode, id)),
    );

    changes
        .iter()
        .zip(base_index + 1..)
        .map(|(change, index)| LogEntry::conf_change(base_term, index, change))
        .collect()
}
