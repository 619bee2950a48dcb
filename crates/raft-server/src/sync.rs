//! # sync
//!
//! why: decide when the log must be fsynced before committed entries reach the apply pipeline
//! relations: called by node.rs between persist and hand-off
//! what: should_sync

use raft_core::Ready;

/// true when the last committed entry of `ready` is still among its unstable entries
///
/// such an entry was only just written; applying it before a flush could let
/// the state machine act on an entry a crash would lose. When the committed
/// tail is not among the unstable entries it was made durable in an earlier round.
pub fn should_sync(ready: &Ready) -> bool {
    let Some(last_committed) = ready.committed_entries.last() else {
        return false;
    };
    ready
        .entries
        .iter()
        .any(|e| e.term == last_committed.term && e.index == last_committed.index)
}
