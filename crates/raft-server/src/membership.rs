//! # membership
//!
//! why: know who is in the cluster before the apply pipeline has caught up with the log
//! relations: used by recovery.rs at startup; its result seeds safety.rs
//! what: reconstruct

use raft_core::{CodecError, ConfChangeType, LogEntry, MemberIdSet, Snapshot};

/// Member ids implied by `snapshot`'s conf state plus the config changes in `trailing`
///
/// `trailing` must be the entries after the snapshot, in log order. A
/// malformed config change aborts reconstruction instead of guessing.
pub fn reconstruct(
    snapshot: Option<&Snapshot>,
    trailing: &[LogEntry],
) -> Result<MemberIdSet, CodecError> {
    let mut ids: MemberIdSet = snapshot
        .map(|s| s.metadata.conf_state.voters.iter().copied().collect())
        .unwrap_or_default();

    for entry in trailing {
        let Some(change) = entry.decode_conf_change()? else {
            continue;
        };
        match change.change_type {
            ConfChangeType::AddNode | ConfChangeType::AddLearnerNode => {
                ids.insert(change.node_id);
            }
            ConfChangeType::RemoveNode => {
                ids.remove(change.node_id);
            }
            ConfChangeType::UpdateNode => {}
        }
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raft_core::{ConfChange, ConfState, EntryKind, SnapshotMetadata};

    fn snapshot_with_voters(voters: Vec<u64>) -> Snapshot {
        Snapshot {
            metadata: SnapshotMetadata {
                conf_state: ConfState {
                    voters,
                    learners: vec![],
                },
                ..Default::default()
            },
            data: vec![],
        }
    }

    fn change(change_type: ConfChangeType, node_id: u64) -> LogEntry {
        LogEntry::conf_change(1, 0, &ConfChange::new(change_type, node_id)).unwrap()
    }

    fn normal() -> LogEntry {
        LogEntry::new(1, 0, vec![])
    }

    #[test]
    fn get_ids() {
        let add = change(ConfChangeType::AddNode, 2);
        let remove = change(ConfChangeType::RemoveNode, 2);
        let update = change(ConfChangeType::UpdateNode, 2);

        let cases: Vec<(Option<Vec<u64>>, Vec<LogEntry>, Vec<u64>)> = vec![
            (None, vec![], vec![]),
            (Some(vec![1]), vec![], vec![1]),
            (Some(vec![1]), vec![add.clone()], vec![1, 2]),
            (Some(vec![1]), vec![add.clone(), remove.clone()], vec![1]),
            (Some(vec![1]), vec![add.clone(), normal()], vec![1, 2]),
            (Some(vec![1]), vec![add.clone(), normal(), update], vec![1, 2]),
            (Some(vec![1]), vec![add, remove, normal()], vec![1]),
        ];

        for (i, (voters, entries, want)) in cases.into_iter().enumerate() {
            let snapshot = voters.map(snapshot_with_voters);
            let ids = reconstruct(snapshot.as_ref(), &entries).unwrap();
            assert_eq!(ids.to_vec(), want, "case #{i}");
        }
    }

    #[test]
    fn learner_is_a_member() {
        let ids = reconstruct(None, &[change(ConfChangeType::AddLearnerNode, 9)]).unwrap();
        assert_eq!(ids.to_vec(), vec![9]);
    }

    #[test]
    fn removing_unknown_id_is_noop() {
        let snap = snapshot_with_voters(vec![1, 3]);
        let ids = reconstruct(Some(&snap), &[change(ConfChangeType::RemoveNode, 7)]).unwrap();
        assert_eq!(ids.to_vec(), vec![1, 3]);
    }

    #[test]
    fn malformed_change_aborts() {
        let bad = LogEntry {
            term: 1,
            index: 42,
            kind: EntryKind::ConfChange,
            data: b"{".to_vec(),
        };

        let err = reconstruct(None, &[change(ConfChangeType::AddNode, 2), bad]).unwrap_err();
        assert!(matches!(err, CodecError::Decode { index: 42, .. }));
    }

    #[test]
    fn reconstruct_is_idempotent() {
        let snap = snapshot_with_voters(vec![3, 1]);
        let entries = vec![
            change(ConfChangeType::AddNode, 2),
            change(ConfChangeType::RemoveNode, 3),
        ];

        let first = reconstruct(Some(&snap), &entries).unwrap();
        let second = reconstruct(Some(&snap), &entries).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.to_vec(), vec![1, 2]);
    }
}
