//! # log
//!
//! why: describe what the replicated log and its snapshots contain
//! relations: carried in ready.rs batches, persisted via raft-storage, decoded by raft-server
//! what: LogEntry, EntryKind, ConfChange records, Snapshot with its ConfState

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// What an entry carries: state machine data or a membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EntryKind {
    /// opaque command for the state machine
    #[default]
    Normal,
    /// encoded [`ConfChange`]
    ConfChange,
}

/// A single entry in the replicated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The term when this entry was created
    pub term: u64,
    /// The index of this entry in the log (1-indexed)
    pub index: u64,
    /// Normal command or membership change
    #[serde(default)]
    pub kind: EntryKind,
    /// The payload; an encoded ConfChange when `kind` is ConfChange
    pub data: Vec<u8>,
}

impl LogEntry {
    /// Create a new normal log entry
    pub fn new(term: u64, index: u64, data: Vec<u8>) -> Self {
        Self {
            term,
            index,
            kind: EntryKind::Normal,
            data,
        }
    }

    /// Create a config change entry carrying `change`
    pub fn conf_change(term: u64, index: u64, change: &ConfChange) -> Result<Self, CodecError> {
        Ok(Self {
            term,
            index,
            kind: EntryKind::ConfChange,
            data: change.encode()?,
        })
    }

    pub fn is_conf_change(&self) -> bool {
        self.kind == EntryKind::ConfChange
    }

    /// Decode the membership change this entry carries, if any
    pub fn decode_conf_change(&self) -> Result<Option<ConfChange>, CodecError> {
        match self.kind {
            EntryKind::Normal => Ok(None),
            EntryKind::ConfChange => ConfChange::decode(self.index, &self.data).map(Some),
        }
    }
}

/// The closed set of membership operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfChangeType {
    AddNode,
    RemoveNode,
    /// attributes change only, the id set is untouched
    UpdateNode,
    AddLearnerNode,
}

/// Decoded payload of a config change entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfChange {
    pub change_type: ConfChangeType,
    pub node_id: u64,
    /// encoded member attributes, empty for removals
    #[serde(default)]
    pub context: Vec<u8>,
}

impl ConfChange {
    pub fn new(change_type: ConfChangeType, node_id: u64) -> Self {
        Self {
            change_type,
            node_id,
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<u8>) -> Self {
        self.context = context;
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Decode the payload of the entry at `index`
    pub fn decode(index: u64, data: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(data).map_err(|source| CodecError::Decode { index, source })
    }
}

/// Membership recorded at the point a snapshot was taken
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfState {
    pub voters: Vec<u64>,
    #[serde(default)]
    pub learners: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// last log index covered by the snapshot
    pub index: u64,
    /// term of the entry at `index`
    pub term: u64,
    pub conf_state: ConfState,
}

/// A point-in-time image of the state machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub data: Vec<u8>,
}

impl Snapshot {
    /// A snapshot with index 0 carries nothing
    pub fn is_empty(&self) -> bool {
        self.metadata.index == 0
    }
}
