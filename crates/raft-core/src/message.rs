//! # message
//!
//! why: define the raft rpc messages the engine asks the server to deliver
//! relations: emitted in ready.rs batches, filtered by raft-server before transport
//! what: MessageType, Message

use serde::{Deserialize, Serialize};

use crate::log::{LogEntry, Snapshot};

/// All possible Raft message kinds between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Replicate log entries
    Append,
    /// Response to Append; `index` is the highest index the sender has
    AppendResponse,
    /// Request a vote during leader election
    Vote,
    VoteResponse,
    PreVote,
    PreVoteResponse,
    Heartbeat,
    HeartbeatResponse,
    /// Install a snapshot on a lagging follower
    Snapshot,
    /// Forward a proposal to the leader
    Propose,
    ReadIndex,
    ReadIndexResponse,
    /// Ask the target to campaign immediately (leadership transfer)
    TimeoutNow,
}

/// A message between two members
///
/// one flat shape for every kind; fields a kind does not use stay at their defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MessageType,
    pub from: u64,
    pub to: u64,
    pub term: u64,
    /// term of the entry at `index`
    #[serde(default)]
    pub log_term: u64,
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub commit: u64,
    #[serde(default)]
    pub reject: bool,
    #[serde(default)]
    pub reject_hint: u64,
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
}

impl Message {
    /// Create a message with every optional field zeroed
    pub fn new(msg_type: MessageType, from: u64, to: u64, term: u64) -> Self {
        Self {
            msg_type,
            from,
            to,
            term,
            log_term: 0,
            index: 0,
            entries: Vec::new(),
            commit: 0,
            reject: false,
            reject_hint: 0,
            snapshot: None,
        }
    }

    /// Acknowledgement of everything up to `index`
    pub fn append_response(from: u64, to: u64, term: u64, index: u64) -> Self {
        Self {
            index,
            ..Self::new(MessageType::AppendResponse, from, to, term)
        }
    }

    pub fn heartbeat(from: u64, to: u64, term: u64, commit: u64) -> Self {
        Self {
            commit,
            ..Self::new(MessageType::Heartbeat, from, to, term)
        }
    }
}
