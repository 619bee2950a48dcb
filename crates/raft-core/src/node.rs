//! # node
//!
//! why: describe the state of the local raft node as the engine reports it
//! relations: carried in ready.rs batches; HardState is persisted via raft-storage
//! what: NodeState enum, SoftState, HardState, ReadState

use serde::{Deserialize, Serialize};

/// The possible roles a Raft node can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeState {
    /// Passive state - listens for heartbeats, votes when asked
    #[default]
    Follower,
    /// Probing state - checks it could win before disrupting the term
    PreCandidate,
    /// Transitional state - requesting votes to become leader
    Candidate,
    /// Active state - manages log replication, sends heartbeats
    Leader,
}

/// Volatile leadership view; not persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SoftState {
    /// 0 when no leader is known
    pub leader_id: u64,
    pub role: NodeState,
}

impl SoftState {
    pub fn is_leader(&self) -> bool {
        self.role == NodeState::Leader
    }
}

/// State that must be on disk before the node responds to any rpc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardState {
    /// Current term number
    pub term: u64,
    /// Node that received our vote in `term`, 0 for none
    pub vote: u64,
    /// Highest index known to be committed
    pub commit: u64,
}

/// Confirmation that a linearizable read may be served once `index` is applied
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadState {
    pub index: u64,
    /// opaque context supplied with the read request
    pub request_ctx: Vec<u8>,
}
