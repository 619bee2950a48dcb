//! # raft-core
//!
//! why: shared vocabulary between the consensus engine and the server that drives it
//! relations: produced by the engine, persisted via raft-storage, consumed by raft-server
//! what: log entries, config changes, messages, snapshots, node state, ready batches, members

pub mod error;
pub mod log;
pub mod member;
pub mod message;
pub mod node;
pub mod ready;

pub use error::CodecError;
pub use log::{
    ConfChange, ConfChangeType, ConfState, EntryKind, LogEntry, Snapshot, SnapshotMetadata,
};
pub use member::{Member, MemberIdSet};
pub use message::{Message, MessageType};
pub use node::{HardState, NodeState, ReadState, SoftState};
pub use ready::Ready;
