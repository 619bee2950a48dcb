//! # error
//!
//! why: one error type for everything that ends the run loop or aborts recovery
//! relations: wraps StorageError and CodecError; returned by node.rs and recovery.rs
//! what: RaftNodeError, Result

use raft_core::CodecError;
use raft_storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaftNodeError>;

#[derive(Debug, Error)]
pub enum RaftNodeError {
    /// Persisting or flushing failed; durability can no longer be guaranteed.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// A config change payload could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The apply pipeline dropped its intake or abandoned a unit.
    #[error("apply pipeline closed")]
    ApplyPipelineClosed,

    /// The consensus engine refused an inbound message.
    #[error("consensus engine error: {0}")]
    Engine(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The run loop task panicked or was cancelled.
    #[error("run loop task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for RaftNodeError {
    fn from(e: tokio::task::JoinError) -> Self {
        RaftNodeError::Join(e.to_string())
    }
}
