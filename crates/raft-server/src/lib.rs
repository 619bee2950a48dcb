//! # raft-server
//!
//! why: drive a consensus engine's output batches against storage, network and the state machine
//! relations: consumes raft-core batches, persists through raft-storage, feeds the apply pipeline
//! what: run loop with apply backpressure, sync decider, message filter, membership recovery

pub mod apply;
pub mod backpressure;
pub mod collaborator;
pub mod config;
pub mod detector;
pub mod error;
pub mod filter;
pub mod membership;
pub mod node;
pub mod recovery;
pub mod safety;
pub mod sync;

pub use apply::{ApplyNotifier, ApplyUnit, ApplyWaiter};
pub use backpressure::requires_apply_barrier;
pub use collaborator::{ConsensusEngine, NoopReadyHandler, ReadyHandler, Transport};
pub use config::RaftNodeConfig;
pub use error::{RaftNodeError, Result};
pub use filter::{coalesce_append_responses, MessageFilter};
pub use membership::reconstruct;
pub use node::{RaftNode, RaftNodeReceivers};
pub use recovery::{recover_membership, restart_as_standalone, RecoveredState};
pub use safety::synthesize_safety_entries;
pub use sync::should_sync;
