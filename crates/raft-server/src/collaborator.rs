//! # collaborator
//!
//! why: the seams between the run loop and the components it drives
//! relations: implemented by the engine, network and server layers; called from node.rs
//! what: ConsensusEngine, Transport, ReadyHandler traits

use async_trait::async_trait;
use raft_core::{Message, SoftState};

use crate::error::Result;

/// The consensus engine, treated as a black box
///
/// implementations own their synchronization; every method may be called
/// from the run loop task while `step` arrives from other tasks.
#[async_trait]
pub trait ConsensusEngine: Send + Sync + 'static {
    /// Wait for the next round's output; None once the engine has stopped
    ///
    /// must be cancel safe: the run loop races it against its ticker and stop signal
    async fn ready(&self) -> Option<raft_core::Ready>;

    /// The last batch returned by `ready` has been fully handled
    fn advance(&self);

    /// Feed an inbound message from a peer
    async fn step(&self, message: Message) -> Result<()>;

    /// Advance the engine's logical clock by one tick
    fn tick(&self);

    /// Called once when the run loop exits
    fn stop(&self) {}
}

/// Best-effort delivery of messages to peers
///
/// failures are not reported back; the engine retransmits on later rounds
pub trait Transport: Send + Sync + 'static {
    fn send(&self, messages: Vec<Message>);

    /// Called once when the run loop exits
    fn stop(&self) {}
}

/// Server-side hooks the run loop calls each round
///
/// every method must return promptly; they run on the run loop task
pub trait ReadyHandler: Send + Sync + 'static {
    /// Leadership or role changed
    fn on_soft_state(&self, _soft_state: &SoftState) {}

    /// Entries up to `index` have been handed to the apply pipeline
    fn on_committed_index(&self, _index: u64) {}

    /// Whether `id` has been removed from the cluster; its messages are dropped
    fn is_member_removed(&self, _id: u64) -> bool {
        false
    }
}

/// Handler that ignores every hook
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReadyHandler;

impl ReadyHandler for NoopReadyHandler {}
