//! # filter
//!
//! why: trim a round's outbound messages before they reach the transport
//! relations: called by node.rs after persistence; asks ReadyHandler about removed members
//! what: coalesce_append_responses, MessageFilter

use raft_core::{Message, MessageType};
use std::time::Duration;

use crate::collaborator::ReadyHandler;
use crate::detector::TimeoutDetector;

/// Collapse runs of consecutive append acknowledgements to the same peer
///
/// a later acknowledgement replaces the one right before it when both go from
/// the same sender to the same peer and the later one is either identical or,
/// for two acceptances, acknowledges at least as much. Only strictly
/// consecutive messages collapse; anything in between breaks the run.
pub fn coalesce_append_responses(messages: Vec<Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        if let Some(prev) = out.last_mut() {
            if supersedes(&message, prev) {
                *prev = message;
                continue;
            }
        }
        out.push(message);
    }
    out
}

fn supersedes(later: &Message, earlier: &Message) -> bool {
    if later.msg_type != MessageType::AppendResponse
        || earlier.msg_type != MessageType::AppendResponse
        || later.from != earlier.from
        || later.to != earlier.to
    {
        return false;
    }
    let identical = later.term == earlier.term
        && later.index == earlier.index
        && later.reject == earlier.reject
        && later.reject_hint == earlier.reject_hint;
    let covers = !later.reject
        && !earlier.reject
        && (later.term, later.index) >= (earlier.term, earlier.index);
    identical || covers
}

/// Outbound pipeline: removed-member drop, ack coalescing, heartbeat timing
#[derive(Debug)]
pub struct MessageFilter {
    detector: TimeoutDetector,
    max_heartbeat_gap: Duration,
}

impl MessageFilter {
    pub fn new(max_heartbeat_gap: Duration) -> Self {
        Self {
            detector: TimeoutDetector::new(max_heartbeat_gap),
            max_heartbeat_gap,
        }
    }

    pub fn process(
        &mut self,
        mut messages: Vec<Message>,
        handler: &dyn ReadyHandler,
    ) -> Vec<Message> {
        messages.retain(|m| {
            let removed = handler.is_member_removed(m.to);
            if removed {
                tracing::debug!(
                    to = m.to,
                    msg_type = ?m.msg_type,
                    "dropping message to removed member"
                );
            }
            !removed
        });

        let messages = coalesce_append_responses(messages);

        for m in messages.iter().filter(|m| m.msg_type == MessageType::Heartbeat) {
            if let Some(exceeded) = self.detector.observe(m.to) {
                tracing::warn!(
                    to = m.to,
                    heartbeat_interval = ?self.max_heartbeat_gap,
                    exceeded_duration = ?exceeded,
                    "leader failed to send out heartbeat on time; \
                     took too long, leader is overloaded likely from slow disk"
                );
            }
        }

        messages
    }

    /// Drop heartbeat history; called when leadership changes hands
    pub fn reset_heartbeats(&mut self) {
        self.detector.reset();
    }
}
