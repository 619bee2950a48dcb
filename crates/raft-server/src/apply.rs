//! # apply
//!
//! why: hand committed work to the apply pipeline and learn when it is durable in the state machine
//! relations: built by node.rs each round, awaited by the backpressure wait
//! what: ApplyUnit, ApplyNotifier (write side), ApplyWaiter (broadcast-once read side)

use raft_core::{LogEntry, Snapshot};
use tokio::sync::watch;

use crate::error::{RaftNodeError, Result};

/// Committed entries (and snapshot) of one round, owned by the apply pipeline once handed off
#[derive(Debug)]
pub struct ApplyUnit {
    pub entries: Vec<LogEntry>,
    pub snapshot: Option<Snapshot>,
    /// must be notified exactly once, after the unit is reflected in the state machine
    pub done: ApplyNotifier,
}

impl ApplyUnit {
    /// Create a unit together with a waiter for its completion
    pub fn new(entries: Vec<LogEntry>, snapshot: Option<Snapshot>) -> (Self, ApplyWaiter) {
        let (tx, rx) = watch::channel(false);
        let unit = Self {
            entries,
            snapshot,
            done: ApplyNotifier { tx },
        };
        (unit, ApplyWaiter { rx })
    }

    /// Another observer of this unit's completion
    pub fn waiter(&self) -> ApplyWaiter {
        ApplyWaiter {
            rx: self.done.tx.subscribe(),
        }
    }
}

/// Write side of a unit's completion signal
///
/// consumed by `notify`, so a unit cannot be signalled twice. Dropping it
/// without notifying tells waiters the pipeline abandoned the unit.
#[derive(Debug)]
pub struct ApplyNotifier {
    tx: watch::Sender<bool>,
}

impl ApplyNotifier {
    pub fn notify(self) {
        // send_replace stores the value even when no waiter is subscribed
        self.tx.send_replace(true);
    }
}

/// Read side of a unit's completion signal
#[derive(Debug, Clone)]
pub struct ApplyWaiter {
    rx: watch::Receiver<bool>,
}

impl ApplyWaiter {
    /// Resolve once the unit has been applied
    ///
    /// fails with `ApplyPipelineClosed` if the notifier was dropped unsignalled
    pub async fn wait(&mut self) -> Result<()> {
        self.rx
            .wait_for(|applied| *applied)
            .await
            .map(|_| ())
            .map_err(|_| RaftNodeError::ApplyPipelineClosed)
    }

    pub fn is_applied(&self) -> bool {
        *self.rx.borrow()
    }
}
