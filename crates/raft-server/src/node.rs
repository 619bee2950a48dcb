//! # node
//!
//! why: turn engine output into durable state, sent messages and applied entries
//! relations: drives collaborator.rs traits and raft-storage; uses sync, filter, apply
//! what: RaftNode handle, RaftNodeReceivers, the run loop
//!
//! Each round runs in a fixed order:
//!
//! 1. report a leadership change and forward read states
//! 2. persist hard state, unstable entries and snapshot
//! 3. force a flush when `should_sync` says the committed tail was just written
//! 4. send the filtered messages
//! 5. hand committed entries / snapshot to the apply pipeline
//! 6. advance the engine, after apply completion if the round changed membership

use raft_core::{ReadState, Ready, SoftState};
use raft_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::apply::ApplyUnit;
use crate::backpressure::requires_apply_barrier;
use crate::collaborator::{ConsensusEngine, ReadyHandler, Transport};
use crate::config::RaftNodeConfig;
use crate::error::{RaftNodeError, Result};
use crate::filter::MessageFilter;
use crate::sync::should_sync;

/// Queues the run loop feeds
pub struct RaftNodeReceivers {
    /// committed work in round order; each unit must be notified once applied
    pub applies: mpsc::Receiver<ApplyUnit>,
    /// linearizable read confirmations
    pub read_states: mpsc::Receiver<ReadState>,
}

/// Handle on a running run loop
pub struct RaftNode {
    id: u64,
    engine: Arc<dyn ConsensusEngine>,
    stop_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    task: Option<JoinHandle<Result<()>>>,
}

impl RaftNode {
    /// Spawn the run loop on the current tokio runtime
    pub fn start(
        config: RaftNodeConfig,
        engine: Arc<dyn ConsensusEngine>,
        storage: Box<dyn Storage>,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn ReadyHandler>,
    ) -> Result<(Self, RaftNodeReceivers)> {
        config.validate()?;

        let (apply_tx, applies) = mpsc::channel(config.apply_queue_capacity);
        let (read_state_tx, read_states) = mpsc::channel(config.read_state_queue_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        let raft_loop = RaftLoop {
            id: config.node_id,
            engine: Arc::clone(&engine),
            storage,
            transport,
            handler,
            filter: MessageFilter::new(config.max_heartbeat_gap()),
            apply_tx,
            read_state_tx,
            stop_rx,
            heartbeat_interval: config.heartbeat_interval(),
            soft_state: SoftState::default(),
        };

        let task = tokio::spawn(async move {
            let result = raft_loop.run().await;
            done_tx.send_replace(true);
            result
        });

        tracing::info!(node_id = config.node_id, "raft node started");

        let node = Self {
            id: config.node_id,
            engine,
            stop_tx,
            done_rx,
            task: Some(task),
        };
        Ok((node, RaftNodeReceivers { applies, read_states }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pass an inbound peer message to the engine
    pub async fn step(&self, message: raft_core::Message) -> Result<()> {
        self.engine.step(message).await
    }

    /// Ask the loop to stop and wait for it
    ///
    /// returns the error that ended the loop, if one did. Calling it again
    /// after the loop finished returns Ok.
    pub async fn stop(&mut self) -> Result<()> {
        self.stop_tx.send_replace(true);
        match self.task.take() {
            Some(task) => task.await?,
            None => Ok(()),
        }
    }

    /// Resolve once the run loop has exited, for whatever reason
    pub async fn wait_stopped(&self) {
        let mut done = self.done_rx.clone();
        // a dropped sender means the task is gone too
        let _ = done.wait_for(|finished| *finished).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.done_rx.borrow()
    }
}

impl Drop for RaftNode {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

enum Flow {
    Continue,
    Stopped,
}

struct RaftLoop {
    id: u64,
    engine: Arc<dyn ConsensusEngine>,
    storage: Box<dyn Storage>,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn ReadyHandler>,
    filter: MessageFilter,
    apply_tx: mpsc::Sender<ApplyUnit>,
    read_state_tx: mpsc::Sender<ReadState>,
    stop_rx: watch::Receiver<bool>,
    heartbeat_interval: Duration,
    soft_state: SoftState,
}

async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    // the handle being dropped counts as a stop
    let _ = stop_rx.wait_for(|stop| *stop).await;
}

impl RaftLoop {
    async fn run(mut self) -> Result<()> {
        let result = self.drive().await;

        self.engine.stop();
        self.transport.stop();
        match &result {
            Ok(()) => tracing::info!(node_id = self.id, "raft loop stopped"),
            Err(e) => {
                tracing::error!(node_id = self.id, error = %e, "raft loop stopped on fatal error")
            }
        }
        // dropping self closes the apply and read-state queues
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let period = self.heartbeat_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop_rx) => return Ok(()),
                _ = ticker.tick() => self.engine.tick(),
                ready = self.engine.ready() => {
                    let Some(ready) = ready else {
                        tracing::info!(node_id = self.id, "consensus engine stopped");
                        return Ok(());
                    };
                    if let Flow::Stopped = self.handle_ready(ready).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_ready(&mut self, mut ready: Ready) -> Result<Flow> {
        if ready.is_empty() {
            self.engine.advance();
            return Ok(Flow::Continue);
        }
        ready.snapshot = ready.snapshot.filter(|s| !s.is_empty());

        let must_sync = should_sync(&ready);
        let barrier = requires_apply_barrier(&ready);
        let apply_work = ready.has_apply_work();
        let committed_index = ready.committed_index();

        let Ready {
            soft_state,
            hard_state,
            read_states,
            entries,
            snapshot,
            committed_entries,
            messages,
        } = ready;

        tracing::debug!(
            node_id = self.id,
            unstable = entries.len(),
            committed = committed_entries.len(),
            messages = messages.len(),
            snapshot = snapshot.as_ref().map(|s| s.metadata.index),
            must_sync,
            barrier,
            "handling ready"
        );

        if let Some(soft_state) = soft_state {
            self.update_soft_state(soft_state);
        }
        self.forward_read_states(read_states);

        let id = self.id;
        self.storage
            .persist(hard_state.as_ref(), &entries, snapshot.as_ref())
            .inspect_err(|e| {
                tracing::error!(node_id = id, error = %e, "failed to persist raft state")
            })?;
        if must_sync {
            self.storage
                .force_flush()
                .inspect_err(|e| {
                    tracing::error!(node_id = id, error = %e, "failed to flush raft log")
                })?;
        }

        let messages = self.filter.process(messages, self.handler.as_ref());
        if !messages.is_empty() {
            self.transport.send(messages);
        }

        if apply_work {
            let (unit, mut waiter) = ApplyUnit::new(committed_entries, snapshot);

            tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop_rx) => return Ok(Flow::Stopped),
                sent = self.apply_tx.send(unit) => {
                    sent.map_err(|_| RaftNodeError::ApplyPipelineClosed)?;
                }
            }
            if let Some(index) = committed_index {
                self.handler.on_committed_index(index);
            }

            if barrier {
                tracing::debug!(
                    node_id = self.id,
                    index = committed_index,
                    "waiting for config change to be applied"
                );
                tokio::select! {
                    biased;
                    _ = stop_requested(&mut self.stop_rx) => return Ok(Flow::Stopped),
                    applied = waiter.wait() => applied?,
                }
            }
        }

        self.engine.advance();
        Ok(Flow::Continue)
    }

    fn update_soft_state(&mut self, soft_state: SoftState) {
        if soft_state.leader_id != self.soft_state.leader_id {
            tracing::info!(
                node_id = self.id,
                previous_leader = self.soft_state.leader_id,
                leader = soft_state.leader_id,
                "leader changed"
            );
        }
        if soft_state.is_leader() != self.soft_state.is_leader() {
            self.filter.reset_heartbeats();
        }
        self.soft_state = soft_state;
        self.handler.on_soft_state(&soft_state);
    }

    fn forward_read_states(&self, read_states: Vec<ReadState>) {
        for read_state in read_states {
            match self.read_state_tx.try_send(read_state) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!(
                        node_id = self.id,
                        index = dropped.index,
                        "timed out sending read state; reader queue is full"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(node_id = self.id, "no reader for read state");
                }
            }
        }
    }
}
