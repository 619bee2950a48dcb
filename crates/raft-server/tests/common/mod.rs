//! Common test utilities for raft-server tests.

use async_trait::async_trait;
use raft_core::{HardState, LogEntry, Message, Ready, Snapshot, SoftState};
use raft_server::{
    ConsensusEngine, RaftNode, RaftNodeConfig, RaftNodeReceivers, ReadyHandler, Transport,
};
use raft_storage::{FileStorage, InMemoryStorage, Storage, StorageError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// How long a test waits for something that should happen.
pub const EVENTUALLY: Duration = Duration::from_secs(2);

/// How long a test watches for something that must not happen.
pub const NEVER: Duration = Duration::from_millis(300);

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Side effects in the order the collaborators observed them.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Persist { entries: Vec<LogEntry> },
    Flush,
    Send(Vec<Message>),
    Advance,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

/// Engine whose rounds are pushed by the test.
pub struct ScriptedEngine {
    readies: AsyncMutex<mpsc::UnboundedReceiver<Ready>>,
    advance_tx: mpsc::UnboundedSender<()>,
    events: EventLog,
    pub stepped: Mutex<Vec<Message>>,
    pub ticks: AtomicUsize,
    pub stopped: AtomicBool,
}

#[async_trait]
impl ConsensusEngine for ScriptedEngine {
    async fn ready(&self) -> Option<Ready> {
        self.readies.lock().await.recv().await
    }

    fn advance(&self) {
        self.events.lock().unwrap().push(Event::Advance);
        let _ = self.advance_tx.send(());
    }

    async fn step(&self, message: Message) -> raft_server::Result<()> {
        self.stepped.lock().unwrap().push(message);
        Ok(())
    }

    fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Which storage call a test wants to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFault {
    #[default]
    Healthy,
    Persist,
    Flush,
}

/// Storage that records persist/flush calls and can be told to fail
pub struct RecordingStorage {
    inner: Box<dyn Storage>,
    events: EventLog,
    fault: StorageFault,
}

impl Storage for RecordingStorage {
    fn persist(
        &mut self,
        hard_state: Option<&HardState>,
        entries: &[LogEntry],
        snapshot: Option<&Snapshot>,
    ) -> raft_storage::Result<()> {
        if self.fault == StorageFault::Persist {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.events.lock().unwrap().push(Event::Persist {
            entries: entries.to_vec(),
        });
        self.inner.persist(hard_state, entries, snapshot)
    }

    fn force_flush(&mut self) -> raft_storage::Result<()> {
        if self.fault == StorageFault::Flush {
            return Err(StorageError::Io(std::io::Error::other("fsync failed")));
        }
        self.events.lock().unwrap().push(Event::Flush);
        self.inner.force_flush()
    }

    fn load_hard_state(&self) -> raft_storage::Result<HardState> {
        self.inner.load_hard_state()
    }

    fn load_snapshot(&self) -> raft_storage::Result<Option<Snapshot>> {
        self.inner.load_snapshot()
    }

    fn load_log(&self) -> raft_storage::Result<Vec<LogEntry>> {
        self.inner.load_log()
    }

    fn truncate_log_from(&mut self, from_index: u64) -> raft_storage::Result<()> {
        self.inner.truncate_log_from(from_index)
    }

    fn clear(&mut self) -> raft_storage::Result<()> {
        self.inner.clear()
    }
}

/// FileStorage that publishes its log fsync count after every call
pub struct SyncCountingStorage {
    inner: FileStorage,
    log_syncs: Arc<AtomicUsize>,
}

impl SyncCountingStorage {
    fn publish<T>(&self, result: raft_storage::Result<T>) -> raft_storage::Result<T> {
        self.log_syncs.store(self.inner.log_sync_count(), Ordering::SeqCst);
        result
    }
}

impl Storage for SyncCountingStorage {
    fn persist(
        &mut self,
        hard_state: Option<&HardState>,
        entries: &[LogEntry],
        snapshot: Option<&Snapshot>,
    ) -> raft_storage::Result<()> {
        let result = self.inner.persist(hard_state, entries, snapshot);
        self.publish(result)
    }

    fn force_flush(&mut self) -> raft_storage::Result<()> {
        let result = self.inner.force_flush();
        self.publish(result)
    }

    fn load_hard_state(&self) -> raft_storage::Result<HardState> {
        self.inner.load_hard_state()
    }

    fn load_snapshot(&self) -> raft_storage::Result<Option<Snapshot>> {
        self.inner.load_snapshot()
    }

    fn load_log(&self) -> raft_storage::Result<Vec<LogEntry>> {
        self.inner.load_log()
    }

    fn truncate_log_from(&mut self, from_index: u64) -> raft_storage::Result<()> {
        let result = self.inner.truncate_log_from(from_index);
        self.publish(result)
    }

    fn clear(&mut self) -> raft_storage::Result<()> {
        self.inner.clear()
    }
}

/// Transport that records each send call, and the log fsync count at that moment
pub struct RecordingTransport {
    events: EventLog,
    log_syncs: Arc<AtomicUsize>,
    pub syncs_at_send: Mutex<Vec<usize>>,
    pub stopped: AtomicBool,
}

impl Transport for RecordingTransport {
    fn send(&self, messages: Vec<Message>) {
        self.syncs_at_send
            .lock()
            .unwrap()
            .push(self.log_syncs.load(Ordering::SeqCst));
        self.events.lock().unwrap().push(Event::Send(messages));
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Handler that records every hook call.
#[derive(Default)]
pub struct RecordingHandler {
    pub soft_states: Mutex<Vec<SoftState>>,
    pub committed: Mutex<Vec<u64>>,
    pub removed: Mutex<Vec<u64>>,
}

impl ReadyHandler for RecordingHandler {
    fn on_soft_state(&self, soft_state: &SoftState) {
        self.soft_states.lock().unwrap().push(*soft_state);
    }

    fn on_committed_index(&self, index: u64) {
        self.committed.lock().unwrap().push(index);
    }

    fn is_member_removed(&self, id: u64) -> bool {
        self.removed.lock().unwrap().contains(&id)
    }
}

/// A running node wired to recording collaborators.
pub struct Harness {
    pub node: RaftNode,
    pub receivers: RaftNodeReceivers,
    pub readies: mpsc::UnboundedSender<Ready>,
    pub advances: mpsc::UnboundedReceiver<()>,
    pub events: EventLog,
    pub engine: Arc<ScriptedEngine>,
    pub transport: Arc<RecordingTransport>,
    pub handler: Arc<RecordingHandler>,
    /// log fsyncs seen so far; stays 0 for in-memory storage
    pub log_syncs: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl Harness {
    pub fn start() -> Self {
        Self::start_with(RaftNodeConfig::default(), StorageFault::Healthy)
    }

    pub fn start_with_failing_storage() -> Self {
        Self::start_with(RaftNodeConfig::default(), StorageFault::Persist)
    }

    pub fn start_with_failing_flush() -> Self {
        Self::start_with(RaftNodeConfig::default(), StorageFault::Flush)
    }

    pub fn start_with(config: RaftNodeConfig, fault: StorageFault) -> Self {
        Self::start_on(config, Box::new(InMemoryStorage::new()), fault, Arc::default())
    }

    /// Run on a real FileStorage in `dir`, counting its log fsyncs
    pub fn start_on_disk(dir: &Path) -> Self {
        let log_syncs = Arc::new(AtomicUsize::new(0));
        let storage = SyncCountingStorage {
            inner: FileStorage::new(dir).expect("open file storage"),
            log_syncs: log_syncs.clone(),
        };
        Self::start_on(
            RaftNodeConfig::default(),
            Box::new(storage),
            StorageFault::Healthy,
            log_syncs,
        )
    }

    fn start_on(
        config: RaftNodeConfig,
        inner: Box<dyn Storage>,
        fault: StorageFault,
        log_syncs: Arc<AtomicUsize>,
    ) -> Self {
        init_tracing();

        let events: EventLog = Arc::default();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (advance_tx, advance_rx) = mpsc::unbounded_channel();

        let engine = Arc::new(ScriptedEngine {
            readies: AsyncMutex::new(ready_rx),
            advance_tx,
            events: events.clone(),
            stepped: Mutex::default(),
            ticks: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        });
        let storage = RecordingStorage {
            inner,
            events: events.clone(),
            fault,
        };
        let transport = Arc::new(RecordingTransport {
            events: events.clone(),
            log_syncs: log_syncs.clone(),
            syncs_at_send: Mutex::default(),
            stopped: AtomicBool::new(false),
        });
        let handler = Arc::new(RecordingHandler::default());

        let (node, receivers) = RaftNode::start(
            config,
            engine.clone(),
            Box::new(storage),
            transport.clone(),
            handler.clone(),
        )
        .expect("valid config");

        Self {
            node,
            receivers,
            readies: ready_tx,
            advances: advance_rx,
            events,
            engine,
            transport,
            handler,
            log_syncs,
        }
    }

    pub fn push(&self, ready: Ready) {
        self.readies.send(ready).expect("engine alive");
    }

    /// Wait for the next advance; panics if none arrives in time.
    pub async fn expect_advance(&mut self) {
        tokio::time::timeout(EVENTUALLY, self.advances.recv())
            .await
            .expect("advance was not called")
            .expect("engine dropped");
    }

    /// Assert no advance arrives for a while.
    pub async fn expect_no_advance(&mut self) {
        let advanced = tokio::time::timeout(NEVER, self.advances.recv()).await;
        assert!(advanced.is_err(), "advance called while it should be blocked");
    }

    pub async fn next_apply(&mut self) -> raft_server::ApplyUnit {
        tokio::time::timeout(EVENTUALLY, self.receivers.applies.recv())
            .await
            .expect("no apply unit arrived")
            .expect("apply queue closed")
    }

    pub fn events(&self) -> Vec<Event> {
        events(&self.events)
    }
}
