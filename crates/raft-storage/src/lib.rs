//! # raft-storage
//!
//! why: provide durable persistence for raft state using standard rust fs apis
//! relations: driven by raft-server's run loop and recovery, stores raft-core types
//! what: Storage trait, StorageError, FileStorage implementation, InMemoryStorage for testing

use raft_core::{HardState, LogEntry, Snapshot};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// errors surfaced by a storage backend
///
/// the run loop treats every one of these as fatal
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt storage: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// trait for durable storage of raft state
///
/// this abstraction allows the same run loop to work with:
/// - real filesystem (native)
/// - in-memory (testing)
pub trait Storage: Send {
    /// append unstable entries, save a snapshot and record the hard state
    ///
    /// entries overlapping the stored tail replace it from their first index;
    /// a snapshot drops the log entries it covers
    fn persist(
        &mut self,
        hard_state: Option<&HardState>,
        entries: &[LogEntry],
        snapshot: Option<&Snapshot>,
    ) -> Result<()>;

    /// make everything written so far durable
    ///
    /// `persist` already leaves its own writes durable; this is the extra
    /// barrier before committed entries are handed to the apply pipeline
    fn force_flush(&mut self) -> Result<()>;

    /// load the persisted hard state (default for new nodes)
    fn load_hard_state(&self) -> Result<HardState>;

    /// load the latest snapshot, if one was saved
    fn load_snapshot(&self) -> Result<Option<Snapshot>>;

    /// load all log entries (for crash recovery)
    fn load_log(&self) -> Result<Vec<LogEntry>>;

    /// truncate log from given index (for conflict resolution)
    fn truncate_log_from(&mut self, from_index: u64) -> Result<()>;

    /// clear all persisted state (for testing)
    fn clear(&mut self) -> Result<()>;
}

// -- file storage implementation --

/// file-based storage implementation using std::fs
///
/// stores raft state in a directory with:
/// - meta.json: hard state, replaced atomically
/// - snapshot.json: latest snapshot, replaced atomically
/// - log.jsonl: one entry per line, append-only between truncations
///
/// every `persist` that appends entries fsyncs log.jsonl before returning
pub struct FileStorage {
    /// directory path for storing state files
    dir: PathBuf,
    /// append handle on log.jsonl
    log: File,
    /// index of the last stored entry, 0 when the log is empty
    last_index: u64,
    /// fsyncs of log.jsonl since open
    log_syncs: usize,
}

impl FileStorage {
    /// open a filestorage at the given directory
    /// creates the directory if it doesn't exist
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let log = open_append(&dir.join(LOG_FILE))?;
        let mut storage = Self {
            dir,
            log,
            last_index: 0,
            log_syncs: 0,
        };
        let log = storage.load_log()?;
        let torn = read_to_string_if_exists(&storage.log_path())?
            .is_some_and(|contents| !contents.is_empty() && !contents.ends_with('\n'));
        if torn {
            // appends must not land behind a partial line
            storage.rewrite_log(&log)?;
        }
        storage.last_index = log.last().map_or(0, |e| e.index);
        Ok(storage)
    }

    /// number of log fsyncs issued by `persist` and `force_flush`
    pub fn log_sync_count(&self) -> usize {
        self.log_syncs
    }

    fn sync_log(&mut self) -> Result<()> {
        self.log.sync_data()?;
        self.log_syncs += 1;
        Ok(())
    }

    /// get the path to the metadata file
    fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.json")
    }

    /// get the path to the log file
    fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// atomic write: write to temp file, sync, then rename
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// replace the whole log with `entries` and reopen the append handle
    fn rewrite_log(&mut self, entries: &[LogEntry]) -> Result<()> {
        let mut contents = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut contents, entry)?;
            contents.push(b'\n');
        }
        let path = self.log_path();
        self.write_atomic(&path, &contents)?;
        self.log = open_append(&path)?;
        self.last_index = entries.last().map_or(0, |e| e.index);
        Ok(())
    }

    fn append(&mut self, entries: &[LogEntry]) -> Result<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };
        if first.index <= self.last_index {
            self.truncate_log_from(first.index)?;
        }

        let mut writer = BufWriter::new(&self.log);
        for entry in entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);
        self.sync_log()?;

        self.last_index = entries.last().map_or(self.last_index, |e| e.index);
        Ok(())
    }
}

const LOG_FILE: &str = "log.jsonl";

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn read_to_string_if_exists(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(Some(contents))
}

impl Storage for FileStorage {
    fn persist(
        &mut self,
        hard_state: Option<&HardState>,
        entries: &[LogEntry],
        snapshot: Option<&Snapshot>,
    ) -> Result<()> {
        if let Some(snapshot) = snapshot.filter(|s| !s.is_empty()) {
            let json = serde_json::to_vec(snapshot)?;
            self.write_atomic(&self.snapshot_path(), &json)?;

            let covered = snapshot.metadata.index;
            let log = self.load_log()?;
            if log.first().is_some_and(|e| e.index <= covered) {
                let kept: Vec<LogEntry> = log.into_iter().filter(|e| e.index > covered).collect();
                tracing::debug!(
                    snapshot_index = covered,
                    kept = kept.len(),
                    "compacting log behind snapshot"
                );
                self.rewrite_log(&kept)?;
            }
        }

        self.append(entries)?;

        if let Some(hard_state) = hard_state {
            let json = serde_json::to_vec_pretty(hard_state)?;
            self.write_atomic(&self.meta_path(), &json)?;
        }

        Ok(())
    }

    fn force_flush(&mut self) -> Result<()> {
        self.sync_log()
    }

    fn load_hard_state(&self) -> Result<HardState> {
        match read_to_string_if_exists(&self.meta_path())? {
            Some(contents) => Ok(serde_json::from_str(&contents)?),
            None => Ok(HardState::default()),
        }
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        match read_to_string_if_exists(&self.snapshot_path())? {
            Some(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            None => Ok(None),
        }
    }

    fn load_log(&self) -> Result<Vec<LogEntry>> {
        let Some(contents) = read_to_string_if_exists(&self.log_path())? else {
            return Ok(Vec::new());
        };

        // an unterminated final line is a write torn by a crash before fsync
        let complete = match contents.rfind('\n') {
            Some(end) => &contents[..=end],
            None => "",
        };
        if complete.len() < contents.len() {
            tracing::warn!(
                path = %self.log_path().display(),
                torn_bytes = contents.len() - complete.len(),
                "ignoring torn tail of log"
            );
        }

        let mut log: Vec<LogEntry> = Vec::new();
        for (line_no, line) in complete.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(line)?;
            if let Some(prev) = log.last() {
                if entry.index != prev.index + 1 {
                    return Err(StorageError::Corrupt(format!(
                        "log line {} has index {} after index {}",
                        line_no + 1,
                        entry.index,
                        prev.index
                    )));
                }
            }
            log.push(entry);
        }

        Ok(log)
    }

    fn truncate_log_from(&mut self, from_index: u64) -> Result<()> {
        let mut log = self.load_log()?;
        log.retain(|e| e.index < from_index);
        self.rewrite_log(&log)
    }

    fn clear(&mut self) -> Result<()> {
        let _ = fs::remove_file(self.meta_path());
        let _ = fs::remove_file(self.snapshot_path());
        self.rewrite_log(&[])
    }
}

// -- in-memory storage implementation --

/// in-memory storage for testing
///
/// stores all state in memory, no persistence across restarts
#[derive(Default)]
pub struct InMemoryStorage {
    hard_state: HardState,
    snapshot: Option<Snapshot>,
    log: Vec<LogEntry>,
    flushes: usize,
}

impl InMemoryStorage {
    /// create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// number of force_flush calls so far
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Storage for InMemoryStorage {
    fn persist(
        &mut self,
        hard_state: Option<&HardState>,
        entries: &[LogEntry],
        snapshot: Option<&Snapshot>,
    ) -> Result<()> {
        if let Some(snapshot) = snapshot.filter(|s| !s.is_empty()) {
            let covered = snapshot.metadata.index;
            self.log.retain(|e| e.index > covered);
            self.snapshot = Some(snapshot.clone());
        }
        if let Some(first) = entries.first() {
            self.log.retain(|e| e.index < first.index);
            self.log.extend(entries.iter().cloned());
        }
        if let Some(hard_state) = hard_state {
            self.hard_state = *hard_state;
        }
        Ok(())
    }

    fn force_flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn load_hard_state(&self) -> Result<HardState> {
        Ok(self.hard_state)
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshot.clone())
    }

    fn load_log(&self) -> Result<Vec<LogEntry>> {
        Ok(self.log.clone())
    }

    fn truncate_log_from(&mut self, from_index: u64) -> Result<()> {
        self.log.retain(|e| e.index < from_index);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.hard_state = HardState::default();
        self.snapshot = None;
        self.log.clear();
        Ok(())
    }
}
