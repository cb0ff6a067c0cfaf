// crates/callgate-gateway/src/audit.rs
// ============================================================================
// Module: Call Gate Audit Logger
// Description: Bounded, fire-and-forget audit dispatch and JSONL writers.
// Purpose: Persist one audit entry per call without blocking the call path.
// Dependencies: callgate-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`AuditLogger`] owns a bounded queue drained by one dedicated writer
//! thread. [`AuditLogger::log`] never blocks: when the queue is full or the
//! writer is gone the entry is dropped and the loss is reported on the ops
//! side-channel. Writers implement [`AuditWriter`]; the daily file writer
//! appends JSON lines to `audit-YYYY-MM-DD.jsonl`.
//!
//! Security posture: entries are built by the engine and contain hashes and
//! locations only, except the opt-in debug capture produced by
//! [`AuditCapture::capture_request`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use callgate_core::AuditEntry;
use callgate_core::fingerprint_json;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;

use crate::ops::OpsEvent;
use crate::ops::OpsSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Audit file name prefix.
const AUDIT_FILE_PREFIX: &str = "audit-";
/// Audit file extension.
const AUDIT_FILE_EXTENSION: &str = "jsonl";
/// Writability probe file name.
const PROBE_FILE_NAME: &str = ".callgate-audit-probe";
/// Writer thread name.
const WRITER_THREAD_NAME: &str = "callgate-audit";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Audit dispatch and persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// Filesystem or stream failure.
    #[error("audit io error: {0}")]
    Io(String),
    /// Entry could not be serialized.
    #[error("audit serialization error: {0}")]
    Serialize(String),
    /// The writer thread is no longer running.
    #[error("audit writer closed")]
    Closed,
}

// ============================================================================
// SECTION: Capture Mode
// ============================================================================

/// Request capture mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditCapture {
    /// Request arguments are recorded as a fingerprint only.
    #[default]
    Production,
    /// Arguments are also recorded in clear, sensitive fields hashed.
    Debug,
}

impl AuditCapture {
    /// Maps the config flag to a capture mode.
    #[must_use]
    pub const fn from_debug_flag(debug: bool) -> Self {
        if debug { Self::Debug } else { Self::Production }
    }

    /// Builds the debug request capture, if this mode records one.
    ///
    /// Top-level fields named in `sensitive` are replaced by their
    /// canonical hash. Non-object arguments are recorded as a fingerprint.
    #[must_use]
    pub fn capture_request<'a, I>(self, args: &Value, sensitive: I) -> Option<Value>
    where
        I: IntoIterator<Item = &'a String>,
    {
        if self == Self::Production {
            return None;
        }
        let Value::Object(fields) = args else {
            return Some(Value::String(fingerprint_json(args).to_string()));
        };
        let mut captured: Map<String, Value> = fields.clone();
        for name in sensitive {
            if let Some(value) = captured.get_mut(name.as_str()) {
                *value = Value::String(fingerprint_json(value).to_string());
            }
        }
        Some(Value::Object(captured))
    }
}

// ============================================================================
// SECTION: Writers
// ============================================================================

/// Destination for audit entries.
pub trait AuditWriter {
    /// Persists one entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the entry cannot be persisted.
    fn write(&mut self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when buffered output cannot be flushed.
    fn flush(&mut self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Serializes one entry as a single JSON line.
fn entry_line(entry: &AuditEntry) -> Result<String, AuditError> {
    serde_json::to_string(entry).map_err(|err| AuditError::Serialize(err.to_string()))
}

/// Audit writer appending JSON lines to one file per UTC day.
///
/// # Invariants
/// - `current` holds the open file for the day named alongside it.
pub struct DailyFileAuditWriter {
    /// Audit directory.
    dir: PathBuf,
    /// Open file and the UTC day it belongs to.
    current: Option<(String, File)>,
}

impl DailyFileAuditWriter {
    /// Opens an audit directory, creating it and probing writability.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the directory cannot be created or
    /// written.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AuditError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|err| {
            AuditError::Io(format!("create audit dir {}: {err}", dir.display()))
        })?;
        let probe = dir.join(PROBE_FILE_NAME);
        File::create(&probe)
            .and_then(|mut file| file.write_all(b"probe"))
            .map_err(|err| AuditError::Io(format!("audit dir {} not writable: {err}", dir.display())))?;
        let _ = std::fs::remove_file(&probe);
        Ok(Self {
            dir,
            current: None,
        })
    }

    /// Returns the file path used for a UTC day (`YYYY-MM-DD`).
    #[must_use]
    pub fn path_for_day(&self, day: &str) -> PathBuf {
        self.dir.join(format!("{AUDIT_FILE_PREFIX}{day}.{AUDIT_FILE_EXTENSION}"))
    }

    /// Returns the open file for `day`, rotating when the day changed.
    fn file_for(&mut self, day: &str) -> Result<&mut File, AuditError> {
        let stale = self.current.as_ref().is_none_or(|(open_day, _)| open_day != day);
        if stale {
            if let Some((_, mut previous)) = self.current.take() {
                let _ = previous.flush();
            }
            let path = self.path_for_day(day);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| AuditError::Io(format!("open {}: {err}", path.display())))?;
            self.current = Some((day.to_string(), file));
        }
        self.current.as_mut().map(|(_, file)| file).ok_or(AuditError::Closed)
    }
}

impl AuditWriter for DailyFileAuditWriter {
    fn write(&mut self, entry: &AuditEntry) -> Result<(), AuditError> {
        let line = entry_line(entry)?;
        let file = self.file_for(entry.utc_day())?;
        writeln!(file, "{line}").map_err(|err| AuditError::Io(err.to_string()))
    }

    fn flush(&mut self) -> Result<(), AuditError> {
        match self.current.as_mut() {
            Some((_, file)) => file.flush().map_err(|err| AuditError::Io(err.to_string())),
            None => Ok(()),
        }
    }
}

/// Audit writer emitting JSON lines to stderr.
pub struct StderrAuditWriter;

impl AuditWriter for StderrAuditWriter {
    fn write(&mut self, entry: &AuditEntry) -> Result<(), AuditError> {
        let line = entry_line(entry)?;
        writeln!(std::io::stderr(), "{line}").map_err(|err| AuditError::Io(err.to_string()))
    }
}

/// Audit writer keeping entries in memory; clones share storage.
#[derive(Clone, Default)]
pub struct MemoryAuditWriter {
    /// Recorded entries.
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

impl AuditWriter for MemoryAuditWriter {
    fn write(&mut self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut entries = self.entries.lock().map_err(|_| AuditError::Closed)?;
        entries.push(entry.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Logger
// ============================================================================

/// Message sent to the writer thread.
enum AuditCommand {
    /// Persist an entry.
    Entry(Box<AuditEntry>),
    /// Acknowledge once everything queued earlier is written.
    Flush(oneshot::Sender<()>),
    /// Drain, flush and stop.
    Shutdown(oneshot::Sender<()>),
}

/// Fire-and-forget audit dispatcher with a single writer thread.
///
/// # Invariants
/// - Entries are written in enqueue order by exactly one thread.
/// - `log` never blocks and never fails towards the caller.
pub struct AuditLogger {
    /// Queue into the writer thread.
    sender: mpsc::Sender<AuditCommand>,
    /// Operational side-channel.
    ops: Arc<dyn OpsSink>,
    /// Writer thread handle, taken on shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditLogger {
    /// Starts the writer thread over `writer` with a bounded queue.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the writer thread cannot be spawned.
    pub fn new(
        writer: Box<dyn AuditWriter + Send>,
        capacity: usize,
        ops: Arc<dyn OpsSink>,
    ) -> Result<Self, AuditError> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker_ops = Arc::clone(&ops);
        let worker = std::thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || run_writer(writer, receiver, worker_ops.as_ref()))
            .map_err(|err| AuditError::Io(format!("spawn audit writer: {err}")))?;
        Ok(Self {
            sender,
            ops,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Enqueues an entry without blocking.
    pub fn log(&self, entry: AuditEntry) {
        let trace_id = entry.trace_id.to_string();
        match self.sender.try_send(AuditCommand::Entry(Box::new(entry))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.ops.record(&OpsEvent::AuditQueueFull {
                    trace_id,
                });
            }
            Err(TrySendError::Closed(_)) => {
                self.ops.record(&OpsEvent::AuditQueueClosed {
                    trace_id,
                });
            }
        }
    }

    /// Waits until every entry queued before this call has been written.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Closed`] when the writer has stopped.
    pub async fn flush(&self) -> Result<(), AuditError> {
        let (ack, done) = oneshot::channel();
        self.sender.send(AuditCommand::Flush(ack)).await.map_err(|_| AuditError::Closed)?;
        done.await.map_err(|_| AuditError::Closed)
    }

    /// Drains the queue, flushes the writer and joins the writer thread.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Closed`] when the writer already stopped.
    pub async fn shutdown(&self) -> Result<(), AuditError> {
        let (ack, done) = oneshot::channel();
        self.sender.send(AuditCommand::Shutdown(ack)).await.map_err(|_| AuditError::Closed)?;
        done.await.map_err(|_| AuditError::Closed)?;
        let worker = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(worker) = worker {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|err| AuditError::Io(err.to_string()))?
                .map_err(|_| AuditError::Io("audit writer panicked".to_string()))?;
        }
        Ok(())
    }
}

/// Writer thread body.
fn run_writer(
    mut writer: Box<dyn AuditWriter + Send>,
    mut receiver: mpsc::Receiver<AuditCommand>,
    ops: &dyn OpsSink,
) {
    let mut shutdown_ack = None;
    while let Some(command) = receiver.blocking_recv() {
        match command {
            AuditCommand::Entry(entry) => {
                if let Err(err) = writer.write(&entry) {
                    ops.record(&OpsEvent::AuditWriteFailed {
                        trace_id: entry.trace_id.to_string(),
                        error: err.to_string(),
                    });
                }
            }
            AuditCommand::Flush(ack) => {
                flush_writer(writer.as_mut(), ops);
                let _ = ack.send(());
            }
            AuditCommand::Shutdown(ack) => {
                receiver.close();
                shutdown_ack = Some(ack);
            }
        }
    }
    flush_writer(writer.as_mut(), ops);
    if let Some(ack) = shutdown_ack {
        let _ = ack.send(());
    }
}

/// Flushes the writer, reporting failures on the ops side-channel.
fn flush_writer(writer: &mut (dyn AuditWriter + Send), ops: &dyn OpsSink) {
    if let Err(err) = writer.flush() {
        ops.record(&OpsEvent::AuditWriteFailed {
            trace_id: String::new(),
            error: err.to_string(),
        });
    }
}
