//! Best-effort persistence of generation records.
//!
//! Records go to a background task over an unbounded channel, so submitting never blocks
//! or fails the cycle. Sink errors are logged and counted, nothing more.

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Final status of one generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Failed,
    /// Delivered content came from the guaranteed fallback
    Fallback,
}

/// One persisted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub source_id: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub failover: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl GenerationRecord {
    pub fn new(source_id: impl Into<String>, status: RecordStatus) -> Self {
        Self {
            source_id: source_id.into(),
            status,
            text: None,
            error: None,
            model: None,
            provider: None,
            failover: false,
            warnings: Vec::new(),
            recorded_at: Utc::now(),
        }
    }
}

/// External persistence collaborator.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn save_record(&self, record: GenerationRecord) -> Result<(), ApiError>;
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<GenerationRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<GenerationRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn save_record(&self, record: GenerationRecord) -> Result<(), ApiError> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Appends records as JSON lines.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn save_record(&self, record: GenerationRecord) -> Result<(), ApiError> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| ApiError::PersistenceFailed(e.to_string()))?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                ApiError::PersistenceFailed(format!("{}: {}", self.path.display(), e))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ApiError::PersistenceFailed(format!("{}: {}", self.path.display(), e)))
    }
}

enum Command {
    Save(GenerationRecord),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    saved: AtomicU64,
    failed: AtomicU64,
}

/// Background task draining records into a sink.
pub struct PersistenceWorker {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
}

impl PersistenceWorker {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn RecordSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let counters = Arc::new(Counters::default());
        let task_counters = Arc::clone(&counters);

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Save(record) => {
                        let source_id = record.source_id.clone();
                        match sink.save_record(record).await {
                            Ok(()) => {
                                task_counters.saved.fetch_add(1, Ordering::Relaxed);
                                debug!(source = %source_id, "Saved generation record");
                            }
                            Err(e) => {
                                task_counters.failed.fetch_add(1, Ordering::Relaxed);
                                warn!(source = %source_id, error = %e, "Failed to save generation record");
                            }
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx, counters }
    }

    /// Queue a record. Never blocks; a stopped worker only logs.
    pub fn submit(&self, record: GenerationRecord) {
        if self.tx.send(Command::Save(record)).is_err() {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!("Persistence worker stopped; dropping generation record");
        }
    }

    /// Wait until everything submitted so far has been handled.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn saved_count(&self) -> u64 {
        self.counters.saved.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}
