//! Telemetry emission for remembered solutions.
//!
//! One structured JSON record per remembered solution, written to an
//! append-only sink that is never read back by this crate. Sink failures
//! degrade gracefully: the caller logs and continues, observability is
//! never allowed to fail the pipeline.

use crate::CompilerError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// One telemetry record, emitted per remembered solution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    /// Sequence index of the remembered solution.
    pub iteration: u64,
    /// RFC 3339 wall-clock timestamp.
    pub timestamp: String,
    /// Configured solver backend name.
    pub backend: String,
    /// Most recently observed coherence, or 1.0 if none recorded yet.
    pub lambda: f64,
    /// The fixed integration baseline constant.
    pub phi: f64,
    /// Most recently observed decoherence, or 0.0.
    pub gamma_norm: f64,
    /// Most recently observed drift, or 0.0.
    pub w2: f64,
    /// Most recently fired corrective action, or `"none"`.
    pub mutation_action: String,
    /// Energy of the remembered solution.
    pub energy: f64,
}

/// Destination for telemetry records.
///
/// Implementations must be thread-safe (`Send + Sync`) for use behind
/// `Arc<dyn TelemetrySink>`.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Append one record to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::Telemetry`] on serialization or I/O
    /// failure. Callers log and continue — emission is best-effort.
    async fn emit(&self, record: &TelemetryRecord) -> Result<(), CompilerError>;
}

// ── JSON-lines file sink ──────────────────────────────────────────────────

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    /// Create a sink appending to `path`. The file is created on first
    /// emit if it does not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path this sink appends to.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl TelemetrySink for JsonLinesSink {
    async fn emit(&self, record: &TelemetryRecord) -> Result<(), CompilerError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| CompilerError::Telemetry(format!("serialize failed: {e}")))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                CompilerError::Telemetry(format!("open {} failed: {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            CompilerError::Telemetry(format!("write {} failed: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

// ── In-memory sink (tests, embedding) ─────────────────────────────────────

/// Buffers records in memory; used by tests and embedders that render
/// telemetry themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the records emitted so far.
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn emit(&self, record: &TelemetryRecord) -> Result<(), CompilerError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

// ── Null sink ─────────────────────────────────────────────────────────────

/// Discards every record. The default when no telemetry path is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl TelemetrySink for NullSink {
    async fn emit(&self, _record: &TelemetryRecord) -> Result<(), CompilerError> {
        Ok(())
    }
}
