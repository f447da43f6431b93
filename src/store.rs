//! Durable progress and partial-result storage for one stage.
//!
//! The progress record is overwritten after every completed batch; the
//! partial-result CSV is append-only. Partial results are written before the
//! progress record advances, so the partial row count is the durable source
//! of truth when the two disagree after a crash.

use crate::{
    error::{AiError, ErrorKind},
    stats::{ErrorCounters, StageStats},
    util,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One output row, keyed by column name. Order comes from the schema.
pub type Row = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub stage: String,
    /// Count of fully completed batches; the next batch to run.
    pub current_batch: usize,
    pub processed_count: usize,
    pub total_items: usize,
    pub timestamp: f64,
    pub last_update: String,
    pub processing_speed: f64,
    pub eta: String,
    pub memory_usage_mb: f64,
    pub rate_limit_occurrences: u64,
    pub total_wait_time: f64,
    pub error_counts: ErrorCounters,
    pub uptime_seconds: f64,
}

pub struct StageStore {
    progress_path: PathBuf,
    partial_path: PathBuf,
}

impl StageStore {
    pub fn new(work_dir: &Path, stage_id: &str) -> Self {
        Self {
            progress_path: work_dir.join(format!("{stage_id}_progress.json")),
            partial_path: work_dir.join(format!("{stage_id}_PARTIAL.csv")),
        }
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    pub fn partial_path(&self) -> &Path {
        &self.partial_path
    }

    /// Overwrite the stage's progress record with a performance snapshot.
    ///
    /// A failed write is counted and swallowed: losing a progress snapshot
    /// costs at most one batch of rework, unlike losing partial results.
    pub fn save_progress(
        &self,
        stage_id: &str,
        current_batch: usize,
        processed_count: usize,
        total_items: usize,
        stats: &mut StageStats,
    ) {
        stats.sample_memory();
        let record = ProgressRecord {
            stage: stage_id.to_string(),
            current_batch,
            processed_count,
            total_items,
            timestamp: util::unix_now(),
            last_update: util::now_rfc3339(),
            processing_speed: stats.processing_speed(),
            eta: stats.eta(total_items.saturating_sub(processed_count)),
            memory_usage_mb: stats.memory_mb(),
            rate_limit_occurrences: stats.errors.rate_limit,
            total_wait_time: stats.total_wait_time,
            error_counts: stats.errors.clone(),
            uptime_seconds: stats.uptime_seconds(),
        };
        let result = serde_json::to_vec_pretty(&record)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| {
                std::fs::write(&self.progress_path, bytes).map_err(anyhow::Error::from)
            });
        if let Err(err) = result {
            warn!("failed to save progress record: {err:#}");
            stats.errors.record(ErrorKind::FileSystem);
        }
    }

    /// Load the progress record if one exists, restoring its counters into
    /// `stats`. A corrupt record is treated as absent.
    pub fn load_progress(&self, stats: &mut StageStats) -> Option<ProgressRecord> {
        if !self.progress_path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(&self.progress_path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to read progress record: {err}");
                stats.errors.record(ErrorKind::FileSystem);
                return None;
            }
        };
        match serde_json::from_str::<ProgressRecord>(&raw) {
            Ok(record) => {
                stats.restore(record.error_counts.clone(), record.total_wait_time);
                Some(record)
            }
            Err(err) => {
                warn!("ignoring corrupt progress record: {err}");
                stats.errors.record(ErrorKind::FileSystem);
                None
            }
        }
    }

    /// Append rows to the partial-result CSV, creating it with a header row
    /// if absent. A failed write is a `FileSystemError`: silently losing
    /// partial rows would corrupt resumability.
    pub fn save_results(
        &self,
        rows: &[Row],
        schema: &[String],
        stats: &mut StageStats,
    ) -> Result<(), AiError> {
        let outcome = self.try_append(rows, schema);
        match outcome {
            Ok(()) => {
                stats.sample_memory();
                Ok(())
            }
            Err(err) => {
                warn!("failed to save partial results: {err:#}");
                stats.errors.record(ErrorKind::FileSystem);
                Err(AiError::FileSystem(format!("{err:#}")))
            }
        }
    }

    fn try_append(&self, rows: &[Row], schema: &[String]) -> Result<()> {
        if let Some(parent) = self.partial_path.parent() {
            if !parent.as_os_str().is_empty() {
                util::ensure_dir(parent)?;
            }
        }
        let existed = self.partial_path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.partial_path)
            .with_context(|| format!("open {}", self.partial_path.display()))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if !existed {
            writer.write_record(schema)?;
        }
        for row in rows {
            writer.write_record(
                schema
                    .iter()
                    .map(|field| row.get(field).map(String::as_str).unwrap_or("")),
            )?;
        }
        writer.flush().with_context(|| "flush partial results")?;
        Ok(())
    }

    /// Read back all partial rows, defaulting any schema field missing from
    /// a stored row to empty. Missing columns are warned about but not
    /// fatal. An unreadable partial file is a `FileSystemError`: the rows
    /// it holds are the only copy of the processed items, so pretending
    /// they do not exist would lose them.
    pub fn read_results(
        &self,
        schema: &[String],
        stats: &mut StageStats,
    ) -> Result<Vec<Row>, AiError> {
        if !self.partial_path.exists() {
            return Ok(Vec::new());
        }
        match self.try_read(schema) {
            Ok(rows) => Ok(rows),
            Err(err) => {
                warn!("failed to read partial results: {err:#}");
                stats.errors.record(ErrorKind::FileSystem);
                Err(AiError::FileSystem(format!("{err:#}")))
            }
        }
    }

    fn try_read(&self, schema: &[String]) -> Result<Vec<Row>> {
        let mut reader = csv::Reader::from_path(&self.partial_path)
            .with_context(|| format!("open {}", self.partial_path.display()))?;
        let headers: Vec<String> = reader
            .headers()
            .with_context(|| "read partial headers")?
            .iter()
            .map(str::to_string)
            .collect();

        let missing: Vec<&String> = schema.iter().filter(|f| !headers.contains(f)).collect();
        if !missing.is_empty() {
            warn!("partial results are missing expected columns: {missing:?}");
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| "read partial row")?;
            let mut row = Row::with_capacity(schema.len());
            for field in schema {
                let value = headers
                    .iter()
                    .position(|h| h == field)
                    .and_then(|idx| record.get(idx))
                    .unwrap_or("");
                row.insert(field.clone(), value.to_string());
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Remove both artifacts. Called only after a stage completed every
    /// batch and wrote its final output.
    pub fn cleanup(&self) {
        for path in [&self.progress_path, &self.partial_path] {
            if path.exists() {
                if let Err(err) = std::fs::remove_file(path) {
                    warn!("could not remove {}: {err}", path.display());
                } else {
                    debug!("removed {}", path.display());
                }
            }
        }
    }
}
