//! Append-only history log.
//!
//! One record per tick, serialized as a single JSON line and flushed
//! durably before the append returns. Prior records are never rewritten
//! or reordered, and `reset` never truncates the log; history is an
//! audit trail independent of live state.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::apply::ActuationRecord;
use crate::engine::TickStage;
use crate::error::{SchemaError, TwinError, TwinResult};
use crate::state::Snapshot;
use crate::zone::ZoneId;

/// Immutable record of one completed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// The snapshot after the controller/applier ran.
    pub snapshot: Snapshot,
    /// Spatial alert list for this tick, ascending zone-id order.
    pub alerts: Vec<ZoneId>,
    /// The deciding agent's explanation.
    pub explanation: String,
    /// True if the reasoning agent failed and local rules were used.
    pub fallback_used: bool,
    /// Overlay sync failure for this tick, if any.
    pub sync_error: Option<String>,
    /// What the actuation applier committed and skipped.
    pub actuation: ActuationRecord,
}

/// Durable appender for history records.
pub struct HistoryLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl HistoryLogger {
    /// Opens (or creates) the log file for appending.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::Persistence` if the file cannot be opened.
    pub fn open(path: &Path) -> TwinResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| TwinError::persistence(TickStage::Idle, path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// The log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a JSON line, flushed and fsynced.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::Persistence` (fatal for the tick) on any
    /// write failure.
    pub fn append(&mut self, record: &HistoryRecord) -> TwinResult<()> {
        let Self { path, writer } = self;
        let persist = |e| TwinError::persistence(TickStage::Logging, path.as_path(), e);

        let mut line = serde_json::to_string(record).map_err(|e| {
            TwinError::from(SchemaError::MalformedJson {
                reason: format!("history serialization failed: {e}"),
            })
        })?;
        line.push('\n');

        writer.write_all(line.as_bytes()).map_err(persist)?;
        writer.flush().map_err(persist)?;
        writer.get_ref().sync_all().map_err(persist)?;
        Ok(())
    }

    /// Reads every record from a history file, in append order.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::Persistence` if the file cannot be read and
    /// `TwinError::Schema` if a line does not parse.
    pub fn read_all(path: &Path) -> TwinResult<Vec<HistoryRecord>> {
        let file = File::open(path).map_err(|e| TwinError::persistence(TickStage::Idle, path, e))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| TwinError::persistence(TickStage::Idle, path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| SchemaError::MalformedJson {
                reason: format!("history line {}: {e}", number + 1),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}
