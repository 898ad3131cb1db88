// Recognition tracing
// Append-only JSONL trace of the stages each recognition run passes through

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Recognition stage a trace entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    WildVibrato,
    LongSlide,
    Cad,
    SlowBend,
    Candidates,
    Classification,
    Fusion,
    SoftVibrato,
    Pruning,
    Complete,
}

impl Stage {
    /// Fraction of the run completed once this stage finishes
    pub fn progress(&self) -> f32 {
        match self {
            Stage::Start => 0.0,
            Stage::WildVibrato => 0.1,
            Stage::LongSlide => 0.2,
            Stage::Cad => 0.3,
            Stage::SlowBend => 0.4,
            Stage::Candidates => 0.5,
            Stage::Classification => 0.7,
            Stage::Fusion => 0.8,
            Stage::SoftVibrato => 0.9,
            Stage::Pruning => 0.95,
            Stage::Complete => 1.0,
        }
    }
}

/// A single line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    /// Identifier shared by all entries of one recognition run
    pub run_id: Uuid,

    /// Name of the audio item being recognized
    pub item: String,

    pub stage: Stage,

    /// Progress [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Optional structured data (detection counts and similar)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Builds the entries of one recognition run
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    run_id: Uuid,
    item: String,
}

impl TraceBuilder {
    /// Start a new run for an item; each run gets a fresh id
    pub fn run(item: impl Into<String>) -> Self {
        TraceBuilder {
            run_id: Uuid::new_v4(),
            item: item.into(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Entry for a finished stage, progress taken from the stage
    pub fn entry(&self, stage: Stage, message: impl Into<String>) -> TraceEntry {
        self.progress(stage, stage.progress(), message)
    }

    /// Entry with an explicit progress value
    pub fn progress(&self, stage: Stage, progress: f32, message: impl Into<String>) -> TraceEntry {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: self.run_id,
            item: self.item.clone(),
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(
        &self,
        stage: Stage,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> TraceEntry {
        TraceEntry {
            data: Some(data),
            ..self.entry(stage, message)
        }
    }
}

/// Appends trace entries to a JSONL file
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        TraceWriter {
            file_path: file_path.into(),
        }
    }

    /// Append one entry, creating the file if it doesn't exist
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.write_batch(std::slice::from_ref(entry))
    }

    /// Append several entries with a single open
    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for entry in entries {
            let json_line = entry.to_json_line()?;
            file.write_all(json_line.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file, skipping blank lines
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TraceError::from))
        .collect()
}
