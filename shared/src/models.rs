/// Database models and queue records shared across sto-grab crates.
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Download job status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the job will not change state again.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A manifest link found by the sniffer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LinkRecord {
    pub url: String,
    pub source_url: Option<String>,
    pub found_at: NaiveDateTime,
}

/// Persisted download attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRecord {
    pub id: String,
    pub url: String,
    pub output_path: String,
    pub status: String,
    pub progress: i32,
    pub error_msg: Option<String>,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}

/// One entry of the in-memory download queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: String,
    pub url: String,
    /// 1-based position in the queue.
    pub index: usize,
    pub total: usize,
    pub output: PathBuf,
    pub status: JobStatus,
    pub progress: u8,
    pub error_msg: Option<String>,
}

/// Output file name for the n-th (1-based) job of a batch.
pub fn output_file_name(index: usize) -> String {
    format!("video_{}.mp4", index)
}
