//! The transcription job record: identity, lifecycle status, and the
//! fields the worker fills in as a run progresses. Field set matches
//! spec.md §3 exactly; `JobStatus` is a closed enum (not a free-form
//! string) with an `is_terminal()` helper, mirroring the pack's own
//! job-engine example's terminal/non-terminal split
//! (`alfredjeanlab-oddjobs/crates/core/src/job.rs`).

use chrono::{DateTime, Utc};
use note_index::NoteId;
use note_service::MarkerApplyResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    CancelRequested,
    Cancelled,
    Completed,
    Failed,
    Orphaned,
    Interrupted,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Orphaned | JobStatus::Cancelled
        )
    }

    /// Jobs a worker may still act on: eligible for leasing, cancellation,
    /// or resume.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Running | JobStatus::CancelRequested | JobStatus::Interrupted
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::CancelRequested => "cancel_requested",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Orphaned => "orphaned",
            JobStatus::Interrupted => "interrupted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorCode {
    TransientError,
    TranscriptionError,
    MarkerMissing,
    TargetNoteMissing,
    RestartInterrupted,
    CancelRequestedBeforeStart,
    CancelRequestedDuringRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub available_at: u64,
    pub attempts: u32,
    pub restart_requeues: u32,
    pub note_id: NoteId,
    pub marker_token: String,
    pub audio_path: String,
    pub source_filename: String,
    pub launch_source: String,
    pub transcript_text: Option<String>,
    pub last_result: Option<MarkerApplyResult>,
    pub duration_ms: Option<u64>,
    pub error_code: Option<JobErrorCode>,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub note_path: Option<String>,
    pub note_revision: Option<u64>,
    /// Set when the target note was deleted before the transcript could be
    /// spliced in: the transcript is saved to this path instead of being
    /// lost, resolving spec.md §9's open question about compensating for
    /// `note_deleted` with no living placeholder to write into.
    #[serde(default)]
    pub transcript_side_file: Option<String>,
}

/// Query-facing view: the record plus the UI-convenience flags
/// `transcription_job_service.py::_serialize_job` adds (`can_cancel`,
/// `can_resume`, `can_copy`) and the freshest resolved note path.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub record: JobRecord,
    pub can_cancel: bool,
    pub can_resume: bool,
    pub can_copy: bool,
}

impl JobView {
    pub fn from_record(mut record: JobRecord, latest_note_path: Option<String>) -> Self {
        if let Some(path) = latest_note_path {
            record.note_path = Some(path);
        }
        let can_cancel = record.status.is_active();
        let can_resume = record.status == JobStatus::Interrupted;
        let can_copy = record.transcript_text.is_some();
        Self {
            record,
            can_cancel,
            can_resume,
            can_copy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_match_spec() {
        for status in [
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Orphaned,
            JobStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
        }
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::CancelRequested,
            JobStatus::Interrupted,
        ] {
            assert!(!status.is_terminal());
        }
    }
}
