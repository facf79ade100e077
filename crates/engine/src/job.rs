// crates/engine/src/job.rs
//! Data model for tracked jobs and their per-unit outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a tracked job. Engine-assigned at creation.
pub type JobId = Uuid;

/// Job family. Decides whether row-level unit tracking applies: a bulk
/// import accumulates one result per row, a moderation job is a single
/// unit of work resolved by an external callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    BulkImport,
    AiModeration,
}

impl JobKind {
    /// Whether jobs of this kind accumulate per-unit results.
    pub fn tracks_units(self) -> bool {
        match self {
            JobKind::BulkImport => true,
            JobKind::AiModeration => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::BulkImport => "BULK_IMPORT",
            JobKind::AiModeration => "AI_MODERATION",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. Transitions only move forward:
/// `Pending → Processing → {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal; a terminal job is frozen.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the forward order `Pending < Processing < terminal`.
    /// Both terminal states share the same rank.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a job. Copied out of the store in one critical
/// section, so a `Job` never shows a torn state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    /// Human-readable tag set at creation (e.g., the uploaded file name).
    pub label: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub total_units: u32,
    pub processed_units: u32,
    pub success_count: u32,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Payload delivered with the terminal completion signal, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome of processing one unit, as reported by the row source.
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Succeeded { detail: Option<serde_json::Value> },
    Failed { error: String },
}

impl UnitOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, UnitOutcome::Succeeded { .. })
    }
}

/// Stored per-unit result. Immutable once recorded: a re-submission for
/// the same index never overwrites the first outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitResult {
    pub job_id: JobId,
    /// 0-based position within the job, unique per job.
    pub index: u32,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
