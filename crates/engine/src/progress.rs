// crates/engine/src/progress.rs
//! Pure progress computation over a job's counters.
//!
//! Kept free of storage access so the calculation is independently
//! testable and works the same for jobs with or without unit tracking.

use serde::Serialize;

use crate::job::{Job, JobId, JobKind, JobStatus};

/// Percent complete, clamped to 0..=100.
///
/// A job with no units has nothing to count: 0 while in flight, 100 once
/// terminal (a single-shot external job is all done when it finishes).
pub fn percent(processed: u32, total: u32, status: JobStatus) -> u8 {
    if total == 0 {
        return if status.is_terminal() { 100 } else { 0 };
    }
    let p = (f64::from(processed) * 100.0 / f64::from(total)).round() as i64;
    p.clamp(0, 100) as u8
}

/// Point-in-time view of a job's progress, pushed to subscribers and
/// returned by the mutating operations. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub processed_units: u32,
    pub total_units: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub percent: u8,
    pub timestamp: String,
}

impl ProgressSnapshot {
    pub(crate) fn new(
        job_id: JobId,
        kind: JobKind,
        status: JobStatus,
        processed_units: u32,
        total_units: u32,
        success_count: u32,
        failure_count: u32,
    ) -> Self {
        Self {
            job_id,
            kind,
            status,
            processed_units,
            total_units,
            success_count,
            failure_count,
            percent: percent(processed_units, total_units, status),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Snapshot of an already-loaded job.
    pub fn of_job(job: &Job) -> Self {
        Self::new(
            job.id,
            job.kind,
            job.status,
            job.processed_units,
            job.total_units,
            job.success_count,
            job.failure_count,
        )
    }
}
