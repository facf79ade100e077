// crates/engine/src/error.rs
//! Error taxonomy for the job tracking engine.
//!
//! Duplicate unit results and duplicate terminal webhooks are not in this
//! enum at all: at-least-once delivery is the expected operating mode, so
//! those are idempotent no-ops, not errors.

use thiserror::Error;

use crate::job::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown job id. Surfaced, never absorbed.
    #[error("job not found: {job_id}")]
    NotFound { job_id: JobId },

    /// The caller attempted a transition that is not legal from the job's
    /// current state. Indicates an ordering bug in the caller, so it is
    /// surfaced rather than silently ignored.
    #[error("invalid transition for job {job_id}: {attempted} is not legal from {current}")]
    InvalidTransition {
        job_id: JobId,
        current: JobStatus,
        attempted: &'static str,
    },

    /// An external id was registered twice or conflictingly. Registration
    /// is exactly-once; a second attempt is a submission bug.
    #[error("external id already correlated: {external_id}")]
    DuplicateCorrelation { external_id: String },

    /// A callback referenced an external id that stayed unknown through
    /// the full backoff window. Retryable by the caller.
    #[error("no job correlated to external id {external_id} after {attempts} attempts")]
    Unresolved { external_id: String, attempts: u32 },

    /// A unit result named an index the job cannot have. Guards the
    /// `processed_units <= total_units` invariant; a caller bug, not a
    /// replay, so it is not treated as an idempotent duplicate.
    #[error("unit index {index} out of range for job {job_id} ({total} units)")]
    UnitIndexOutOfRange { job_id: JobId, index: u32, total: u32 },

    /// A callback payload that cannot be interpreted at all.
    #[error("malformed callback payload: {0}")]
    MalformedCallback(String),

    /// Handing the job to the external service failed. The job has
    /// already been marked FAILED when this is returned.
    #[error("submission for job {job_id} failed: {message}")]
    SubmissionFailed { job_id: JobId, message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
