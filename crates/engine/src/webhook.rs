// crates/engine/src/webhook.rs
//! Idempotent application of external completion/failure callbacks.
//!
//! Delivery is at-least-once and unordered: repeats of a terminal signal,
//! and conflicting signals arriving after the job is already terminal, are
//! discarded against the existing state rather than treated as errors.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::job::{JobId, JobStatus};
use crate::lifecycle::JobEngine;
use crate::progress::ProgressSnapshot;

/// Inbound callback payload from the external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub external_id: String,
    pub status: CallbackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Completed,
    Failed,
}

/// What the applier did with a delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackDisposition {
    /// First terminal signal for this job; the transition was performed.
    Applied(ProgressSnapshot),
    /// The job was already terminal; the delivery was discarded.
    Duplicate(ProgressSnapshot),
}

impl CallbackDisposition {
    pub fn snapshot(&self) -> &ProgressSnapshot {
        match self {
            CallbackDisposition::Applied(snap) | CallbackDisposition::Duplicate(snap) => snap,
        }
    }
}

impl JobEngine {
    /// Apply an inbound callback.
    ///
    /// Resolves the external id through the correlation table, retrying
    /// with bounded exponential backoff in case the callback raced its own
    /// registration. An id that stays unknown surfaces as `Unresolved`,
    /// which the transport NACKs so the external system redelivers.
    pub async fn apply_callback(
        &self,
        payload: WebhookPayload,
    ) -> EngineResult<CallbackDisposition> {
        if payload.external_id.is_empty() {
            return Err(EngineError::MalformedCallback(
                "missing external id".into(),
            ));
        }

        let job_id = self.resolve_with_backoff(&payload.external_id).await?;
        let entry = self.store.entry(job_id)?;

        // Terminal check and transition share one critical section, so two
        // concurrent deliveries cannot both apply.
        entry.with_inner(|inner| {
            if inner.status.is_terminal() {
                tracing::info!(
                    job_id = %job_id,
                    external_id = %payload.external_id,
                    delivered = ?payload.status,
                    current = %inner.status,
                    "discarding callback for already-terminal job"
                );
                return Ok(CallbackDisposition::Duplicate(entry.snapshot_locked(inner)));
            }
            if inner.status != JobStatus::Processing {
                return Err(EngineError::InvalidTransition {
                    job_id,
                    current: inner.status,
                    attempted: "apply_callback",
                });
            }

            match payload.status {
                CallbackStatus::Completed => {
                    inner.status = JobStatus::Completed;
                    inner.result = payload.result.clone();
                    tracing::info!(job_id = %job_id, external_id = %payload.external_id, "callback completed job");
                }
                CallbackStatus::Failed => {
                    inner.status = JobStatus::Failed;
                    inner.error_message = Some(
                        payload
                            .error
                            .clone()
                            .unwrap_or_else(|| "external service reported failure".into()),
                    );
                    tracing::warn!(
                        job_id = %job_id,
                        external_id = %payload.external_id,
                        error = inner.error_message.as_deref().unwrap_or_default(),
                        "callback failed job"
                    );
                }
            }
            inner.completed_at = Some(Utc::now());
            Ok(CallbackDisposition::Applied(self.emit_locked(&entry, inner)))
        })
    }

    async fn resolve_with_backoff(&self, external_id: &str) -> EngineResult<JobId> {
        let backoff = &self.config.resolve_backoff;
        let mut delay = backoff.initial_delay;
        for attempt in 0..=backoff.max_retries {
            if let Some(job_id) = self.resolve_external(external_id) {
                if attempt > 0 {
                    tracing::info!(external_id, attempt, "correlation resolved after retry");
                }
                return Ok(job_id);
            }
            if attempt < backoff.max_retries {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(backoff.max_delay);
            }
        }
        Err(EngineError::Unresolved {
            external_id: external_id.to_string(),
            attempts: backoff.max_retries + 1,
        })
    }
}
