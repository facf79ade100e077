// crates/engine/src/submit.rs
//! Submission boundary to an external processing service.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{EngineError, EngineResult};
use crate::job::JobId;
use crate::lifecycle::JobEngine;

/// Error from the external service's submit endpoint. The transport-level
/// detail stays with the collaborator; the engine only needs a message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SubmitError(pub String);

/// Collaborator that hands a job payload to an external service and
/// returns the id the service issued for it. Called once per job.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, payload: serde_json::Value) -> Result<String, SubmitError>;
}

impl JobEngine {
    /// Start `job_id`, submit it to the external service, and correlate
    /// the returned external id.
    ///
    /// A submission failure is a whole-job fault, unlike a single row
    /// failure: the job is marked `Failed` with the client's error before
    /// the error is returned.
    pub async fn submit_external(
        &self,
        job_id: JobId,
        client: &dyn SubmissionClient,
        payload: serde_json::Value,
    ) -> EngineResult<String> {
        self.start(job_id)?;
        match client.submit(payload).await {
            Ok(external_id) => {
                if let Err(err) = self.register_external(job_id, external_id.as_str()) {
                    // Without the correlation the callback can never land.
                    let _ = self.fail(job_id, format!("correlation failed: {err}"));
                    return Err(err);
                }
                tracing::info!(
                    job_id = %job_id,
                    external_id = %external_id,
                    "job submitted, awaiting callback"
                );
                Ok(external_id)
            }
            Err(err) => {
                let message = err.to_string();
                self.fail(job_id, message.clone())?;
                Err(EngineError::SubmissionFailed { job_id, message })
            }
        }
    }
}
