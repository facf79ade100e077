// crates/engine/src/lifecycle.rs
//! Job lifecycle controller.
//!
//! Owns the `Pending → Processing → {Completed, Failed}` state machine.
//! Every mutating operation runs inside the target job's critical section
//! (`JobEntry::with_inner`), so concurrent unit-result recordings and
//! callbacks for one job serialize while unrelated jobs never block each
//! other. A progress snapshot is broadcast after every state-affecting
//! call, including duplicate unit results, so consumers can retry safely.

use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::correlation::CorrelationTable;
use crate::error::{EngineError, EngineResult};
use crate::events::ProgressFeed;
use crate::job::{Job, JobId, JobKind, JobStatus, UnitOutcome, UnitResult};
use crate::ledger::RecordDisposition;
use crate::progress::ProgressSnapshot;
use crate::store::{JobEntry, JobInner, JobStore};

/// One engine instance: job store, correlation table and the engine-wide
/// progress channel. Explicitly constructed and torn down (dropped), never
/// a process-wide singleton, so tests get isolated instances.
pub struct JobEngine {
    pub(crate) store: JobStore,
    pub(crate) correlations: CorrelationTable,
    pub(crate) global_tx: broadcast::Sender<ProgressSnapshot>,
    pub(crate) config: EngineConfig,
}

impl JobEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let (global_tx, _) = broadcast::channel(config.global_channel_capacity);
        Self {
            store: JobStore::new(config.job_channel_capacity),
            correlations: CorrelationTable::new(),
            global_tx,
            config,
        }
    }

    /// Create a job in `Pending` with zeroed counters.
    ///
    /// `total_units` only applies to kinds that track units; single-shot
    /// kinds have no unit ledger and always carry `total_units == 0`.
    pub fn create_job(
        &self,
        kind: JobKind,
        label: impl Into<String>,
        total_units: u32,
    ) -> Job {
        let total_units = if kind.tracks_units() { total_units } else { 0 };
        let entry = self.store.create(kind, label.into(), total_units);
        tracing::info!(job_id = %entry.id, kind = %kind, total_units, "job created");
        entry.job()
    }

    /// `Pending → Processing`. Sets `started_at` exactly once.
    pub fn start(&self, job_id: JobId) -> EngineResult<ProgressSnapshot> {
        let entry = self.store.entry(job_id)?;
        entry.with_inner(|inner| {
            if inner.status != JobStatus::Pending {
                return Err(EngineError::InvalidTransition {
                    job_id,
                    current: inner.status,
                    attempted: "start",
                });
            }
            inner.status = JobStatus::Processing;
            inner.started_at = Some(Utc::now());
            tracing::info!(job_id = %job_id, "job started");
            Ok(self.emit_locked(&entry, inner))
        })
    }

    /// Record the outcome for one unit of a `Processing` job.
    ///
    /// Idempotent per index: a repeat for an already-recorded index changes
    /// nothing but still emits a snapshot. When the last distinct unit
    /// lands, the job completes automatically. Row failures are data
    /// errors, not job failures, so the job completes even with a non-zero
    /// failure count.
    pub fn record_unit_result(
        &self,
        job_id: JobId,
        index: u32,
        outcome: UnitOutcome,
    ) -> EngineResult<ProgressSnapshot> {
        let entry = self.store.entry(job_id)?;
        entry.with_inner(|inner| {
            if inner.status != JobStatus::Processing {
                return Err(EngineError::InvalidTransition {
                    job_id,
                    current: inner.status,
                    attempted: "record_unit_result",
                });
            }
            if index >= inner.total_units {
                return Err(EngineError::UnitIndexOutOfRange {
                    job_id,
                    index,
                    total: inner.total_units,
                });
            }

            let succeeded = outcome.succeeded();
            match inner.ledger.record(job_id, index, outcome) {
                RecordDisposition::Recorded => {
                    if succeeded {
                        inner.success_count += 1;
                    } else {
                        inner.failure_count += 1;
                    }
                    if inner.processed_units() == inner.total_units {
                        inner.status = JobStatus::Completed;
                        inner.completed_at = Some(Utc::now());
                        tracing::info!(
                            job_id = %job_id,
                            success = inner.success_count,
                            failure = inner.failure_count,
                            "all units processed, job completed"
                        );
                    }
                }
                RecordDisposition::Duplicate => {
                    tracing::debug!(job_id = %job_id, index, "duplicate unit result ignored");
                }
            }
            Ok(self.emit_locked(&entry, inner))
        })
    }

    /// `Processing → Completed`, for jobs without unit tracking. A job
    /// with units completes through its last `record_unit_result` instead.
    pub fn complete(
        &self,
        job_id: JobId,
        result: Option<serde_json::Value>,
    ) -> EngineResult<ProgressSnapshot> {
        let entry = self.store.entry(job_id)?;
        entry.with_inner(|inner| {
            if inner.status != JobStatus::Processing || inner.total_units > 0 {
                return Err(EngineError::InvalidTransition {
                    job_id,
                    current: inner.status,
                    attempted: "complete",
                });
            }
            inner.status = JobStatus::Completed;
            inner.result = result;
            inner.completed_at = Some(Utc::now());
            tracing::info!(job_id = %job_id, "job completed");
            Ok(self.emit_locked(&entry, inner))
        })
    }

    /// `Processing → Failed`. Also the entry point for supervisory SLA
    /// timeouts: the engine runs no timer of its own, a collaborator calls
    /// this when a job sits in `Processing` too long.
    pub fn fail(
        &self,
        job_id: JobId,
        error_message: impl Into<String>,
    ) -> EngineResult<ProgressSnapshot> {
        let entry = self.store.entry(job_id)?;
        let error_message = error_message.into();
        entry.with_inner(|inner| {
            if inner.status != JobStatus::Processing {
                return Err(EngineError::InvalidTransition {
                    job_id,
                    current: inner.status,
                    attempted: "fail",
                });
            }
            inner.status = JobStatus::Failed;
            inner.error_message = Some(error_message.clone());
            inner.completed_at = Some(Utc::now());
            tracing::warn!(job_id = %job_id, error = %error_message, "job failed");
            Ok(self.emit_locked(&entry, inner))
        })
    }

    /// Correlate `external_id` with `job_id`, exactly once. Fails if the
    /// job already has an external id or the external id already belongs
    /// to any job. Only non-terminal jobs of kinds without unit tracking
    /// can be correlated: a job is purely row-driven or purely
    /// externally-driven, never both.
    pub fn register_external(
        &self,
        job_id: JobId,
        external_id: impl Into<String>,
    ) -> EngineResult<()> {
        let external_id = external_id.into();
        let entry = self.store.entry(job_id)?;
        entry.with_inner(|inner| {
            // Row-driven jobs are never handed to an external service, so
            // no callback can ever complete one with rows outstanding.
            if entry.kind.tracks_units() {
                return Err(EngineError::InvalidTransition {
                    job_id,
                    current: inner.status,
                    attempted: "register_external",
                });
            }
            if inner.status.is_terminal() {
                return Err(EngineError::InvalidTransition {
                    job_id,
                    current: inner.status,
                    attempted: "register_external",
                });
            }
            if inner.external_id.is_some() {
                return Err(EngineError::DuplicateCorrelation {
                    external_id: external_id.clone(),
                });
            }
            // Table insert happens before the job field is set, so a loser
            // of a registration race leaves the job untouched.
            self.correlations.register(&external_id, job_id)?;
            inner.external_id = Some(external_id.clone());
            tracing::info!(job_id = %job_id, external_id = %external_id, "external id registered");
            Ok(())
        })
    }

    /// Current state of a job. Never blocks longer than one field copy.
    pub fn get_job(&self, job_id: JobId) -> EngineResult<Job> {
        self.store.get(job_id)
    }

    /// Unit results of a job, ordered by index.
    pub fn list_unit_results(&self, job_id: JobId) -> EngineResult<Vec<UnitResult>> {
        let entry = self.store.entry(job_id)?;
        Ok(entry.with_inner(|inner| inner.ledger.results()))
    }

    /// On-demand progress snapshot, without emitting an event.
    pub fn progress(&self, job_id: JobId) -> EngineResult<ProgressSnapshot> {
        let entry = self.store.entry(job_id)?;
        Ok(entry.with_inner(|inner| entry.snapshot_locked(inner)))
    }

    /// Subscribe to one job's progress. The feed yields the current
    /// snapshot once as a baseline, then live updates. Dropping the feed
    /// unsubscribes.
    pub fn subscribe(&self, job_id: JobId) -> EngineResult<ProgressFeed> {
        let entry = self.store.entry(job_id)?;
        // Receiver and baseline are taken under the job lock so no update
        // can slip between them.
        Ok(entry.with_inner(|inner| {
            let rx = entry.progress_tx.subscribe();
            ProgressFeed::with_baseline(entry.snapshot_locked(inner), rx)
        }))
    }

    /// Subscribe to every job's progress (live dashboard transport).
    pub fn subscribe_all(&self) -> ProgressFeed {
        ProgressFeed::live(self.global_tx.subscribe())
    }

    pub(crate) fn resolve_external(&self, external_id: &str) -> Option<JobId> {
        self.correlations.resolve(external_id)
    }

    /// Broadcast a snapshot while still inside the job's critical section,
    /// so subscribers observe updates in mutation order. Send errors mean
    /// no subscribers, which is fine.
    pub(crate) fn emit_locked(&self, entry: &JobEntry, inner: &JobInner) -> ProgressSnapshot {
        let snap = entry.snapshot_locked(inner);
        let _ = entry.progress_tx.send(snap.clone());
        let _ = self.global_tx.send(snap.clone());
        snap
    }
}

impl Default for JobEngine {
    fn default() -> Self {
        Self::new()
    }
}
