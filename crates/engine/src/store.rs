// crates/engine/src/store.rs
//! Concurrency-safe storage of job records.
//!
//! The map itself is guarded by a `RwLock` held only for insert/lookup.
//! All mutable job fields live behind one `Mutex` per entry, so every
//! mutating operation on a job runs in that job's own critical section and
//! readers copy out a consistent view. A concurrent map alone would allow
//! a reader to see counters updated but status not yet.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::job::{Job, JobId, JobKind, JobStatus};
use crate::ledger::UnitLedger;
use crate::progress::ProgressSnapshot;

/// Mutable job state. Only reachable through `JobEntry::with_inner`, which
/// is the per-job critical section.
pub(crate) struct JobInner {
    pub label: String,
    pub status: JobStatus,
    pub external_id: Option<String>,
    pub total_units: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub error_message: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ledger: UnitLedger,
}

impl JobInner {
    pub fn processed_units(&self) -> u32 {
        self.ledger.len()
    }
}

/// One stored job: immutable identity plus locked state plus the per-job
/// progress channel.
pub(crate) struct JobEntry {
    pub id: JobId,
    pub kind: JobKind,
    inner: Mutex<JobInner>,
    pub progress_tx: broadcast::Sender<ProgressSnapshot>,
}

impl JobEntry {
    fn new(kind: JobKind, label: String, total_units: u32, channel_capacity: usize) -> Self {
        let (progress_tx, _) = broadcast::channel(channel_capacity);
        Self {
            id: Uuid::new_v4(),
            kind,
            inner: Mutex::new(JobInner {
                label,
                status: JobStatus::Pending,
                external_id: None,
                total_units,
                success_count: 0,
                failure_count: 0,
                error_message: None,
                result: None,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                ledger: UnitLedger::new(),
            }),
            progress_tx,
        }
    }

    /// Run `f` inside this job's critical section.
    pub fn with_inner<T>(&self, f: impl FnOnce(&mut JobInner) -> T) -> T {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(job_id = %self.id, "job mutex poisoned, recovering last state");
                poisoned.into_inner()
            }
        };
        f(&mut guard)
    }

    /// Snapshot built while the caller already holds the critical section.
    pub fn snapshot_locked(&self, inner: &JobInner) -> ProgressSnapshot {
        ProgressSnapshot::new(
            self.id,
            self.kind,
            inner.status,
            inner.processed_units(),
            inner.total_units,
            inner.success_count,
            inner.failure_count,
        )
    }

    /// Copy out the current field values as a read-only `Job`.
    pub fn job(&self) -> Job {
        self.with_inner(|inner| Job {
            id: self.id,
            kind: self.kind,
            label: inner.label.clone(),
            status: inner.status,
            external_id: inner.external_id.clone(),
            total_units: inner.total_units,
            processed_units: inner.processed_units(),
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            error_message: inner.error_message.clone(),
            result: inner.result.clone(),
            created_at: inner.created_at,
            started_at: inner.started_at,
            completed_at: inner.completed_at,
        })
    }
}

pub(crate) struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<JobEntry>>>,
    channel_capacity: usize,
}

impl JobStore {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    pub fn create(&self, kind: JobKind, label: String, total_units: u32) -> Arc<JobEntry> {
        let entry = Arc::new(JobEntry::new(kind, label, total_units, self.channel_capacity));
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(entry.id, Arc::clone(&entry));
            }
            Err(poisoned) => {
                tracing::error!("job map lock poisoned, recovering");
                poisoned.into_inner().insert(entry.id, Arc::clone(&entry));
            }
        }
        entry
    }

    pub fn entry(&self, job_id: JobId) -> EngineResult<Arc<JobEntry>> {
        let jobs = match self.jobs.read() {
            Ok(jobs) => jobs,
            Err(poisoned) => {
                tracing::error!("job map lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        jobs.get(&job_id)
            .cloned()
            .ok_or(EngineError::NotFound { job_id })
    }

    pub fn get(&self, job_id: JobId) -> EngineResult<Job> {
        Ok(self.entry(job_id)?.job())
    }

    /// Snapshot of every stored job, in no particular order.
    pub fn all(&self) -> Vec<Job> {
        let jobs = match self.jobs.read() {
            Ok(jobs) => jobs,
            Err(poisoned) => {
                tracing::error!("job map lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        jobs.values().map(|entry| entry.job()).collect()
    }
}
