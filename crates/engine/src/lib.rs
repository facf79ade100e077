// crates/engine/src/lib.rs
//! Job tracking and external-callback correlation engine.
//!
//! Tracks the lifecycle of long-running work that is driven partly by
//! local processing and partly by asynchronous, possibly out-of-order,
//! possibly duplicated external signals. Two job families share the
//! machinery: bulk reader imports processed row-by-row with live
//! progress, and document moderation jobs submitted to an external
//! service whose result arrives later via webhook.
//!
//! The engine guarantees, per job:
//! - mutating operations serialize in a per-job critical section;
//! - readers always see a consistent, monotonic view (counters never
//!   decrease, status never regresses, terminal state is frozen);
//! - unit results and terminal callbacks apply idempotently, so
//!   at-least-once delivery is safe everywhere.
//!
//! Entry point is [`JobEngine`]; everything mutable (job store,
//! correlation table) is scoped to the instance.

pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod lifecycle;
pub mod progress;
pub mod query;
pub mod submit;
pub mod webhook;

mod correlation;
mod export;
mod ledger;
mod store;

pub use config::{BackoffConfig, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use events::ProgressFeed;
pub use job::{Job, JobId, JobKind, JobStatus, UnitOutcome, UnitResult};
pub use lifecycle::JobEngine;
pub use progress::{percent, ProgressSnapshot};
pub use query::{JobFilter, JobPage};
pub use submit::{SubmissionClient, SubmitError};
pub use webhook::{CallbackDisposition, CallbackStatus, WebhookPayload};
