// crates/engine/src/query.rs
//! Job listing for dashboard and detail views.

use serde::Serialize;

use crate::job::{Job, JobKind, JobStatus};
use crate::lifecycle::JobEngine;

/// Filters applied before pagination. All criteria compose with AND.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Case-insensitive keyword matched against label, kind and status.
    pub q: Option<String>,
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
}

/// One page of jobs, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPage {
    pub items: Vec<Job>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl JobEngine {
    /// List jobs newest-first, filtered and paginated. `page` is 1-based;
    /// a page past the end is empty, not an error.
    pub fn list_jobs(&self, filter: &JobFilter, page: usize, page_size: usize) -> JobPage {
        let mut jobs = self.store.all();

        if let Some(q) = filter.q.as_deref() {
            let keyword = q.trim().to_lowercase();
            if !keyword.is_empty() {
                jobs.retain(|job| {
                    let haystack = format!("{} {} {}", job.label, job.kind, job.status);
                    haystack.to_lowercase().contains(&keyword)
                });
            }
        }
        if let Some(status) = filter.status {
            jobs.retain(|job| job.status == status);
        }
        if let Some(kind) = filter.kind {
            jobs.retain(|job| job.kind == kind);
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = jobs.len();
        let page = page.max(1);
        let page_size = page_size.max(1);
        let from = (page - 1).saturating_mul(page_size);
        let items = if from >= total {
            Vec::new()
        } else {
            jobs[from..from.saturating_add(page_size).min(total)].to_vec()
        };

        JobPage {
            items,
            total,
            page,
            page_size,
        }
    }
}
