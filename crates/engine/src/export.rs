// crates/engine/src/export.rs
//! CSV rendering of a job's unit results for detail-view downloads.

use crate::error::EngineResult;
use crate::job::JobId;
use crate::lifecycle::JobEngine;

impl JobEngine {
    /// Render the unit results of a job as CSV, ordered by index. The
    /// header row is always present, even for a job with no results yet.
    pub fn unit_results_csv(&self, job_id: JobId) -> EngineResult<String> {
        let results = self.list_unit_results(job_id)?;
        let mut out = String::from("Index,Succeeded,Detail,Error\n");
        for result in results {
            let detail = result
                .detail
                .map(|d| d.to_string())
                .unwrap_or_default();
            out.push_str(&csv_field(&result.index.to_string()));
            out.push(',');
            out.push_str(&csv_field(if result.succeeded { "true" } else { "false" }));
            out.push(',');
            out.push_str(&csv_field(&detail));
            out.push(',');
            out.push_str(&csv_field(result.error.as_deref().unwrap_or_default()));
            out.push('\n');
        }
        Ok(out)
    }
}

/// Quote a field when it contains a comma, quote or newline; embedded
/// quotes are doubled.
fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
