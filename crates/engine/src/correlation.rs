// crates/engine/src/correlation.rs
//! Mapping from externally-issued job ids to internal job ids.
//!
//! One entry per external id, created exactly once when a job is handed to
//! an external service. Lookups are O(1) and safe under concurrent
//! callback delivery; registration races lose with `DuplicateCorrelation`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::job::JobId;

pub(crate) struct CorrelationTable {
    by_external: RwLock<HashMap<String, JobId>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            by_external: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, external_id: &str, job_id: JobId) -> EngineResult<()> {
        let mut map = match self.by_external.write() {
            Ok(map) => map,
            Err(poisoned) => {
                tracing::error!("correlation table lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        match map.entry(external_id.to_string()) {
            Entry::Occupied(_) => Err(EngineError::DuplicateCorrelation {
                external_id: external_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(job_id);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, external_id: &str) -> Option<JobId> {
        let map = match self.by_external.read() {
            Ok(map) => map,
            Err(poisoned) => {
                tracing::error!("correlation table lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        map.get(external_id).copied()
    }
}
