// crates/engine/src/ledger.rs
//! Append-once ledger of per-unit outcomes for a multi-unit job.
//!
//! The first write for an index wins. Row processing is at-least-once, so
//! a repeat delivery for an already-recorded index must leave the stored
//! result untouched.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::job::{JobId, UnitOutcome, UnitResult};

/// What a record attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordDisposition {
    /// First result for this index.
    Recorded,
    /// Index already had a result; nothing changed.
    Duplicate,
}

#[derive(Debug, Default)]
pub(crate) struct UnitLedger {
    entries: BTreeMap<u32, UnitResult>,
}

impl UnitLedger {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, job_id: JobId, index: u32, outcome: UnitOutcome) -> RecordDisposition {
        match self.entries.entry(index) {
            Entry::Occupied(_) => RecordDisposition::Duplicate,
            Entry::Vacant(slot) => {
                let (succeeded, detail, error) = match outcome {
                    UnitOutcome::Succeeded { detail } => (true, detail, None),
                    UnitOutcome::Failed { error } => (false, None, Some(error)),
                };
                slot.insert(UnitResult {
                    job_id,
                    index,
                    succeeded,
                    detail,
                    error,
                });
                RecordDisposition::Recorded
            }
        }
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Results ordered by index.
    pub fn results(&self) -> Vec<UnitResult> {
        self.entries.values().cloned().collect()
    }
}
