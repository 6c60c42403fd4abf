//! Reproducibility audit hook.
//!
//! An observer attached to a patient's `PatientRng` sees every draw for that
//! patient: call-site identifier, stream position and value. Observers only
//! read; they cannot alter what the simulation draws.

use crate::types::{Month, PatientIndex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub patient: PatientIndex,
    pub month: Month,
    pub position: u64,
    pub site: &'static str,
    pub value: f64,
}

pub trait TraceObserver: Send + Sync {
    /// Whether draws for `patient` should be forwarded to this observer.
    fn wants(&self, patient: PatientIndex) -> bool;

    fn on_draw(&self, record: TraceRecord);
}

/// Keeps every draw for a designated set of patients in memory.
pub struct RecordingTracer {
    patients: BTreeSet<PatientIndex>,
    records: Mutex<Vec<TraceRecord>>,
}

impl RecordingTracer {
    pub fn new(patients: impl IntoIterator<Item = PatientIndex>) -> Self {
        Self {
            patients: patients.into_iter().collect(),
            records: Mutex::new(Vec::new()),
        }
    }

    /// All records, ordered by patient then stream position.
    pub fn records(&self) -> Vec<TraceRecord> {
        let mut out = match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        out.sort_by_key(|r| (r.patient, r.position));
        out
    }

    pub fn records_for(&self, patient: PatientIndex) -> Vec<TraceRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.patient == patient)
            .collect()
    }
}

impl TraceObserver for RecordingTracer {
    fn wants(&self, patient: PatientIndex) -> bool {
        self.patients.contains(&patient)
    }

    fn on_draw(&self, record: TraceRecord) {
        match self.records.lock() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
