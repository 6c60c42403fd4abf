//! Statistics sink and cohort aggregation.
//!
//! The engine calls the sink synchronously from EndMonth. Each worker owns
//! its own `CohortStats`; partials are merged once the batch completes.
//! Floating-point totals are only computed in `summary()`, over outcomes
//! sorted by patient index, so the result does not depend on how patients
//! were distributed across workers.

use crate::{
    event::SimEvent,
    snapshot::{MonthSnapshot, PatientOutcome},
    types::{DeathCause, Month, DEATH_CAUSE_NUM},
};
use serde::{Deserialize, Serialize};

pub trait StatisticsSink {
    /// Called once per patient per simulated month, after the month closes.
    fn record_month(&mut self, snapshot: &MonthSnapshot, events: &[SimEvent]);

    /// Called once per patient when its simulation ends.
    fn finalize(&mut self, outcome: &PatientOutcome);
}

/// Discards everything. Used when only the final `PatientState` matters.
#[derive(Debug, Default)]
pub struct NullSink;

impl StatisticsSink for NullSink {
    fn record_month(&mut self, _snapshot: &MonthSnapshot, _events: &[SimEvent]) {}
    fn finalize(&mut self, _outcome: &PatientOutcome) {}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortStats {
    /// Patients alive at the close of each month.
    pub alive_by_month:     Vec<u64>,
    /// Patients HIV-positive and alive at the close of each month.
    pub hiv_positive_by_month: Vec<u64>,
    pub on_art_by_month:    Vec<u64>,
    pub deaths_by_cause:    [u64; DEATH_CAUSE_NUM],
    pub new_infections:     u64,
    pub acute_ois:          u64,
    pub art_starts:         u64,
    pub outcomes:           Vec<PatientOutcome>,
}

impl CohortStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(series: &mut Vec<u64>, month: Month) {
        let i = month as usize;
        if series.len() <= i {
            series.resize(i + 1, 0);
        }
        series[i] += 1;
    }

    /// Combine a worker partial into this aggregate.
    pub fn merge(&mut self, other: CohortStats) {
        fn add_series(into: &mut Vec<u64>, from: &[u64]) {
            if into.len() < from.len() {
                into.resize(from.len(), 0);
            }
            for (a, b) in into.iter_mut().zip(from) {
                *a += b;
            }
        }
        add_series(&mut self.alive_by_month, &other.alive_by_month);
        add_series(&mut self.hiv_positive_by_month, &other.hiv_positive_by_month);
        add_series(&mut self.on_art_by_month, &other.on_art_by_month);
        for (a, b) in self.deaths_by_cause.iter_mut().zip(other.deaths_by_cause) {
            *a += b;
        }
        self.new_infections += other.new_infections;
        self.acute_ois += other.acute_ois;
        self.art_starts += other.art_starts;
        self.outcomes.extend(other.outcomes);
    }

    pub fn merged(mut self, other: CohortStats) -> Self {
        self.merge(other);
        self
    }

    /// Order outcomes by patient index. Call after the last merge.
    pub fn sort_outcomes(&mut self) {
        self.outcomes.sort_by_key(|o| o.patient);
    }

    pub fn deaths(&self, cause: DeathCause) -> u64 {
        self.deaths_by_cause[cause as usize]
    }

    pub fn num_patients(&self) -> usize {
        self.outcomes.len()
    }

    pub fn summary(&self) -> CohortSummary {
        let mut outcomes: Vec<&PatientOutcome> = self.outcomes.iter().collect();
        outcomes.sort_by_key(|o| o.patient);
        let n = outcomes.len();
        let total = |f: fn(&PatientOutcome) -> f64| outcomes.iter().map(|o| f(o)).sum::<f64>();
        let total_discounted_cost = total(|o| o.discounted_cost);
        let total_life_months = total(|o| o.life_months);
        let total_discounted_qalms = total(|o| o.discounted_qalms);
        let per_patient = |t: f64| if n == 0 { 0.0 } else { t / n as f64 };
        CohortSummary {
            num_patients: n as u64,
            deaths_by_cause: DeathCause::ALL
                .iter()
                .map(|&c| (c.name().to_string(), self.deaths(c)))
                .collect(),
            new_infections: self.new_infections,
            prevalent_at_entry: outcomes.iter().filter(|o| o.infected_at_entry).count() as u64,
            acute_ois: self.acute_ois,
            art_starts: self.art_starts,
            total_discounted_cost,
            total_life_months,
            total_discounted_qalms,
            mean_discounted_cost: per_patient(total_discounted_cost),
            mean_life_months: per_patient(total_life_months),
            mean_discounted_qalms: per_patient(total_discounted_qalms),
        }
    }
}

impl StatisticsSink for CohortStats {
    fn record_month(&mut self, snapshot: &MonthSnapshot, events: &[SimEvent]) {
        if snapshot.alive {
            Self::bump(&mut self.alive_by_month, snapshot.month);
            if snapshot.hiv_state.is_positive() {
                Self::bump(&mut self.hiv_positive_by_month, snapshot.month);
            }
            if snapshot.art_status.is_active() {
                Self::bump(&mut self.on_art_by_month, snapshot.month);
            }
        }
        for event in events {
            match event {
                SimEvent::HivInfected { at_entry: false, .. } => self.new_infections += 1,
                SimEvent::AcuteOiOccurred { .. } => self.acute_ois += 1,
                SimEvent::ArtStarted { .. } => self.art_starts += 1,
                SimEvent::PatientDied { cause, .. } => self.deaths_by_cause[*cause as usize] += 1,
                _ => {}
            }
        }
    }

    fn finalize(&mut self, outcome: &PatientOutcome) {
        self.outcomes.push(outcome.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub num_patients:           u64,
    pub deaths_by_cause:        Vec<(String, u64)>,
    pub new_infections:         u64,
    pub prevalent_at_entry:     u64,
    pub acute_ois:              u64,
    pub art_starts:             u64,
    pub total_discounted_cost:  f64,
    pub total_life_months:      f64,
    pub total_discounted_qalms: f64,
    pub mean_discounted_cost:   f64,
    pub mean_life_months:       f64,
    pub mean_discounted_qalms:  f64,
}
