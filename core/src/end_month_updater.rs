//! Stage 16: EndMonth.
//!
//! Closes the month for every patient, including one who died this month:
//!   - credits life months and QALMs (a partial month on death)
//!   - checks the patient's invariants in debug builds
//!   - hands the month snapshot and events to the statistics sink
//!   - advances the clock and age, then tests the horizon
//!   - hands the final outcome to the sink once the patient is finished

use crate::{
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    snapshot::{MonthSnapshot, PatientOutcome},
    updater::{StageContext, Updater},
};

pub struct EndMonthUpdater;

impl EndMonthUpdater {
    /// Base quality of life for the month before modifiers.
    pub fn base_qol(patient: &PatientState, config: &SimConfig) -> f64 {
        let qol = &config.qol;
        match patient.disease().cd4_stratum {
            Some(stratum) if patient.on_art() => qol.hiv_positive_on_art[stratum.index()],
            Some(stratum) => qol.hiv_positive_off_art[stratum.index()],
            None => qol.hiv_negative,
        }
    }

    fn horizon_reached(patient: &PatientState, config: &SimConfig) -> bool {
        let run = &config.run;
        patient.general().age_months >= run.max_age_months
            || run.max_months.is_some_and(|max| patient.month() >= max)
    }
}

impl Updater for EndMonthUpdater {
    fn name(&self) -> &'static str {
        "end_month"
    }

    fn run_init(
        &self,
        _patient: &mut PatientState,
        _events_in: &[SimEvent],
        _ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        Ok(Vec::new())
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let month = patient.month();
        let fraction = if patient.is_alive() {
            1.0
        } else {
            config.run.death_month_life_fraction
        };
        let qol = Self::base_qol(patient, config);
        patient.accrue_life(fraction, qol, &config.run);

        if cfg!(debug_assertions) {
            patient.check_invariants(&config.run)?;
        }
        let snapshot = MonthSnapshot::capture(patient);

        let mut events = Vec::new();
        if patient.is_alive() {
            patient.advance_month();
            if Self::horizon_reached(patient, config) {
                patient.mark_horizon_reached();
                log::debug!("month={month} patient={} end_month: horizon reached", patient.index());
                events.push(SimEvent::HorizonReached { month: patient.month() });
            }
        }

        let mut month_events = events_in.to_vec();
        month_events.extend(events.iter().cloned());
        ctx.sink.record_month(&snapshot, &month_events);
        if patient.is_finished() {
            ctx.sink.finalize(&PatientOutcome::capture(patient));
        }
        Ok(events)
    }

    fn runs_after_death(&self) -> bool {
        true
    }
}
