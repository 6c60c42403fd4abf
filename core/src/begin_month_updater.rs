//! Stage 1: BeginMonth.
//!
//! Init: demographics (age, gender, risk factors) and the pediatric
//! eligibility predicate, evaluated exactly once.
//! Monthly: clears the per-month accumulators and applies risk-factor
//! incidence.

use crate::{
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    rng::site,
    types::{Gender, PatientKind},
    updater::{StageContext, Updater},
};

pub struct BeginMonthUpdater;

impl Updater for BeginMonthUpdater {
    fn name(&self) -> &'static str {
        "begin_month"
    }

    fn run_init(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let cohort = &ctx.config.cohort;
        let age = ctx.rng.draw_gaussian(
            site::INIT_AGE,
            cohort.initial_age_mean_months,
            cohort.initial_age_sd_months,
        )?;
        // At least one month must remain before the age horizon.
        let oldest = ctx.config.run.max_age_months.saturating_sub(1);
        let age_months = age.round().clamp(0.0, oldest as f64) as u32;

        let gender = if ctx.rng.chance(site::INIT_GENDER, cohort.male_probability) {
            Gender::Male
        } else {
            Gender::Female
        };

        let peds = &ctx.config.peds;
        let kind = if peds.enabled && age_months < peds.age_threshold_months {
            PatientKind::Pediatric
        } else {
            PatientKind::Adult
        };
        patient.set_demographics(age_months, gender, kind);

        for (factor, &p) in cohort.risk_factor_prevalence.iter().enumerate() {
            if ctx.rng.chance(site::INIT_RISK_FACTOR, p) {
                patient.set_risk_factor(factor);
            }
        }

        Ok(vec![SimEvent::PatientCreated {
            age_months,
            gender,
            kind,
        }])
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        patient.begin_month();

        let incidence = &ctx.config.cohort.risk_factor_incidence;
        for (factor, &p) in incidence.iter().enumerate() {
            if patient.general().risk_factors[factor] {
                continue;
            }
            if ctx.rng.chance(site::RISK_FACTOR_INCIDENCE, p) {
                patient.set_risk_factor(factor);
                log::debug!(
                    "month={} patient={} begin_month: risk factor {factor} acquired",
                    patient.month(),
                    patient.index()
                );
            }
        }
        Ok(Vec::new())
    }
}
