//! Stage 3: ChronicConditions.
//!
//! Init: prevalence draw per condition. Monthly: incidence for conditions
//! the patient does not have yet, then the monthly cost of every condition
//! the patient carries.

use crate::{
    config::{category_for, ChronicConditionConfig, SimConfig},
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    prob,
    rng::site,
    updater::{StageContext, Updater},
};

pub struct ChronicConditionUpdater;

/// Risk-factor shift on the logit scale for one condition.
fn risk_factor_shift(patient: &PatientState, cond: &ChronicConditionConfig) -> f64 {
    patient
        .general()
        .risk_factors
        .iter()
        .zip(&cond.risk_factor_logit)
        .filter(|(on, _)| **on)
        .map(|(_, &l)| l)
        .sum()
}

/// Pick the HIV-status-specific entry of a prevalence or incidence table.
fn table_value(
    patient: &PatientState,
    config: &SimConfig,
    hiv_negative: &[Vec<f64>],
    hiv_positive: &[Vec<Vec<f64>>],
) -> f64 {
    let gender = patient.general().gender.index();
    let cat = category_for(patient.age_years(), &config.chronic.age_category_upper_bounds_years);
    match patient.disease().cd4_stratum {
        Some(stratum) if patient.is_hiv_positive() => hiv_positive[stratum.index()][gender][cat],
        _ => hiv_negative[gender][cat],
    }
}

impl Updater for ChronicConditionUpdater {
    fn name(&self) -> &'static str {
        "chronic_conditions"
    }

    fn run_init(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        for (i, cond) in config.chronic.conditions.iter().enumerate() {
            let base = table_value(patient, config, &cond.prevalence_hiv_negative, &cond.prevalence_hiv_positive);
            let p = prob::adjust_on_logit(base, risk_factor_shift(patient, cond))?;
            if ctx.rng.chance(site::CHRM_PREVALENCE, p) {
                patient.set_chronic_condition(i);
            }
        }
        Ok(Vec::new())
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let mut events = Vec::new();
        for (i, cond) in config.chronic.conditions.iter().enumerate() {
            if !patient.disease().chronic_conditions[i] {
                let base = table_value(patient, config, &cond.incidence_hiv_negative, &cond.incidence_hiv_positive);
                let mut p = prob::adjust_on_logit(base, risk_factor_shift(patient, cond))?;
                if patient.on_art() {
                    p = prob::rate_ratio_to_prob(p, cond.on_art_incidence_multiplier)?;
                }
                if ctx.rng.chance(site::CHRM_INCIDENCE, p) {
                    patient.set_chronic_condition(i);
                    log::debug!(
                        "month={} patient={} chronic_conditions: onset of {}",
                        patient.month(),
                        patient.index(),
                        cond.name
                    );
                    events.push(SimEvent::ChronicConditionOnset {
                        month: patient.month(),
                        condition: i,
                    });
                }
            }
            if patient.disease().chronic_conditions[i] {
                patient.add_cost(cond.monthly_cost, &config.run);
            }
        }
        Ok(events)
    }
}
