//! Stage 11: DrugEfficacy.
//!
//! Sets the efficacy of the active ART line for the month.
//!
//! Continuous lines: responders are suppressed once months-to-suppression
//! have elapsed and may fail late afterwards; non-responders fail at the
//! configured month.
//!
//! Periodic lines: efficacy follows the configured curve of months since
//! the last administration. A dose missed by more than the grace window
//! drops efficacy to zero, which puts the patient back on the natural
//! CD4 decline until the next administration.

use crate::{
    config::{ArtLineConfig, Formulation},
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    rng::site,
    updater::{StageContext, Updater},
};

pub struct DrugEfficacyUpdater;

/// Efficacy of a periodic line for this month, and whether the due dose
/// has been missed beyond the grace window. `None` for continuous lines.
pub fn periodic_efficacy(patient: &PatientState, line: &ArtLineConfig) -> Option<(f64, bool)> {
    let Formulation::Periodic {
        interval_months,
        grace_months,
        efficacy_curve,
        ..
    } = &line.formulation
    else {
        return None;
    };
    let art = patient.art();
    let Some(last) = art.last_administration else {
        return Some((0.0, false));
    };
    if !art.responder {
        return Some((0.0, false));
    }
    let since = patient.month().saturating_sub(last);
    if since > interval_months + grace_months {
        return Some((0.0, true));
    }
    Some((efficacy_curve.efficacy(since, *interval_months), false))
}

impl Updater for DrugEfficacyUpdater {
    fn name(&self) -> &'static str {
        "drug_efficacy"
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
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        if !patient.on_art() {
            return Ok(Vec::new());
        }
        let config = ctx.config;
        let Some(line) = patient.art().line else {
            return Ok(Vec::new());
        };
        let Some(line_cfg) = config.art.lines.get(line) else {
            return Ok(Vec::new());
        };
        let month = patient.month();
        let mut events = Vec::new();

        if let Some((efficacy, missed)) = periodic_efficacy(patient, line_cfg) {
            if missed && !patient.art().missed_dose {
                log::debug!("month={month} patient={} drug_efficacy: dose missed on line {line}", patient.index());
                events.push(SimEvent::ArtDoseMissed { month, line });
            }
            patient.set_missed_dose(missed);
            patient.set_art_efficacy(efficacy);
            return Ok(events);
        }

        let art = patient.art();
        if art.failed {
            patient.set_art_efficacy(0.0);
            return Ok(events);
        }
        let months_on = art.months_on_line(month);
        if art.suppressed {
            if ctx.rng.chance(site::LATE_FAILURE, line_cfg.monthly_prob_late_failure) {
                patient.set_art_failed();
                patient.set_art_efficacy(0.0);
                log::debug!("month={month} patient={} drug_efficacy: late failure on line {line}", patient.index());
                events.push(SimEvent::ArtFailed { month, line });
            }
        } else if art.responder {
            patient.set_art_efficacy(1.0);
            if months_on >= line_cfg.months_to_suppression {
                patient.set_art_suppressed();
                events.push(SimEvent::ArtSuppressed { month, line });
            }
        } else if months_on >= line_cfg.nonresponder_failure_month {
            patient.set_art_failed();
            patient.set_art_efficacy(0.0);
            events.push(SimEvent::ArtFailed { month, line });
        }
        Ok(events)
    }
}
