//! Stage 8: CD4HVLProgression.
//!
//! Moves the true CD4 count and HVL stratum one month forward:
//!   - ends the acute phase once its duration has elapsed
//!   - off ART (or at zero efficacy): natural-history decline drawn from
//!     the CD4 x HVL table plus the patient's own offset
//!   - on ART: gain for the response type and period, blended with the
//!     natural decline by the current regimen efficacy
//!   - HVL falls toward suppression under effective ART and otherwise
//!     drifts back up toward the set-point
//!
//! Efficacy is the value DrugEfficacy left at the end of the previous
//! month, since DrugEfficacy runs later in the pipeline.

use crate::{
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    rng::site,
    types::{HivState, HvlStratum},
    updater::{StageContext, Updater},
};

/// Efficacy at or above which HVL moves toward suppression.
pub const SUPPRESSIVE_EFFICACY: f64 = 0.5;

pub struct Cd4HvlUpdater;

impl Updater for Cd4HvlUpdater {
    fn name(&self) -> &'static str {
        "cd4_hvl_progression"
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
        if !patient.is_hiv_positive() {
            return Ok(Vec::new());
        }
        let config = ctx.config;
        let month = patient.month();
        let mut events = Vec::new();

        if patient.disease().hiv_state == HivState::AcutePositive {
            let since = patient
                .disease()
                .infection_month
                .map_or(0, |m| month.saturating_sub(m));
            if since >= config.incidence.acute_duration_months {
                patient.end_acute_phase();
                events.push(SimEvent::AcutePhaseEnded { month });
            }
        }

        let (Some(cd4), Some(stratum), Some(hvl)) = (
            patient.disease().true_cd4,
            patient.disease().cd4_stratum,
            patient.disease().hvl,
        ) else {
            return Ok(events);
        };
        let nh = &config.nat_hist;
        let decline_mean = nh.cd4_decline_mean[stratum.index()][hvl.index()] + patient.disease().cd4_decline_offset;
        let decline_sd = nh.cd4_decline_sd[stratum.index()][hvl.index()];

        let on_art = patient.on_art();
        let efficacy = if on_art { patient.art().efficacy } else { 0.0 };
        let line_cfg = patient.art().line.and_then(|l| config.art.lines.get(l));

        let new_cd4 = match line_cfg {
            Some(line) if on_art && efficacy > 0.0 => {
                let months_on = patient.art().months_on_line(month);
                let period = line.gain_period(months_on);
                let response = patient.monitoring().cd4_response_type;
                let gain = ctx.rng.draw_gaussian(
                    site::CD4_CHANGE,
                    line.cd4_gain_mean[response][period],
                    line.cd4_gain_sd[response][period],
                )?;
                cd4 + efficacy * gain - (1.0 - efficacy) * decline_mean
            }
            _ => {
                let mut decline = ctx.rng.draw_gaussian(site::CD4_CHANGE, decline_mean, decline_sd)?;
                if let Some(line) = line_cfg.filter(|_| on_art && patient.art().failed) {
                    decline *= line.failed_cd4_decline_multiplier;
                }
                cd4 - decline
            }
        };
        patient.set_true_cd4(new_cd4, &config.run);

        let setpoint = patient.disease().setpoint_hvl.unwrap_or(hvl);
        let new_hvl = if efficacy >= SUPPRESSIVE_EFFICACY {
            hvl.step_down()
        } else if hvl < setpoint {
            hvl.step_up()
        } else if ctx.rng.chance(site::HVL_CHANGE, nh.monthly_prob_hvl_increase) {
            hvl.step_up()
        } else {
            hvl
        };
        if new_hvl != hvl {
            patient.set_hvl(new_hvl);
        }
        if new_hvl == HvlStratum::VeryLow && hvl != HvlStratum::VeryLow {
            log::debug!(
                "month={month} patient={} cd4_hvl_progression: HVL suppressed",
                patient.index()
            );
        }
        Ok(events)
    }
}
