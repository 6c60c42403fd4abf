//! Stage 6: AcuteOpportunisticInfection.
//!
//! Builds the monthly probability of each OI from CD4 stratum, history,
//! ART and prophylaxis, then uses a single draw to select at most one OI.
//! Recording the OI goes through `PatientState::record_oi`, which applies
//! the asymptomatic to symptomatic upgrade.

use crate::{
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    prob,
    rng::site,
    types::{OiType, OI_NUM},
    updater::{StageContext, Updater},
};

pub struct AcuteOiUpdater;

impl AcuteOiUpdater {
    /// Monthly probability of each OI type for this patient.
    pub fn oi_probabilities(patient: &PatientState, config: &SimConfig) -> SimResult<Vec<f64>> {
        let Some(stratum) = patient.disease().cd4_stratum else {
            return Ok(vec![0.0; OI_NUM]);
        };
        let nh = &config.nat_hist;
        let s = stratum.index();
        let mut probs = Vec::with_capacity(OI_NUM);
        for oi in OiType::all() {
            let i = oi.index();
            let mut p = if patient.disease().oi_history[i] {
                nh.oi_prob_with_history[s][i]
            } else {
                nh.oi_prob_no_history[s][i]
            };
            if patient.on_art() {
                p = prob::rate_ratio_to_prob(p, nh.oi_on_art_multiplier[s])?;
            }
            if patient.proph().status[i].is_active() {
                let cfg = &config.proph.prophs[i];
                let efficacy = if patient.proph().secondary[i] {
                    cfg.secondary_efficacy
                } else {
                    cfg.primary_efficacy
                };
                p *= 1.0 - efficacy;
            }
            probs.push(p);
        }
        Ok(probs)
    }
}

impl Updater for AcuteOiUpdater {
    fn name(&self) -> &'static str {
        "acute_oi"
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
        let probs = Self::oi_probabilities(patient, config)?;
        let draw = ctx.rng.draw_uniform(site::ACUTE_OI);
        let selected = prob::select_competing(
            "acute_oi",
            &probs,
            draw,
            &format!("patient={} cd4_stratum={:?}", patient.index(), patient.disease().cd4_stratum),
        )?;
        let Some(i) = selected else {
            return Ok(Vec::new());
        };

        let oi = OiType(i as u8);
        patient.record_oi(oi, true)?;
        let cost = if patient.monitoring().detected {
            config.costs.acute_oi_detected[i]
        } else {
            config.costs.acute_oi_undetected[i]
        };
        patient.add_cost(cost, &config.run);
        patient.apply_qol_modifier(config.qol.acute_oi_modifier[i]);

        let severe = config.nat_hist.severe_oi[i];
        log::debug!(
            "month={} patient={} acute_oi: OI {i} (severe={severe}) state={:?}",
            patient.month(),
            patient.index(),
            patient.disease().hiv_state
        );
        Ok(vec![SimEvent::AcuteOiOccurred {
            month: patient.month(),
            oi,
            severe,
        }])
    }
}
