//! Stage 5: TBDisease.
//!
//! Natural history of TB: infection, activation of latent infection
//! (reduced by TB prophylaxis), self-cure of untreated active disease.
//! Diagnosis and treatment belong to TBClinicalCare.

use crate::{
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    prob,
    rng::site,
    types::{TbState, TbStrain},
    updater::{StageContext, Updater},
};

const TB_STATES: [TbState; 6] = [
    TbState::Uninfected,
    TbState::Latent,
    TbState::ActivePulmonary,
    TbState::ActiveExtrapulmonary,
    TbState::PreviouslyTreated,
    TbState::TreatmentDefault,
];

pub struct TbDiseaseUpdater;

impl TbDiseaseUpdater {
    fn draw_strain(patient: &PatientState, ctx: &mut StageContext<'_>, site: &'static str) -> SimResult<TbStrain> {
        let draw = ctx.rng.draw_uniform(site);
        let i = prob::select_outcome(
            "tb.strain_distribution",
            &ctx.config.tb.strain_distribution,
            draw,
            &format!("patient={}", patient.index()),
        )?;
        Ok(TbStrain::ALL[i])
    }

    pub(crate) fn transition(patient: &mut PatientState, to: TbState) -> SimEvent {
        let from = patient.tb().state;
        patient.set_tb_state(to);
        log::debug!(
            "month={} patient={} tb_disease: {from:?} -> {to:?}",
            patient.month(),
            patient.index()
        );
        SimEvent::TbStateChanged {
            month: patient.month(),
            from,
            to,
            strain: patient.tb().strain,
        }
    }
}

impl Updater for TbDiseaseUpdater {
    fn name(&self) -> &'static str {
        "tb_disease"
    }

    fn run_init(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let tb = &config.tb;
        if !tb.enabled {
            return Ok(Vec::new());
        }
        let (name, dist) = if patient.is_hiv_positive() {
            ("tb.initial_state_hiv_positive", &tb.initial_state_hiv_positive)
        } else {
            ("tb.initial_state_hiv_negative", &tb.initial_state_hiv_negative)
        };
        let draw = ctx.rng.draw_uniform(site::TB_INIT_STATE);
        let state = TB_STATES[prob::select_outcome(name, dist, draw, &format!("patient={}", patient.index()))?];
        if state != TbState::Uninfected {
            let strain = Self::draw_strain(patient, ctx, site::TB_INIT_STRAIN)?;
            patient.set_tb_strain(strain);
        }
        patient.set_tb_state(state);
        Ok(Vec::new())
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let tb = &config.tb;
        if !tb.enabled {
            return Ok(Vec::new());
        }
        let mut events = Vec::new();
        match patient.tb().state {
            TbState::Uninfected => {
                if ctx.rng.chance(site::TB_INFECTION, tb.monthly_prob_infection) {
                    let strain = Self::draw_strain(patient, ctx, site::TB_INFECTION_STRAIN)?;
                    patient.set_tb_strain(strain);
                    events.push(Self::transition(patient, TbState::Latent));
                }
            }
            TbState::Latent | TbState::PreviouslyTreated | TbState::TreatmentDefault => {
                let mut p = match patient.disease().cd4_stratum {
                    Some(stratum) => tb.monthly_prob_activation_hiv_positive[stratum.index()],
                    None => tb.monthly_prob_activation_hiv_negative,
                };
                if patient.tb().proph.is_active() {
                    p *= 1.0 - tb.proph.activation_efficacy;
                }
                if ctx.rng.chance(site::TB_ACTIVATION, p) {
                    let to = if ctx.rng.chance(site::TB_PULMONARY, tb.prob_pulmonary) {
                        TbState::ActivePulmonary
                    } else {
                        TbState::ActiveExtrapulmonary
                    };
                    events.push(Self::transition(patient, to));
                }
            }
            TbState::ActivePulmonary | TbState::ActiveExtrapulmonary => {
                if !patient.tb().treatment.is_active()
                    && ctx.rng.chance(site::TB_SELF_CURE, tb.monthly_prob_self_cure)
                {
                    events.push(Self::transition(patient, TbState::Latent));
                }
            }
        }
        Ok(events)
    }
}
