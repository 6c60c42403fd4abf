//! Stage 15: TBClinicalCare.
//!
//! Diagnosis and treatment of active TB, and TB prophylaxis for latent
//! infection. Treatment toxicity is drawn by DrugToxicity; this stage
//! reads its event and stops the treatment.

use crate::{
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    rng::site,
    tb_disease_updater::TbDiseaseUpdater,
    types::{RegimenStatus, TbState, TbStrain},
    updater::{StageContext, Updater},
};

pub struct TbClinicalCareUpdater;

impl TbClinicalCareUpdater {
    fn success_probability(patient: &PatientState, config: &SimConfig) -> f64 {
        let tx = &config.tb.treatment;
        let strain = patient.tb().strain.unwrap_or(TbStrain::DrugSensitive).index();
        match patient.disease().cd4_stratum {
            Some(stratum) => tx.prob_success_hiv_positive[strain][stratum.index()],
            None => tx.prob_success_hiv_negative[strain],
        }
    }

    fn treatment(
        patient: &mut PatientState,
        events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> Vec<SimEvent> {
        let config = ctx.config;
        let tx = &config.tb.treatment;
        let month = patient.month();
        let mut events = Vec::new();

        if !patient.tb().treatment.is_active() {
            let eligible = patient.tb().state.is_active() && !patient.tb().diagnosed;
            if eligible && ctx.rng.chance(site::TB_DIAGNOSIS, config.tb.monthly_prob_diagnosis) {
                patient.set_tb_diagnosed(true);
                patient.start_tb_treatment();
                patient.add_cost(tx.initial_cost, &config.run);
                patient.add_cost(tx.monthly_cost, &config.run);
                log::debug!("month={month} patient={} tb_care: diagnosed, treatment started", patient.index());
                events.push(SimEvent::TbDiagnosed { month });
                events.push(SimEvent::TbTreatmentStarted { month });
                if patient.tb().proph.is_active() {
                    patient.stop_tb_proph(RegimenStatus::StoppedByPolicy);
                    events.push(SimEvent::TbProphEnded { month });
                }
            }
            return events;
        }

        let toxicity = events_in
            .iter()
            .any(|e| matches!(e, SimEvent::TbTreatmentToxicity { .. }));
        if toxicity {
            patient.stop_tb_treatment(RegimenStatus::StoppedByToxicity);
            patient.set_tb_diagnosed(false);
            events.push(SimEvent::TbTreatmentEnded {
                month,
                status: RegimenStatus::StoppedByToxicity,
                cured: false,
            });
            return events;
        }
        if ctx.rng.chance(site::TB_TREATMENT_DEFAULT, tx.monthly_prob_default) {
            patient.stop_tb_treatment(RegimenStatus::StoppedByPolicy);
            patient.set_tb_diagnosed(false);
            events.push(SimEvent::TbTreatmentEnded {
                month,
                status: RegimenStatus::StoppedByPolicy,
                cured: false,
            });
            events.push(TbDiseaseUpdater::transition(patient, TbState::TreatmentDefault));
            return events;
        }

        patient.add_cost(tx.monthly_cost, &config.run);
        let since = patient
            .tb()
            .treatment_start
            .map_or(0, |s| month.saturating_sub(s));
        if since + 1 < tx.duration_months {
            return events;
        }
        let p = Self::success_probability(patient, config);
        let cured = ctx.rng.chance(site::TB_TREATMENT_SUCCESS, p);
        patient.set_tb_diagnosed(false);
        if cured {
            patient.stop_tb_treatment(RegimenStatus::StoppedByPolicy);
            events.push(SimEvent::TbTreatmentEnded {
                month,
                status: RegimenStatus::StoppedByPolicy,
                cured,
            });
            events.push(TbDiseaseUpdater::transition(patient, TbState::PreviouslyTreated));
        } else {
            patient.stop_tb_treatment(RegimenStatus::StoppedByFailure);
            events.push(SimEvent::TbTreatmentEnded {
                month,
                status: RegimenStatus::StoppedByFailure,
                cured,
            });
        }
        log::debug!("month={month} patient={} tb_care: treatment completed cured={cured}", patient.index());
        events
    }

    fn prophylaxis(patient: &mut PatientState, ctx: &mut StageContext<'_>) -> Vec<SimEvent> {
        let config = ctx.config;
        let proph = &config.tb.proph;
        let month = patient.month();
        if !proph.enabled {
            return Vec::new();
        }

        if patient.tb().proph.is_active() {
            patient.add_cost(proph.monthly_cost, &config.run);
            let since = patient.tb().proph_start.map_or(0, |s| month.saturating_sub(s));
            if since + 1 >= proph.duration_months {
                patient.stop_tb_proph(RegimenStatus::StoppedByPolicy);
                return vec![SimEvent::TbProphEnded { month }];
            }
            return Vec::new();
        }

        let eligible = patient.tb().state == TbState::Latent
            && patient.tb().proph == RegimenStatus::NotStarted
            && patient.in_care();
        if eligible && ctx.rng.chance(site::TB_PROPH_START, proph.monthly_prob_start) {
            patient.start_tb_proph();
            patient.add_cost(proph.monthly_cost, &config.run);
            return vec![SimEvent::TbProphStarted { month }];
        }
        Vec::new()
    }
}

impl Updater for TbClinicalCareUpdater {
    fn name(&self) -> &'static str {
        "tb_clinical_care"
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
        if !ctx.config.tb.enabled {
            return Ok(Vec::new());
        }
        let mut events = Self::treatment(patient, events_in, ctx);
        events.extend(Self::prophylaxis(patient, ctx));
        Ok(events)
    }
}
