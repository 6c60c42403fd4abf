//! Stage 4: DrugToxicity.
//!
//! Toxicity of every active treatment axis:
//!   1. ART: each toxicity of the current line gets one draw when
//!      months-on-line reaches its onset month. Chronic toxicities keep
//!      their death rate ratio and QOL effect while the line stays active.
//!   2. OI prophylaxis: monthly major toxicity stops the prophylaxis.
//!   3. TB treatment: monthly major toxicity, acted on by TBClinicalCare.
//!
//! Stopping ART after a major toxicity is a policy decision left to
//! ClinicVisit, which reads the `ArtToxicity` event.

use crate::{
    config::ToxSeverity,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    rng::site,
    types::{DeathCause, OiType, RegimenStatus},
    updater::{StageContext, Updater},
};

pub struct DrugToxicityUpdater;

impl DrugToxicityUpdater {
    fn art_toxicity(patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let Some(line) = patient.art().line.filter(|_| patient.on_art()) else {
            return Ok(Vec::new());
        };
        let Some(line_cfg) = config.art.lines.get(line) else {
            return Ok(Vec::new());
        };
        let month = patient.month();
        let months_on = patient.art().months_on_line(month);
        let mut events = Vec::new();

        for (t, tox) in line_cfg.toxicities.iter().enumerate() {
            let seen = patient.art().toxicities_seen.get(t).copied().unwrap_or(true);
            if seen {
                if tox.severity == ToxSeverity::Chronic {
                    patient.add_death_rate_ratio(DeathCause::DrugToxicity, tox.death_rate_ratio);
                    patient.apply_qol_modifier(tox.qol_modifier);
                }
                continue;
            }
            if months_on != tox.onset_month {
                continue;
            }
            if !ctx.rng.chance(site::ART_TOXICITY, tox.probability) {
                continue;
            }
            patient.mark_art_toxicity(t);
            patient.add_cost(tox.cost, &config.run);
            patient.apply_qol_modifier(tox.qol_modifier);
            if tox.severity != ToxSeverity::Minor {
                patient.add_death_rate_ratio(DeathCause::DrugToxicity, tox.death_rate_ratio);
            }
            log::debug!(
                "month={month} patient={} drug_toxicity: {} on line {line} ({:?})",
                patient.index(),
                tox.name,
                tox.severity
            );
            events.push(SimEvent::ArtToxicity {
                month,
                line,
                toxicity: t,
                severity: tox.severity,
            });
        }
        Ok(events)
    }

    fn proph_toxicity(patient: &mut PatientState, ctx: &mut StageContext<'_>) -> Vec<SimEvent> {
        let config = ctx.config;
        let month = patient.month();
        let mut events = Vec::new();
        for oi in OiType::all() {
            if !patient.proph().status[oi.index()].is_active() {
                continue;
            }
            let cfg = &config.proph.prophs[oi.index()];
            if ctx.rng.chance(site::PROPH_TOXICITY, cfg.monthly_prob_major_toxicity) {
                patient.stop_proph(oi, RegimenStatus::StoppedByToxicity);
                patient.add_death_rate_ratio(DeathCause::DrugToxicity, cfg.toxicity_death_rate_ratio);
                events.push(SimEvent::ProphToxicity { month, oi });
                events.push(SimEvent::ProphStopped {
                    month,
                    oi,
                    status: RegimenStatus::StoppedByToxicity,
                });
            }
        }
        events
    }

    fn tb_treatment_toxicity(patient: &mut PatientState, ctx: &mut StageContext<'_>) -> Vec<SimEvent> {
        let tx = &ctx.config.tb.treatment;
        if !patient.tb().treatment.is_active() {
            return Vec::new();
        }
        if ctx.rng.chance(site::TB_TREATMENT_TOXICITY, tx.monthly_prob_major_toxicity) {
            patient.add_death_rate_ratio(DeathCause::DrugToxicity, tx.toxicity_death_rate_ratio);
            return vec![SimEvent::TbTreatmentToxicity { month: patient.month() }];
        }
        Vec::new()
    }
}

impl Updater for DrugToxicityUpdater {
    fn name(&self) -> &'static str {
        "drug_toxicity"
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
        let mut events = Self::art_toxicity(patient, ctx)?;
        events.extend(Self::proph_toxicity(patient, ctx));
        events.extend(Self::tb_treatment_toxicity(patient, ctx));
        Ok(events)
    }
}
