//! Stage 14: ClinicVisit.
//!
//! Treatment decisions for patients in care, in this order:
//!   1. routine care cost
//!   2. ART stop rules (major toxicity, observed failure, maximum duration)
//!   3. ART continuation: periodic administrations and monthly costs
//!   4. ART start on the next line when the start policy allows
//!   5. OI prophylaxis stop, start and cost
//!
//! All decisions use observed values (CD4 test result, observed failure),
//! never the true state. The patient's clinic visit type and CD4 response
//! type are drawn once at init.

use crate::{
    config::{ArtLineConfig, Formulation, SimConfig, ToxSeverity},
    drug_efficacy_updater::periodic_efficacy,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    prob,
    rng::site,
    types::{ClinicVisitType, Gender, OiType, RegimenStatus},
    updater::{StageContext, Updater},
};

pub struct ClinicVisitUpdater;

impl ClinicVisitUpdater {
    /// Probability the patient responds to `line`, from the patient's
    /// baseline logit plus the line and covariate shifts.
    pub fn response_probability(
        patient: &PatientState,
        config: &SimConfig,
        line: &ArtLineConfig,
    ) -> SimResult<f64> {
        let het = &config.art.heterogeneity;
        let mut logit = patient.art().response_baseline_logit + line.response_logit;
        if let Some(stratum) = patient.disease().cd4_stratum {
            logit += het.cd4_logit[stratum.index()];
        }
        if patient.general().gender == Gender::Female {
            logit += het.female_logit;
        }
        if patient.has_oi_history() {
            logit += het.oi_history_logit;
        }
        logit += patient
            .general()
            .risk_factors
            .iter()
            .zip(&het.risk_factor_logit)
            .filter(|(on, _)| **on)
            .map(|(_, shift)| shift)
            .sum::<f64>();
        prob::logit_to_prob(logit)
    }

    fn stop_art(patient: &mut PatientState, events_in: &[SimEvent], config: &SimConfig) -> Option<SimEvent> {
        let line = patient.art().line?;
        let line_cfg = config.art.lines.get(line)?;
        let month = patient.month();
        let major_toxicity = events_in.iter().any(|e| {
            matches!(e, SimEvent::ArtToxicity { line: l, severity: ToxSeverity::Major, .. } if *l == line)
        });
        let status = if major_toxicity && line_cfg.stop.on_major_toxicity {
            RegimenStatus::StoppedByToxicity
        } else if patient.monitoring().observed_failure && line_cfg.stop.on_observed_failure {
            RegimenStatus::StoppedByFailure
        } else if line_cfg
            .stop
            .max_months
            .is_some_and(|max| patient.art().months_on_line(month) >= max)
        {
            RegimenStatus::StoppedByPolicy
        } else {
            return None;
        };
        patient.stop_art(status);
        log::debug!("month={month} patient={} clinic_visit: stop ART line {line} ({status:?})", patient.index());
        Some(SimEvent::ArtStopped { month, line, status })
    }

    /// Give a periodic dose now: cost, schedule the next, and reset efficacy
    /// to the start of the curve.
    fn administer(patient: &mut PatientState, config: &SimConfig, line: usize, line_cfg: &ArtLineConfig) -> Option<SimEvent> {
        let Formulation::Periodic {
            interval_months,
            administration_cost,
            ..
        } = &line_cfg.formulation
        else {
            return None;
        };
        patient.add_cost(*administration_cost, &config.run);
        patient.record_administration(*interval_months);
        if let Some((efficacy, _)) = periodic_efficacy(patient, line_cfg) {
            patient.set_art_efficacy(efficacy);
        }
        Some(SimEvent::ArtAdministered {
            month: patient.month(),
            line,
            cost: *administration_cost,
        })
    }

    fn continue_art(patient: &mut PatientState, ctx: &mut StageContext<'_>) -> Vec<SimEvent> {
        let config = ctx.config;
        let Some(line) = patient.art().line else {
            return Vec::new();
        };
        let Some(line_cfg) = config.art.lines.get(line) else {
            return Vec::new();
        };
        match line_cfg.formulation {
            Formulation::Continuous => {
                patient.add_cost(line_cfg.monthly_cost, &config.run);
                Vec::new()
            }
            Formulation::Periodic { .. } => {
                let due = patient.art().next_due.is_some_and(|d| patient.month() >= d);
                if due && ctx.rng.chance(site::ADMINISTRATION_ATTEND, config.art.prob_attend_administration) {
                    Self::administer(patient, config, line, line_cfg).into_iter().collect()
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn start_allowed(patient: &PatientState, config: &SimConfig, line_cfg: &ArtLineConfig) -> bool {
        let month = patient.month();
        let policy = &line_cfg.start;
        if month < policy.min_month {
            return false;
        }
        if let Some(stopped) = patient.art().stop_month {
            if month.saturating_sub(stopped) < policy.months_since_previous_line {
                return false;
            }
        }
        let Some(threshold) = policy.cd4_threshold else {
            return true;
        };
        let below = patient.monitoring().observed_cd4.is_some_and(|cd4| cd4 < threshold);
        below || (policy.start_on_severe_oi && patient.has_severe_oi_history(&config.nat_hist.severe_oi))
    }

    fn start_art(patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let line = patient.art().next_line();
        let Some(line_cfg) = config.art.lines.get(line) else {
            return Ok(Vec::new());
        };
        if !Self::start_allowed(patient, config, line_cfg) {
            return Ok(Vec::new());
        }
        let p = Self::response_probability(patient, config, line_cfg)?;
        let responder = ctx.rng.chance(site::ART_RESPONDER, p);
        patient.start_art(line, responder, line_cfg.toxicities.len());
        patient.add_cost(line_cfg.initial_cost, &config.run);
        let month = patient.month();
        log::debug!(
            "month={month} patient={} clinic_visit: start ART line {line} ({}) responder={responder}",
            patient.index(),
            line_cfg.name
        );

        let mut events = vec![SimEvent::ArtStarted { month, line, responder }];
        match line_cfg.formulation {
            Formulation::Continuous => {
                patient.add_cost(line_cfg.monthly_cost, &config.run);
                patient.set_art_efficacy(if responder { 1.0 } else { 0.0 });
            }
            Formulation::Periodic { .. } => {
                events.extend(Self::administer(patient, config, line, line_cfg));
            }
        }
        Ok(events)
    }

    fn manage_prophs(patient: &mut PatientState, config: &SimConfig) -> Vec<SimEvent> {
        let month = patient.month();
        let months_on_art = if patient.on_art() {
            Some(patient.art().months_on_line(month))
        } else {
            None
        };
        let observed_cd4 = patient.monitoring().observed_cd4;
        let mut events = Vec::new();

        for oi in OiType::all() {
            let i = oi.index();
            let Some(cfg) = config.proph.prophs.get(i).filter(|c| c.enabled) else {
                continue;
            };
            let status = patient.proph().status[i];
            let stop_eligible = match (cfg.stop_cd4_threshold, observed_cd4, months_on_art) {
                (Some(t), Some(cd4), Some(on)) => cd4 > t && on >= cfg.stop_min_months_on_art,
                _ => false,
            };

            if status.is_active() {
                if stop_eligible {
                    patient.stop_proph(oi, RegimenStatus::StoppedByPolicy);
                    events.push(SimEvent::ProphStopped {
                        month,
                        oi,
                        status: RegimenStatus::StoppedByPolicy,
                    });
                } else {
                    patient.add_cost(cfg.monthly_cost, &config.run);
                }
                continue;
            }
            if status == RegimenStatus::StoppedByToxicity || stop_eligible {
                continue;
            }

            let secondary = cfg.secondary_on_history && patient.disease().oi_history[i];
            let primary = match (cfg.primary_cd4_threshold, observed_cd4) {
                (Some(t), Some(cd4)) => cd4 < t,
                _ => false,
            };
            if secondary || primary {
                patient.start_proph(oi, secondary);
                patient.add_cost(cfg.monthly_cost, &config.run);
                events.push(SimEvent::ProphStarted { month, oi, secondary });
            }
        }
        events
    }
}

impl Updater for ClinicVisitUpdater {
    fn name(&self) -> &'static str {
        "clinic_visit"
    }

    fn run_init(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let het = &config.art.heterogeneity;
        let baseline = ctx
            .rng
            .draw_gaussian(site::RESPONSE_BASELINE, het.baseline_logit_mean, het.baseline_logit_sd)?;
        let context = format!("patient={}", patient.index());
        let draw = ctx.rng.draw_uniform(site::VISIT_TYPE);
        let visit = prob::select_outcome(
            "cohort.clinic_visit_type_distribution",
            &config.cohort.clinic_visit_type_distribution,
            draw,
            &context,
        )?;
        let draw = ctx.rng.draw_uniform(site::CD4_RESPONSE_TYPE);
        let response = prob::select_outcome(
            "cohort.cd4_response_type_distribution",
            &config.cohort.cd4_response_type_distribution,
            draw,
            &context,
        )?;
        patient.set_care_profile(ClinicVisitType::ALL[visit], response, baseline);
        Ok(Vec::new())
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        if !patient.is_hiv_positive() {
            patient.add_cost(config.costs.routine_care_hiv_negative, &config.run);
            return Ok(Vec::new());
        }
        if !patient.in_care() {
            return Ok(Vec::new());
        }
        if let Some(stratum) = patient.disease().cd4_stratum {
            patient.add_cost(config.costs.routine_care_hiv_positive[stratum.index()], &config.run);
        }

        let mut events = Vec::new();
        let visit = patient.monitoring().visit_type;
        if patient.on_art() {
            match Self::stop_art(patient, events_in, config) {
                Some(stopped) => events.push(stopped),
                None => events.extend(Self::continue_art(patient, ctx)),
            }
        }
        if !patient.on_art() && visit.allows_art() {
            events.extend(Self::start_art(patient, ctx)?);
        }
        if visit.allows_proph() {
            events.extend(Self::manage_prophs(patient, config));
        }
        Ok(events)
    }
}
