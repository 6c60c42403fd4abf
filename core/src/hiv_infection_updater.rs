//! Stage 2: HIVInfection.
//!
//! Serostatus at entry and new infections during the run. Adults and
//! pediatric patients follow different rules; the rule set is chosen once
//! from `PatientKind`, which BeginMonth fixes at creation. Nothing else in
//! the pipeline branches on the patient kind.

use crate::{
    config::{category_for, SimConfig},
    error::SimResult,
    event::{DetectionRoute, SimEvent},
    patient::{PatientState, VerticalTransmission},
    prob,
    rng::{site, PatientRng},
    types::{Cd4Stratum, HvlStratum, OiType, PatientKind},
    updater::{StageContext, Updater},
};

/// Infection rules for one kind of patient.
pub trait InfectionStrategy: Send + Sync {
    fn init(&self, patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>>;

    fn monthly(&self, patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>>;
}

/// Draw a set-point HVL and per-patient decline offset, then infect.
fn infect_with_draws(
    patient: &mut PatientState,
    config: &SimConfig,
    rng: &mut PatientRng,
    acute: bool,
    cd4: f64,
    at_entry: bool,
) -> SimResult<HvlStratum> {
    let draw = rng.draw_uniform(site::INFECTION_SETPOINT);
    let hvl = HvlStratum::ALL[prob::select_outcome(
        "incidence.setpoint_hvl_distribution",
        &config.incidence.setpoint_hvl_distribution,
        draw,
        &format!("patient={}", patient.index()),
    )?];
    let offset = rng.draw_gaussian(
        site::CD4_DECLINE_SUBJECT,
        0.0,
        config.nat_hist.cd4_decline_between_subject_sd,
    )?;
    patient.infect(acute, cd4, hvl, offset, at_entry, &config.run);
    Ok(hvl)
}

// ── Adult ──────────────────────────────────────────────────────────

pub struct AdultInfection;

impl AdultInfection {
    /// Monthly probability of infection for an HIV-negative adult.
    pub fn incidence_probability(patient: &PatientState, config: &SimConfig) -> SimResult<f64> {
        let inc = &config.incidence;
        if !inc.enabled {
            return Ok(0.0);
        }
        let cat = category_for(patient.age_years(), &inc.age_category_upper_bounds_years);
        let base = inc.monthly_incidence[cat][patient.general().gender.index()];
        let ratio: f64 = patient
            .general()
            .risk_factors
            .iter()
            .zip(&inc.risk_factor_rate_ratio)
            .filter(|(on, _)| **on)
            .map(|(_, &r)| r)
            .product();
        prob::rate_ratio_to_prob(base, ratio)
    }
}

impl InfectionStrategy for AdultInfection {
    fn init(&self, patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let cohort = &config.cohort;
        if !ctx.rng.chance(site::INIT_HIV_PREVALENCE, cohort.hiv_prevalence) {
            return Ok(Vec::new());
        }

        let raw = ctx.rng.draw_gaussian(site::INIT_CD4, cohort.initial_cd4_mean, cohort.initial_cd4_sd)?;
        let cd4 = if cohort.cd4_sqrt_transform {
            raw.max(0.0).powi(2)
        } else {
            raw
        };
        let stratum = Cd4Stratum::from_count(
            cd4.clamp(0.0, config.run.max_patient_cd4),
            &config.run.cd4_strata_upper_bounds,
        );
        let draw = ctx.rng.draw_uniform(site::INIT_HVL);
        let hvl = HvlStratum::ALL[prob::select_outcome(
            "cohort.initial_hvl_distribution",
            &cohort.initial_hvl_distribution[stratum.index()],
            draw,
            &format!("patient={} cd4_stratum={}", patient.index(), stratum.index()),
        )?];
        let offset = ctx.rng.draw_gaussian(
            site::CD4_DECLINE_SUBJECT,
            0.0,
            config.nat_hist.cd4_decline_between_subject_sd,
        )?;
        patient.infect(false, cd4, hvl, offset, true, &config.run);

        let mut events = vec![SimEvent::HivInfected {
            month: patient.month(),
            at_entry: true,
            cd4: patient.disease().true_cd4.unwrap_or(0.0),
            hvl,
        }];

        for oi in OiType::all() {
            let p = cohort.oi_history_at_entry[stratum.index()][oi.index()];
            if ctx.rng.chance(site::INIT_OI_HISTORY, p) {
                patient.record_oi(oi, false)?;
            }
        }

        if ctx.rng.chance(site::INIT_DETECTED, cohort.prob_detected_at_entry) {
            patient.set_detected()?;
            events.push(SimEvent::HivDetected {
                month: patient.month(),
                route: DetectionRoute::AtEntry,
            });
            if ctx.rng.chance(site::INIT_LINKED, cohort.prob_linked_at_entry) {
                patient.set_linked()?;
                events.push(SimEvent::LinkedToCare { month: patient.month() });
            }
        }
        Ok(events)
    }

    fn monthly(&self, patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        if patient.is_hiv_positive() || !config.incidence.enabled {
            return Ok(Vec::new());
        }
        let p = Self::incidence_probability(patient, config)?;
        if !ctx.rng.chance(site::HIV_INCIDENCE, p) {
            return Ok(Vec::new());
        }

        let inc = &config.incidence;
        let cd4 = ctx.rng.draw_gaussian(site::INFECTION_CD4, inc.infection_cd4_mean, inc.infection_cd4_sd)?;
        let hvl = infect_with_draws(patient, config, ctx.rng, true, cd4, false)?;
        log::debug!(
            "month={} patient={} hiv_infection: new infection cd4={:.0} setpoint={hvl:?}",
            patient.month(),
            patient.index(),
            patient.disease().true_cd4.unwrap_or(0.0)
        );
        Ok(vec![SimEvent::HivInfected {
            month: patient.month(),
            at_entry: false,
            cd4: patient.disease().true_cd4.unwrap_or(0.0),
            hvl,
        }])
    }
}

// ── Pediatric ──────────────────────────────────────────────────────

pub struct PediatricInfection;

impl PediatricInfection {
    fn infect_infant(
        patient: &mut PatientState,
        ctx: &mut StageContext<'_>,
        mode: VerticalTransmission,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let peds = &config.peds;
        let cd4 = ctx.rng.draw_gaussian(site::INFECTION_CD4, peds.infant_cd4_mean, peds.infant_cd4_sd)?;
        let at_entry = !matches!(mode, VerticalTransmission::Postpartum);
        let hvl = infect_with_draws(patient, config, ctx.rng, !at_entry, cd4, at_entry)?;
        patient.set_vertical_transmission(mode);
        log::debug!(
            "month={} patient={} hiv_infection: vertical transmission {mode:?}",
            patient.month(),
            patient.index()
        );
        Ok(vec![
            SimEvent::VerticalTransmission {
                month: patient.month(),
                mode,
            },
            SimEvent::HivInfected {
                month: patient.month(),
                at_entry,
                cd4: patient.disease().true_cd4.unwrap_or(0.0),
                hvl,
            },
        ])
    }
}

impl InfectionStrategy for PediatricInfection {
    fn init(&self, patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let peds = &config.peds;
        let mother_positive = ctx.rng.chance(site::PEDS_MATERNAL_STATUS, peds.prob_mother_hiv_positive);
        let breastfeeding = ctx.rng.chance(site::PEDS_BREASTFEEDING, peds.prob_breastfeeding)
            && patient.general().age_months < peds.breastfeeding_duration_months;
        patient.set_maternal_status(mother_positive, breastfeeding);
        if !mother_positive {
            return Ok(Vec::new());
        }

        let draw = ctx.rng.draw_uniform(site::PEDS_VERTICAL);
        let mode = prob::select_competing(
            "peds.vertical_transmission",
            &[peds.prob_in_utero, peds.prob_intrapartum],
            draw,
            &format!("patient={}", patient.index()),
        )?;
        match mode {
            Some(0) => Self::infect_infant(patient, ctx, VerticalTransmission::InUtero),
            Some(_) => Self::infect_infant(patient, ctx, VerticalTransmission::Intrapartum),
            None => Ok(Vec::new()),
        }
    }

    fn monthly(&self, patient: &mut PatientState, ctx: &mut StageContext<'_>) -> SimResult<Vec<SimEvent>> {
        if patient.is_hiv_positive() {
            return Ok(Vec::new());
        }
        let config = ctx.config;
        let peds = &config.peds;
        if patient.general().age_months >= peds.age_threshold_months {
            return AdultInfection.monthly(patient, ctx);
        }
        if !patient.peds().breastfeeding {
            return Ok(Vec::new());
        }
        if patient.general().age_months >= peds.breastfeeding_duration_months {
            patient.stop_breastfeeding();
            return Ok(Vec::new());
        }
        if patient.peds().mother_hiv_positive
            && ctx.rng.chance(site::PEDS_POSTPARTUM, peds.monthly_prob_postpartum)
        {
            return Self::infect_infant(patient, ctx, VerticalTransmission::Postpartum);
        }
        Ok(Vec::new())
    }
}

// ── Updater ────────────────────────────────────────────────────────

pub struct HivInfectionUpdater {
    adult:     AdultInfection,
    pediatric: PediatricInfection,
}

impl HivInfectionUpdater {
    pub fn new() -> Self {
        Self {
            adult:     AdultInfection,
            pediatric: PediatricInfection,
        }
    }

    fn strategy(&self, kind: PatientKind) -> &dyn InfectionStrategy {
        match kind {
            PatientKind::Adult => &self.adult,
            PatientKind::Pediatric => &self.pediatric,
        }
    }
}

impl Default for HivInfectionUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl Updater for HivInfectionUpdater {
    fn name(&self) -> &'static str {
        "hiv_infection"
    }

    fn run_init(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        self.strategy(patient.general().kind).init(patient, ctx)
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        self.strategy(patient.general().kind).monthly(patient, ctx)
    }
}
