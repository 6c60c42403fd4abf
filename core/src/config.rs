//! Simulation parameters.
//!
//! A `SimConfig` is loaded once per run, validated, and then shared
//! read-only by every worker. Nothing in the simulation mutates it.
//! Table dimensions and distributions are checked in `validate()` so that
//! configuration mistakes surface at load time with the parameter named.

use crate::{
    error::{SimError, SimResult},
    prob,
    types::{
        HvlStratum, Month, PatientIndex, AGE_YEARS_NUM, CD4_NUM_STRATA, CD4_RESPONSE_NUM_TYPES,
        CHRM_NUM, GENDER_NUM, HVL_NUM_STRATA, OI_NUM, RISK_FACT_NUM, TB_NUM_STRAINS,
    },
};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Run ────────────────────────────────────────────────────────────

fn default_workers() -> usize {
    1
}

fn default_death_month_fraction() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub run_name: String,
    pub num_patients: u64,
    pub seed: u64,
    pub discount_rate_annual: f64,
    /// Ceiling applied to every true CD4 value.
    pub max_patient_cd4: f64,
    /// Upper bounds of the first five CD4 strata.
    pub cd4_strata_upper_bounds: Vec<f64>,
    /// Patients reaching this age leave the simulation alive.
    pub max_age_months: Month,
    /// Optional cap on simulated months per patient.
    #[serde(default)]
    pub max_months: Option<Month>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Patients whose draws are forwarded to the trace observer.
    #[serde(default)]
    pub trace_patients: Vec<PatientIndex>,
    /// Life-month credit for the month of death.
    #[serde(default = "default_death_month_fraction")]
    pub death_month_life_fraction: f64,
}

impl RunConfig {
    /// Discount multiplier for costs and benefits accrued in `month`.
    pub fn discount(&self, month: Month) -> f64 {
        (1.0 + self.discount_rate_annual).powf(-(month as f64) / 12.0)
    }
}

// ── Cohort ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortConfig {
    pub initial_age_mean_months: f64,
    pub initial_age_sd_months: f64,
    pub male_probability: f64,
    /// Probability a patient is HIV-positive when created.
    pub hiv_prevalence: f64,
    pub initial_cd4_mean: f64,
    pub initial_cd4_sd: f64,
    /// Draw CD4 on the square-root scale (mean and sd are then in sqrt units).
    #[serde(default)]
    pub cd4_sqrt_transform: bool,
    /// [CD4 stratum][HVL stratum]
    pub initial_hvl_distribution: Vec<Vec<f64>>,
    /// [CD4 stratum][OI]
    pub oi_history_at_entry: Vec<Vec<f64>>,
    /// [risk factor]
    pub risk_factor_prevalence: Vec<f64>,
    /// Monthly incidence of each risk factor. [risk factor]
    pub risk_factor_incidence: Vec<f64>,
    /// [NoTreatment, ProphylaxisOnly, FullTreatment]
    pub clinic_visit_type_distribution: Vec<f64>,
    /// [CD4 response type]
    pub cd4_response_type_distribution: Vec<f64>,
    pub prob_detected_at_entry: f64,
    /// Conditional on detection at entry.
    pub prob_linked_at_entry: f64,
}

// ── HIV incidence ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidenceConfig {
    pub enabled: bool,
    pub age_category_upper_bounds_years: Vec<f64>,
    /// [age category][gender]
    pub monthly_incidence: Vec<Vec<f64>>,
    /// Rate ratio applied per active risk factor. [risk factor]
    pub risk_factor_rate_ratio: Vec<f64>,
    pub acute_duration_months: Month,
    pub infection_cd4_mean: f64,
    pub infection_cd4_sd: f64,
    /// Set-point HVL at infection. [HVL stratum]
    pub setpoint_hvl_distribution: Vec<f64>,
}

// ── Natural history ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatHistConfig {
    /// Monthly CD4 loss off ART. [CD4 stratum][HVL stratum]
    pub cd4_decline_mean: Vec<Vec<f64>>,
    pub cd4_decline_sd: Vec<Vec<f64>>,
    /// Sd of the per-patient decline offset drawn at infection.
    pub cd4_decline_between_subject_sd: f64,
    pub monthly_prob_hvl_increase: f64,
    /// Monthly background death rate. [gender][age in years]
    pub background_death_rate: Vec<Vec<f64>>,
    /// [CD4 stratum]
    pub hiv_death_rate_ratio: Vec<f64>,
    /// [CD4 stratum]
    pub acute_oi_death_rate_ratio: Vec<f64>,
    pub severe_oi_history_death_rate_ratio: f64,
    pub severe_oi_history_duration_months: Month,
    /// [risk factor]
    pub risk_factor_death_rate_ratio: Vec<f64>,
    /// Monthly OI probability for patients without history. [CD4][OI]
    pub oi_prob_no_history: Vec<Vec<f64>>,
    /// Monthly OI probability for patients with history. [CD4][OI]
    pub oi_prob_with_history: Vec<Vec<f64>>,
    /// Rate ratio on OI risk while ART is active. [CD4 stratum]
    pub oi_on_art_multiplier: Vec<f64>,
    /// [OI]
    pub severe_oi: Vec<bool>,
}

// ── Chronic conditions ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronicConditionConfig {
    pub name: String,
    /// [gender][age category]
    pub prevalence_hiv_negative: Vec<Vec<f64>>,
    /// [CD4][gender][age category]
    pub prevalence_hiv_positive: Vec<Vec<Vec<f64>>>,
    /// [gender][age category]
    pub incidence_hiv_negative: Vec<Vec<f64>>,
    /// [CD4][gender][age category]
    pub incidence_hiv_positive: Vec<Vec<Vec<f64>>>,
    pub on_art_incidence_multiplier: f64,
    /// [risk factor]
    pub risk_factor_logit: Vec<f64>,
    pub death_rate_ratio: f64,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronicConfig {
    pub age_category_upper_bounds_years: Vec<f64>,
    pub conditions: Vec<ChronicConditionConfig>,
}

// ── ART ────────────────────────────────────────────────────────────

/// Efficacy of a periodic regimen as a function of months since the last
/// administration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum EfficacyCurve {
    /// Efficacy per month since administration; the last value is held.
    Stepped { by_month: Vec<f64> },
    /// Linear from `initial` at administration to `at_interval` at the due
    /// month, held through the grace window.
    Linear { initial: f64, at_interval: f64 },
}

impl EfficacyCurve {
    pub fn efficacy(&self, months_since: Month, interval: Month) -> f64 {
        match self {
            Self::Stepped { by_month } => by_month
                .get(months_since as usize)
                .or_else(|| by_month.last())
                .copied()
                .unwrap_or(0.0),
            Self::Linear { initial, at_interval } => {
                if interval == 0 {
                    return *initial;
                }
                let t = (months_since.min(interval) as f64) / interval as f64;
                initial + (at_interval - initial) * t
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formulation {
    /// Cost and efficacy apply every month while active.
    Continuous,
    /// Administered at a fixed interval; cost only in administration months.
    Periodic {
        interval_months: Month,
        grace_months: Month,
        administration_cost: f64,
        efficacy_curve: EfficacyCurve,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToxSeverity {
    Minor,
    Major,
    Chronic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToxicityConfig {
    pub name: String,
    pub severity: ToxSeverity,
    /// Probability the toxicity occurs once the onset month is reached.
    pub probability: f64,
    pub onset_month: Month,
    pub cost: f64,
    pub death_rate_ratio: f64,
    pub qol_modifier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtStartPolicy {
    /// Start when the last observed CD4 is below this. `None` starts
    /// regardless of CD4.
    pub cd4_threshold: Option<f64>,
    /// Start on any severe OI history even above the CD4 threshold.
    pub start_on_severe_oi: bool,
    pub min_month: Month,
    pub months_since_previous_line: Month,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtStopPolicy {
    pub on_major_toxicity: bool,
    pub on_observed_failure: bool,
    pub max_months: Option<Month>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedFailureRule {
    /// An observed HVL at or above this stratum counts as failure.
    pub hvl_threshold: HvlStratum,
    pub min_months_on_art: Month,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtLineConfig {
    pub name: String,
    pub formulation: Formulation,
    pub initial_cost: f64,
    /// Continuous regimens only.
    pub monthly_cost: f64,
    pub response_logit: f64,
    pub months_to_suppression: Month,
    pub nonresponder_failure_month: Month,
    pub monthly_prob_late_failure: f64,
    /// Monthly CD4 gain while suppressed. [response type][period]
    pub cd4_gain_mean: Vec<Vec<f64>>,
    pub cd4_gain_sd: Vec<Vec<f64>>,
    /// Months on ART separating the gain periods (two bounds, three periods).
    pub cd4_gain_period_bounds: Vec<Month>,
    /// Multiplier on natural-history decline while ART has failed.
    pub failed_cd4_decline_multiplier: f64,
    pub toxicities: Vec<ToxicityConfig>,
    pub start: ArtStartPolicy,
    pub stop: ArtStopPolicy,
    pub failure: ObservedFailureRule,
}

impl ArtLineConfig {
    pub fn gain_period(&self, months_on_art: Month) -> usize {
        self.cd4_gain_period_bounds
            .iter()
            .position(|&b| months_on_art < b)
            .unwrap_or(self.cd4_gain_period_bounds.len())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHeterogeneity {
    pub baseline_logit_mean: f64,
    pub baseline_logit_sd: f64,
    /// [CD4 stratum]
    pub cd4_logit: Vec<f64>,
    pub female_logit: f64,
    pub oi_history_logit: f64,
    /// [risk factor]
    pub risk_factor_logit: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtConfig {
    pub lines: Vec<ArtLineConfig>,
    /// Applied to mortality while ART is active.
    pub death_rate_ratio: f64,
    pub heterogeneity: ResponseHeterogeneity,
    /// Probability a patient attends a due periodic administration.
    pub prob_attend_administration: f64,
}

// ── OI prophylaxis ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OiProphConfig {
    pub enabled: bool,
    /// Primary prophylaxis starts when observed CD4 falls below this.
    pub primary_cd4_threshold: Option<f64>,
    /// Secondary prophylaxis starts after the OI has occurred.
    pub secondary_on_history: bool,
    /// Stop when observed CD4 is above this after enough months on ART.
    pub stop_cd4_threshold: Option<f64>,
    pub stop_min_months_on_art: Month,
    pub primary_efficacy: f64,
    pub secondary_efficacy: f64,
    pub monthly_cost: f64,
    pub monthly_prob_major_toxicity: f64,
    pub toxicity_death_rate_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProphConfig {
    /// [OI]
    pub prophs: Vec<OiProphConfig>,
}

// ── TB ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TbTreatmentConfig {
    pub duration_months: Month,
    pub initial_cost: f64,
    pub monthly_cost: f64,
    /// [strain]
    pub prob_success_hiv_negative: Vec<f64>,
    /// [strain][CD4 stratum]
    pub prob_success_hiv_positive: Vec<Vec<f64>>,
    pub monthly_prob_default: f64,
    pub monthly_prob_major_toxicity: f64,
    pub toxicity_death_rate_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TbProphConfig {
    pub enabled: bool,
    pub monthly_prob_start: f64,
    pub duration_months: Month,
    pub activation_efficacy: f64,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TbConfig {
    pub enabled: bool,
    /// [TB state] in `TbState` declaration order.
    pub initial_state_hiv_negative: Vec<f64>,
    pub initial_state_hiv_positive: Vec<f64>,
    /// [strain]
    pub strain_distribution: Vec<f64>,
    pub monthly_prob_infection: f64,
    pub monthly_prob_activation_hiv_negative: f64,
    /// [CD4 stratum]
    pub monthly_prob_activation_hiv_positive: Vec<f64>,
    pub prob_pulmonary: f64,
    pub monthly_prob_self_cure: f64,
    pub death_rate_ratio_hiv_negative: f64,
    /// [CD4 stratum]
    pub death_rate_ratio_hiv_positive: Vec<f64>,
    pub monthly_prob_diagnosis: f64,
    pub treatment: TbTreatmentConfig,
    pub proph: TbProphConfig,
}

// ── HIV testing, LTFU, monitoring ──────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HivTestConfig {
    pub enabled: bool,
    pub age_category_upper_bounds_years: Vec<f64>,
    /// [age category]
    pub monthly_prob_offer: Vec<f64>,
    pub prob_accept: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub test_cost: f64,
    pub prob_return_for_result: f64,
    pub prob_link_at_detection: f64,
    /// Monthly linkage for detected patients not yet linked.
    pub monthly_prob_link: f64,
    /// Probability an acute OI leads to HIV detection.
    pub prob_oi_detection: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtfuConfig {
    pub enabled: bool,
    pub monthly_prob_ltfu: f64,
    pub response_logit_mean: f64,
    pub response_logit_sd: f64,
    pub monthly_prob_return: f64,
    pub prob_return_on_severe_oi: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub cd4_test_interval_pre_art: Option<Month>,
    pub cd4_test_interval_on_art: Option<Month>,
    pub hvl_test_interval_pre_art: Option<Month>,
    pub hvl_test_interval_on_art: Option<Month>,
    /// Sd of the multiplicative CD4 measurement error.
    pub cd4_test_sd_fraction: f64,
    pub prob_hvl_test_higher: f64,
    pub prob_hvl_test_lower: f64,
    pub cd4_test_cost: f64,
    pub hvl_test_cost: f64,
}

// ── Costs and quality of life ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    /// Monthly routine care for linked HIV-positive patients. [CD4 stratum]
    pub routine_care_hiv_positive: Vec<f64>,
    pub routine_care_hiv_negative: f64,
    /// [OI]
    pub acute_oi_detected: Vec<f64>,
    /// [OI]
    pub acute_oi_undetected: Vec<f64>,
    pub death_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QolConfig {
    pub hiv_negative: f64,
    /// [CD4 stratum]
    pub hiv_positive_off_art: Vec<f64>,
    /// [CD4 stratum]
    pub hiv_positive_on_art: Vec<f64>,
    /// [OI]
    pub acute_oi_modifier: Vec<f64>,
}

// ── Pediatrics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedsConfig {
    pub enabled: bool,
    /// Patients created younger than this follow the pediatric rules.
    pub age_threshold_months: Month,
    pub prob_mother_hiv_positive: f64,
    pub prob_breastfeeding: f64,
    pub breastfeeding_duration_months: Month,
    pub prob_in_utero: f64,
    pub prob_intrapartum: f64,
    pub monthly_prob_postpartum: f64,
    pub infant_cd4_mean: f64,
    pub infant_cd4_sd: f64,
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub run: RunConfig,
    pub cohort: CohortConfig,
    pub incidence: IncidenceConfig,
    pub nat_hist: NatHistConfig,
    pub chronic: ChronicConfig,
    pub art: ArtConfig,
    pub proph: ProphConfig,
    pub tb: TbConfig,
    pub hiv_test: HivTestConfig,
    pub ltfu: LtfuConfig,
    pub monitoring: MonitoringConfig,
    pub costs: CostConfig,
    pub qol: QolConfig,
    pub peds: PedsConfig,
}

/// Index of the category whose upper bound first exceeds `value`.
pub fn category_for(value: f64, upper_bounds: &[f64]) -> usize {
    upper_bounds
        .iter()
        .position(|&b| value < b)
        .unwrap_or(upper_bounds.len())
}

impl SimConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config = Self::from_json_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check dimensions, probability ranges and distributions.
    pub fn validate(&self) -> SimResult<()> {
        let run = &self.run;
        check_len("run.cd4_strata_upper_bounds", run.cd4_strata_upper_bounds.len(), CD4_NUM_STRATA - 1)?;
        if run
            .cd4_strata_upper_bounds
            .windows(2)
            .any(|w| w[0] >= w[1])
        {
            return Err(SimError::config(
                "run.cd4_strata_upper_bounds",
                "bounds must be strictly increasing",
            ));
        }
        check_non_negative("run.discount_rate_annual", run.discount_rate_annual)?;
        if !(run.max_patient_cd4 > 0.0) {
            return Err(SimError::config("run.max_patient_cd4", "must be positive"));
        }
        if run.workers == 0 {
            return Err(SimError::config("run.workers", "must be at least 1"));
        }
        check_prob("run.death_month_life_fraction", run.death_month_life_fraction)?;

        let c = &self.cohort;
        check_non_negative("cohort.initial_age_sd_months", c.initial_age_sd_months)?;
        check_non_negative("cohort.initial_cd4_sd", c.initial_cd4_sd)?;
        check_prob("cohort.male_probability", c.male_probability)?;
        check_prob("cohort.hiv_prevalence", c.hiv_prevalence)?;
        check_prob("cohort.prob_detected_at_entry", c.prob_detected_at_entry)?;
        check_prob("cohort.prob_linked_at_entry", c.prob_linked_at_entry)?;
        check_matrix("cohort.initial_hvl_distribution", &c.initial_hvl_distribution, CD4_NUM_STRATA, HVL_NUM_STRATA)?;
        for (i, row) in c.initial_hvl_distribution.iter().enumerate() {
            prob::check_distribution("cohort.initial_hvl_distribution", row, &format!("cd4 stratum {i}"))?;
        }
        check_matrix("cohort.oi_history_at_entry", &c.oi_history_at_entry, CD4_NUM_STRATA, OI_NUM)?;
        check_prob_matrix("cohort.oi_history_at_entry", &c.oi_history_at_entry)?;
        check_probs("cohort.risk_factor_prevalence", &c.risk_factor_prevalence, RISK_FACT_NUM)?;
        check_probs("cohort.risk_factor_incidence", &c.risk_factor_incidence, RISK_FACT_NUM)?;
        check_len("cohort.clinic_visit_type_distribution", c.clinic_visit_type_distribution.len(), 3)?;
        prob::check_distribution("cohort.clinic_visit_type_distribution", &c.clinic_visit_type_distribution, "cohort")?;
        check_len("cohort.cd4_response_type_distribution", c.cd4_response_type_distribution.len(), CD4_RESPONSE_NUM_TYPES)?;
        prob::check_distribution("cohort.cd4_response_type_distribution", &c.cd4_response_type_distribution, "cohort")?;

        let inc = &self.incidence;
        let age_cats = inc.age_category_upper_bounds_years.len() + 1;
        check_matrix("incidence.monthly_incidence", &inc.monthly_incidence, age_cats, GENDER_NUM)?;
        check_prob_matrix("incidence.monthly_incidence", &inc.monthly_incidence)?;
        check_len("incidence.risk_factor_rate_ratio", inc.risk_factor_rate_ratio.len(), RISK_FACT_NUM)?;
        for &r in &inc.risk_factor_rate_ratio {
            check_non_negative("incidence.risk_factor_rate_ratio", r)?;
        }
        check_non_negative("incidence.infection_cd4_sd", inc.infection_cd4_sd)?;
        check_len("incidence.setpoint_hvl_distribution", inc.setpoint_hvl_distribution.len(), HVL_NUM_STRATA)?;
        prob::check_distribution("incidence.setpoint_hvl_distribution", &inc.setpoint_hvl_distribution, "incidence")?;

        let nh = &self.nat_hist;
        check_matrix("nat_hist.cd4_decline_mean", &nh.cd4_decline_mean, CD4_NUM_STRATA, HVL_NUM_STRATA)?;
        check_matrix("nat_hist.cd4_decline_sd", &nh.cd4_decline_sd, CD4_NUM_STRATA, HVL_NUM_STRATA)?;
        for row in &nh.cd4_decline_sd {
            for &sd in row {
                check_non_negative("nat_hist.cd4_decline_sd", sd)?;
            }
        }
        check_non_negative("nat_hist.cd4_decline_between_subject_sd", nh.cd4_decline_between_subject_sd)?;
        check_prob("nat_hist.monthly_prob_hvl_increase", nh.monthly_prob_hvl_increase)?;
        check_matrix("nat_hist.background_death_rate", &nh.background_death_rate, GENDER_NUM, AGE_YEARS_NUM)?;
        for row in &nh.background_death_rate {
            for &r in row {
                check_non_negative("nat_hist.background_death_rate", r)?;
            }
        }
        check_ratios("nat_hist.hiv_death_rate_ratio", &nh.hiv_death_rate_ratio, CD4_NUM_STRATA)?;
        check_ratios("nat_hist.acute_oi_death_rate_ratio", &nh.acute_oi_death_rate_ratio, CD4_NUM_STRATA)?;
        check_non_negative("nat_hist.severe_oi_history_death_rate_ratio", nh.severe_oi_history_death_rate_ratio)?;
        check_ratios("nat_hist.risk_factor_death_rate_ratio", &nh.risk_factor_death_rate_ratio, RISK_FACT_NUM)?;
        check_matrix("nat_hist.oi_prob_no_history", &nh.oi_prob_no_history, CD4_NUM_STRATA, OI_NUM)?;
        check_prob_matrix("nat_hist.oi_prob_no_history", &nh.oi_prob_no_history)?;
        check_matrix("nat_hist.oi_prob_with_history", &nh.oi_prob_with_history, CD4_NUM_STRATA, OI_NUM)?;
        check_prob_matrix("nat_hist.oi_prob_with_history", &nh.oi_prob_with_history)?;
        check_ratios("nat_hist.oi_on_art_multiplier", &nh.oi_on_art_multiplier, CD4_NUM_STRATA)?;
        check_len("nat_hist.severe_oi", nh.severe_oi.len(), OI_NUM)?;

        let ch = &self.chronic;
        check_len("chronic.conditions", ch.conditions.len(), CHRM_NUM)?;
        let chrm_cats = ch.age_category_upper_bounds_years.len() + 1;
        for (i, cond) in ch.conditions.iter().enumerate() {
            let name = |field: &str| format!("chronic.conditions[{i}].{field}");
            check_matrix(&name("prevalence_hiv_negative"), &cond.prevalence_hiv_negative, GENDER_NUM, chrm_cats)?;
            check_prob_matrix(&name("prevalence_hiv_negative"), &cond.prevalence_hiv_negative)?;
            check_matrix(&name("incidence_hiv_negative"), &cond.incidence_hiv_negative, GENDER_NUM, chrm_cats)?;
            check_prob_matrix(&name("incidence_hiv_negative"), &cond.incidence_hiv_negative)?;
            check_len(&name("prevalence_hiv_positive"), cond.prevalence_hiv_positive.len(), CD4_NUM_STRATA)?;
            check_len(&name("incidence_hiv_positive"), cond.incidence_hiv_positive.len(), CD4_NUM_STRATA)?;
            for s in 0..CD4_NUM_STRATA {
                check_matrix(&name("prevalence_hiv_positive"), &cond.prevalence_hiv_positive[s], GENDER_NUM, chrm_cats)?;
                check_prob_matrix(&name("prevalence_hiv_positive"), &cond.prevalence_hiv_positive[s])?;
                check_matrix(&name("incidence_hiv_positive"), &cond.incidence_hiv_positive[s], GENDER_NUM, chrm_cats)?;
                check_prob_matrix(&name("incidence_hiv_positive"), &cond.incidence_hiv_positive[s])?;
            }
            check_non_negative(&name("on_art_incidence_multiplier"), cond.on_art_incidence_multiplier)?;
            check_len(&name("risk_factor_logit"), cond.risk_factor_logit.len(), RISK_FACT_NUM)?;
            check_non_negative(&name("death_rate_ratio"), cond.death_rate_ratio)?;
        }

        let art = &self.art;
        check_non_negative("art.death_rate_ratio", art.death_rate_ratio)?;
        check_prob("art.prob_attend_administration", art.prob_attend_administration)?;
        let het = &art.heterogeneity;
        check_non_negative("art.heterogeneity.baseline_logit_sd", het.baseline_logit_sd)?;
        check_len("art.heterogeneity.cd4_logit", het.cd4_logit.len(), CD4_NUM_STRATA)?;
        check_len("art.heterogeneity.risk_factor_logit", het.risk_factor_logit.len(), RISK_FACT_NUM)?;
        for (i, line) in art.lines.iter().enumerate() {
            let name = |field: &str| format!("art.lines[{i}].{field}");
            if let Formulation::Periodic {
                interval_months,
                efficacy_curve,
                ..
            } = &line.formulation
            {
                if *interval_months == 0 {
                    return Err(SimError::config(name("formulation.interval_months"), "must be at least 1"));
                }
                let values: Vec<f64> = match efficacy_curve {
                    EfficacyCurve::Stepped { by_month } => {
                        if by_month.is_empty() {
                            return Err(SimError::config(name("formulation.efficacy_curve"), "empty curve"));
                        }
                        by_month.clone()
                    }
                    EfficacyCurve::Linear { initial, at_interval } => vec![*initial, *at_interval],
                };
                for v in values {
                    check_prob(&name("formulation.efficacy_curve"), v)?;
                }
            }
            check_prob(&name("monthly_prob_late_failure"), line.monthly_prob_late_failure)?;
            check_len(&name("cd4_gain_period_bounds"), line.cd4_gain_period_bounds.len(), 2)?;
            check_matrix(&name("cd4_gain_mean"), &line.cd4_gain_mean, CD4_RESPONSE_NUM_TYPES, 3)?;
            check_matrix(&name("cd4_gain_sd"), &line.cd4_gain_sd, CD4_RESPONSE_NUM_TYPES, 3)?;
            for row in &line.cd4_gain_sd {
                for &sd in row {
                    check_non_negative(&name("cd4_gain_sd"), sd)?;
                }
            }
            check_non_negative(&name("failed_cd4_decline_multiplier"), line.failed_cd4_decline_multiplier)?;
            for (t, tox) in line.toxicities.iter().enumerate() {
                check_prob(&format!("art.lines[{i}].toxicities[{t}].probability"), tox.probability)?;
                check_non_negative(&format!("art.lines[{i}].toxicities[{t}].death_rate_ratio"), tox.death_rate_ratio)?;
                check_prob(&format!("art.lines[{i}].toxicities[{t}].qol_modifier"), tox.qol_modifier)?;
            }
        }

        check_len("proph.prophs", self.proph.prophs.len(), OI_NUM)?;
        for (i, p) in self.proph.prophs.iter().enumerate() {
            let name = |field: &str| format!("proph.prophs[{i}].{field}");
            check_prob(&name("primary_efficacy"), p.primary_efficacy)?;
            check_prob(&name("secondary_efficacy"), p.secondary_efficacy)?;
            check_prob(&name("monthly_prob_major_toxicity"), p.monthly_prob_major_toxicity)?;
            check_non_negative(&name("toxicity_death_rate_ratio"), p.toxicity_death_rate_ratio)?;
        }

        let tb = &self.tb;
        check_len("tb.initial_state_hiv_negative", tb.initial_state_hiv_negative.len(), 6)?;
        prob::check_distribution("tb.initial_state_hiv_negative", &tb.initial_state_hiv_negative, "tb")?;
        check_len("tb.initial_state_hiv_positive", tb.initial_state_hiv_positive.len(), 6)?;
        prob::check_distribution("tb.initial_state_hiv_positive", &tb.initial_state_hiv_positive, "tb")?;
        check_len("tb.strain_distribution", tb.strain_distribution.len(), TB_NUM_STRAINS)?;
        prob::check_distribution("tb.strain_distribution", &tb.strain_distribution, "tb")?;
        check_prob("tb.monthly_prob_infection", tb.monthly_prob_infection)?;
        check_prob("tb.monthly_prob_activation_hiv_negative", tb.monthly_prob_activation_hiv_negative)?;
        check_probs("tb.monthly_prob_activation_hiv_positive", &tb.monthly_prob_activation_hiv_positive, CD4_NUM_STRATA)?;
        check_prob("tb.prob_pulmonary", tb.prob_pulmonary)?;
        check_prob("tb.monthly_prob_self_cure", tb.monthly_prob_self_cure)?;
        check_non_negative("tb.death_rate_ratio_hiv_negative", tb.death_rate_ratio_hiv_negative)?;
        check_ratios("tb.death_rate_ratio_hiv_positive", &tb.death_rate_ratio_hiv_positive, CD4_NUM_STRATA)?;
        check_prob("tb.monthly_prob_diagnosis", tb.monthly_prob_diagnosis)?;
        let tx = &tb.treatment;
        check_probs("tb.treatment.prob_success_hiv_negative", &tx.prob_success_hiv_negative, TB_NUM_STRAINS)?;
        check_matrix("tb.treatment.prob_success_hiv_positive", &tx.prob_success_hiv_positive, TB_NUM_STRAINS, CD4_NUM_STRATA)?;
        check_prob_matrix("tb.treatment.prob_success_hiv_positive", &tx.prob_success_hiv_positive)?;
        check_prob("tb.treatment.monthly_prob_default", tx.monthly_prob_default)?;
        check_prob("tb.treatment.monthly_prob_major_toxicity", tx.monthly_prob_major_toxicity)?;
        check_non_negative("tb.treatment.toxicity_death_rate_ratio", tx.toxicity_death_rate_ratio)?;
        check_prob("tb.proph.monthly_prob_start", tb.proph.monthly_prob_start)?;
        check_prob("tb.proph.activation_efficacy", tb.proph.activation_efficacy)?;

        let ht = &self.hiv_test;
        let test_cats = ht.age_category_upper_bounds_years.len() + 1;
        check_probs("hiv_test.monthly_prob_offer", &ht.monthly_prob_offer, test_cats)?;
        for (name, p) in [
            ("hiv_test.prob_accept", ht.prob_accept),
            ("hiv_test.sensitivity", ht.sensitivity),
            ("hiv_test.specificity", ht.specificity),
            ("hiv_test.prob_return_for_result", ht.prob_return_for_result),
            ("hiv_test.prob_link_at_detection", ht.prob_link_at_detection),
            ("hiv_test.monthly_prob_link", ht.monthly_prob_link),
            ("hiv_test.prob_oi_detection", ht.prob_oi_detection),
        ] {
            check_prob(name, p)?;
        }

        let lt = &self.ltfu;
        check_prob("ltfu.monthly_prob_ltfu", lt.monthly_prob_ltfu)?;
        check_non_negative("ltfu.response_logit_sd", lt.response_logit_sd)?;
        check_prob("ltfu.monthly_prob_return", lt.monthly_prob_return)?;
        check_prob("ltfu.prob_return_on_severe_oi", lt.prob_return_on_severe_oi)?;

        let mon = &self.monitoring;
        for (name, interval) in [
            ("monitoring.cd4_test_interval_pre_art", mon.cd4_test_interval_pre_art),
            ("monitoring.cd4_test_interval_on_art", mon.cd4_test_interval_on_art),
            ("monitoring.hvl_test_interval_pre_art", mon.hvl_test_interval_pre_art),
            ("monitoring.hvl_test_interval_on_art", mon.hvl_test_interval_on_art),
        ] {
            if interval == Some(0) {
                return Err(SimError::config(name, "interval must be at least 1 month"));
            }
        }
        check_non_negative("monitoring.cd4_test_sd_fraction", mon.cd4_test_sd_fraction)?;
        check_prob("monitoring.prob_hvl_test_higher", mon.prob_hvl_test_higher)?;
        check_prob("monitoring.prob_hvl_test_lower", mon.prob_hvl_test_lower)?;
        if mon.prob_hvl_test_higher + mon.prob_hvl_test_lower > 1.0 {
            return Err(SimError::config(
                "monitoring.prob_hvl_test_higher",
                "higher and lower error probabilities exceed 1 together",
            ));
        }

        check_len("costs.routine_care_hiv_positive", self.costs.routine_care_hiv_positive.len(), CD4_NUM_STRATA)?;
        check_len("costs.acute_oi_detected", self.costs.acute_oi_detected.len(), OI_NUM)?;
        check_len("costs.acute_oi_undetected", self.costs.acute_oi_undetected.len(), OI_NUM)?;

        check_prob("qol.hiv_negative", self.qol.hiv_negative)?;
        check_probs("qol.hiv_positive_off_art", &self.qol.hiv_positive_off_art, CD4_NUM_STRATA)?;
        check_probs("qol.hiv_positive_on_art", &self.qol.hiv_positive_on_art, CD4_NUM_STRATA)?;
        check_probs("qol.acute_oi_modifier", &self.qol.acute_oi_modifier, OI_NUM)?;

        let peds = &self.peds;
        for (name, p) in [
            ("peds.prob_mother_hiv_positive", peds.prob_mother_hiv_positive),
            ("peds.prob_breastfeeding", peds.prob_breastfeeding),
            ("peds.prob_in_utero", peds.prob_in_utero),
            ("peds.prob_intrapartum", peds.prob_intrapartum),
            ("peds.monthly_prob_postpartum", peds.monthly_prob_postpartum),
        ] {
            check_prob(name, p)?;
        }
        if peds.prob_in_utero + peds.prob_intrapartum > 1.0 {
            return Err(SimError::config(
                "peds.prob_in_utero",
                "in-utero and intrapartum probabilities exceed 1 together",
            ));
        }
        check_non_negative("peds.infant_cd4_sd", peds.infant_cd4_sd)?;

        Ok(())
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        let cd4_bounds = vec![50.0, 100.0, 200.0, 350.0, 500.0];

        let oi_base = [0.010, 0.006, 0.003, 0.0015, 0.0008, 0.0004];
        let oi_prob_no_history: Vec<Vec<f64>> =
            oi_base.iter().map(|&p| vec![p; OI_NUM]).collect();
        let oi_prob_with_history: Vec<Vec<f64>> =
            oi_base.iter().map(|&p| vec![p * 2.0; OI_NUM]).collect();

        let background_death_rate: Vec<Vec<f64>> = [1.2, 1.0]
            .iter()
            .map(|&gender_mult| {
                (0..AGE_YEARS_NUM)
                    .map(|age| (0.000_05 * (0.085 * age as f64).exp() * gender_mult).min(0.5))
                    .collect()
            })
            .collect();

        let cd4_decline_mean: Vec<Vec<f64>> = (0..CD4_NUM_STRATA)
            .map(|_| (0..HVL_NUM_STRATA).map(|h| 2.0 + h as f64 * 1.5).collect())
            .collect();
        let cd4_decline_sd = vec![vec![1.0; HVL_NUM_STRATA]; CD4_NUM_STRATA];

        let chrm_cats = 7;
        let conditions = (0..CHRM_NUM)
            .map(|i| ChronicConditionConfig {
                name: format!("chrm_{}", i + 1),
                prevalence_hiv_negative: vec![vec![0.02; chrm_cats]; GENDER_NUM],
                prevalence_hiv_positive: vec![vec![vec![0.03; chrm_cats]; GENDER_NUM]; CD4_NUM_STRATA],
                incidence_hiv_negative: vec![vec![0.0005; chrm_cats]; GENDER_NUM],
                incidence_hiv_positive: vec![vec![vec![0.0008; chrm_cats]; GENDER_NUM]; CD4_NUM_STRATA],
                on_art_incidence_multiplier: 0.9,
                risk_factor_logit: vec![0.0; RISK_FACT_NUM],
                death_rate_ratio: 1.3,
                monthly_cost: 50.0,
            })
            .collect();

        let art_line = |name: &str, monthly_cost: f64| ArtLineConfig {
            name: name.into(),
            formulation: Formulation::Continuous,
            initial_cost: 0.0,
            monthly_cost,
            response_logit: 0.0,
            months_to_suppression: 6,
            nonresponder_failure_month: 9,
            monthly_prob_late_failure: 0.002,
            cd4_gain_mean: vec![
                vec![25.0, 10.0, 4.0],
                vec![18.0, 7.0, 3.0],
                vec![10.0, 4.0, 1.0],
                vec![0.0, 0.0, 0.0],
            ],
            cd4_gain_sd: vec![vec![5.0, 3.0, 1.0]; CD4_RESPONSE_NUM_TYPES],
            cd4_gain_period_bounds: vec![6, 24],
            failed_cd4_decline_multiplier: 1.0,
            toxicities: vec![
                ToxicityConfig {
                    name: "nausea".into(),
                    severity: ToxSeverity::Minor,
                    probability: 0.05,
                    onset_month: 1,
                    cost: 100.0,
                    death_rate_ratio: 1.0,
                    qol_modifier: 0.95,
                },
                ToxicityConfig {
                    name: "hepatotoxicity".into(),
                    severity: ToxSeverity::Major,
                    probability: 0.01,
                    onset_month: 3,
                    cost: 1500.0,
                    death_rate_ratio: 1.2,
                    qol_modifier: 0.8,
                },
            ],
            start: ArtStartPolicy {
                cd4_threshold: None,
                start_on_severe_oi: true,
                min_month: 0,
                months_since_previous_line: 0,
            },
            stop: ArtStopPolicy {
                on_major_toxicity: true,
                on_observed_failure: true,
                max_months: None,
            },
            failure: ObservedFailureRule {
                hvl_threshold: HvlStratum::Medium,
                min_months_on_art: 6,
            },
        };

        let proph = |enabled: bool| OiProphConfig {
            enabled,
            primary_cd4_threshold: Some(200.0),
            secondary_on_history: true,
            stop_cd4_threshold: Some(200.0),
            stop_min_months_on_art: 3,
            primary_efficacy: 0.8,
            secondary_efficacy: 0.7,
            monthly_cost: 10.0,
            monthly_prob_major_toxicity: 0.001,
            toxicity_death_rate_ratio: 1.0,
        };

        Self {
            run: RunConfig {
                run_name: "test".into(),
                num_patients: 100,
                seed: 42,
                discount_rate_annual: 0.03,
                max_patient_cd4: 2000.0,
                cd4_strata_upper_bounds: cd4_bounds,
                max_age_months: 1212,
                max_months: Some(120),
                workers: 1,
                trace_patients: Vec::new(),
                death_month_life_fraction: 0.5,
            },
            cohort: CohortConfig {
                initial_age_mean_months: 360.0,
                initial_age_sd_months: 120.0,
                male_probability: 0.5,
                hiv_prevalence: 0.3,
                initial_cd4_mean: 500.0,
                initial_cd4_sd: 200.0,
                cd4_sqrt_transform: false,
                initial_hvl_distribution: vec![
                    vec![0.05, 0.10, 0.15, 0.20, 0.20, 0.15, 0.15];
                    CD4_NUM_STRATA
                ],
                oi_history_at_entry: vec![vec![0.01; OI_NUM]; CD4_NUM_STRATA],
                risk_factor_prevalence: vec![0.1; RISK_FACT_NUM],
                risk_factor_incidence: vec![0.0005; RISK_FACT_NUM],
                clinic_visit_type_distribution: vec![0.0, 0.1, 0.9],
                cd4_response_type_distribution: vec![0.25; CD4_RESPONSE_NUM_TYPES],
                prob_detected_at_entry: 0.5,
                prob_linked_at_entry: 0.8,
            },
            incidence: IncidenceConfig {
                enabled: true,
                age_category_upper_bounds_years: vec![20.0, 30.0, 40.0, 50.0, 60.0],
                monthly_incidence: vec![vec![0.001; GENDER_NUM]; 6],
                risk_factor_rate_ratio: vec![2.0; RISK_FACT_NUM],
                acute_duration_months: 2,
                infection_cd4_mean: 650.0,
                infection_cd4_sd: 100.0,
                setpoint_hvl_distribution: vec![0.0, 0.05, 0.15, 0.25, 0.25, 0.20, 0.10],
            },
            nat_hist: NatHistConfig {
                cd4_decline_mean,
                cd4_decline_sd,
                cd4_decline_between_subject_sd: 0.5,
                monthly_prob_hvl_increase: 0.01,
                background_death_rate,
                hiv_death_rate_ratio: vec![8.0, 5.0, 3.0, 1.8, 1.3, 1.1],
                acute_oi_death_rate_ratio: vec![4.0, 3.0, 2.0, 1.5, 1.2, 1.1],
                severe_oi_history_death_rate_ratio: 1.5,
                severe_oi_history_duration_months: 12,
                risk_factor_death_rate_ratio: vec![1.2; RISK_FACT_NUM],
                oi_prob_no_history,
                oi_prob_with_history,
                oi_on_art_multiplier: vec![0.5; CD4_NUM_STRATA],
                severe_oi: (0..OI_NUM).map(|i| i < 5).collect(),
            },
            chronic: ChronicConfig {
                age_category_upper_bounds_years: vec![30.0, 40.0, 50.0, 60.0, 70.0, 80.0],
                conditions,
            },
            art: ArtConfig {
                lines: vec![
                    art_line("first_line", 1000.0),
                    art_line("second_line", 1500.0),
                    art_line("third_line", 2000.0),
                ],
                death_rate_ratio: 0.9,
                heterogeneity: ResponseHeterogeneity {
                    baseline_logit_mean: 1.5,
                    baseline_logit_sd: 0.5,
                    cd4_logit: vec![0.0; CD4_NUM_STRATA],
                    female_logit: 0.0,
                    oi_history_logit: -0.2,
                    risk_factor_logit: vec![0.0; RISK_FACT_NUM],
                },
                prob_attend_administration: 0.95,
            },
            proph: ProphConfig {
                prophs: (0..OI_NUM).map(|i| proph(i < 3)).collect(),
            },
            tb: TbConfig {
                enabled: true,
                initial_state_hiv_negative: vec![0.75, 0.20, 0.02, 0.01, 0.02, 0.0],
                initial_state_hiv_positive: vec![0.65, 0.25, 0.04, 0.02, 0.04, 0.0],
                strain_distribution: vec![0.90, 0.08, 0.02],
                monthly_prob_infection: 0.0005,
                monthly_prob_activation_hiv_negative: 0.0002,
                monthly_prob_activation_hiv_positive: vec![0.010, 0.006, 0.004, 0.002, 0.001, 0.0008],
                prob_pulmonary: 0.8,
                monthly_prob_self_cure: 0.005,
                death_rate_ratio_hiv_negative: 3.0,
                death_rate_ratio_hiv_positive: vec![6.0, 5.0, 4.0, 3.0, 3.0, 3.0],
                monthly_prob_diagnosis: 0.3,
                treatment: TbTreatmentConfig {
                    duration_months: 6,
                    initial_cost: 100.0,
                    monthly_cost: 50.0,
                    prob_success_hiv_negative: vec![0.90, 0.60, 0.40],
                    prob_success_hiv_positive: vec![
                        vec![0.80, 0.82, 0.85, 0.87, 0.88, 0.90],
                        vec![0.45, 0.48, 0.50, 0.55, 0.58, 0.60],
                        vec![0.25, 0.28, 0.30, 0.35, 0.38, 0.40],
                    ],
                    monthly_prob_default: 0.01,
                    monthly_prob_major_toxicity: 0.005,
                    toxicity_death_rate_ratio: 1.2,
                },
                proph: TbProphConfig {
                    enabled: true,
                    monthly_prob_start: 0.1,
                    duration_months: 6,
                    activation_efficacy: 0.6,
                    monthly_cost: 5.0,
                },
            },
            hiv_test: HivTestConfig {
                enabled: true,
                age_category_upper_bounds_years: vec![25.0, 45.0],
                monthly_prob_offer: vec![0.02, 0.02, 0.01],
                prob_accept: 0.8,
                sensitivity: 0.99,
                specificity: 0.99,
                test_cost: 20.0,
                prob_return_for_result: 0.9,
                prob_link_at_detection: 0.7,
                monthly_prob_link: 0.1,
                prob_oi_detection: 0.5,
            },
            ltfu: LtfuConfig {
                enabled: true,
                monthly_prob_ltfu: 0.005,
                response_logit_mean: 0.0,
                response_logit_sd: 0.5,
                monthly_prob_return: 0.05,
                prob_return_on_severe_oi: 0.5,
            },
            monitoring: MonitoringConfig {
                cd4_test_interval_pre_art: Some(6),
                cd4_test_interval_on_art: Some(6),
                hvl_test_interval_pre_art: Some(6),
                hvl_test_interval_on_art: Some(3),
                cd4_test_sd_fraction: 0.1,
                prob_hvl_test_higher: 0.05,
                prob_hvl_test_lower: 0.05,
                cd4_test_cost: 25.0,
                hvl_test_cost: 50.0,
            },
            costs: CostConfig {
                routine_care_hiv_positive: vec![400.0, 350.0, 300.0, 250.0, 200.0, 150.0],
                routine_care_hiv_negative: 20.0,
                acute_oi_detected: vec![2000.0; OI_NUM],
                acute_oi_undetected: vec![500.0; OI_NUM],
                death_cost: 1000.0,
            },
            qol: QolConfig {
                hiv_negative: 1.0,
                hiv_positive_off_art: vec![0.70, 0.75, 0.80, 0.85, 0.90, 0.95],
                hiv_positive_on_art: vec![0.75, 0.80, 0.85, 0.90, 0.92, 0.95],
                acute_oi_modifier: vec![0.8; OI_NUM],
            },
            peds: PedsConfig {
                enabled: false,
                age_threshold_months: 156,
                prob_mother_hiv_positive: 0.2,
                prob_breastfeeding: 0.6,
                breastfeeding_duration_months: 12,
                prob_in_utero: 0.05,
                prob_intrapartum: 0.1,
                monthly_prob_postpartum: 0.005,
                infant_cd4_mean: 1500.0,
                infant_cd4_sd: 300.0,
            },
        }
    }
}

// ── Validation helpers ─────────────────────────────────────────────

fn check_len(name: &str, actual: usize, expected: usize) -> SimResult<()> {
    if actual != expected {
        return Err(SimError::config(
            name,
            format!("expected {expected} entries, found {actual}"),
        ));
    }
    Ok(())
}

fn check_matrix(name: &str, m: &[Vec<f64>], rows: usize, cols: usize) -> SimResult<()> {
    check_len(name, m.len(), rows)?;
    for (i, row) in m.iter().enumerate() {
        if row.len() != cols {
            return Err(SimError::config(
                name,
                format!("row {i}: expected {cols} entries, found {}", row.len()),
            ));
        }
    }
    Ok(())
}

fn check_prob(name: &str, p: f64) -> SimResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(SimError::config(name, format!("probability {p} outside [0, 1]")));
    }
    Ok(())
}

fn check_probs(name: &str, ps: &[f64], expected: usize) -> SimResult<()> {
    check_len(name, ps.len(), expected)?;
    for (i, &p) in ps.iter().enumerate() {
        check_prob(&format!("{name}[{i}]"), p)?;
    }
    Ok(())
}

fn check_prob_matrix(name: &str, m: &[Vec<f64>]) -> SimResult<()> {
    for (i, row) in m.iter().enumerate() {
        for (j, &p) in row.iter().enumerate() {
            check_prob(&format!("{name}[{i}][{j}]"), p)?;
        }
    }
    Ok(())
}

fn check_non_negative(name: &str, v: f64) -> SimResult<()> {
    if !(v >= 0.0) || !v.is_finite() {
        return Err(SimError::config(name, format!("value {v} must be finite and >= 0")));
    }
    Ok(())
}

fn check_ratios(name: &str, rs: &[f64], expected: usize) -> SimResult<()> {
    check_len(name, rs.len(), expected)?;
    for (i, &r) in rs.iter().enumerate() {
        check_non_negative(&format!("{name}[{i}]"), r)?;
    }
    Ok(())
}
