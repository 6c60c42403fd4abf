//! Stage 7: Mortality.
//!
//! Competing-risk model: the monthly death rate is the background rate for
//! the patient's age and gender multiplied by every applicable death rate
//! ratio. The product is converted with `rate_to_prob`. A single draw
//! decides death; a second draw attributes the cause in proportion to the
//! excess rate each factor contributes.
//!
//! Several large ratios together can push the probability to 1. That
//! saturation is preserved: the probability is clamped and a warning is
//! logged, never silently altered.

use crate::{
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    prob,
    rng::site,
    types::{DeathCause, AGE_YEARS_NUM, DEATH_CAUSE_NUM},
    updater::{StageContext, Updater},
};

/// Death probabilities at or above this are reported as saturated.
pub const SATURATION_WARN_THRESHOLD: f64 = 0.999;

pub struct MortalityUpdater;

/// Share of a death attributed to each cause, indexed by `DeathCause`.
///
/// Background carries the base rate; every other factor carries the base
/// rate times its excess ratio (ratio - 1, floored at 0). A zero total
/// gives all-zero shares.
pub fn cause_shares(base_rate: f64, factors: &[(DeathCause, f64)]) -> SimResult<[f64; DEATH_CAUSE_NUM]> {
    let mut weights = [0.0; DEATH_CAUSE_NUM];
    weights[DeathCause::Background as usize] = base_rate;
    for &(cause, ratio) in factors {
        weights[cause as usize] += base_rate * (ratio - 1.0).max(0.0);
    }
    let shares = prob::normalize_weights(&weights)?;
    let mut out = [0.0; DEATH_CAUSE_NUM];
    out.copy_from_slice(&shares);
    Ok(out)
}

impl MortalityUpdater {
    /// Background monthly rate and the death rate ratios in effect.
    pub fn rate_factors(patient: &PatientState, config: &SimConfig) -> (f64, Vec<(DeathCause, f64)>) {
        let nh = &config.nat_hist;
        let g = patient.general();
        let age = (g.age_months as usize / 12).min(AGE_YEARS_NUM - 1);
        let base = nh.background_death_rate[g.gender.index()][age];

        let mut factors: Vec<(DeathCause, f64)> = Vec::new();
        let stratum = patient.disease().cd4_stratum;
        if let Some(s) = stratum {
            factors.push((DeathCause::HivDisease, nh.hiv_death_rate_ratio[s.index()]));
            if patient.disease().acute_oi_this_month.is_some() {
                factors.push((DeathCause::AcuteOi, nh.acute_oi_death_rate_ratio[s.index()]));
            }
            if patient.recent_severe_oi(&nh.severe_oi, nh.severe_oi_history_duration_months) {
                factors.push((DeathCause::HivDisease, nh.severe_oi_history_death_rate_ratio));
            }
        }
        if patient.on_art() {
            factors.push((DeathCause::HivDisease, config.art.death_rate_ratio));
        }
        if patient.tb().state.is_active() {
            let tb = &config.tb;
            let ratio = match stratum {
                Some(s) => tb.death_rate_ratio_hiv_positive[s.index()],
                None => tb.death_rate_ratio_hiv_negative,
            };
            factors.push((DeathCause::TbDisease, ratio));
        }
        for (cond, &has) in config.chronic.conditions.iter().zip(&patient.disease().chronic_conditions) {
            if has {
                factors.push((DeathCause::ChronicCondition, cond.death_rate_ratio));
            }
        }
        for (&ratio, &on) in nh.risk_factor_death_rate_ratio.iter().zip(&g.risk_factors) {
            if on {
                factors.push((DeathCause::RiskFactor, ratio));
            }
        }
        factors.extend(g.month_death_rate_ratios.iter().copied());
        (base, factors)
    }

    /// Combined monthly death probability, clamped to [0, 1].
    pub fn death_probability(base_rate: f64, factors: &[(DeathCause, f64)]) -> SimResult<f64> {
        let product: f64 = factors.iter().map(|&(_, r)| r).product();
        let p = prob::rate_to_prob(base_rate * product)?;
        Ok(p.clamp(0.0, 1.0))
    }
}

impl Updater for MortalityUpdater {
    fn name(&self) -> &'static str {
        "mortality"
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
        let config = ctx.config;
        let (base, factors) = Self::rate_factors(patient, config);
        let p = Self::death_probability(base, &factors)?;
        if p >= SATURATION_WARN_THRESHOLD {
            log::warn!(
                "month={} patient={} mortality: death probability saturated at {p:.6} ({} factors)",
                patient.month(),
                patient.index(),
                factors.len()
            );
        }
        if !ctx.rng.chance(site::DEATH, p) {
            return Ok(Vec::new());
        }

        let shares = cause_shares(base, &factors)?;
        let draw = ctx.rng.draw_uniform(site::DEATH_CAUSE);
        let cause = if shares.iter().all(|&s| s == 0.0) {
            DeathCause::Background
        } else {
            DeathCause::ALL[prob::select_outcome(
                "mortality.cause_shares",
                &shares,
                draw,
                &format!("patient={}", patient.index()),
            )?]
        };

        patient.mark_dead(cause);
        patient.add_cost(config.costs.death_cost, &config.run);
        log::debug!(
            "month={} patient={} mortality: died of {} (p={p:.5})",
            patient.month(),
            patient.index(),
            cause.name()
        );
        Ok(vec![SimEvent::PatientDied {
            month: patient.month(),
            cause,
            death_probability: p,
        }])
    }
}
