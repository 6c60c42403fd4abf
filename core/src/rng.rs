//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! Every stochastic decision for a patient flows through that patient's
//! `PatientRng`, derived from the run seed and the patient index. This means:
//!   - A patient's draws do not depend on which worker simulates it.
//!   - A patient's stream is fully reproducible in isolation.
//!
//! Each draw takes a call-site identifier. The identifier never affects the
//! value drawn; it is logged at trace level and forwarded to an attached
//! `TraceObserver` so audits can line up draws with decisions.

use crate::{
    error::{SimError, SimResult},
    trace::{TraceObserver, TraceRecord},
    types::{Month, PatientIndex},
};
use rand::{RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64Mcg;
use std::sync::Arc;

/// Stable call-site identifiers. NEVER rename an existing entry:
/// audit tooling keys off these strings.
pub mod site {
    pub const INIT_AGE: &str = "begin_month.init.age";
    pub const INIT_GENDER: &str = "begin_month.init.gender";
    pub const INIT_RISK_FACTOR: &str = "begin_month.init.risk_factor";
    pub const RISK_FACTOR_INCIDENCE: &str = "begin_month.risk_factor_incidence";

    pub const INIT_HIV_PREVALENCE: &str = "hiv_infection.init.prevalence";
    pub const INIT_CD4: &str = "hiv_infection.init.cd4";
    pub const INIT_HVL: &str = "hiv_infection.init.hvl";
    pub const INIT_OI_HISTORY: &str = "hiv_infection.init.oi_history";
    pub const INIT_DETECTED: &str = "hiv_infection.init.detected";
    pub const INIT_LINKED: &str = "hiv_infection.init.linked";
    pub const CD4_DECLINE_SUBJECT: &str = "hiv_infection.cd4_decline_subject";
    pub const HIV_INCIDENCE: &str = "hiv_infection.incidence";
    pub const INFECTION_CD4: &str = "hiv_infection.infection_cd4";
    pub const INFECTION_SETPOINT: &str = "hiv_infection.infection_setpoint";
    pub const PEDS_MATERNAL_STATUS: &str = "hiv_infection.peds.maternal_status";
    pub const PEDS_BREASTFEEDING: &str = "hiv_infection.peds.breastfeeding";
    pub const PEDS_VERTICAL: &str = "hiv_infection.peds.vertical_transmission";
    pub const PEDS_POSTPARTUM: &str = "hiv_infection.peds.postpartum_transmission";

    pub const CHRM_PREVALENCE: &str = "chronic.prevalence";
    pub const CHRM_INCIDENCE: &str = "chronic.incidence";

    pub const ART_TOXICITY: &str = "drug_toxicity.art";
    pub const PROPH_TOXICITY: &str = "drug_toxicity.proph";
    pub const TB_TREATMENT_TOXICITY: &str = "drug_toxicity.tb_treatment";

    pub const TB_INIT_STATE: &str = "tb_disease.init.state";
    pub const TB_INIT_STRAIN: &str = "tb_disease.init.strain";
    pub const TB_INFECTION: &str = "tb_disease.infection";
    pub const TB_INFECTION_STRAIN: &str = "tb_disease.infection_strain";
    pub const TB_ACTIVATION: &str = "tb_disease.activation";
    pub const TB_PULMONARY: &str = "tb_disease.pulmonary";
    pub const TB_SELF_CURE: &str = "tb_disease.self_cure";

    pub const ACUTE_OI: &str = "acute_oi.event";

    pub const DEATH: &str = "mortality.death";
    pub const DEATH_CAUSE: &str = "mortality.cause";

    pub const CD4_CHANGE: &str = "cd4_hvl.cd4_change";
    pub const HVL_CHANGE: &str = "cd4_hvl.hvl_change";

    pub const OI_DETECTION: &str = "hiv_testing.oi_detection";
    pub const HIV_TEST_OFFER: &str = "hiv_testing.offer";
    pub const HIV_TEST_ACCEPT: &str = "hiv_testing.accept";
    pub const HIV_TEST_RESULT: &str = "hiv_testing.result";
    pub const HIV_TEST_RETURN: &str = "hiv_testing.return";
    pub const LINKAGE: &str = "hiv_testing.linkage";

    pub const LTFU_RESPONSE: &str = "behavior.init.ltfu_response";
    pub const LTFU: &str = "behavior.ltfu";
    pub const RETURN_TO_CARE: &str = "behavior.return_to_care";

    pub const LATE_FAILURE: &str = "drug_efficacy.late_failure";

    pub const CD4_TEST_NOISE: &str = "cd4_test.noise";
    pub const HVL_TEST_ERROR: &str = "hvl_test.error";

    pub const RESPONSE_BASELINE: &str = "clinic_visit.init.response_baseline";
    pub const VISIT_TYPE: &str = "clinic_visit.init.visit_type";
    pub const CD4_RESPONSE_TYPE: &str = "clinic_visit.init.cd4_response_type";
    pub const ART_RESPONDER: &str = "clinic_visit.art_responder";
    pub const ADMINISTRATION_ATTEND: &str = "clinic_visit.administration_attend";

    pub const TB_DIAGNOSIS: &str = "tb_care.diagnosis";
    pub const TB_TREATMENT_DEFAULT: &str = "tb_care.treatment_default";
    pub const TB_TREATMENT_SUCCESS: &str = "tb_care.treatment_success";
    pub const TB_PROPH_START: &str = "tb_care.proph_start";
}

/// Derive the seed of a patient's stream. The mixing constant must never
/// change: doing so changes every patient's draws.
pub fn patient_seed(run_seed: u64, patient: PatientIndex) -> u64 {
    run_seed ^ patient.wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

/// The random stream owned by one patient simulation.
pub struct PatientRng {
    pub patient: PatientIndex,
    month: Month,
    position: u64,
    inner: Pcg64Mcg,
    tracer: Option<Arc<dyn TraceObserver>>,
}

impl PatientRng {
    pub fn new(run_seed: u64, patient: PatientIndex) -> Self {
        Self {
            patient,
            month: 0,
            position: 0,
            inner: Pcg64Mcg::seed_from_u64(patient_seed(run_seed, patient)),
            tracer: None,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn TraceObserver>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Month stamped on trace records. Set by the engine each pass.
    pub fn set_month(&mut self, month: Month) {
        self.month = month;
    }

    /// Number of draws taken so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Draw a float in [0.0, 1.0).
    pub fn draw_uniform(&mut self, site: &'static str) -> f64 {
        let bits = self.inner.next_u64();
        let value = (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
        self.record(site, value);
        value
    }

    /// Draw from N(mean, stddev). A zero `stddev` returns `mean` but still
    /// consumes a position so the stream stays aligned.
    pub fn draw_gaussian(&mut self, site: &'static str, mean: f64, stddev: f64) -> SimResult<f64> {
        let domain_error = SimError::NumericDomain {
            operation: "draw_gaussian",
            value: stddev,
        };
        if !mean.is_finite() || !stddev.is_finite() || stddev < 0.0 {
            return Err(domain_error);
        }
        let normal = Normal::new(mean, stddev).map_err(|_| domain_error)?;
        let value = normal.sample(&mut self.inner);
        self.record(site, value);
        Ok(value)
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, site: &'static str, p: f64) -> bool {
        self.draw_uniform(site) < p
    }

    fn record(&mut self, site: &'static str, value: f64) {
        self.position += 1;
        log::trace!(
            "patient={} month={} draw site={site} pos={} value={value}",
            self.patient,
            self.month,
            self.position
        );
        if let Some(tracer) = &self.tracer {
            tracer.on_draw(TraceRecord {
                patient: self.patient,
                month: self.month,
                position: self.position,
                site,
                value,
            });
        }
    }
}

/// Hands out patient streams for a single run.
pub struct RngBank {
    run_seed: u64,
}

impl RngBank {
    pub fn new(run_seed: u64) -> Self {
        Self { run_seed }
    }

    pub fn for_patient(&self, patient: PatientIndex) -> PatientRng {
        PatientRng::new(self.run_seed, patient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_patient_same_stream() {
        let bank = RngBank::new(42);
        let mut a = bank.for_patient(7);
        let mut b = bank.for_patient(7);
        for _ in 0..100 {
            assert_eq!(a.draw_uniform("test.a"), b.draw_uniform("test.b"));
        }
    }

    #[test]
    fn different_patients_diverge() {
        let bank = RngBank::new(42);
        let mut a = bank.for_patient(0);
        let mut b = bank.for_patient(1);
        let va: Vec<f64> = (0..10).map(|_| a.draw_uniform("test")).collect();
        let vb: Vec<f64> = (0..10).map(|_| b.draw_uniform("test")).collect();
        assert_ne!(va, vb);
    }

    #[test]
    fn uniform_stays_in_unit_interval() {
        let mut rng = PatientRng::new(1, 1);
        for _ in 0..10_000 {
            let u = rng.draw_uniform("test");
            assert!((0.0..1.0).contains(&u));
        }
        assert_eq!(rng.position(), 10_000);
    }

    #[test]
    fn gaussian_rejects_negative_stddev() {
        let mut rng = PatientRng::new(1, 1);
        assert!(rng.draw_gaussian("test", 0.0, -1.0).is_err());
        assert_eq!(rng.draw_gaussian("test", 3.5, 0.0).unwrap(), 3.5);
    }
}
