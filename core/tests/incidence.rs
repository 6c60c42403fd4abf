use hivsim_core::{
    cohort::CohortRunner,
    config::SimConfig,
    hiv_infection_updater::AdultInfection,
    patient::PatientState,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn negative_cohort(patients: u64) -> SimConfig {
    let mut config = SimConfig::default_test();
    config.run.num_patients = patients;
    config.run.max_months = Some(24);
    config.cohort.hiv_prevalence = 0.0;
    config
}

fn set_incidence(config: &mut SimConfig, p: f64) {
    for row in &mut config.incidence.monthly_incidence {
        row.iter_mut().for_each(|v| *v = p);
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Incidence switched off: an HIV-negative cohort stays negative.
#[test]
fn disabled_incidence_produces_no_infections() {
    let mut config = negative_cohort(200);
    config.incidence.enabled = false;
    set_incidence(&mut config, 0.5);

    let stats = CohortRunner::default().run(&config).unwrap();
    assert_eq!(stats.new_infections, 0);
    assert!(stats.outcomes.iter().all(|o| !o.infected_during_run && !o.infected_at_entry));
    assert!(stats.hiv_positive_by_month.iter().all(|&n| n == 0));
}

/// Zero incidence everywhere behaves exactly like incidence disabled.
#[test]
fn zero_incidence_produces_no_infections() {
    let mut config = negative_cohort(200);
    set_incidence(&mut config, 0.0);

    let stats = CohortRunner::default().run(&config).unwrap();
    assert_eq!(stats.new_infections, 0);
    assert_eq!(stats.summary().prevalent_at_entry, 0);
}

/// Certain incidence infects every patient in the first month.
#[test]
fn certain_incidence_infects_everyone_in_month_zero() {
    let mut config = negative_cohort(100);
    set_incidence(&mut config, 1.0);

    let stats = CohortRunner::default().run(&config).unwrap();
    assert_eq!(stats.new_infections, 100);
    for outcome in &stats.outcomes {
        assert!(outcome.infected_during_run, "patient {} not infected", outcome.patient);
        assert_eq!(outcome.infection_month, Some(0));
    }
}

/// Risk factors scale incidence on the rate scale.
#[test]
fn risk_factors_raise_incidence_probability() {
    let mut config = negative_cohort(1);
    set_incidence(&mut config, 0.01);
    config.incidence.risk_factor_rate_ratio = vec![3.0; 5];

    let mut patient = PatientState::new(0);
    let base = AdultInfection::incidence_probability(&patient, &config).unwrap();
    assert!((base - 0.01).abs() < 1e-12);

    patient.set_risk_factor(0);
    let one = AdultInfection::incidence_probability(&patient, &config).unwrap();
    let expected = 1.0 - (1.0f64 - 0.01).powf(3.0);
    assert!((one - expected).abs() < 1e-12, "got {one}, expected {expected}");

    patient.set_risk_factor(1);
    let two = AdultInfection::incidence_probability(&patient, &config).unwrap();
    assert!(two > one);
}
