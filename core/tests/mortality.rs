use hivsim_core::{
    cohort::CohortRunner,
    config::SimConfig,
    mortality_updater::{cause_shares, MortalityUpdater},
    types::DeathCause,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn share(shares: &[f64], cause: DeathCause) -> f64 {
    shares[cause as usize]
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// No base rate means nothing to attribute: all shares are zero, not NaN.
#[test]
fn zero_total_gives_zero_shares() {
    let shares = cause_shares(0.0, &[(DeathCause::HivDisease, 5.0)]).unwrap();
    assert!(shares.iter().all(|&s| s == 0.0), "got {shares:?}");
}

/// Each factor is weighted by its excess over the background rate.
#[test]
fn causes_are_weighted_by_excess_rate() {
    let shares = cause_shares(
        0.01,
        &[(DeathCause::HivDisease, 3.0), (DeathCause::TbDisease, 2.0)],
    )
    .unwrap();
    // Weights: background 1, HIV 2, TB 1 (in units of the base rate).
    assert!((share(&shares, DeathCause::Background) - 0.25).abs() < 1e-12);
    assert!((share(&shares, DeathCause::HivDisease) - 0.50).abs() < 1e-12);
    assert!((share(&shares, DeathCause::TbDisease) - 0.25).abs() < 1e-12);
    assert!((shares.iter().sum::<f64>() - 1.0).abs() < 1e-12);
}

/// Protective ratios reduce the probability but never receive a share.
#[test]
fn protective_ratio_gets_no_share() {
    let factors = [(DeathCause::HivDisease, 0.5)];
    let shares = cause_shares(0.02, &factors).unwrap();
    assert_eq!(share(&shares, DeathCause::Background), 1.0);
    assert_eq!(share(&shares, DeathCause::HivDisease), 0.0);

    let p = MortalityUpdater::death_probability(0.02, &factors).unwrap();
    assert!((p - (1.0 - (-0.01f64).exp())).abs() < 1e-12);
}

/// Huge ratios saturate at 1 without overflowing to NaN.
#[test]
fn death_probability_is_clamped() {
    let factors = [(DeathCause::HivDisease, 1e6), (DeathCause::AcuteOi, 1e6)];
    let p = MortalityUpdater::death_probability(0.5, &factors).unwrap();
    assert!(p <= 1.0 && p > 0.999, "got {p}");
    assert_eq!(MortalityUpdater::death_probability(0.0, &factors).unwrap(), 0.0);
}

/// A negative rate is a numeric domain error, not a silent zero.
#[test]
fn negative_rate_is_rejected() {
    assert!(MortalityUpdater::death_probability(-0.1, &[]).is_err());
}

/// Background mortality alone: survival follows exp(-rate * months).
#[test]
fn background_survival_matches_rate() {
    const RATE: f64 = 0.02;
    const MONTHS: u32 = 24;
    const PATIENTS: u64 = 4000;

    let mut config = SimConfig::default_test();
    config.run.num_patients = PATIENTS;
    config.run.max_months = Some(MONTHS);
    config.run.workers = 4;
    config.cohort.hiv_prevalence = 0.0;
    config.incidence.enabled = false;
    config.tb.enabled = false;
    config.cohort.risk_factor_prevalence = vec![0.0; 5];
    config.cohort.risk_factor_incidence = vec![0.0; 5];
    for cond in &mut config.chronic.conditions {
        cond.death_rate_ratio = 1.0;
    }
    for row in &mut config.nat_hist.background_death_rate {
        row.iter_mut().for_each(|r| *r = RATE);
    }

    let stats = CohortRunner::default().run(&config).unwrap();
    let survivors = stats.outcomes.iter().filter(|o| !o.died()).count() as f64;
    let observed = survivors / PATIENTS as f64;
    let expected = (-RATE * MONTHS as f64).exp();
    // Binomial sd is about 0.0077 here; allow four of them.
    assert!(
        (observed - expected).abs() < 0.031,
        "survival {observed:.4}, expected {expected:.4}"
    );
    assert_eq!(stats.deaths(DeathCause::Background), PATIENTS - survivors as u64);
}
