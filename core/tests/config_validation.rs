use hivsim_core::{config::SimConfig, error::SimError};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn expect_config_error(config: &SimConfig, parameter_prefix: &str) {
    match config.validate() {
        Err(SimError::Config { parameter, .. }) => assert!(
            parameter.starts_with(parameter_prefix),
            "expected error on {parameter_prefix}, got {parameter}"
        ),
        other => panic!("expected Config error on {parameter_prefix}, got {other:?}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn default_test_config_is_valid() {
    SimConfig::default_test().validate().unwrap();
}

/// A configuration written to JSON loads back and validates.
#[test]
fn json_round_trip_validates() {
    let config = SimConfig::default_test();
    let json = serde_json::to_string_pretty(&config).unwrap();
    let loaded = SimConfig::from_json_str(&json).unwrap();

    assert_eq!(loaded.run.seed, config.run.seed);
    assert_eq!(loaded.run.cd4_strata_upper_bounds, config.run.cd4_strata_upper_bounds);
    assert_eq!(loaded.art.lines.len(), config.art.lines.len());
    assert_eq!(loaded.chronic.conditions.len(), config.chronic.conditions.len());
}

/// Optional run fields fall back to their defaults when absent.
#[test]
fn missing_optional_run_fields_use_defaults() {
    let mut value = serde_json::to_value(SimConfig::default_test()).unwrap();
    let run = value["run"].as_object_mut().unwrap();
    run.remove("workers");
    run.remove("trace_patients");
    run.remove("death_month_life_fraction");
    run.remove("max_months");

    let loaded = SimConfig::from_json_str(&value.to_string()).unwrap();
    assert_eq!(loaded.run.workers, 1);
    assert!(loaded.run.trace_patients.is_empty());
    assert_eq!(loaded.run.death_month_life_fraction, 0.5);
    assert_eq!(loaded.run.max_months, None);
}

#[test]
fn malformed_json_is_a_serialization_error() {
    let err = SimConfig::from_json_str("{ \"run\": ").unwrap_err();
    assert!(matches!(err, SimError::Serialization(_)), "got {err:?}");
}

/// A distribution that does not sum to 1 names the offending table.
#[test]
fn distribution_not_summing_to_one_is_rejected() {
    let mut config = SimConfig::default_test();
    config.cohort.clinic_visit_type_distribution = vec![0.2, 0.2, 0.2];
    match config.validate() {
        Err(SimError::DistributionSum { distribution, sum, .. }) => {
            assert_eq!(distribution, "cohort.clinic_visit_type_distribution");
            assert!((sum - 0.6).abs() < 1e-9);
        }
        other => panic!("expected DistributionSum, got {other:?}"),
    }
}

#[test]
fn wrong_table_length_is_rejected() {
    let mut config = SimConfig::default_test();
    config.nat_hist.hiv_death_rate_ratio.pop();
    expect_config_error(&config, "nat_hist.hiv_death_rate_ratio");

    let mut config = SimConfig::default_test();
    config.nat_hist.background_death_rate[1].truncate(50);
    expect_config_error(&config, "nat_hist.background_death_rate");
}

#[test]
fn probability_out_of_range_is_rejected() {
    let mut config = SimConfig::default_test();
    config.hiv_test.sensitivity = 1.2;
    expect_config_error(&config, "hiv_test.sensitivity");

    let mut config = SimConfig::default_test();
    config.cohort.risk_factor_prevalence[2] = -0.1;
    expect_config_error(&config, "cohort.risk_factor_prevalence");
}

#[test]
fn strata_bounds_must_increase() {
    let mut config = SimConfig::default_test();
    config.run.cd4_strata_upper_bounds = vec![50.0, 200.0, 100.0, 350.0, 500.0];
    expect_config_error(&config, "run.cd4_strata_upper_bounds");
}

#[test]
fn zero_workers_is_rejected() {
    let mut config = SimConfig::default_test();
    config.run.workers = 0;
    expect_config_error(&config, "run.workers");
}

#[test]
fn zero_test_interval_is_rejected() {
    let mut config = SimConfig::default_test();
    config.monitoring.hvl_test_interval_on_art = Some(0);
    expect_config_error(&config, "monitoring.hvl_test_interval_on_art");
}
