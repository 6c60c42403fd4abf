use hivsim_core::{
    cohort::CohortRunner,
    config::SimConfig,
    stats::CohortStats,
    store::SimStore,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn store() -> SimStore {
    let s = SimStore::in_memory().expect("in-memory store");
    s.migrate().expect("migrate");
    s
}

fn small_run() -> (SimConfig, CohortStats) {
    let mut config = SimConfig::default_test();
    config.run.num_patients = 60;
    config.run.max_months = Some(36);
    let stats = CohortRunner::default().run(&config).expect("cohort run");
    (config, stats)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn migrations_are_idempotent() {
    let s = store();
    s.migrate().expect("second migrate must not fail");
}

#[test]
fn run_record_and_config_round_trip() {
    let s = store();
    let (config, _) = small_run();
    s.insert_run("run-a", &config, "test").unwrap();

    let record = s.run("run-a").unwrap().expect("run row");
    assert_eq!(record.run_name, config.run.run_name);
    assert_eq!(record.seed, config.run.seed);
    assert_eq!(record.num_patients, 60);
    assert!(record.finished_at.is_none());

    s.finish_run("run-a").unwrap();
    assert!(s.run("run-a").unwrap().unwrap().finished_at.is_some());

    let loaded = s.run_config("run-a").unwrap().expect("config");
    loaded.validate().expect("stored config is still valid");
    assert_eq!(loaded.run.max_months, Some(36));
    assert!(s.run("missing").unwrap().is_none());
}

/// Outcomes come back in patient order with their values intact.
#[test]
fn patient_outcomes_round_trip() {
    let s = store();
    let (config, stats) = small_run();
    s.insert_run("run-b", &config, "test").unwrap();
    s.insert_patient_outcomes("run-b", &stats.outcomes).unwrap();

    let loaded = s.patient_outcomes("run-b").unwrap();
    assert_eq!(loaded, stats.outcomes);

    let deaths: i64 = s.deaths_by_cause("run-b").unwrap().iter().map(|(_, n)| n).sum();
    assert_eq!(deaths as u64, stats.deaths_by_cause.iter().sum::<u64>());
}

#[test]
fn outcomes_require_a_run_row() {
    let s = store();
    let (_, stats) = small_run();
    assert!(
        s.insert_patient_outcomes("no-such-run", &stats.outcomes).is_err(),
        "foreign key on run_id must reject orphan outcomes"
    );
}

#[test]
fn summary_and_census_round_trip() {
    let s = store();
    let (config, stats) = small_run();
    s.insert_run("run-c", &config, "test").unwrap();

    let summary = stats.summary();
    s.save_run_summary("run-c", &summary).unwrap();
    // Saving twice overwrites rather than failing.
    s.save_run_summary("run-c", &summary).unwrap();

    let loaded = s.run_summary("run-c").unwrap().expect("summary row");
    assert_eq!(loaded.num_patients, summary.num_patients);
    assert_eq!(loaded.deaths_by_cause, summary.deaths_by_cause);
    assert_eq!(loaded.art_starts, summary.art_starts);
    assert!(close(loaded.total_discounted_cost, summary.total_discounted_cost));
    assert!(close(loaded.mean_life_months, summary.mean_life_months));

    s.save_monthly_census("run-c", &stats).unwrap();
    let census = s.monthly_census("run-c").unwrap();
    assert_eq!(census.len(), stats.alive_by_month.len());
    for (month, alive, positive, on_art) in census {
        let m = month as usize;
        assert_eq!(alive, stats.alive_by_month[m]);
        assert_eq!(positive, stats.hiv_positive_by_month.get(m).copied().unwrap_or(0));
        assert_eq!(on_art, stats.on_art_by_month.get(m).copied().unwrap_or(0));
        assert!(positive <= alive && on_art <= positive);
    }
}
