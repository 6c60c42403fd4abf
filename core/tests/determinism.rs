//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Same seed, same configuration: identical per-patient outcomes and
//! identical cohort summaries, whatever the number of worker threads.
//! Any divergence is a blocker. Do not merge until fixed.

use hivsim_core::{
    cohort::CohortRunner,
    config::SimConfig,
    engine::SimEngine,
    rng::PatientRng,
    stats::NullSink,
};

fn small_config(seed: u64, patients: u64) -> SimConfig {
    let mut config = SimConfig::default_test();
    config.run.seed = seed;
    config.run.num_patients = patients;
    config.run.max_months = Some(60);
    config
}

#[test]
fn same_seed_produces_identical_outcomes() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;
    let config = small_config(SEED, 200);

    let a = CohortRunner::default().run(&config).expect("run a");
    let b = CohortRunner::default().run(&config).expect("run b");

    assert_eq!(a.outcomes.len(), 200);
    assert_eq!(
        a.outcomes.len(), b.outcomes.len(),
        "Outcome counts differ: {} vs {}",
        a.outcomes.len(), b.outcomes.len()
    );
    for (i, (x, y)) in a.outcomes.iter().zip(&b.outcomes).enumerate() {
        assert_eq!(x, y, "Outcomes diverged at patient {i}:\n  A: {x:?}\n  B: {y:?}");
    }
    assert_eq!(a.summary(), b.summary());
}

#[test]
fn worker_count_does_not_change_results() {
    let config = small_config(7, 300);
    let runner = CohortRunner::default();

    let single = runner.run_with_workers(&config, 1).expect("1 worker");
    let parallel = runner.run_with_workers(&config, 4).expect("4 workers");

    assert_eq!(single.outcomes, parallel.outcomes);
    assert_eq!(single.alive_by_month, parallel.alive_by_month);
    assert_eq!(single.on_art_by_month, parallel.on_art_by_month);
    assert_eq!(single.deaths_by_cause, parallel.deaths_by_cause);
    // Exact equality, not approximate: totals are summed in patient order.
    assert_eq!(single.summary(), parallel.summary());
}

#[test]
fn different_seeds_produce_different_outcomes() {
    let a = CohortRunner::default().run(&small_config(42, 100)).expect("run a");
    let b = CohortRunner::default().run(&small_config(99, 100)).expect("run b");

    let any_different = a.outcomes.iter().zip(&b.outcomes).any(|(x, y)| x != y);
    assert!(any_different, "Different seeds produced identical outcomes: seed is not being used");
}

#[test]
fn a_patient_does_not_depend_on_its_neighbours() {
    // Patient 17 simulated alone must match patient 17 inside a cohort.
    let config = small_config(1234, 40);
    let cohort = CohortRunner::default().run(&config).expect("cohort");

    let engine = SimEngine::build();
    let mut rng = PatientRng::new(config.run.seed, 17);
    let alone = engine
        .simulate_patient(17, &config, &mut rng, &mut NullSink)
        .expect("single patient");

    let in_cohort = &cohort.outcomes[17];
    assert_eq!(in_cohort.patient, 17);
    assert_eq!(in_cohort.life_months, alone.general().life_months);
    assert_eq!(in_cohort.discounted_cost, alone.general().discounted_cost);
    assert_eq!(in_cohort.cause_of_death, alone.general().cause_of_death);
}
