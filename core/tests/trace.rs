use hivsim_core::{
    cohort::CohortRunner,
    config::SimConfig,
    rng::site,
    store::SimStore,
    trace::RecordingTracer,
};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn config() -> SimConfig {
    let mut config = SimConfig::default_test();
    config.run.num_patients = 50;
    config.run.max_months = Some(24);
    config.run.trace_patients = vec![3, 41];
    config
}

fn traced_run(config: &SimConfig, workers: usize) -> Arc<RecordingTracer> {
    let tracer = Arc::new(RecordingTracer::new(config.run.trace_patients.iter().copied()));
    CohortRunner::default()
        .with_tracer(tracer.clone())
        .run_with_workers(config, workers)
        .expect("traced run");
    tracer
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Only designated patients are traced, and each stream starts at the
/// age draw of the init pass.
#[test]
fn only_designated_patients_are_traced() {
    let config = config();
    let tracer = traced_run(&config, 2);
    let records = tracer.records();

    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.patient == 3 || r.patient == 41));

    for patient in [3, 41] {
        let draws = tracer.records_for(patient);
        let first = draws.first().expect("traced patient has draws");
        assert_eq!(first.site, site::INIT_AGE);
        assert_eq!(first.month, 0);
        assert_eq!(first.position, 1);
        let positions: Vec<u64> = draws.iter().map(|r| r.position).collect();
        let expected: Vec<u64> = (1..=draws.len() as u64).collect();
        assert_eq!(positions, expected, "positions must be contiguous for patient {patient}");
        assert!(draws.windows(2).all(|w| w[0].month <= w[1].month));
    }
}

/// The draw sequence of a patient does not depend on thread scheduling.
#[test]
fn trace_is_identical_across_worker_counts() {
    let config = config();
    let one = traced_run(&config, 1).records();
    let four = traced_run(&config, 4).records();
    assert_eq!(one, four);
}

/// Tracing observes draws without changing them.
#[test]
fn tracing_does_not_change_outcomes() {
    let config = config();
    let plain = CohortRunner::default().run(&config).unwrap();
    let tracer = Arc::new(RecordingTracer::new([3]));
    let traced = CohortRunner::default().with_tracer(tracer).run(&config).unwrap();
    assert_eq!(plain.outcomes, traced.outcomes);
}

#[test]
fn trace_round_trips_through_the_store() {
    let config = config();
    let tracer = traced_run(&config, 2);
    let records = tracer.records();

    let s = SimStore::in_memory().unwrap();
    s.migrate().unwrap();
    s.insert_run("run-t", &config, "test").unwrap();
    s.append_trace("run-t", &records).unwrap();

    assert_eq!(s.trace_count("run-t").unwrap() as usize, records.len());
    let stored = s.trace_for_patient("run-t", 41).unwrap();
    let expected = tracer.records_for(41);
    assert_eq!(stored.len(), expected.len());
    for (a, b) in stored.iter().zip(&expected) {
        assert_eq!(a.position, b.position);
        assert_eq!(a.month, b.month);
        assert_eq!(a.site, b.site);
        assert_eq!(a.value.to_bits(), b.value.to_bits());
    }
}
