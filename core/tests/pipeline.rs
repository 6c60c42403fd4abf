use hivsim_core::{
    config::SimConfig,
    engine::SimEngine,
    error::SimError,
    event::SimEvent,
    rng::PatientRng,
    snapshot::{MonthSnapshot, PatientOutcome},
    stats::{CohortStats, StatisticsSink},
    types::HivState,
    updater::StageSlot,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Keeps everything the engine hands to the sink.
#[derive(Default)]
struct RecordingSink {
    months:   Vec<(MonthSnapshot, Vec<SimEvent>)>,
    outcomes: Vec<PatientOutcome>,
}

impl StatisticsSink for RecordingSink {
    fn record_month(&mut self, snapshot: &MonthSnapshot, events: &[SimEvent]) {
        self.months.push((snapshot.clone(), events.to_vec()));
    }

    fn finalize(&mut self, outcome: &PatientOutcome) {
        self.outcomes.push(outcome.clone());
    }
}

fn simulate(config: &SimConfig, index: u64) -> (hivsim_core::patient::PatientState, RecordingSink) {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = SimEngine::build();
    let mut rng = PatientRng::new(config.run.seed, index);
    let mut sink = RecordingSink::default();
    let patient = engine
        .simulate_patient(index, config, &mut rng, &mut sink)
        .expect("simulate patient");
    (patient, sink)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn stages_run_in_documented_order() {
    let engine = SimEngine::build();
    assert_eq!(engine.stage_slots(), StageSlot::ALL.to_vec());
    assert_eq!(
        engine.stage_names(),
        vec![
            "begin_month",
            "hiv_infection",
            "chronic_conditions",
            "drug_toxicity",
            "tb_disease",
            "acute_oi",
            "mortality",
            "cd4_hvl_progression",
            "hiv_testing",
            "behavior",
            "drug_efficacy",
            "cd4_test",
            "hvl_test",
            "clinic_visit",
            "tb_clinical_care",
            "end_month",
        ]
    );
}

#[test]
fn every_month_reaches_the_sink_and_outcome_is_final() {
    let config = SimConfig::default_test();
    let (patient, sink) = simulate(&config, 3);

    assert!(patient.is_finished());
    assert_eq!(sink.outcomes.len(), 1, "finalize must be called exactly once");
    let months: Vec<u32> = sink.months.iter().map(|(s, _)| s.month).collect();
    let expected: Vec<u32> = (0..months.len() as u32).collect();
    assert_eq!(months, expected, "one snapshot per month, in order");

    let outcome = &sink.outcomes[0];
    assert_eq!(outcome.patient, 3);
    assert_eq!(outcome.life_months, patient.general().life_months);
}

#[test]
fn init_events_are_carried_into_month_zero() {
    let config = SimConfig::default_test();
    let (_, sink) = simulate(&config, 0);

    let (first, events) = &sink.months[0];
    assert_eq!(first.month, 0);
    assert!(
        events.iter().any(|e| matches!(e, SimEvent::PatientCreated { .. })),
        "PatientCreated from the init pass must be visible in month 0"
    );
    for (_, later) in &sink.months[1..] {
        assert!(!later.iter().any(|e| matches!(e, SimEvent::PatientCreated { .. })));
    }
}

#[test]
fn horizon_ends_the_simulation() {
    let mut config = SimConfig::default_test();
    config.run.max_months = Some(12);
    for row in &mut config.nat_hist.background_death_rate {
        row.iter_mut().for_each(|r| *r = 0.0);
    }
    let (patient, sink) = simulate(&config, 5);

    assert!(patient.is_alive());
    assert!(patient.general().horizon_reached);
    assert_eq!(patient.month(), 12);
    assert_eq!(sink.months.len(), 12);
    assert_eq!(patient.general().life_months, 12.0);
    let (_, last_events) = sink.months.last().expect("at least one month");
    assert!(last_events.iter().any(|e| matches!(e, SimEvent::HorizonReached { month: 12 })));
}

#[test]
fn death_month_credits_partial_life_and_stops_stages() {
    let mut config = SimConfig::default_test();
    // Certain death in the first month.
    for row in &mut config.nat_hist.background_death_rate {
        row.iter_mut().for_each(|r| *r = 50.0);
    }
    let (patient, sink) = simulate(&config, 8);

    assert!(!patient.is_alive());
    assert_eq!(patient.general().death_month, Some(0));
    assert_eq!(patient.general().life_months, config.run.death_month_life_fraction);
    assert_eq!(sink.months.len(), 1);
    let (snapshot, events) = &sink.months[0];
    assert!(!snapshot.alive);
    let died_at = events
        .iter()
        .position(|e| matches!(e, SimEvent::PatientDied { .. }))
        .expect("PatientDied event");
    // Nothing but EndMonth runs after death, and EndMonth emits nothing
    // for a dead patient.
    assert_eq!(died_at, events.len() - 1);
}

#[test]
fn invariants_hold_for_a_whole_cohort() {
    let mut config = SimConfig::default_test();
    config.run.num_patients = 150;
    config.run.max_months = Some(48);
    let engine = SimEngine::build();
    let mut stats = CohortStats::new();
    for index in 0..config.run.num_patients {
        let mut rng = PatientRng::new(config.run.seed, index);
        let patient = engine
            .simulate_patient(index, &config, &mut rng, &mut stats)
            .expect("simulate");
        patient.check_invariants(&config.run).expect("invariants");
        if patient.general().cost > 0.0 {
            assert!(patient.general().discounted_cost <= patient.general().cost);
        }
    }
    assert_eq!(stats.num_patients(), 150);
}

/// A patient whose age draw lands past the age horizon still starts one
/// month below it and is closed after that single month.
#[test]
fn initial_age_starts_below_the_age_horizon() {
    let mut config = SimConfig::default_test();
    config.run.max_age_months = 600;
    config.cohort.initial_age_mean_months = 900.0;
    config.cohort.initial_age_sd_months = 0.0;
    for row in &mut config.nat_hist.background_death_rate {
        row.iter_mut().for_each(|r| *r = 0.0);
    }
    let (patient, sink) = simulate(&config, 2);

    let (_, first_events) = &sink.months[0];
    let created_age = first_events
        .iter()
        .find_map(|e| match e {
            SimEvent::PatientCreated { age_months, .. } => Some(*age_months),
            _ => None,
        })
        .expect("PatientCreated in month 0");
    assert_eq!(created_age, 599);
    assert_eq!(sink.months.len(), 1);
    assert_eq!(patient.general().age_months, 600);
    assert!(patient.general().horizon_reached);
}

/// The first OI and the asymptomatic to symptomatic upgrade land in the
/// same month, and no patient turns symptomatic without an OI.
#[test]
fn first_oi_and_symptomatic_upgrade_share_a_month() {
    let mut config = SimConfig::default_test();
    config.run.max_months = Some(60);
    config.cohort.hiv_prevalence = 1.0;
    for row in &mut config.cohort.oi_history_at_entry {
        row.iter_mut().for_each(|p| *p = 0.0);
    }
    for row in &mut config.nat_hist.background_death_rate {
        row.iter_mut().for_each(|r| *r = 0.0);
    }
    for table in [&mut config.nat_hist.oi_prob_no_history, &mut config.nat_hist.oi_prob_with_history] {
        for row in table.iter_mut() {
            row.iter_mut().for_each(|p| *p = 0.0);
            row[0] = 0.1;
        }
    }
    config.proph.prophs.iter_mut().for_each(|p| p.enabled = false);

    let mut with_oi = 0;
    for index in 0..30 {
        let (_, sink) = simulate(&config, index);
        let first_oi = sink.months.iter().find_map(|(_, events)| {
            events.iter().find_map(|e| match e {
                SimEvent::AcuteOiOccurred { month, .. } => Some(*month),
                _ => None,
            })
        });
        let first_symptomatic = sink
            .months
            .iter()
            .find(|(s, _)| s.hiv_state == HivState::SymptomaticChronic)
            .map(|(s, _)| s.month);
        assert_eq!(first_oi, first_symptomatic, "patient {index}");
        for (snapshot, _) in &sink.months {
            if snapshot.hiv_state == HivState::SymptomaticChronic {
                assert!(snapshot.oi_history_count > 0, "patient {index} month {}", snapshot.month);
            }
        }
        if first_oi.is_some() {
            with_oi += 1;
        }
    }
    assert!(with_oi > 0, "some patient should have had an OI");
}

/// A distribution that slips past validation still fails at use, and the
/// error names the patient it was drawn for.
#[test]
fn distribution_error_names_the_patient() {
    let mut config = SimConfig::default_test();
    config.cohort.cd4_response_type_distribution = vec![0.1, 0.1, 0.1, 0.1];
    let engine = SimEngine::build();
    let mut rng = PatientRng::new(config.run.seed, 7);
    let mut sink = CohortStats::new();

    match engine.simulate_patient(7, &config, &mut rng, &mut sink) {
        Err(SimError::DistributionSum { distribution, context, .. }) => {
            assert_eq!(distribution, "cohort.cd4_response_type_distribution");
            assert!(context.contains("patient=7"), "context was {context}");
        }
        other => panic!("expected DistributionSum, got {:?}", other.map(|p| p.month())),
    }
}
