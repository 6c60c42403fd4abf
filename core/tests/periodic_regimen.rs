use hivsim_core::{
    config::{EfficacyCurve, Formulation, SimConfig},
    engine::SimEngine,
    event::SimEvent,
    rng::PatientRng,
    snapshot::{MonthSnapshot, PatientOutcome},
    stats::StatisticsSink,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CapturingSink {
    snapshots: Vec<MonthSnapshot>,
    events:    Vec<SimEvent>,
}

impl StatisticsSink for CapturingSink {
    fn record_month(&mut self, snapshot: &MonthSnapshot, events: &[SimEvent]) {
        self.snapshots.push(snapshot.clone());
        self.events.extend_from_slice(events);
    }

    fn finalize(&mut self, _outcome: &PatientOutcome) {}
}

/// A single HIV-positive patient in care from month 0, guaranteed to
/// respond, on one long-acting line given every six months with a
/// one-month grace window. Everything that could interrupt the regimen
/// or end the simulation early is switched off.
fn periodic_config(prob_attend: f64) -> SimConfig {
    let mut config = SimConfig::default_test();
    config.run.max_months = Some(25);

    config.cohort.hiv_prevalence = 1.0;
    config.cohort.initial_cd4_sd = 0.0;
    config.cohort.prob_detected_at_entry = 1.0;
    config.cohort.prob_linked_at_entry = 1.0;
    config.cohort.clinic_visit_type_distribution = vec![0.0, 0.0, 1.0];
    for row in &mut config.cohort.oi_history_at_entry {
        row.iter_mut().for_each(|p| *p = 0.0);
    }

    for row in &mut config.nat_hist.background_death_rate {
        row.iter_mut().for_each(|r| *r = 0.0);
    }
    for table in [&mut config.nat_hist.oi_prob_no_history, &mut config.nat_hist.oi_prob_with_history] {
        for row in table.iter_mut() {
            row.iter_mut().for_each(|p| *p = 0.0);
        }
    }
    for row in &mut config.nat_hist.cd4_decline_sd {
        row.iter_mut().for_each(|sd| *sd = 0.0);
    }
    config.nat_hist.cd4_decline_between_subject_sd = 0.0;

    config.ltfu.enabled = false;
    config.tb.enabled = false;
    config.proph.prophs.iter_mut().for_each(|p| p.enabled = false);

    config.art.heterogeneity.baseline_logit_mean = 20.0;
    config.art.heterogeneity.baseline_logit_sd = 0.0;
    config.art.prob_attend_administration = prob_attend;

    let mut line = config.art.lines[0].clone();
    line.name = "long_acting".into();
    line.formulation = Formulation::Periodic {
        interval_months: 6,
        grace_months: 1,
        administration_cost: 3000.0,
        efficacy_curve: EfficacyCurve::Stepped { by_month: vec![1.0] },
    };
    line.toxicities.clear();
    line.stop.on_observed_failure = false;
    line.stop.max_months = None;
    config.art.lines = vec![line];

    config.validate().expect("periodic config must validate");
    config
}

fn simulate(config: &SimConfig) -> CapturingSink {
    let engine = SimEngine::build();
    let mut rng = PatientRng::new(config.run.seed, 0);
    let mut sink = CapturingSink::default();
    engine
        .simulate_patient(0, config, &mut rng, &mut sink)
        .expect("simulate patient");
    sink
}

fn administration_months(events: &[SimEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            SimEvent::ArtAdministered { month, .. } => Some(*month),
            _ => None,
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// With perfect attendance the dose is given at start and then every
/// interval, and the cost falls only in those months.
#[test]
fn doses_follow_the_interval_when_attended() {
    let config = periodic_config(1.0);
    let sink = simulate(&config);

    assert!(
        sink.events.iter().any(|e| matches!(e, SimEvent::ArtStarted { month: 0, line: 0, responder: true })),
        "ART should start in month 0 for a linked patient with no CD4 threshold"
    );
    assert_eq!(administration_months(&sink.events), vec![0, 6, 12, 18, 24]);
    assert!(!sink.events.iter().any(|e| matches!(e, SimEvent::ArtDoseMissed { .. })));

    for snap in &sink.snapshots {
        assert_eq!(snap.art_efficacy, 1.0, "month {}: efficacy should stay at 1", snap.month);
    }
}

/// Never attending after the first dose: the dose due at month 6 is
/// missed once the one-month grace window has passed, efficacy drops to
/// zero and the natural CD4 decline resumes.
#[test]
fn missed_dose_beyond_grace_drops_efficacy() {
    let config = periodic_config(0.0);
    let sink = simulate(&config);

    assert_eq!(administration_months(&sink.events), vec![0], "only the start dose is given");

    let missed: Vec<u32> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            SimEvent::ArtDoseMissed { month, .. } => Some(*month),
            _ => None,
        })
        .collect();
    assert_eq!(missed, vec![8], "dose due at 6 with grace 1 is missed at 8, reported once");

    for snap in &sink.snapshots {
        if snap.month < 8 {
            assert_eq!(snap.art_efficacy, 1.0, "month {}", snap.month);
        } else {
            assert_eq!(snap.art_efficacy, 0.0, "month {}", snap.month);
        }
    }

    // Progression reads last month's efficacy, so the decline shows from 9.
    let cd4: Vec<f64> = sink
        .snapshots
        .iter()
        .filter(|s| s.month >= 8)
        .map(|s| s.true_cd4.expect("HIV-positive patient has a CD4"))
        .collect();
    for pair in cd4.windows(2) {
        assert!(pair[1] < pair[0], "CD4 should decline every month after the missed dose: {cd4:?}");
    }
}

/// A periodic regimen only costs money in administration months.
#[test]
fn administration_cost_is_charged_per_dose() {
    let config = periodic_config(1.0);
    let sink = simulate(&config);

    let dosed: u32 = sink
        .events
        .iter()
        .filter_map(|e| match e {
            SimEvent::ArtAdministered { cost, .. } => Some(*cost),
            _ => None,
        })
        .map(|c| {
            assert_eq!(c, 3000.0);
            1
        })
        .sum();
    assert_eq!(dosed, 5);

    let routine = config.costs.routine_care_hiv_positive.iter().cloned().fold(f64::MAX, f64::min);
    for snap in &sink.snapshots {
        let administered = snap.month % 6 == 0;
        if administered {
            assert!(snap.month_cost >= 3000.0, "month {} cost {}", snap.month, snap.month_cost);
        } else {
            assert!(snap.month_cost < 3000.0, "month {} cost {}", snap.month, snap.month_cost);
            assert!(snap.month_cost >= routine);
        }
    }
}

/// A degrading curve: efficacy falls every month after a dose, is
/// restored by the next dose, and the dose cost lands only in dose months.
#[test]
fn linear_curve_degrades_between_doses() {
    let mut config = periodic_config(1.0);
    config.run.max_months = Some(13);
    config.art.lines[0].formulation = Formulation::Periodic {
        interval_months: 6,
        grace_months: 1,
        administration_cost: 5000.0,
        efficacy_curve: EfficacyCurve::Linear { initial: 1.0, at_interval: 0.4 },
    };
    config.validate().expect("linear curve config must validate");
    let sink = simulate(&config);

    assert_eq!(administration_months(&sink.events), vec![0, 6, 12]);
    assert_eq!(sink.snapshots.len(), 13);

    let efficacy: Vec<f64> = sink.snapshots.iter().map(|s| s.art_efficacy).collect();
    for dose in [0, 6, 12] {
        assert_eq!(efficacy[dose], 1.0, "efficacy restored at dose month {dose}: {efficacy:?}");
    }
    for since in 1..6 {
        let expected = 1.0 - 0.1 * since as f64;
        for dose in [0, 6] {
            let got = efficacy[dose + since];
            assert!((got - expected).abs() < 1e-9, "month {}: {got} vs {expected}", dose + since);
        }
    }
    for window in efficacy[0..6].windows(2).chain(efficacy[6..12].windows(2)) {
        assert!(window[1] < window[0], "efficacy must fall between doses: {efficacy:?}");
    }

    for snap in &sink.snapshots {
        if snap.month % 6 == 0 {
            assert!(snap.month_cost >= 5000.0, "month {} cost {}", snap.month, snap.month_cost);
        } else {
            assert!(snap.month_cost < 5000.0, "month {} cost {}", snap.month, snap.month_cost);
        }
    }
}
