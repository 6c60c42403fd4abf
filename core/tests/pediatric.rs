use hivsim_core::{
    config::SimConfig,
    engine::SimEngine,
    patient::{PatientState, VerticalTransmission},
    rng::PatientRng,
    stats::CohortStats,
    types::PatientKind,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Newborns with pediatric rules on, no background deaths and no adult
/// incidence unless a test turns it on.
fn newborn_config() -> SimConfig {
    let mut config = SimConfig::default_test();
    config.run.max_months = Some(24);
    config.cohort.initial_age_mean_months = 0.0;
    config.cohort.initial_age_sd_months = 0.0;
    config.incidence.enabled = false;
    for row in &mut config.nat_hist.background_death_rate {
        row.iter_mut().for_each(|r| *r = 0.0);
    }

    config.peds.enabled = true;
    config.peds.age_threshold_months = 120;
    config.peds.prob_mother_hiv_positive = 1.0;
    config.peds.prob_breastfeeding = 0.0;
    config.peds.prob_in_utero = 0.0;
    config.peds.prob_intrapartum = 0.0;
    config.peds.monthly_prob_postpartum = 0.0;
    config
}

fn simulate_cohort(config: &SimConfig, patients: u64) -> Vec<PatientState> {
    config.validate().expect("pediatric config must validate");
    let engine = SimEngine::build();
    let mut stats = CohortStats::new();
    (0..patients)
        .map(|index| {
            let mut rng = PatientRng::new(config.run.seed, index);
            engine
                .simulate_patient(index, config, &mut rng, &mut stats)
                .expect("simulate patient")
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The kind is fixed at creation from the age draw.
#[test]
fn newborns_are_pediatric_and_adults_are_not() {
    let config = newborn_config();
    for patient in simulate_cohort(&config, 20) {
        assert_eq!(patient.general().kind, PatientKind::Pediatric);
    }

    let mut adults = newborn_config();
    adults.cohort.initial_age_mean_months = 240.0;
    for patient in simulate_cohort(&adults, 20) {
        assert_eq!(patient.general().kind, PatientKind::Adult);
    }

    let mut disabled = newborn_config();
    disabled.peds.enabled = false;
    for patient in simulate_cohort(&disabled, 20) {
        assert_eq!(patient.general().kind, PatientKind::Adult);
    }
}

/// In-utero and intrapartum transmission happen at creation and count as
/// infections present at entry.
#[test]
fn perinatal_transmission_is_infection_at_entry() {
    let mut config = newborn_config();
    config.peds.prob_in_utero = 0.5;
    config.peds.prob_intrapartum = 0.5;

    let patients = simulate_cohort(&config, 100);
    let mut modes = Vec::new();
    for patient in &patients {
        assert!(patient.is_hiv_positive(), "patient {}", patient.index());
        assert!(patient.disease().infected_at_entry);
        assert_eq!(patient.disease().infection_month, Some(0));
        let mode = patient.peds().vertical_transmission.expect("transmission mode");
        assert_ne!(mode, VerticalTransmission::Postpartum);
        modes.push(mode);
    }
    assert!(modes.contains(&VerticalTransmission::InUtero));
    assert!(modes.contains(&VerticalTransmission::Intrapartum));
}

/// Postpartum infection needs breastfeeding, and stops once breastfeeding
/// ends.
#[test]
fn postpartum_infection_only_while_breastfeeding() {
    let mut never_fed = newborn_config();
    never_fed.peds.monthly_prob_postpartum = 1.0;
    assert!(simulate_cohort(&never_fed, 50).iter().all(|p| !p.is_hiv_positive()));

    let mut fed = newborn_config();
    fed.peds.prob_breastfeeding = 1.0;
    fed.peds.breastfeeding_duration_months = 6;
    fed.peds.monthly_prob_postpartum = 0.2;

    let patients = simulate_cohort(&fed, 300);
    let mut infected = 0;
    for patient in &patients {
        if !patient.is_hiv_positive() {
            assert!(!patient.peds().breastfeeding, "breastfeeding must have ended");
            continue;
        }
        infected += 1;
        let month = patient.disease().infection_month.expect("infection month");
        assert!(month < 6, "patient {} infected at month {month}", patient.index());
        assert!(!patient.disease().infected_at_entry);
        assert_eq!(patient.peds().vertical_transmission, Some(VerticalTransmission::Postpartum));
    }
    assert!(infected > 0 && infected < patients.len());
}

/// Past the age threshold a pediatric patient follows the adult
/// incidence rule.
#[test]
fn adult_incidence_applies_after_age_threshold() {
    let mut config = newborn_config();
    config.peds.age_threshold_months = 12;
    config.peds.prob_mother_hiv_positive = 0.0;
    config.incidence.enabled = true;
    for row in &mut config.incidence.monthly_incidence {
        row.iter_mut().for_each(|p| *p = 1.0);
    }

    for patient in simulate_cohort(&config, 40) {
        assert_eq!(patient.general().kind, PatientKind::Pediatric);
        assert!(patient.is_hiv_positive());
        assert_eq!(patient.disease().infection_month, Some(12), "patient {}", patient.index());
        assert_eq!(patient.peds().vertical_transmission, None);
    }
}
