//! The per-patient simulation engine.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!    1. BeginMonth
//!    2. HIVInfection
//!    3. ChronicConditions
//!    4. DrugToxicity
//!    5. TBDisease
//!    6. AcuteOpportunisticInfection
//!    7. Mortality
//!    8. CD4HVLProgression
//!    9. HIVTesting
//!   10. Behavior
//!   11. DrugEfficacy
//!   12. CD4Test
//!   13. HVLTest
//!   14. ClinicVisit
//!   15. TBClinicalCare
//!   16. EndMonth
//!
//! RULES:
//!   - Stages execute in registration order, once in the init pass and
//!     once per month.
//!   - Each stage sees all events emitted earlier in the same month.
//!   - After death, only stages that ask for it (EndMonth) still run.
//!   - All randomness flows through the patient's own RNG stream.
//!   - A patient is simulated to completion before the next one starts;
//!     patients never share state.

use crate::{
    acute_oi_updater::AcuteOiUpdater,
    begin_month_updater::BeginMonthUpdater,
    behavior_updater::BehaviorUpdater,
    cd4_hvl_updater::Cd4HvlUpdater,
    cd4_test_updater::Cd4TestUpdater,
    chronic_condition_updater::ChronicConditionUpdater,
    clinic_visit_updater::ClinicVisitUpdater,
    config::SimConfig,
    drug_efficacy_updater::DrugEfficacyUpdater,
    drug_toxicity_updater::DrugToxicityUpdater,
    end_month_updater::EndMonthUpdater,
    error::{SimError, SimResult},
    event::SimEvent,
    hiv_infection_updater::HivInfectionUpdater,
    hiv_testing_updater::HivTestingUpdater,
    hvl_test_updater::HvlTestUpdater,
    mortality_updater::MortalityUpdater,
    patient::PatientState,
    rng::PatientRng,
    stats::StatisticsSink,
    tb_clinical_care_updater::TbClinicalCareUpdater,
    tb_disease_updater::TbDiseaseUpdater,
    types::PatientIndex,
    updater::{StageContext, StageSlot, Updater},
};

pub struct SimEngine {
    stages: Vec<(StageSlot, Box<dyn Updater>)>,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::build()
    }
}

impl SimEngine {
    /// An engine with no stages. Use `build()` for the standard pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Build a fully wired engine with all sixteen stages registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build() -> Self {
        let mut engine = SimEngine::new();

        // EXECUTION ORDER is fixed. Never reorder.
        engine.register(StageSlot::BeginMonth, Box::new(BeginMonthUpdater));
        engine.register(StageSlot::HivInfection, Box::new(HivInfectionUpdater::new()));
        engine.register(StageSlot::ChronicConditions, Box::new(ChronicConditionUpdater));
        engine.register(StageSlot::DrugToxicity, Box::new(DrugToxicityUpdater));
        engine.register(StageSlot::TbDisease, Box::new(TbDiseaseUpdater));
        engine.register(StageSlot::AcuteOi, Box::new(AcuteOiUpdater));
        engine.register(StageSlot::Mortality, Box::new(MortalityUpdater));
        engine.register(StageSlot::Cd4HvlProgression, Box::new(Cd4HvlUpdater));
        engine.register(StageSlot::HivTesting, Box::new(HivTestingUpdater));
        engine.register(StageSlot::Behavior, Box::new(BehaviorUpdater));
        engine.register(StageSlot::DrugEfficacy, Box::new(DrugEfficacyUpdater));
        engine.register(StageSlot::Cd4Testing, Box::new(Cd4TestUpdater));
        engine.register(StageSlot::HvlTesting, Box::new(HvlTestUpdater));
        engine.register(StageSlot::ClinicVisit, Box::new(ClinicVisitUpdater));
        engine.register(StageSlot::TbClinicalCare, Box::new(TbClinicalCareUpdater));
        engine.register(StageSlot::EndMonth, Box::new(EndMonthUpdater));
        engine
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, slot: StageSlot, updater: Box<dyn Updater>) {
        self.stages.push((slot, updater));
    }

    pub fn stage_slots(&self) -> Vec<StageSlot> {
        self.stages.iter().map(|(slot, _)| *slot).collect()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(_, stage)| stage.name()).collect()
    }

    /// Simulate one patient from creation until death or the horizon.
    ///
    /// Events emitted by the init pass are carried into month 0, so the
    /// first month's statistics see them.
    pub fn simulate_patient(
        &self,
        index: PatientIndex,
        config: &SimConfig,
        rng: &mut PatientRng,
        sink: &mut dyn StatisticsSink,
    ) -> SimResult<PatientState> {
        let mut patient = PatientState::new(index);
        rng.set_month(patient.month());
        let mut ctx = StageContext { config, rng, sink };

        let mut carried: Vec<SimEvent> = Vec::new();
        for (_, stage) in &self.stages {
            let new_events = stage.run_init(&mut patient, &carried, &mut ctx)?;
            carried.extend(new_events);
        }

        while !patient.is_finished() {
            let month = patient.month();
            ctx.rng.set_month(month);
            let mut month_events = std::mem::take(&mut carried);
            for (_, stage) in &self.stages {
                if !patient.is_alive() && !stage.runs_after_death() {
                    continue;
                }
                let new_events = stage.run_monthly(&mut patient, &month_events, &mut ctx)?;
                for event in &new_events {
                    log::trace!("month={month} patient={index} {}: {}", stage.name(), event.type_name());
                }
                month_events.extend(new_events);
            }
            if patient.is_alive() && patient.month() == month && !patient.is_finished() {
                return Err(SimError::InvariantViolation {
                    patient: index,
                    detail: format!("month {month} did not advance; is EndMonth registered?"),
                });
            }
        }
        log::debug!(
            "patient={index} finished at month={} alive={}",
            patient.month(),
            patient.is_alive()
        );
        Ok(patient)
    }
}
