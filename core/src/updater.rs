//! Updater trait and stage registry.
//!
//! RULE: Every pipeline stage implements Updater.
//! The engine calls each registered updater in registration order, once in
//! the init pass and once per simulated month.
//! Execution order is fixed and documented in engine.rs.
//!
//! Updaters hold no per-patient state. Everything they read or write lives
//! in `PatientState`; everything random comes from the context's RNG.

use crate::{
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    rng::PatientRng,
    stats::StatisticsSink,
};

/// Position of each stage in the pipeline. Append only, never reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageSlot {
    BeginMonth,
    HivInfection,
    ChronicConditions,
    DrugToxicity,
    TbDisease,
    AcuteOi,
    Mortality,
    Cd4HvlProgression,
    HivTesting,
    Behavior,
    DrugEfficacy,
    Cd4Testing,
    HvlTesting,
    ClinicVisit,
    TbClinicalCare,
    EndMonth,
}

impl StageSlot {
    pub const ALL: [StageSlot; 16] = [
        Self::BeginMonth,
        Self::HivInfection,
        Self::ChronicConditions,
        Self::DrugToxicity,
        Self::TbDisease,
        Self::AcuteOi,
        Self::Mortality,
        Self::Cd4HvlProgression,
        Self::HivTesting,
        Self::Behavior,
        Self::DrugEfficacy,
        Self::Cd4Testing,
        Self::HvlTesting,
        Self::ClinicVisit,
        Self::TbClinicalCare,
        Self::EndMonth,
    ];
}

/// Everything an updater may touch besides the patient.
pub struct StageContext<'a> {
    pub config: &'a SimConfig,
    pub rng:    &'a mut PatientRng,
    pub sink:   &'a mut dyn StatisticsSink,
}

/// The contract every pipeline stage must fulfill.
pub trait Updater: Send + Sync {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Called once when the patient is created.
    ///
    /// - `events_in`: events emitted by earlier stages in this pass
    ///
    /// Stages with nothing to initialise return an empty vec and must not
    /// touch the patient or draw.
    fn run_init(
        &self,
        patient: &mut PatientState,
        events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>>;

    /// Called once per simulated month.
    ///
    /// Returns the new events to append to the month's event list.
    fn run_monthly(
        &self,
        patient: &mut PatientState,
        events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>>;

    /// Whether the stage still runs in the month the patient died.
    fn runs_after_death(&self) -> bool {
        false
    }
}
