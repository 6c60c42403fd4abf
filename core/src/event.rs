//! The per-patient event bus.
//!
//! RULE: Updaters communicate ONLY through events and `PatientState`.
//! An updater may never call another updater directly. Each updater sees
//! the events emitted earlier in the same month; the full list for the
//! month is handed to the statistics sink by EndMonth.

use crate::{
    config::ToxSeverity,
    patient::VerticalTransmission,
    types::{
        DeathCause, Gender, HvlStratum, Month, OiType, PatientKind, RegimenStatus, TbState,
        TbStrain,
    },
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionRoute {
    AtEntry,
    OpportunisticInfection,
    HivTest,
}

/// Every event emitted during a patient simulation.
/// Variants are added, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Lifecycle ──────────────────────────────────
    PatientCreated {
        age_months: Month,
        gender: Gender,
        kind: PatientKind,
    },
    PatientDied {
        month: Month,
        cause: DeathCause,
        death_probability: f64,
    },
    HorizonReached {
        month: Month,
    },

    // ── Disease ────────────────────────────────────
    HivInfected {
        month: Month,
        at_entry: bool,
        cd4: f64,
        hvl: HvlStratum,
    },
    VerticalTransmission {
        month: Month,
        mode: VerticalTransmission,
    },
    AcutePhaseEnded {
        month: Month,
    },
    AcuteOiOccurred {
        month: Month,
        oi: OiType,
        severe: bool,
    },
    ChronicConditionOnset {
        month: Month,
        condition: usize,
    },
    TbStateChanged {
        month: Month,
        from: TbState,
        to: TbState,
        strain: Option<TbStrain>,
    },

    // ── Care cascade ───────────────────────────────
    HivTestPerformed {
        month: Month,
        positive_result: bool,
        result_received: bool,
    },
    HivDetected {
        month: Month,
        route: DetectionRoute,
    },
    LinkedToCare {
        month: Month,
    },
    LostToFollowUp {
        month: Month,
    },
    ReturnedToCare {
        month: Month,
    },
    Cd4Tested {
        month: Month,
        observed: f64,
    },
    HvlTested {
        month: Month,
        observed: HvlStratum,
    },
    ObservedFailure {
        month: Month,
        line: usize,
    },

    // ── Treatment ──────────────────────────────────
    ArtStarted {
        month: Month,
        line: usize,
        responder: bool,
    },
    ArtStopped {
        month: Month,
        line: usize,
        status: RegimenStatus,
    },
    ArtAdministered {
        month: Month,
        line: usize,
        cost: f64,
    },
    ArtDoseMissed {
        month: Month,
        line: usize,
    },
    ArtSuppressed {
        month: Month,
        line: usize,
    },
    ArtFailed {
        month: Month,
        line: usize,
    },
    ArtToxicity {
        month: Month,
        line: usize,
        toxicity: usize,
        severity: ToxSeverity,
    },
    ProphStarted {
        month: Month,
        oi: OiType,
        secondary: bool,
    },
    ProphStopped {
        month: Month,
        oi: OiType,
        status: RegimenStatus,
    },
    ProphToxicity {
        month: Month,
        oi: OiType,
    },
    TbDiagnosed {
        month: Month,
    },
    TbTreatmentStarted {
        month: Month,
    },
    TbTreatmentEnded {
        month: Month,
        status: RegimenStatus,
        cured: bool,
    },
    TbTreatmentToxicity {
        month: Month,
    },
    TbProphStarted {
        month: Month,
    },
    TbProphEnded {
        month: Month,
    },
}

impl SimEvent {
    /// Stable name used as the event type in logs and storage.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PatientCreated { .. }        => "patient_created",
            Self::PatientDied { .. }           => "patient_died",
            Self::HorizonReached { .. }        => "horizon_reached",
            Self::HivInfected { .. }           => "hiv_infected",
            Self::VerticalTransmission { .. }  => "vertical_transmission",
            Self::AcutePhaseEnded { .. }       => "acute_phase_ended",
            Self::AcuteOiOccurred { .. }       => "acute_oi_occurred",
            Self::ChronicConditionOnset { .. } => "chronic_condition_onset",
            Self::TbStateChanged { .. }        => "tb_state_changed",
            Self::HivTestPerformed { .. }      => "hiv_test_performed",
            Self::HivDetected { .. }           => "hiv_detected",
            Self::LinkedToCare { .. }          => "linked_to_care",
            Self::LostToFollowUp { .. }        => "lost_to_follow_up",
            Self::ReturnedToCare { .. }        => "returned_to_care",
            Self::Cd4Tested { .. }             => "cd4_tested",
            Self::HvlTested { .. }             => "hvl_tested",
            Self::ObservedFailure { .. }       => "observed_failure",
            Self::ArtStarted { .. }            => "art_started",
            Self::ArtStopped { .. }            => "art_stopped",
            Self::ArtAdministered { .. }       => "art_administered",
            Self::ArtDoseMissed { .. }         => "art_dose_missed",
            Self::ArtSuppressed { .. }         => "art_suppressed",
            Self::ArtFailed { .. }             => "art_failed",
            Self::ArtToxicity { .. }           => "art_toxicity",
            Self::ProphStarted { .. }          => "proph_started",
            Self::ProphStopped { .. }          => "proph_stopped",
            Self::ProphToxicity { .. }         => "proph_toxicity",
            Self::TbDiagnosed { .. }           => "tb_diagnosed",
            Self::TbTreatmentStarted { .. }    => "tb_treatment_started",
            Self::TbTreatmentEnded { .. }      => "tb_treatment_ended",
            Self::TbTreatmentToxicity { .. }   => "tb_treatment_toxicity",
            Self::TbProphStarted { .. }        => "tb_proph_started",
            Self::TbProphEnded { .. }          => "tb_proph_ended",
        }
    }
}
