//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};

/// A simulated month. Month 0 is the patient's first monthly pass.
pub type Month = u32;

/// Stable index of a patient within a run. Also keys the patient's RNG stream.
pub type PatientIndex = u64;

pub const CD4_NUM_STRATA: usize = 6;
pub const HVL_NUM_STRATA: usize = 7;
pub const OI_NUM: usize = 15;
pub const CHRM_NUM: usize = 10;
pub const RISK_FACT_NUM: usize = 5;
pub const GENDER_NUM: usize = 2;
pub const CD4_RESPONSE_NUM_TYPES: usize = 4;
pub const TB_NUM_STRAINS: usize = 3;
pub const AGE_YEARS_NUM: usize = 101;
pub const DEATH_CAUSE_NUM: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn index(self) -> usize {
        match self {
            Self::Male => 0,
            Self::Female => 1,
        }
    }
}

/// HIV status. The symptomatic/asymptomatic split is derived from OI history
/// and is only ever changed through `PatientState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HivState {
    Negative,
    AcutePositive,
    AsymptomaticChronic,
    SymptomaticChronic,
}

impl HivState {
    pub fn is_positive(self) -> bool {
        !matches!(self, Self::Negative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cd4Stratum {
    VeryLow,
    Low,
    MidLow,
    MidHigh,
    High,
    VeryHigh,
}

impl Cd4Stratum {
    pub const ALL: [Cd4Stratum; CD4_NUM_STRATA] = [
        Self::VeryLow,
        Self::Low,
        Self::MidLow,
        Self::MidHigh,
        Self::High,
        Self::VeryHigh,
    ];

    /// The one binning rule for CD4 counts: the first stratum whose upper
    /// bound is strictly greater than `count`, otherwise `VeryHigh`.
    pub fn from_count(count: f64, upper_bounds: &[f64]) -> Self {
        upper_bounds
            .iter()
            .position(|&bound| count < bound)
            .map(|i| Self::ALL[i.min(CD4_NUM_STRATA - 1)])
            .unwrap_or(Self::VeryHigh)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvlStratum {
    VeryLow,
    Low,
    MidLow,
    Medium,
    MidHigh,
    High,
    VeryHigh,
}

impl HvlStratum {
    pub const ALL: [HvlStratum; HVL_NUM_STRATA] = [
        Self::VeryLow,
        Self::Low,
        Self::MidLow,
        Self::Medium,
        Self::MidHigh,
        Self::High,
        Self::VeryHigh,
    ];

    /// Bin an enumerated stratum index, clamping into range.
    pub fn from_index(index: i64) -> Self {
        Self::ALL[index.clamp(0, HVL_NUM_STRATA as i64 - 1) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn step_up(self) -> Self {
        Self::from_index(self.index() as i64 + 1)
    }

    pub fn step_down(self) -> Self {
        Self::from_index(self.index() as i64 - 1)
    }
}

/// One of the `OI_NUM` opportunistic infection types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OiType(pub u8);

impl OiType {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = OiType> {
        (0..OI_NUM as u8).map(OiType)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TbState {
    Uninfected,
    Latent,
    ActivePulmonary,
    ActiveExtrapulmonary,
    PreviouslyTreated,
    TreatmentDefault,
}

impl TbState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::ActivePulmonary | Self::ActiveExtrapulmonary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TbStrain {
    DrugSensitive,
    Mdr,
    Xdr,
}

impl TbStrain {
    pub const ALL: [TbStrain; TB_NUM_STRAINS] = [Self::DrugSensitive, Self::Mdr, Self::Xdr];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicVisitType {
    NoTreatment,
    ProphylaxisOnly,
    FullTreatment,
}

impl ClinicVisitType {
    pub const ALL: [ClinicVisitType; 3] =
        [Self::NoTreatment, Self::ProphylaxisOnly, Self::FullTreatment];

    pub fn allows_art(self) -> bool {
        matches!(self, Self::FullTreatment)
    }

    pub fn allows_proph(self) -> bool {
        !matches!(self, Self::NoTreatment)
    }
}

/// Lifecycle of a single treatment axis (ART, one OI prophylaxis, TB treatment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimenStatus {
    NotStarted,
    Active,
    StoppedByPolicy,
    StoppedByToxicity,
    StoppedByFailure,
}

impl RegimenStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Background,
    HivDisease,
    AcuteOi,
    TbDisease,
    DrugToxicity,
    ChronicCondition,
    RiskFactor,
}

impl DeathCause {
    pub const ALL: [DeathCause; DEATH_CAUSE_NUM] = [
        Self::Background,
        Self::HivDisease,
        Self::AcuteOi,
        Self::TbDisease,
        Self::DrugToxicity,
        Self::ChronicCondition,
        Self::RiskFactor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::HivDisease => "hiv_disease",
            Self::AcuteOi => "acute_oi",
            Self::TbDisease => "tb_disease",
            Self::DrugToxicity => "drug_toxicity",
            Self::ChronicCondition => "chronic_condition",
            Self::RiskFactor => "risk_factor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Which infection strategy governs a patient. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientKind {
    Adult,
    Pediatric,
}
