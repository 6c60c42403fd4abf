//! Per-patient simulation state.
//!
//! RULE: Updaters read the sub-records through shared references only.
//! Every mutation goes through a named method on `PatientState`, which is
//! where the state invariants are enforced:
//!   - CD4 stratum is always `Cd4Stratum::from_count(true_cd4)`.
//!   - True CD4 is clamped to [0, max_patient_cd4] on every write.
//!   - HIV-negative patients carry no CD4/HVL values and no OI history.
//!   - Linkage requires detection.
//!   - Recording an OI re-evaluates the asymptomatic/symptomatic split.

use crate::{
    config::RunConfig,
    error::{SimError, SimResult},
    types::{
        Cd4Stratum, ClinicVisitType, DeathCause, Gender, HivState, HvlStratum, Month, OiType,
        PatientIndex, PatientKind, RegimenStatus, TbState, TbStrain, CHRM_NUM, OI_NUM,
        RISK_FACT_NUM,
    },
};
use serde::{Deserialize, Serialize};

// ── Sub-records ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralState {
    pub index:             PatientIndex,
    pub kind:              PatientKind,
    pub month:             Month,
    pub age_months:        Month,
    pub gender:            Gender,
    pub risk_factors:      [bool; RISK_FACT_NUM],
    pub alive:             bool,
    pub cause_of_death:    Option<DeathCause>,
    pub death_month:       Option<Month>,
    pub horizon_reached:   bool,
    pub cost:              f64,
    pub discounted_cost:   f64,
    pub life_months:       f64,
    pub discounted_qalms:  f64,
    /// Undiscounted cost incurred in the current month.
    pub month_cost:        f64,
    /// Product of QOL modifiers applied this month.
    pub month_qol_modifier: f64,
    /// Death rate ratios registered by earlier stages this month.
    pub month_death_rate_ratios: Vec<(DeathCause, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseState {
    pub hiv_state:          HivState,
    pub infection_month:    Option<Month>,
    pub infected_at_entry:  bool,
    pub true_cd4:           Option<f64>,
    pub cd4_stratum:        Option<Cd4Stratum>,
    pub hvl:                Option<HvlStratum>,
    pub setpoint_hvl:       Option<HvlStratum>,
    /// Per-patient offset on the monthly CD4 decline.
    pub cd4_decline_offset: f64,
    pub oi_history:         [bool; OI_NUM],
    pub oi_last_month:      [Option<Month>; OI_NUM],
    pub acute_oi_this_month: Option<OiType>,
    pub num_ois:            u32,
    pub symptomatic_since:  Option<Month>,
    pub chronic_conditions: [bool; CHRM_NUM],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringState {
    pub detected:          bool,
    pub detection_month:   Option<Month>,
    pub linked:            bool,
    pub linkage_month:     Option<Month>,
    pub lost_to_follow_up: bool,
    pub visit_type:        ClinicVisitType,
    pub cd4_response_type: usize,
    pub ltfu_logit:        f64,
    pub observed_cd4:      Option<f64>,
    pub last_cd4_test:     Option<Month>,
    pub observed_hvl:      Option<HvlStratum>,
    pub last_hvl_test:     Option<Month>,
    pub observed_failure:  bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtState {
    pub line:              Option<usize>,
    pub status:            RegimenStatus,
    pub lines_started:     usize,
    pub start_month:       Option<Month>,
    pub stop_month:        Option<Month>,
    pub first_start_month: Option<Month>,
    /// Logit-scale baseline drawn once per patient.
    pub response_baseline_logit: f64,
    pub responder:         bool,
    pub suppressed:        bool,
    pub failed:            bool,
    pub efficacy:          f64,
    pub last_administration: Option<Month>,
    pub next_due:          Option<Month>,
    pub missed_dose:       bool,
    /// Stopped because the patient left care; the same line resumes.
    pub interrupted:       bool,
    /// Toxicities already experienced on the current line.
    pub toxicities_seen:   Vec<bool>,
}

impl ArtState {
    pub fn months_on_line(&self, month: Month) -> Month {
        self.start_month.map_or(0, |s| month.saturating_sub(s))
    }

    /// Line the next start would use: the interrupted line again, else the
    /// line after the last one.
    pub fn next_line(&self) -> usize {
        match self.line {
            None => 0,
            Some(line) if self.interrupted => line,
            Some(line) => line + 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProphState {
    pub status:      [RegimenStatus; OI_NUM],
    pub secondary:   [bool; OI_NUM],
    pub start_month: [Option<Month>; OI_NUM],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TbRecord {
    pub state:              TbState,
    pub strain:             Option<TbStrain>,
    pub diagnosed:          bool,
    pub treatment:          RegimenStatus,
    pub treatment_start:    Option<Month>,
    pub proph:              RegimenStatus,
    pub proph_start:        Option<Month>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalTransmission {
    InUtero,
    Intrapartum,
    Postpartum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedsState {
    pub mother_hiv_positive:   bool,
    pub breastfeeding:         bool,
    pub vertical_transmission: Option<VerticalTransmission>,
}

// ── PatientState ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientState {
    general:    GeneralState,
    disease:    DiseaseState,
    monitoring: MonitoringState,
    art:        ArtState,
    proph:      ProphState,
    tb:         TbRecord,
    peds:       PedsState,
}

impl PatientState {
    pub fn new(index: PatientIndex) -> Self {
        Self {
            general: GeneralState {
                index,
                kind: PatientKind::Adult,
                month: 0,
                age_months: 0,
                gender: Gender::Male,
                risk_factors: [false; RISK_FACT_NUM],
                alive: true,
                cause_of_death: None,
                death_month: None,
                horizon_reached: false,
                cost: 0.0,
                discounted_cost: 0.0,
                life_months: 0.0,
                discounted_qalms: 0.0,
                month_cost: 0.0,
                month_qol_modifier: 1.0,
                month_death_rate_ratios: Vec::new(),
            },
            disease: DiseaseState {
                hiv_state: HivState::Negative,
                infection_month: None,
                infected_at_entry: false,
                true_cd4: None,
                cd4_stratum: None,
                hvl: None,
                setpoint_hvl: None,
                cd4_decline_offset: 0.0,
                oi_history: [false; OI_NUM],
                oi_last_month: [None; OI_NUM],
                acute_oi_this_month: None,
                num_ois: 0,
                symptomatic_since: None,
                chronic_conditions: [false; CHRM_NUM],
            },
            monitoring: MonitoringState {
                detected: false,
                detection_month: None,
                linked: false,
                linkage_month: None,
                lost_to_follow_up: false,
                visit_type: ClinicVisitType::FullTreatment,
                cd4_response_type: 0,
                ltfu_logit: 0.0,
                observed_cd4: None,
                last_cd4_test: None,
                observed_hvl: None,
                last_hvl_test: None,
                observed_failure: false,
            },
            art: ArtState {
                line: None,
                status: RegimenStatus::NotStarted,
                lines_started: 0,
                start_month: None,
                stop_month: None,
                first_start_month: None,
                response_baseline_logit: 0.0,
                responder: false,
                suppressed: false,
                failed: false,
                efficacy: 0.0,
                last_administration: None,
                next_due: None,
                missed_dose: false,
                interrupted: false,
                toxicities_seen: Vec::new(),
            },
            proph: ProphState {
                status: [RegimenStatus::NotStarted; OI_NUM],
                secondary: [false; OI_NUM],
                start_month: [None; OI_NUM],
            },
            tb: TbRecord {
                state: TbState::Uninfected,
                strain: None,
                diagnosed: false,
                treatment: RegimenStatus::NotStarted,
                treatment_start: None,
                proph: RegimenStatus::NotStarted,
                proph_start: None,
            },
            peds: PedsState {
                mother_hiv_positive: false,
                breastfeeding: false,
                vertical_transmission: None,
            },
        }
    }

    // ── Read access ────────────────────────────────────────────────

    pub fn general(&self) -> &GeneralState {
        &self.general
    }
    pub fn disease(&self) -> &DiseaseState {
        &self.disease
    }
    pub fn monitoring(&self) -> &MonitoringState {
        &self.monitoring
    }
    pub fn art(&self) -> &ArtState {
        &self.art
    }
    pub fn proph(&self) -> &ProphState {
        &self.proph
    }
    pub fn tb(&self) -> &TbRecord {
        &self.tb
    }
    pub fn peds(&self) -> &PedsState {
        &self.peds
    }

    pub fn index(&self) -> PatientIndex {
        self.general.index
    }
    pub fn month(&self) -> Month {
        self.general.month
    }
    pub fn is_alive(&self) -> bool {
        self.general.alive
    }
    /// Dead or past the horizon: no further monthly passes.
    pub fn is_finished(&self) -> bool {
        !self.general.alive || self.general.horizon_reached
    }
    pub fn age_years(&self) -> f64 {
        self.general.age_months as f64 / 12.0
    }
    pub fn is_hiv_positive(&self) -> bool {
        self.disease.hiv_state.is_positive()
    }
    pub fn on_art(&self) -> bool {
        self.art.status.is_active()
    }
    /// In care: linked and not currently lost to follow-up.
    pub fn in_care(&self) -> bool {
        self.monitoring.linked && !self.monitoring.lost_to_follow_up
    }
    pub fn has_oi_history(&self) -> bool {
        self.disease.oi_history.iter().any(|&h| h)
    }
    pub fn has_severe_oi_history(&self, severe: &[bool]) -> bool {
        self.disease
            .oi_history
            .iter()
            .zip(severe)
            .any(|(&h, &s)| h && s)
    }

    // ── General ────────────────────────────────────────────────────

    pub fn set_demographics(&mut self, age_months: Month, gender: Gender, kind: PatientKind) {
        self.general.age_months = age_months;
        self.general.gender = gender;
        self.general.kind = kind;
    }

    pub fn set_risk_factor(&mut self, factor: usize) {
        if let Some(flag) = self.general.risk_factors.get_mut(factor) {
            *flag = true;
        }
    }

    /// Clear the per-month accumulators. First thing in every monthly pass.
    pub fn begin_month(&mut self) {
        self.general.month_cost = 0.0;
        self.general.month_qol_modifier = 1.0;
        self.general.month_death_rate_ratios.clear();
        self.disease.acute_oi_this_month = None;
    }

    /// Add an undiscounted cost incurred this month.
    pub fn add_cost(&mut self, amount: f64, run: &RunConfig) {
        if amount == 0.0 {
            return;
        }
        self.general.month_cost += amount;
        self.general.cost += amount;
        self.general.discounted_cost += amount * run.discount(self.general.month);
    }

    pub fn add_death_rate_ratio(&mut self, cause: DeathCause, ratio: f64) {
        self.general.month_death_rate_ratios.push((cause, ratio));
    }

    pub fn apply_qol_modifier(&mut self, modifier: f64) {
        self.general.month_qol_modifier *= modifier;
    }

    /// Credit `fraction` of a life month at quality `qol`.
    pub fn accrue_life(&mut self, fraction: f64, qol: f64, run: &RunConfig) {
        self.general.life_months += fraction;
        self.general.discounted_qalms +=
            fraction * qol * self.general.month_qol_modifier * run.discount(self.general.month);
    }

    pub fn mark_dead(&mut self, cause: DeathCause) {
        self.general.alive = false;
        self.general.cause_of_death = Some(cause);
        self.general.death_month = Some(self.general.month);
    }

    /// Close the month: advance the clock and age.
    pub fn advance_month(&mut self) {
        self.general.month += 1;
        self.general.age_months += 1;
    }

    pub fn mark_horizon_reached(&mut self) {
        self.general.horizon_reached = true;
    }

    // ── Disease ────────────────────────────────────────────────────

    /// Make the patient HIV-positive. `acute` selects acute infection;
    /// otherwise the patient enters as chronic (symptomatic only once an
    /// OI is recorded).
    pub fn infect(
        &mut self,
        acute: bool,
        cd4: f64,
        hvl: HvlStratum,
        decline_offset: f64,
        at_entry: bool,
        run: &RunConfig,
    ) {
        self.disease.hiv_state = if acute {
            HivState::AcutePositive
        } else {
            HivState::AsymptomaticChronic
        };
        self.disease.infection_month = Some(self.general.month);
        self.disease.infected_at_entry = at_entry;
        self.disease.hvl = Some(hvl);
        self.disease.setpoint_hvl = Some(hvl);
        self.disease.cd4_decline_offset = decline_offset;
        self.set_true_cd4(cd4, run);
    }

    /// Write the true CD4 count. Clamps and re-bins in one place.
    pub fn set_true_cd4(&mut self, value: f64, run: &RunConfig) {
        if !self.is_hiv_positive() {
            return;
        }
        let clamped = if value.is_finite() {
            value.clamp(0.0, run.max_patient_cd4)
        } else {
            0.0
        };
        self.disease.true_cd4 = Some(clamped);
        self.disease.cd4_stratum = Some(Cd4Stratum::from_count(clamped, &run.cd4_strata_upper_bounds));
    }

    pub fn set_hvl(&mut self, hvl: HvlStratum) {
        if self.is_hiv_positive() {
            self.disease.hvl = Some(hvl);
        }
    }

    /// End the acute phase. Symptomatic if any OI was recorded meanwhile.
    pub fn end_acute_phase(&mut self) {
        if self.disease.hiv_state == HivState::AcutePositive {
            if self.has_oi_history() {
                self.disease.hiv_state = HivState::SymptomaticChronic;
                self.disease.symptomatic_since = Some(self.general.month);
            } else {
                self.disease.hiv_state = HivState::AsymptomaticChronic;
            }
        }
    }

    /// Record an OI. `acute` marks it as this month's event; `false` is used
    /// for history present at entry. Upgrades asymptomatic patients.
    pub fn record_oi(&mut self, oi: OiType, acute: bool) -> SimResult<()> {
        if !self.is_hiv_positive() {
            return Err(SimError::InvariantViolation {
                patient: self.general.index,
                detail: format!("OI {} recorded for an HIV-negative patient", oi.index()),
            });
        }
        let i = oi.index();
        if i >= OI_NUM {
            return Err(SimError::InvariantViolation {
                patient: self.general.index,
                detail: format!("OI index {i} out of range"),
            });
        }
        self.disease.oi_history[i] = true;
        self.disease.oi_last_month[i] = Some(self.general.month);
        if acute {
            self.disease.acute_oi_this_month = Some(oi);
            self.disease.num_ois += 1;
        }
        if self.disease.hiv_state == HivState::AsymptomaticChronic {
            self.disease.hiv_state = HivState::SymptomaticChronic;
            self.disease.symptomatic_since = Some(self.general.month);
        }
        Ok(())
    }

    /// Whether a severe OI occurred within the last `window` months.
    pub fn recent_severe_oi(&self, severe: &[bool], window: Month) -> bool {
        self.disease
            .oi_last_month
            .iter()
            .zip(severe)
            .any(|(last, &s)| s && last.is_some_and(|m| self.general.month.saturating_sub(m) < window))
    }

    pub fn set_chronic_condition(&mut self, condition: usize) {
        if let Some(flag) = self.disease.chronic_conditions.get_mut(condition) {
            *flag = true;
        }
    }

    // ── Monitoring ─────────────────────────────────────────────────

    pub fn set_detected(&mut self) -> SimResult<()> {
        if !self.is_hiv_positive() {
            return Err(SimError::InvariantViolation {
                patient: self.general.index,
                detail: "detection of an HIV-negative patient".into(),
            });
        }
        if !self.monitoring.detected {
            self.monitoring.detected = true;
            self.monitoring.detection_month = Some(self.general.month);
        }
        Ok(())
    }

    pub fn set_linked(&mut self) -> SimResult<()> {
        if !self.monitoring.detected {
            return Err(SimError::InvariantViolation {
                patient: self.general.index,
                detail: "linkage before detection".into(),
            });
        }
        if !self.monitoring.linked {
            self.monitoring.linked = true;
            self.monitoring.linkage_month = Some(self.general.month);
        }
        Ok(())
    }

    pub fn set_lost_to_follow_up(&mut self, lost: bool) {
        self.monitoring.lost_to_follow_up = lost;
    }

    pub fn set_care_profile(
        &mut self,
        visit_type: ClinicVisitType,
        cd4_response_type: usize,
        response_baseline_logit: f64,
    ) {
        self.monitoring.visit_type = visit_type;
        self.monitoring.cd4_response_type = cd4_response_type;
        self.art.response_baseline_logit = response_baseline_logit;
    }

    pub fn set_ltfu_logit(&mut self, logit: f64) {
        self.monitoring.ltfu_logit = logit;
    }

    pub fn record_cd4_test(&mut self, observed: f64) {
        self.monitoring.observed_cd4 = Some(observed.max(0.0));
        self.monitoring.last_cd4_test = Some(self.general.month);
    }

    pub fn record_hvl_test(&mut self, observed: HvlStratum) {
        self.monitoring.observed_hvl = Some(observed);
        self.monitoring.last_hvl_test = Some(self.general.month);
    }

    pub fn set_observed_failure(&mut self, failed: bool) {
        self.monitoring.observed_failure = failed;
    }

    // ── ART ────────────────────────────────────────────────────────

    pub fn start_art(&mut self, line: usize, responder: bool, num_toxicities: usize) {
        let month = self.general.month;
        self.art.line = Some(line);
        self.art.status = RegimenStatus::Active;
        self.art.lines_started += 1;
        self.art.start_month = Some(month);
        self.art.stop_month = None;
        self.art.first_start_month.get_or_insert(month);
        self.art.responder = responder;
        self.art.suppressed = false;
        self.art.failed = false;
        self.art.efficacy = 0.0;
        self.art.last_administration = None;
        self.art.next_due = None;
        self.art.missed_dose = false;
        self.art.interrupted = false;
        self.art.toxicities_seen = vec![false; num_toxicities];
        self.monitoring.observed_failure = false;
    }

    pub fn stop_art(&mut self, status: RegimenStatus) {
        if !self.art.status.is_active() {
            return;
        }
        self.art.status = status;
        self.art.stop_month = Some(self.general.month);
        self.art.efficacy = 0.0;
        self.art.suppressed = false;
        self.art.next_due = None;
    }

    /// Stop ART because the patient left care.
    pub fn interrupt_art(&mut self) {
        if self.art.status.is_active() {
            self.stop_art(RegimenStatus::StoppedByPolicy);
            self.art.interrupted = true;
        }
    }

    pub fn set_art_efficacy(&mut self, efficacy: f64) {
        self.art.efficacy = efficacy.clamp(0.0, 1.0);
    }

    pub fn set_art_suppressed(&mut self) {
        self.art.suppressed = true;
        self.art.failed = false;
    }

    pub fn set_art_failed(&mut self) {
        self.art.failed = true;
        self.art.suppressed = false;
    }

    /// A periodic dose given this month; the next is due `interval` later.
    pub fn record_administration(&mut self, interval: Month) {
        let month = self.general.month;
        self.art.last_administration = Some(month);
        self.art.next_due = Some(month + interval);
        self.art.missed_dose = false;
    }

    pub fn set_missed_dose(&mut self, missed: bool) {
        self.art.missed_dose = missed;
    }

    pub fn mark_art_toxicity(&mut self, toxicity: usize) {
        if let Some(seen) = self.art.toxicities_seen.get_mut(toxicity) {
            *seen = true;
        }
    }

    // ── Prophylaxis ────────────────────────────────────────────────

    pub fn start_proph(&mut self, oi: OiType, secondary: bool) {
        let i = oi.index();
        self.proph.status[i] = RegimenStatus::Active;
        self.proph.secondary[i] = secondary;
        self.proph.start_month[i] = Some(self.general.month);
    }

    pub fn stop_proph(&mut self, oi: OiType, status: RegimenStatus) {
        let i = oi.index();
        if self.proph.status[i].is_active() {
            self.proph.status[i] = status;
        }
    }

    // ── TB ─────────────────────────────────────────────────────────

    pub fn set_tb_state(&mut self, state: TbState) {
        self.tb.state = state;
        if state == TbState::Uninfected {
            self.tb.strain = None;
        }
    }

    pub fn set_tb_strain(&mut self, strain: TbStrain) {
        self.tb.strain = Some(strain);
    }

    pub fn set_tb_diagnosed(&mut self, diagnosed: bool) {
        self.tb.diagnosed = diagnosed;
    }

    pub fn start_tb_treatment(&mut self) {
        self.tb.treatment = RegimenStatus::Active;
        self.tb.treatment_start = Some(self.general.month);
    }

    pub fn stop_tb_treatment(&mut self, status: RegimenStatus) {
        if self.tb.treatment.is_active() {
            self.tb.treatment = status;
        }
    }

    pub fn start_tb_proph(&mut self) {
        self.tb.proph = RegimenStatus::Active;
        self.tb.proph_start = Some(self.general.month);
    }

    pub fn stop_tb_proph(&mut self, status: RegimenStatus) {
        if self.tb.proph.is_active() {
            self.tb.proph = status;
        }
    }

    // ── Pediatrics ─────────────────────────────────────────────────

    pub fn set_maternal_status(&mut self, mother_hiv_positive: bool, breastfeeding: bool) {
        self.peds.mother_hiv_positive = mother_hiv_positive;
        self.peds.breastfeeding = breastfeeding;
    }

    pub fn stop_breastfeeding(&mut self) {
        self.peds.breastfeeding = false;
    }

    pub fn set_vertical_transmission(&mut self, mode: VerticalTransmission) {
        self.peds.vertical_transmission = Some(mode);
    }

    // ── Invariants ─────────────────────────────────────────────────

    /// Verify the cross-record invariants. Called by EndMonth in debug
    /// builds and directly by tests.
    pub fn check_invariants(&self, run: &RunConfig) -> SimResult<()> {
        let violation = |detail: String| SimError::InvariantViolation {
            patient: self.general.index,
            detail,
        };
        let d = &self.disease;
        if !d.hiv_state.is_positive() {
            if d.true_cd4.is_some() || d.cd4_stratum.is_some() || d.hvl.is_some() {
                return Err(violation("HIV-negative patient has CD4/HVL values".into()));
            }
            if self.has_oi_history() {
                return Err(violation("HIV-negative patient has OI history".into()));
            }
            if self.monitoring.detected {
                return Err(violation("HIV-negative patient is detected".into()));
            }
        } else {
            let cd4 = d
                .true_cd4
                .ok_or_else(|| violation("HIV-positive patient without CD4".into()))?;
            if !(0.0..=run.max_patient_cd4).contains(&cd4) {
                return Err(violation(format!("true CD4 {cd4} outside valid range")));
            }
            let expected = Cd4Stratum::from_count(cd4, &run.cd4_strata_upper_bounds);
            if d.cd4_stratum != Some(expected) {
                return Err(violation(format!(
                    "CD4 stratum {:?} does not match count {cd4}",
                    d.cd4_stratum
                )));
            }
            if d.hvl.is_none() {
                return Err(violation("HIV-positive patient without HVL stratum".into()));
            }
        }
        if d.hiv_state == HivState::AsymptomaticChronic && self.has_oi_history() {
            return Err(violation("asymptomatic patient with OI history".into()));
        }
        if d.hiv_state == HivState::SymptomaticChronic && !self.has_oi_history() {
            return Err(violation("symptomatic patient without OI history".into()));
        }
        if self.monitoring.linked && !self.monitoring.detected {
            return Err(violation("linked but not detected".into()));
        }
        if !self.general.alive && self.general.cause_of_death.is_none() {
            return Err(violation("dead without a cause".into()));
        }
        if self.art.status.is_active() && !self.is_hiv_positive() {
            return Err(violation("ART active for an HIV-negative patient".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn chronic_patient(run: &RunConfig) -> PatientState {
        let mut patient = PatientState::new(4);
        patient.infect(false, 420.0, HvlStratum::ALL[2], 0.0, true, run);
        patient
    }

    #[test]
    fn first_oi_upgrades_to_symptomatic() {
        let run = SimConfig::default_test().run;
        let mut patient = chronic_patient(&run);
        assert_eq!(patient.disease().hiv_state, HivState::AsymptomaticChronic);
        patient.check_invariants(&run).unwrap();

        patient.record_oi(OiType(1), true).unwrap();
        assert_eq!(patient.disease().hiv_state, HivState::SymptomaticChronic);
        assert_eq!(patient.disease().symptomatic_since, Some(0));
        patient.check_invariants(&run).unwrap();
    }

    #[test]
    fn symptomatic_without_oi_history_is_a_violation() {
        let run = SimConfig::default_test().run;
        let mut patient = chronic_patient(&run);
        patient.disease.hiv_state = HivState::SymptomaticChronic;
        match patient.check_invariants(&run) {
            Err(SimError::InvariantViolation { patient: 4, detail }) => {
                assert!(detail.contains("without OI history"), "{detail}")
            }
            other => panic!("expected an invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn acute_phase_ends_symptomatic_only_with_history() {
        let run = SimConfig::default_test().run;
        let mut quiet = PatientState::new(1);
        quiet.infect(true, 800.0, HvlStratum::ALL[3], 0.0, false, &run);
        quiet.end_acute_phase();
        assert_eq!(quiet.disease().hiv_state, HivState::AsymptomaticChronic);

        let mut sick = PatientState::new(2);
        sick.infect(true, 800.0, HvlStratum::ALL[3], 0.0, false, &run);
        sick.record_oi(OiType(0), true).unwrap();
        assert_eq!(sick.disease().hiv_state, HivState::AcutePositive);
        sick.end_acute_phase();
        assert_eq!(sick.disease().hiv_state, HivState::SymptomaticChronic);
        sick.check_invariants(&run).unwrap();
    }
}
