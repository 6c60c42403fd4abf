//! Snapshot records handed to the statistics sink.
//!
//! A `MonthSnapshot` is taken by EndMonth at the close of every monthly
//! pass, including the month of death. A `PatientOutcome` is produced once
//! per patient when the simulation of that patient ends.

use crate::{
    patient::PatientState,
    types::{Cd4Stratum, DeathCause, HivState, HvlStratum, Month, PatientIndex, RegimenStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSnapshot {
    pub patient:          PatientIndex,
    pub month:            Month,
    pub age_months:       Month,
    pub alive:            bool,
    pub hiv_state:        HivState,
    pub true_cd4:         Option<f64>,
    pub cd4_stratum:      Option<Cd4Stratum>,
    pub hvl:              Option<HvlStratum>,
    pub oi_history_count: usize,
    pub detected:         bool,
    pub linked:           bool,
    pub lost_to_follow_up: bool,
    pub art_status:       RegimenStatus,
    pub art_line:         Option<usize>,
    pub art_efficacy:     f64,
    /// Undiscounted cost incurred this month.
    pub month_cost:       f64,
    pub discounted_cost:  f64,
    pub life_months:      f64,
    pub discounted_qalms: f64,
}

impl MonthSnapshot {
    pub fn capture(patient: &PatientState) -> Self {
        let g = patient.general();
        let d = patient.disease();
        let m = patient.monitoring();
        let art = patient.art();
        Self {
            patient:          g.index,
            month:            g.month,
            age_months:       g.age_months,
            alive:            g.alive,
            hiv_state:        d.hiv_state,
            true_cd4:         d.true_cd4,
            cd4_stratum:      d.cd4_stratum,
            hvl:              d.hvl,
            oi_history_count: d.oi_history.iter().filter(|&&h| h).count(),
            detected:         m.detected,
            linked:           m.linked,
            lost_to_follow_up: m.lost_to_follow_up,
            art_status:       art.status,
            art_line:         art.line,
            art_efficacy:     art.efficacy,
            month_cost:       g.month_cost,
            discounted_cost:  g.discounted_cost,
            life_months:      g.life_months,
            discounted_qalms: g.discounted_qalms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientOutcome {
    pub patient:             PatientIndex,
    /// Month of death, or the first month past the horizon.
    pub final_month:         Month,
    pub cause_of_death:      Option<DeathCause>,
    pub infected_at_entry:   bool,
    pub infected_during_run: bool,
    pub infection_month:     Option<Month>,
    pub cost:                f64,
    pub discounted_cost:     f64,
    pub life_months:         f64,
    pub discounted_qalms:    f64,
    pub first_art_month:     Option<Month>,
    pub num_ois:             u32,
}

impl PatientOutcome {
    pub fn capture(patient: &PatientState) -> Self {
        let g = patient.general();
        let d = patient.disease();
        Self {
            patient:             g.index,
            final_month:         g.death_month.unwrap_or(g.month),
            cause_of_death:      g.cause_of_death,
            infected_at_entry:   d.infected_at_entry,
            infected_during_run: d.hiv_state.is_positive() && !d.infected_at_entry,
            infection_month:     d.infection_month,
            cost:                g.cost,
            discounted_cost:     g.discounted_cost,
            life_months:         g.life_months,
            discounted_qalms:    g.discounted_qalms,
            first_art_month:     patient.art().first_start_month,
            num_ois:             d.num_ois,
        }
    }

    pub fn died(&self) -> bool {
        self.cause_of_death.is_some()
    }
}
