//! hivsim-core: monthly Monte Carlo microsimulation of HIV disease,
//! treatment and outcomes, one patient at a time.

pub mod config;
pub mod error;
pub mod event;
pub mod patient;
pub mod prob;
pub mod rng;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod trace;
pub mod types;

pub mod cohort;
pub mod engine;
pub mod updater;

pub mod acute_oi_updater;
pub mod begin_month_updater;
pub mod behavior_updater;
pub mod cd4_hvl_updater;
pub mod cd4_test_updater;
pub mod chronic_condition_updater;
pub mod clinic_visit_updater;
pub mod drug_efficacy_updater;
pub mod drug_toxicity_updater;
pub mod end_month_updater;
pub mod hiv_infection_updater;
pub mod hiv_testing_updater;
pub mod hvl_test_updater;
pub mod mortality_updater;
pub mod tb_clinical_care_updater;
pub mod tb_disease_updater;
