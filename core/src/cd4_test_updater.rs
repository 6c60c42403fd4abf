//! Stage 12: CD4Test.
//!
//! Scheduled CD4 tests for HIV-positive patients in care. The interval
//! depends on whether ART is active. The observed value carries a
//! multiplicative measurement error.

use crate::{
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    rng::site,
    types::Month,
    updater::{StageContext, Updater},
};

pub struct Cd4TestUpdater;

/// True when a test with the given interval is due this month.
pub fn test_due(last: Option<Month>, interval: Option<Month>, month: Month) -> bool {
    match (interval, last) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(interval), Some(last)) => month.saturating_sub(last) >= interval,
    }
}

impl Updater for Cd4TestUpdater {
    fn name(&self) -> &'static str {
        "cd4_test"
    }

    fn run_init(
        &self,
        _patient: &mut PatientState,
        _events_in: &[SimEvent],
        _ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        Ok(Vec::new())
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        if !patient.is_hiv_positive() || !patient.in_care() {
            return Ok(Vec::new());
        }
        let config = ctx.config;
        let mon = &config.monitoring;
        let interval = if patient.on_art() {
            mon.cd4_test_interval_on_art
        } else {
            mon.cd4_test_interval_pre_art
        };
        let month = patient.month();
        if !test_due(patient.monitoring().last_cd4_test, interval, month) {
            return Ok(Vec::new());
        }
        let Some(true_cd4) = patient.disease().true_cd4 else {
            return Ok(Vec::new());
        };

        let noise = ctx.rng.draw_gaussian(site::CD4_TEST_NOISE, 0.0, mon.cd4_test_sd_fraction)?;
        let observed = (true_cd4 * (1.0 + noise)).max(0.0);
        patient.record_cd4_test(observed);
        patient.add_cost(mon.cd4_test_cost, &config.run);
        log::debug!(
            "month={month} patient={} cd4_test: true={true_cd4:.0} observed={observed:.0}",
            patient.index()
        );
        Ok(vec![SimEvent::Cd4Tested { month, observed }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_test_is_due_immediately() {
        assert!(test_due(None, Some(6), 0));
        assert!(!test_due(None, None, 0));
    }

    #[test]
    fn interval_counts_from_last_test() {
        assert!(!test_due(Some(3), Some(6), 8));
        assert!(test_due(Some(3), Some(6), 9));
    }
}
