//! Stage 13: HVLTest.
//!
//! Scheduled HVL tests. A result may read one stratum higher or lower than
//! the truth. On ART, an observed HVL at or above the line's failure
//! threshold (after the minimum months on ART) marks observed failure,
//! which ClinicVisit acts on.

use crate::{
    cd4_test_updater::test_due,
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    prob,
    rng::site,
    updater::{StageContext, Updater},
};

pub struct HvlTestUpdater;

impl Updater for HvlTestUpdater {
    fn name(&self) -> &'static str {
        "hvl_test"
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
        let on_art = patient.on_art();
        let interval = if on_art {
            mon.hvl_test_interval_on_art
        } else {
            mon.hvl_test_interval_pre_art
        };
        let month = patient.month();
        if !test_due(patient.monitoring().last_hvl_test, interval, month) {
            return Ok(Vec::new());
        }
        let Some(true_hvl) = patient.disease().hvl else {
            return Ok(Vec::new());
        };

        let draw = ctx.rng.draw_uniform(site::HVL_TEST_ERROR);
        let error = prob::select_competing(
            "monitoring.hvl_test_error",
            &[mon.prob_hvl_test_higher, mon.prob_hvl_test_lower],
            draw,
            &format!("patient={} month={month}", patient.index()),
        )?;
        let observed = match error {
            Some(0) => true_hvl.step_up(),
            Some(_) => true_hvl.step_down(),
            None => true_hvl,
        };
        patient.record_hvl_test(observed);
        patient.add_cost(mon.hvl_test_cost, &config.run);
        let mut events = vec![SimEvent::HvlTested { month, observed }];

        if !on_art || patient.monitoring().observed_failure {
            return Ok(events);
        }
        let Some(line) = patient.art().line else {
            return Ok(events);
        };
        let Some(line_cfg) = config.art.lines.get(line) else {
            return Ok(events);
        };
        let rule = &line_cfg.failure;
        if patient.art().months_on_line(month) >= rule.min_months_on_art && observed >= rule.hvl_threshold {
            patient.set_observed_failure(true);
            log::debug!(
                "month={month} patient={} hvl_test: observed failure on line {line} ({observed:?})",
                patient.index()
            );
            events.push(SimEvent::ObservedFailure { month, line });
        }
        Ok(events)
    }
}
