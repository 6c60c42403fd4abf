//! Stage 9: HIVTesting.
//!
//! Detection and linkage. Detection at entry is handled by HIVInfection
//! init. Each month:
//!   1. An acute OI this month may reveal HIV infection.
//!   2. Undetected patients may be offered a routine test (HIV-negative
//!      patients are tested too; a false positive is not a detection).
//!   3. Detected patients not yet linked may link to care.

use crate::{
    config::{category_for, SimConfig},
    error::SimResult,
    event::{DetectionRoute, SimEvent},
    patient::PatientState,
    rng::{site, PatientRng},
    updater::{StageContext, Updater},
};

pub struct HivTestingUpdater;

impl HivTestingUpdater {
    fn detect(
        patient: &mut PatientState,
        config: &SimConfig,
        rng: &mut PatientRng,
        route: DetectionRoute,
        events: &mut Vec<SimEvent>,
    ) -> SimResult<()> {
        patient.set_detected()?;
        let month = patient.month();
        log::debug!("month={month} patient={} hiv_testing: detected via {route:?}", patient.index());
        events.push(SimEvent::HivDetected { month, route });
        if rng.chance(site::LINKAGE, config.hiv_test.prob_link_at_detection) {
            patient.set_linked()?;
            events.push(SimEvent::LinkedToCare { month });
        }
        Ok(())
    }
}

impl Updater for HivTestingUpdater {
    fn name(&self) -> &'static str {
        "hiv_testing"
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
        events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let ht = &config.hiv_test;
        let month = patient.month();
        let mut events = Vec::new();

        if patient.is_hiv_positive() && !patient.monitoring().detected {
            let had_oi = events_in
                .iter()
                .any(|e| matches!(e, SimEvent::AcuteOiOccurred { .. }));
            if had_oi && ctx.rng.chance(site::OI_DETECTION, ht.prob_oi_detection) {
                Self::detect(patient, config, ctx.rng, DetectionRoute::OpportunisticInfection, &mut events)?;
                return Ok(events);
            }
        }

        if ht.enabled && !patient.monitoring().detected {
            let cat = category_for(patient.age_years(), &ht.age_category_upper_bounds_years);
            if ctx.rng.chance(site::HIV_TEST_OFFER, ht.monthly_prob_offer[cat])
                && ctx.rng.chance(site::HIV_TEST_ACCEPT, ht.prob_accept)
            {
                patient.add_cost(ht.test_cost, &config.run);
                let positive_result = if patient.is_hiv_positive() {
                    ctx.rng.chance(site::HIV_TEST_RESULT, ht.sensitivity)
                } else {
                    !ctx.rng.chance(site::HIV_TEST_RESULT, ht.specificity)
                };
                let result_received = ctx.rng.chance(site::HIV_TEST_RETURN, ht.prob_return_for_result);
                events.push(SimEvent::HivTestPerformed {
                    month,
                    positive_result,
                    result_received,
                });
                if positive_result && result_received && patient.is_hiv_positive() {
                    Self::detect(patient, config, ctx.rng, DetectionRoute::HivTest, &mut events)?;
                    return Ok(events);
                }
            }
            return Ok(events);
        }

        if patient.monitoring().detected
            && !patient.monitoring().linked
            && ctx.rng.chance(site::LINKAGE, ht.monthly_prob_link)
        {
            patient.set_linked()?;
            log::debug!("month={month} patient={} hiv_testing: linked to care", patient.index());
            events.push(SimEvent::LinkedToCare { month });
        }
        Ok(events)
    }
}
