//! Stage 10: Behavior.
//!
//! Loss to follow-up and return to care. Each patient's LTFU propensity is a
//! logit shift drawn once at init. Leaving care interrupts ART and stops
//! all prophylaxis; linkage itself is kept, so a returning patient needs no
//! second detection.

use crate::{
    error::SimResult,
    event::SimEvent,
    patient::PatientState,
    prob,
    rng::site,
    types::{OiType, RegimenStatus},
    updater::{StageContext, Updater},
};

pub struct BehaviorUpdater;

impl Updater for BehaviorUpdater {
    fn name(&self) -> &'static str {
        "behavior"
    }

    fn run_init(
        &self,
        patient: &mut PatientState,
        _events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let ltfu = &ctx.config.ltfu;
        if ltfu.enabled {
            let logit = ctx
                .rng
                .draw_gaussian(site::LTFU_RESPONSE, ltfu.response_logit_mean, ltfu.response_logit_sd)?;
            patient.set_ltfu_logit(logit);
        }
        Ok(Vec::new())
    }

    fn run_monthly(
        &self,
        patient: &mut PatientState,
        events_in: &[SimEvent],
        ctx: &mut StageContext<'_>,
    ) -> SimResult<Vec<SimEvent>> {
        let config = ctx.config;
        let ltfu = &config.ltfu;
        if !ltfu.enabled || !patient.monitoring().linked {
            return Ok(Vec::new());
        }
        let month = patient.month();
        let mut events = Vec::new();

        if !patient.monitoring().lost_to_follow_up {
            let p = prob::adjust_on_logit(ltfu.monthly_prob_ltfu, patient.monitoring().ltfu_logit)?;
            if !ctx.rng.chance(site::LTFU, p) {
                return Ok(events);
            }
            patient.set_lost_to_follow_up(true);
            events.push(SimEvent::LostToFollowUp { month });
            if let Some(line) = patient.art().line.filter(|_| patient.on_art()) {
                patient.interrupt_art();
                events.push(SimEvent::ArtStopped {
                    month,
                    line,
                    status: RegimenStatus::StoppedByPolicy,
                });
            }
            for oi in OiType::all() {
                if patient.proph().status[oi.index()].is_active() {
                    patient.stop_proph(oi, RegimenStatus::StoppedByPolicy);
                    events.push(SimEvent::ProphStopped {
                        month,
                        oi,
                        status: RegimenStatus::StoppedByPolicy,
                    });
                }
            }
            log::debug!("month={month} patient={} behavior: lost to follow-up", patient.index());
            return Ok(events);
        }

        let severe_oi = events_in
            .iter()
            .any(|e| matches!(e, SimEvent::AcuteOiOccurred { severe: true, .. }));
        let p = if severe_oi {
            ltfu.prob_return_on_severe_oi
        } else {
            ltfu.monthly_prob_return
        };
        if ctx.rng.chance(site::RETURN_TO_CARE, p) {
            patient.set_lost_to_follow_up(false);
            log::debug!("month={month} patient={} behavior: returned to care", patient.index());
            events.push(SimEvent::ReturnedToCare { month });
        }
        Ok(events)
    }
}
