//! Cohort runner: simulates every patient of a run across a worker pool.
//!
//! RULE: Patients are independent units of work.
//! Each patient owns its RNG stream (derived from the run seed and its
//! index), and each worker accumulates into its own `CohortStats`. Partials
//! are merged after the batch, and outcomes are sorted by patient index, so
//! the result is identical for any worker count.

use crate::{
    config::SimConfig,
    engine::SimEngine,
    error::{SimError, SimResult},
    rng::RngBank,
    stats::CohortStats,
    trace::TraceObserver,
    types::PatientIndex,
};
use rayon::prelude::*;
use std::sync::Arc;

pub struct CohortRunner {
    engine: SimEngine,
    tracer: Option<Arc<dyn TraceObserver>>,
}

impl Default for CohortRunner {
    fn default() -> Self {
        Self::new(SimEngine::build())
    }
}

impl CohortRunner {
    pub fn new(engine: SimEngine) -> Self {
        Self { engine, tracer: None }
    }

    /// Forward draws of the patients the observer wants to it.
    pub fn with_tracer(mut self, tracer: Arc<dyn TraceObserver>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    /// Run the cohort described by `config` with `config.run.workers` threads.
    pub fn run(&self, config: &SimConfig) -> SimResult<CohortStats> {
        self.run_with_workers(config, config.run.workers)
    }

    pub fn run_with_workers(&self, config: &SimConfig, workers: usize) -> SimResult<CohortStats> {
        config.validate()?;
        let workers = workers.max(1);
        let num_patients = config.run.num_patients;
        log::info!(
            "Cohort '{}' starting: patients={num_patients} seed={} workers={workers}",
            config.run.run_name,
            config.run.seed
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cohort-{i}"))
            .build()
            .map_err(|e| SimError::Other(anyhow::anyhow!("Cannot build worker pool: {e}")))?;
        let bank = RngBank::new(config.run.seed);

        let mut stats = pool.install(|| {
            (0..num_patients)
                .into_par_iter()
                .try_fold(CohortStats::new, |mut partial, index| {
                    self.simulate_one(index, config, &bank, &mut partial)?;
                    Ok::<_, SimError>(partial)
                })
                .try_reduce(CohortStats::new, |a, b| Ok(a.merged(b)))
        })?;
        stats.sort_outcomes();

        log::info!(
            "Cohort '{}' complete: patients={} deaths={}",
            config.run.run_name,
            stats.num_patients(),
            stats.deaths_by_cause.iter().sum::<u64>()
        );
        Ok(stats)
    }

    fn simulate_one(
        &self,
        index: PatientIndex,
        config: &SimConfig,
        bank: &RngBank,
        stats: &mut CohortStats,
    ) -> SimResult<()> {
        let mut rng = bank.for_patient(index);
        if let Some(tracer) = self.tracer.as_ref().filter(|t| t.wants(index)) {
            rng = rng.with_tracer(Arc::clone(tracer));
        }
        self.engine.simulate_patient(index, config, &mut rng, stats)?;
        Ok(())
    }
}
