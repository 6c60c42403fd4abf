//! sim-runner: headless cohort runner for hivsim.
//!
//! Usage:
//!   sim-runner --config base.json --seed 12345 --patients 10000 --db runs.db
//!   sim-runner --config a.json --config b.json --workers 8
//!
//! Each `--config` is an independent run; runs share nothing but the
//! database. Without `--config` the built-in test configuration is used.

use anyhow::{Context, Result};
use hivsim_core::{
    cohort::CohortRunner,
    config::SimConfig,
    stats::CohortSummary,
    store::SimStore,
    trace::RecordingTracer,
};
use std::env;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_paths: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "--config")
        .map(|w| w[1].as_str())
        .collect();
    let seed: Option<u64> = parse_arg(&args, "--seed");
    let patients: Option<u64> = parse_arg(&args, "--patients");
    let workers: Option<usize> = parse_arg(&args, "--workers");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");

    let mut configs = Vec::new();
    if config_paths.is_empty() {
        configs.push(SimConfig::default_test());
    }
    for path in &config_paths {
        configs.push(SimConfig::load(path).with_context(|| format!("loading config {path}"))?);
    }

    println!("hivsim sim-runner");
    println!("  runs:      {}", configs.len());
    println!("  db:        {db}");
    println!();

    let store = SimStore::open(db)?;
    store.migrate()?;

    for mut config in configs {
        if let Some(seed) = seed {
            config.run.seed = seed;
        }
        if let Some(n) = patients {
            config.run.num_patients = n;
        }
        if let Some(w) = workers {
            config.run.workers = w;
        }
        run_one(&store, &config)?;
    }
    Ok(())
}

fn run_one(store: &SimStore, config: &SimConfig) -> Result<()> {
    let run_id = format!("run-{}-{}", config.run.seed, uuid::Uuid::new_v4());
    store.insert_run(&run_id, config, env!("CARGO_PKG_VERSION"))?;

    let mut runner = CohortRunner::default();
    let tracer = if config.run.trace_patients.is_empty() {
        None
    } else {
        let tracer = Arc::new(RecordingTracer::new(config.run.trace_patients.iter().copied()));
        runner = runner.with_tracer(tracer.clone());
        Some(tracer)
    };

    let started = chrono::Utc::now();
    let stats = runner.run(config)?;
    let elapsed = chrono::Utc::now() - started;

    let summary = stats.summary();
    store.insert_patient_outcomes(&run_id, &stats.outcomes)?;
    store.save_run_summary(&run_id, &summary)?;
    store.save_monthly_census(&run_id, &stats)?;
    if let Some(tracer) = tracer {
        store.append_trace(&run_id, &tracer.records())?;
    }
    store.finish_run(&run_id)?;
    log::info!("Run {run_id} stored in {} ms", elapsed.num_milliseconds());

    print_summary(&run_id, config, &summary);
    Ok(())
}

fn print_summary(run_id: &str, config: &SimConfig, summary: &CohortSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:            {run_id}");
    println!("  name:              {}", config.run.run_name);
    println!("  seed:              {}", config.run.seed);
    println!("  patients:          {}", summary.num_patients);
    println!("  prevalent:         {}", summary.prevalent_at_entry);
    println!("  new infections:    {}", summary.new_infections);
    println!("  acute OIs:         {}", summary.acute_ois);
    println!("  ART starts:        {}", summary.art_starts);
    println!();
    println!("=== DEATHS BY CAUSE ===");
    for (cause, count) in &summary.deaths_by_cause {
        println!("  {cause:<18} {count}");
    }
    println!();
    println!("=== PER-PATIENT MEANS ===");
    println!("  life months:       {:.2}", summary.mean_life_months);
    println!("  discounted QALMs:  {:.2}", summary.mean_discounted_qalms);
    println!("  discounted cost:   ${:.0}", summary.mean_discounted_cost);
    println!();
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
}
