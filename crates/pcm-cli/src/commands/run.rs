use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use pcm_algo::SimulationError;
use pcm_cli::cli::Overrides;
use pcm_cli::output::{
    format_runtime, read_state, write_state, write_tables, JsonIntervalSink, RunStatus,
    RunSummary,
};
use pcm_cli::scenario::{LoadedInputs, ScenarioFile};
use tracing::{info, warn};

pub fn handle(
    scenario_path: &Path,
    overrides: &Overrides,
    initial_state: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let scenario = ScenarioFile::load(scenario_path)?;
    let config = scenario.config(overrides)?;
    let inputs = LoadedInputs::load(&scenario.inputs)?;
    let sim = inputs.simulation(config)?;

    let out_dir = out
        .map(Path::to_path_buf)
        .or_else(|| scenario.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("output"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let initial = match initial_state {
        Some(path) => {
            info!("Starting from carried state {}", path.display());
            read_state(path)?
        }
        None => sim.initial_state(),
    };

    let config = sim.config();
    let backend = config.solver.kind.backend();
    let mut sink = JsonIntervalSink::new(&out_dir);
    let (results, failure) = match sim.run_with(backend.as_ref(), initial, &mut sink) {
        Ok(results) => (results, None),
        Err(SimulationError::Halted {
            interval,
            failure,
            partial,
            ..
        }) => (*partial, Some((interval, failure))),
        Err(other) => return Err(other).context("simulation failed"),
    };

    let runtime = format_runtime(clock.elapsed());
    let written = write_tables(&out_dir, &results)?;
    write_state(&out_dir, &results.final_state)?;
    let summary = RunSummary {
        status: if failure.is_some() {
            RunStatus::Halted
        } else {
            RunStatus::Completed
        },
        solver: backend.id().to_string(),
        started_at,
        runtime: runtime.clone(),
        start_index: config.start_index,
        interval_length: config.interval_length,
        intervals_requested: config.n_interval,
        intervals_completed: results.intervals_completed(),
        failed_interval: failure.as_ref().map(|(interval, _)| *interval),
        failure: failure.as_ref().map(|(_, f)| f.clone()),
        total_objective: results.total_objective(),
        total_load_shed: results.total_load_shed(),
        final_state: results.final_state.clone(),
    };
    summary.write(&out_dir)?;

    if results.total_load_shed() > 0.0 {
        warn!("{:.3} MWh of demand was shed", results.total_load_shed());
    }
    info!(
        "Wrote {} tables to {} (runtime {})",
        written.len(),
        out_dir.display(),
        runtime
    );

    if let Some((interval, failure)) = failure {
        bail!(
            "interval {interval} failed ({failure}); {} interval(s) completed, partial results in {}",
            results.intervals_completed(),
            out_dir.display()
        );
    }
    println!(
        "Completed {} interval(s), total cost {:.2}",
        results.intervals_completed(),
        results.total_objective()
    );
    Ok(())
}
