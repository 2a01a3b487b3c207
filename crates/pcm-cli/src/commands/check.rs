use std::path::Path;

use anyhow::Result;
use pcm_cli::cli::Overrides;
use pcm_cli::scenario::{LoadedInputs, ScenarioFile};
use tracing::info;

pub fn handle(scenario_path: &Path, overrides: &Overrides) -> Result<()> {
    let scenario = ScenarioFile::load(scenario_path)?;
    let config = scenario.config(overrides)?;
    let inputs = LoadedInputs::load(&scenario.inputs)?;
    let sim = inputs.simulation(config)?;

    let topology = sim.topology();
    let config = sim.config();
    println!("Scenario {}:", scenario_path.display());
    println!("  Buses         : {}", topology.n_bus());
    println!("  Generators    : {}", topology.n_gen());
    println!(
        "  Branches      : {} ({} AC, {} DC)",
        topology.n_branch(),
        topology.n_ac_branch(),
        topology.n_branch() - topology.n_ac_branch()
    );
    println!("  Islands       : {}", topology.island_count());
    println!(
        "  Horizon       : hours {}..={} in {} interval(s) of {}",
        config.start_index,
        config.end_index(),
        config.n_interval,
        config.interval_length
    );
    println!("  Solver        : {}", config.solver.kind);
    print!("{}", sim.diagnostics());

    info!("Scenario check passed");
    Ok(())
}
