use clap::Parser;
use pcm_algo::SolverKind;
use pcm_cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {e}");
    }

    let result = match &cli.command {
        Commands::Run {
            scenario,
            overrides,
            initial_state,
            out,
        } => commands::run::handle(
            scenario,
            overrides,
            initial_state.as_deref(),
            out.as_deref(),
        ),
        Commands::Check {
            scenario,
            overrides,
        } => commands::check::handle(scenario, overrides),
        Commands::Solvers => {
            for name in SolverKind::available() {
                println!("{name}");
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}
