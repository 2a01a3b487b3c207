//! # pcm-algo: Rolling-Horizon Production-Cost Simulation
//!
//! Builds one DC power-flow linear program per interval, hands it to a
//! solver backend, and stitches the solved intervals into full-horizon
//! tables.
//!
//! ## Architecture
//!
//! - **[`ModelBuilder`]**: turns a [`pcm_core::Topology`], one window of
//!   profiles and the [`CarryState`] into an [`IntervalModel`]
//! - **[`SolverBackend`]**: solves a [`LinearProgram`]; Clarabel is always
//!   available, HiGHS behind the `solver-highs` feature
//! - **[`Simulation`]**: the rolling-horizon loop; halts on the first failed
//!   solve and keeps what was solved
//! - **[`extract`]**: solved values to `[hour][element]` tables plus the next
//!   carried state
//!
//! ## Example
//!
//! ```ignore
//! use pcm_algo::{ScenarioConfig, Simulation, SolverKind};
//!
//! let config = ScenarioConfig { interval_length: 24, n_interval: 7, ..Default::default() };
//! let sim = Simulation::new(&case, &profiles, config)?;
//! let results = sim.run(SolverKind::Clarabel.backend().as_ref())?;
//! println!("total cost {:.2}", results.total_objective());
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod model;
pub mod results;
pub mod simulation;
pub mod state;

#[cfg(feature = "solver-highs")]
pub use backends::HighsBackend;
pub use backends::{Assignment, ClarabelBackend, SolverBackend, SolverKind, SolverOptions};
pub use config::{LoadShed, ScenarioConfig};
pub use error::{ConfigError, ModelError, SimulationError, SolveFailure};
pub use model::{
    IntervalModel, IntervalVariables, LinearProgram, ModelBuilder, ModelLayout, ObjectiveTerms,
};
pub use results::{extract, FlexUsage, IntervalResults, ScenarioResults, StorageTrajectory, Table};
pub use simulation::{IntervalSink, NullSink, Simulation};
pub use state::CarryState;
