//! Rolling-horizon loop.
//!
//! ```text
//! carry₀ ─▶ build(0, carry₀) ─▶ solve ─▶ extract ─▶ carry₁ ─▶ build(1, carry₁) ─▶ …
//!                                  │
//!                                  └─ failure ─▶ Halted { interval, partial }
//! ```
//!
//! Intervals run strictly in order on the calling thread: each model needs
//! the previous interval's last-hour dispatch, state of charge and owed
//! balance. A failed solve ends the scenario; nothing is relaxed and retried.

use std::error::Error;

use pcm_core::{BusId, Case, DemandFlexibility, Diagnostics, Storage, Topology};
use pcm_ts::{IntervalWindow, ProfileAllocator, ProfileError, Profiles};

use crate::backends::SolverBackend;
use crate::config::ScenarioConfig;
use crate::error::SimulationError;
use crate::model::{IntervalModel, ModelBuilder};
use crate::results::{extract, IntervalResults, ScenarioResults};
use crate::state::CarryState;

/// Receives each interval's results as soon as it is solved.
pub trait IntervalSink {
    fn accept(
        &mut self,
        results: &IntervalResults,
        state: &CarryState,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Sink that discards everything.
pub struct NullSink;

impl IntervalSink for NullSink {
    fn accept(
        &mut self,
        _results: &IntervalResults,
        _state: &CarryState,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// One scenario: a case, its profiles, optional resources, and the settings
/// that tile the horizon into intervals.
pub struct Simulation<'a> {
    case: &'a Case,
    topology: Topology,
    allocator: ProfileAllocator<'a>,
    config: ScenarioConfig,
    storage: Option<&'a Storage>,
    flexibility: Option<&'a DemandFlexibility>,
    diagnostics: Diagnostics,
}

impl<'a> Simulation<'a> {
    /// Check configuration and inputs; no model is built yet.
    ///
    /// Fails if the configuration is degenerate, the topology is malformed,
    /// a profile column is missing, or the horizon runs past the profiles.
    pub fn new(
        case: &'a Case,
        profiles: &'a Profiles,
        config: ScenarioConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let topology = Topology::build(case)?;
        let allocator = ProfileAllocator::new(case, profiles)?;

        let available = allocator.available_hours();
        if config.end_index() > available {
            return Err(ProfileError::WindowOutOfRange {
                table: "profile",
                start_index: config.start_index,
                length: config.interval_length * config.n_interval,
                available,
            }
            .into());
        }

        let mut diagnostics = case.diagnostics();
        diagnostics.merge(topology.diagnostics());
        diagnostics.log();

        Ok(Self {
            case,
            topology,
            allocator,
            config,
            storage: None,
            flexibility: None,
            diagnostics,
        })
    }

    /// Attach storage units; used only when `storage_enabled` is set.
    pub fn with_storage(mut self, storage: &'a Storage) -> Result<Self, SimulationError> {
        storage.validate(self.case)?;
        self.storage = Some(storage);
        Ok(self)
    }

    /// Attach demand flexibility; used only when both `flexibility_enabled`
    /// and the record's own `enabled` flag are set.
    pub fn with_flexibility(
        mut self,
        flexibility: &'a DemandFlexibility,
    ) -> Result<Self, SimulationError> {
        flexibility.validate(self.case)?;
        self.flexibility = Some(flexibility);
        Ok(self)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn active_storage(&self) -> Option<&'a Storage> {
        if !self.config.storage_enabled {
            return None;
        }
        self.storage.filter(|s| !s.is_empty())
    }

    fn active_flexibility(&self) -> Option<&'a DemandFlexibility> {
        if !self.config.flexibility_enabled {
            return None;
        }
        self.flexibility.filter(|f| f.enabled)
    }

    /// State before the first interval, from case and resource defaults.
    pub fn initial_state(&self) -> CarryState {
        CarryState {
            dispatch: self
                .config
                .initial_ramp
                .then(|| self.topology.gen_pg0().to_vec()),
            soc: self
                .active_storage()
                .map(Storage::initial_soc)
                .unwrap_or_default(),
            flex_balance: self
                .active_flexibility()
                .map(|f| f.initial_balances(self.case))
                .unwrap_or_default(),
        }
    }

    fn model_builder(&self) -> Result<ModelBuilder<'_>, SimulationError> {
        if self.config.storage_enabled && self.storage.is_none() {
            tracing::warn!("storage enabled but no storage units were supplied");
        }
        if self.config.flexibility_enabled && self.active_flexibility().is_none() {
            tracing::warn!("flexibility enabled but no enabled flexibility record was supplied");
        }

        let mut builder = ModelBuilder::new(&self.topology);
        if let Some(storage) = self.active_storage() {
            builder = builder.with_storage(storage)?;
        }
        if let Some(flex) = self.active_flexibility() {
            builder = builder.with_flexibility(flex)?;
        }
        if self.config.load_shed.enabled {
            builder = builder.with_load_shed(self.config.load_shed.penalty);
        }
        Ok(builder)
    }

    /// Run every interval from the default initial state.
    pub fn run(&self, backend: &dyn SolverBackend) -> Result<ScenarioResults, SimulationError> {
        self.run_with(backend, self.initial_state(), &mut NullSink)
    }

    /// Run every interval from `initial`, handing each result to `sink`.
    ///
    /// On a failed solve returns [`SimulationError::Halted`] holding the
    /// intervals completed so far.
    pub fn run_with(
        &self,
        backend: &dyn SolverBackend,
        initial: CarryState,
        sink: &mut dyn IntervalSink,
    ) -> Result<ScenarioResults, SimulationError> {
        let builder = self.model_builder()?;
        let storage_buses: Vec<BusId> = self
            .active_storage()
            .map(|s| s.units.iter().map(|u| u.bus).collect())
            .unwrap_or_default();
        let n_interval = self.config.n_interval;
        let mut results = ScenarioResults::new(&self.topology, storage_buses, initial.clone());
        let mut carry = initial;

        tracing::info!(
            backend = backend.id(),
            intervals = n_interval,
            interval_length = self.config.interval_length,
            start_index = self.config.start_index,
            "starting rolling-horizon run"
        );

        for i in 0..n_interval {
            let span = tracing::info_span!("interval", index = i);
            let _guard = span.enter();

            let window =
                IntervalWindow::nth(self.config.start_index, self.config.interval_length, i)?;
            let profiles = self.allocator.window(window)?;
            let IntervalModel { lp, layout } =
                builder.build(&profiles, &carry, i + 1 == n_interval)?;

            match backend.solve(lp, &self.config.solver) {
                Ok(assignment) => {
                    let (interval, next) =
                        extract(&layout, &assignment, i, self.topology.n_bus(), &carry);
                    tracing::info!(
                        first_hour = window.start_index,
                        last_hour = window.end_index(),
                        objective = interval.objective,
                        "interval solved"
                    );
                    sink.accept(&interval, &next)
                        .map_err(SimulationError::Sink)?;
                    results.append(&interval, &next);
                    carry = next;
                }
                Err(failure) => {
                    tracing::error!(%failure, "solve failed; halting scenario");
                    return Err(SimulationError::Halted {
                        interval: i,
                        last_completed: results.last_completed(),
                        failure,
                        partial: Box::new(results),
                    });
                }
            }
        }

        Ok(results)
    }
}
