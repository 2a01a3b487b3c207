//! Error taxonomy for interval modelling and the rolling-horizon loop.
//!
//! Construction errors ([`ConfigError`], [`ModelError`], and the case and
//! profile errors re-wrapped by [`SimulationError`]) are raised before any
//! solve. [`SolveFailure`] is what a backend reports for one interval; the
//! loop turns it into [`SimulationError::Halted`], which carries the results
//! solved so far.

use pcm_core::CaseError;
use pcm_ts::ProfileError;
use serde::Serialize;
use thiserror::Error;

use crate::results::ScenarioResults;

/// Scenario settings rejected at loop entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("interval_length must be at least 1")]
    ZeroIntervalLength,

    #[error("n_interval must be at least 1")]
    ZeroIntervalCount,

    #[error("start_index is 1-based and must be at least 1")]
    ZeroStartIndex,

    #[error("thread count must be at least 1")]
    ZeroThreads,

    #[error("load shed penalty must be finite and non-negative, got {0}")]
    InvalidPenalty(f64),

    #[error(
        "horizon of {n_interval} interval(s) of {interval_length} hours from hour {start_index} overflows"
    )]
    HorizonOverflow {
        start_index: usize,
        interval_length: usize,
        n_interval: usize,
    },

    #[error("unknown lp solver '{name}'; supported values: {available}")]
    UnknownSolver { name: String, available: String },
}

/// Inputs that cannot be turned into a well-formed linear program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Profile slices must have one row per interval hour and one value per
    /// element of the matching index set.
    #[error("{what} profile has shape {found:?}, expected {expected:?}")]
    ProfileShape {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Carried state must match the case it seeds.
    #[error("carried {what} has {found} entries, expected {expected}")]
    CarryShape {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Outcome of a solve that produced no usable assignment.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SolveFailure {
    #[error("problem is infeasible")]
    Infeasible,

    #[error("problem is unbounded")]
    Unbounded,

    #[error("solver error: {0}")]
    Solver(String),
}

impl From<good_lp::ResolutionError> for SolveFailure {
    fn from(err: good_lp::ResolutionError) -> Self {
        match err {
            good_lp::ResolutionError::Infeasible => SolveFailure::Infeasible,
            good_lp::ResolutionError::Unbounded => SolveFailure::Unbounded,
            other => SolveFailure::Solver(other.to_string()),
        }
    }
}

/// Errors surfaced by [`Simulation`](crate::Simulation).
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("invalid scenario configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid case data: {0}")]
    Case(#[from] CaseError),

    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("model construction failed: {0}")]
    Model(#[from] ModelError),

    #[error("interval result sink failed: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A solve failed; `partial` holds every interval completed before it.
    #[error("interval {interval} failed ({failure}); {} interval(s) completed", .partial.intervals_completed())]
    Halted {
        interval: usize,
        last_completed: Option<usize>,
        failure: SolveFailure,
        partial: Box<ScenarioResults>,
    },
}

impl SimulationError {
    /// Solve outcomes end the scenario; everything else is a setup problem a
    /// caller can report and fix.
    pub fn is_scenario_fatal(&self) -> bool {
        matches!(self, SimulationError::Halted { .. })
    }

    /// Results accumulated before a halt.
    pub fn partial_results(&self) -> Option<&ScenarioResults> {
        match self {
            SimulationError::Halted { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_mapping() {
        assert_eq!(
            SolveFailure::from(good_lp::ResolutionError::Infeasible),
            SolveFailure::Infeasible
        );
        assert_eq!(
            SolveFailure::from(good_lp::ResolutionError::Unbounded),
            SolveFailure::Unbounded
        );
        assert!(matches!(
            SolveFailure::from(good_lp::ResolutionError::Str("numerical trouble".into())),
            SolveFailure::Solver(msg) if msg.contains("numerical trouble")
        ));
    }

    #[test]
    fn test_setup_errors_are_not_fatal() {
        let err = SimulationError::from(ConfigError::ZeroIntervalCount);
        assert!(!err.is_scenario_fatal());
        assert!(err.partial_results().is_none());
    }

    #[test]
    fn test_solve_failure_serializes_with_kind() {
        let json = serde_json::to_string(&SolveFailure::Solver("boom".into())).unwrap();
        assert_eq!(json, r#"{"kind":"solver","message":"boom"}"#);
        let json = serde_json::to_string(&SolveFailure::Infeasible).unwrap();
        assert_eq!(json, r#"{"kind":"infeasible"}"#);
    }
}
