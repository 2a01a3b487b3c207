//! Pluggable LP solve capability.
//!
//! A backend receives a fully built [`LinearProgram`] plus the scenario's
//! solver options and returns either an [`Assignment`] of variable values or
//! a [`SolveFailure`]. The rolling-horizon loop only ever sees this trait.

mod clarabel;
#[cfg(feature = "solver-highs")]
mod highs;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use good_lp::{Solution, Variable};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SolveFailure};
use crate::model::LinearProgram;

pub use clarabel::ClarabelBackend;
#[cfg(feature = "solver-highs")]
pub use highs::HighsBackend;

/// Values of every variable in a solved program.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    values: HashMap<Variable, f64>,
}

impl Assignment {
    pub fn new(values: HashMap<Variable, f64>) -> Self {
        Self { values }
    }

    /// Read back `columns` from a good_lp solution.
    pub fn from_solution<S: Solution>(columns: &[Variable], solution: &S) -> Self {
        Self {
            values: columns.iter().map(|&v| (v, solution.value(v))).collect(),
        }
    }

    /// Value of `var`; variables the backend did not report read as zero.
    pub fn value(&self, var: Variable) -> f64 {
        self.values.get(&var).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Solver options passed through to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub kind: SolverKind,
    /// Threads the solver may use internally
    pub threads: Option<usize>,
    /// Backend-specific options; unknown keys are ignored
    pub options: BTreeMap<String, String>,
}

pub trait SolverBackend {
    /// Unique identifier (e.g., "clarabel", "highs")
    fn id(&self) -> &str;

    /// Solve `lp`, blocking until the solver returns.
    fn solve(&self, lp: LinearProgram, options: &SolverOptions)
        -> Result<Assignment, SolveFailure>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SolverKind {
    #[default]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

impl SolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            SolverKind::Highs => "highs",
        }
    }

    pub fn backend(&self) -> Box<dyn SolverBackend> {
        match self {
            SolverKind::Clarabel => Box::new(ClarabelBackend),
            #[cfg(feature = "solver-highs")]
            SolverKind::Highs => Box::new(HighsBackend),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolverKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "clarabel" => Ok(SolverKind::Clarabel),
            #[cfg(feature = "solver-highs")]
            "highs" => Ok(SolverKind::Highs),
            other => Err(ConfigError::UnknownSolver {
                name: other.to_string(),
                available: SolverKind::available().join(", "),
            }),
        }
    }
}

impl TryFrom<String> for SolverKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SolverKind> for String {
    fn from(kind: SolverKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Log option keys a backend does not understand.
pub(crate) fn log_ignored_options(backend: &str, options: &SolverOptions, known: &[&str]) {
    for key in options.options.keys() {
        if !known.contains(&key.as_str()) {
            tracing::debug!(backend, option = %key, "ignoring unsupported solver option");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_solver_kind() {
        assert_eq!("clarabel".parse::<SolverKind>().unwrap(), SolverKind::Clarabel);
        assert_eq!("Clarabel".parse::<SolverKind>().unwrap(), SolverKind::Clarabel);
        let err = "gurobi".parse::<SolverKind>().unwrap_err();
        assert!(err.to_string().contains("gurobi"));
        assert!(err.to_string().contains("clarabel"));
    }

    #[test]
    fn test_solver_options_deserialize() {
        let opts: SolverOptions =
            serde_json::from_str(r#"{"kind": "clarabel", "threads": 4}"#).unwrap();
        assert_eq!(opts.kind, SolverKind::Clarabel);
        assert_eq!(opts.threads, Some(4));
        assert!(opts.options.is_empty());

        assert!(serde_json::from_str::<SolverOptions>(r#"{"kind": "cplex"}"#).is_err());
    }

    #[test]
    fn test_backend_ids() {
        assert_eq!(SolverKind::Clarabel.backend().id(), "clarabel");
        #[cfg(feature = "solver-highs")]
        assert_eq!(SolverKind::Highs.backend().id(), "highs");
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn _accepts_backend(_b: &dyn SolverBackend) {}
    }
}
