//! Clarabel backend for LP problems.

use good_lp::solvers::clarabel::clarabel;
use good_lp::SolverModel;

use super::{log_ignored_options, Assignment, SolverBackend, SolverOptions};
use crate::error::SolveFailure;
use crate::model::LinearProgram;

/// Clarabel is a pure-Rust interior-point solver that's always available.
///
/// It runs single-threaded; a requested thread count is logged and ignored.
pub struct ClarabelBackend;

impl SolverBackend for ClarabelBackend {
    fn id(&self) -> &str {
        "clarabel"
    }

    fn solve(
        &self,
        lp: LinearProgram,
        options: &SolverOptions,
    ) -> Result<Assignment, SolveFailure> {
        if let Some(threads) = options.threads {
            tracing::debug!(threads, "clarabel ignores the thread count");
        }
        log_ignored_options(self.id(), options, &[]);

        let (vars, columns, objective, constraints) = lp.into_parts();
        let mut model = vars.minimise(objective).using(clarabel);
        for constraint in constraints {
            model = model.with(constraint);
        }
        let solution = model.solve()?;
        Ok(Assignment::from_solution(&columns, &solution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::{constraint, variable};

    #[test]
    fn test_clarabel_backend_id() {
        let backend = ClarabelBackend;
        assert_eq!(backend.id(), "clarabel");
    }

    #[test]
    fn test_clarabel_solves_small_lp() {
        // min 2x + 3y  s.t.  x + y = 10, x <= 4
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(variable().min(0.0));
        let y = lp.add_variable(variable().min(0.0));
        lp.add_constraint("balance", constraint!(x + y == 10.0));
        lp.add_constraint("limit", constraint!(x <= 4.0));
        lp.add_objective_term(2.0, x);
        lp.add_objective_term(3.0, y);

        let assignment = ClarabelBackend
            .solve(lp, &SolverOptions::default())
            .unwrap();
        assert!((assignment.value(x) - 4.0).abs() < 1e-4);
        assert!((assignment.value(y) - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_clarabel_reports_infeasible() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(variable().min(0.0).max(1.0));
        lp.add_constraint("demand", constraint!(x >= 2.0));
        lp.add_objective_term(1.0, x);

        let result = ClarabelBackend.solve(lp, &SolverOptions::default());
        assert_eq!(result.unwrap_err(), SolveFailure::Infeasible);
    }
}
