//! HiGHS backend (feature `solver-highs`).

use good_lp::solvers::highs::highs;
use good_lp::SolverModel;

use super::{log_ignored_options, Assignment, SolverBackend, SolverOptions};
use crate::error::SolveFailure;
use crate::model::LinearProgram;

/// HiGHS dual simplex / IPM, with `threads` passed through.
pub struct HighsBackend;

impl SolverBackend for HighsBackend {
    fn id(&self) -> &str {
        "highs"
    }

    fn solve(
        &self,
        lp: LinearProgram,
        options: &SolverOptions,
    ) -> Result<Assignment, SolveFailure> {
        log_ignored_options(self.id(), options, &[]);

        let (vars, columns, objective, constraints) = lp.into_parts();
        let mut model = vars.minimise(objective).using(highs);
        if let Some(threads) = options.threads {
            model = model.set_option("threads", threads as i32);
        }
        for constraint in constraints {
            model = model.with(constraint);
        }
        let solution = model.solve()?;
        Ok(Assignment::from_solution(&columns, &solution))
    }
}
