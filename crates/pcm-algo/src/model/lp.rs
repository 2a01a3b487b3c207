//! Backend-agnostic linear program.
//!
//! Holds everything a good_lp solver model needs (variables, objective,
//! constraints) without committing to a solver, so the rolling-horizon loop
//! can hand the same program to any [`SolverBackend`](crate::SolverBackend).

use std::collections::BTreeMap;

use good_lp::{Constraint, Expression, ProblemVariables, Variable, VariableDefinition};

pub struct LinearProgram {
    vars: ProblemVariables,
    columns: Vec<Variable>,
    objective: Expression,
    constraints: Vec<Constraint>,
    families: BTreeMap<&'static str, usize>,
}

impl Default for LinearProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearProgram {
    pub fn new() -> Self {
        Self {
            vars: ProblemVariables::new(),
            columns: Vec::new(),
            objective: Expression::from(0.0),
            constraints: Vec::new(),
            families: BTreeMap::new(),
        }
    }

    pub fn add_variable(&mut self, def: VariableDefinition) -> Variable {
        let var = self.vars.add(def);
        self.columns.push(var);
        var
    }

    /// Add a constraint, counted under `family`.
    pub fn add_constraint(&mut self, family: &'static str, constraint: Constraint) {
        *self.families.entry(family).or_insert(0) += 1;
        self.constraints.push(constraint);
    }

    pub fn add_objective_term(&mut self, coefficient: f64, var: Variable) {
        if coefficient != 0.0 {
            self.objective += coefficient * var;
        }
    }

    pub fn add_objective_constant(&mut self, value: f64) {
        self.objective += value;
    }

    pub fn n_variables(&self) -> usize {
        self.columns.len()
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Every variable, in creation order.
    pub fn columns(&self) -> &[Variable] {
        &self.columns
    }

    /// Number of constraints added under `family` (zero if none).
    pub fn family_count(&self, family: &str) -> usize {
        self.families.get(family).copied().unwrap_or(0)
    }

    pub fn families(&self) -> &BTreeMap<&'static str, usize> {
        &self.families
    }

    pub fn into_parts(self) -> (ProblemVariables, Vec<Variable>, Expression, Vec<Constraint>) {
        (self.vars, self.columns, self.objective, self.constraints)
    }
}

impl std::fmt::Debug for LinearProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearProgram")
            .field("variables", &self.columns.len())
            .field("constraints", &self.constraints.len())
            .field("families", &self.families)
            .finish()
    }
}
