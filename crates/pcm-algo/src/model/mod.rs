//! Interval model builder: one DC power-flow LP per rolling-horizon interval.
//!
//! ```text
//! min  H·Σ_g b_g + Σ_h Σ_g a_g·pg[h,g] + penalties
//!
//! s.t. G·pg[h] + A·pf[h] + dis[h] − chg[h] + curt[h] − rec[h] + shed[h] = d[h]
//!      x_l·pf[h,l] = θ[h,to(l)] − θ[h,from(l)]          AC branches only
//!      θ[h,ref] = 0                                      one bus per AC island
//!      −rating_l ≤ pf[h,l] ≤ rating_l                    finite ratings only
//!      pmin_g ≤ pg[h,g] ≤ pmax_g                         finite pmax only
//!      |pg[h,g] − pg[h−1,g]| ≤ 2·ramp30_g               finite ramps only
//!      pg[h,hydro] = hydro[h];  pg[h,solar|wind] ≤ avail[h]
//!      soc[h] = soc[h−1] + e·chg[h] − dis[h]/e
//!      bal[h] = bal[h−1] + curt[h] − rec[h]
//! ```
//!
//! `G` and `A` are the topology's incidence matrices; the nodal balance for a
//! bus is read straight off its CSR rows. The hour before `h = 0` comes from
//! the carried state, which is what couples consecutive intervals.

pub mod lp;

use good_lp::{constraint, variable, Expression, Variable, VariableDefinition};
use pcm_core::{BusId, CaseError, DemandFlexibility, Storage, Topology};
use pcm_ts::{IntervalProfiles, IntervalWindow};

use crate::backends::Assignment;
use crate::error::ModelError;
use crate::state::CarryState;

pub use lp::LinearProgram;

/// Variable handles for one interval, `[hour][element]`.
#[derive(Debug, Clone)]
pub struct IntervalVariables {
    pub pg: Vec<Vec<Variable>>,
    pub pf: Vec<Vec<Variable>>,
    pub theta: Vec<Vec<Variable>>,
    pub storage: Option<StorageVariables>,
    pub flex: Option<FlexVariables>,
    /// Unserved demand per bus
    pub shed: Option<Vec<Vec<Variable>>>,
}

#[derive(Debug, Clone)]
pub struct StorageVariables {
    pub charge: Vec<Vec<Variable>>,
    pub discharge: Vec<Vec<Variable>>,
    pub soc: Vec<Vec<Variable>>,
}

/// Flexibility variables exist only for buses with a flexible fraction.
#[derive(Debug, Clone)]
pub struct FlexVariables {
    /// Bus index of each flexible column
    pub buses: Vec<usize>,
    pub curtail: Vec<Vec<Variable>>,
    pub recover: Vec<Vec<Variable>>,
    pub balance: Vec<Vec<Variable>>,
}

/// Linear objective kept outside the LP so it can be evaluated on an
/// assignment after the program has been handed to a solver.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveTerms {
    pub constant: f64,
    pub terms: Vec<(Variable, f64)>,
}

impl ObjectiveTerms {
    fn add(&mut self, coefficient: f64, var: Variable) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(var, c)| c * assignment.value(var))
                .sum::<f64>()
    }
}

/// Everything about an interval model except the LP itself.
#[derive(Debug, Clone)]
pub struct ModelLayout {
    pub window: IntervalWindow,
    pub vars: IntervalVariables,
    pub objective: ObjectiveTerms,
    /// Branch columns that received flow-limit constraints
    pub flow_limited: Vec<usize>,
    /// Generators that received ramp constraints
    pub ramp_limited: Vec<usize>,
}

#[derive(Debug)]
pub struct IntervalModel {
    pub lp: LinearProgram,
    pub layout: ModelLayout,
}

#[derive(Debug, Clone)]
struct StorageSet {
    bus: Vec<usize>,
    capacity: Vec<f64>,
    max_charge: Vec<f64>,
    max_discharge: Vec<f64>,
    efficiency: Vec<f64>,
}

#[derive(Debug, Clone)]
struct FlexSet {
    buses: Vec<usize>,
    fraction: Vec<f64>,
    interval_cap: f64,
    balance_cap: Option<f64>,
    settle_at_horizon_end: bool,
    cost_per_mwh: f64,
}

/// Builds interval models for one scenario.
///
/// Index sets (bounded branches, ramp-limited generators, storage buses,
/// flexible buses) are resolved once here and reused for every interval.
#[derive(Debug, Clone)]
pub struct ModelBuilder<'a> {
    topology: &'a Topology,
    flow_limited: Vec<usize>,
    ramp_limited: Vec<usize>,
    storage: Option<StorageSet>,
    flex: Option<FlexSet>,
    shed_penalty: Option<f64>,
}

fn grid(
    lp: &mut LinearProgram,
    hours: usize,
    width: usize,
    mut def: impl FnMut(usize, usize) -> VariableDefinition,
) -> Vec<Vec<Variable>> {
    let mut rows = Vec::with_capacity(hours);
    for h in 0..hours {
        let mut row = Vec::with_capacity(width);
        for j in 0..width {
            row.push(lp.add_variable(def(h, j)));
        }
        rows.push(row);
    }
    rows
}

fn check_shape(
    what: &'static str,
    table: &[Vec<f64>],
    hours: usize,
    width: usize,
) -> Result<(), ModelError> {
    let found = (table.len(), table.first().map_or(0, Vec::len));
    if found != (hours, width) || table.iter().any(|row| row.len() != width) {
        return Err(ModelError::ProfileShape {
            what,
            expected: (hours, width),
            found,
        });
    }
    Ok(())
}

fn check_carry(what: &'static str, values: &[f64], expected: usize) -> Result<(), ModelError> {
    if values.len() != expected {
        return Err(ModelError::CarryShape {
            what,
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

impl<'a> ModelBuilder<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self {
            topology,
            flow_limited: topology.bounded_branches(),
            ramp_limited: topology.ramp_limited_gens(),
            storage: None,
            flex: None,
            shed_penalty: None,
        }
    }

    /// Include storage units; fails if a unit sits on an unknown bus.
    pub fn with_storage(mut self, storage: &Storage) -> Result<Self, CaseError> {
        let mut set = StorageSet {
            bus: Vec::with_capacity(storage.len()),
            capacity: Vec::with_capacity(storage.len()),
            max_charge: Vec::with_capacity(storage.len()),
            max_discharge: Vec::with_capacity(storage.len()),
            efficiency: Vec::with_capacity(storage.len()),
        };
        for (i, unit) in storage.units.iter().enumerate() {
            let bus = self.resolve_bus(format!("storage {i}"), unit.bus)?;
            set.bus.push(bus);
            set.capacity.push(unit.capacity);
            set.max_charge.push(unit.max_charge);
            set.max_discharge.push(unit.max_discharge);
            set.efficiency.push(unit.efficiency);
        }
        self.storage = Some(set);
        Ok(self)
    }

    /// Include curtail-and-payback variables for buses with a flexible fraction.
    pub fn with_flexibility(mut self, flex: &DemandFlexibility) -> Result<Self, CaseError> {
        let mut buses = Vec::new();
        let mut fraction = Vec::new();
        for (&bus, &share) in &flex.fraction {
            if share > 0.0 {
                buses.push(self.resolve_bus("demand flexibility".to_string(), bus)?);
                fraction.push(share);
            }
        }
        self.flex = Some(FlexSet {
            buses,
            fraction,
            interval_cap: flex.interval_cap,
            balance_cap: flex.balance_cap,
            settle_at_horizon_end: flex.settle_at_horizon_end,
            cost_per_mwh: flex.cost_per_mwh,
        });
        Ok(self)
    }

    /// Allow demand to go unserved at `penalty` per MWh.
    pub fn with_load_shed(mut self, penalty: f64) -> Self {
        self.shed_penalty = Some(penalty);
        self
    }

    fn resolve_bus(&self, element: String, bus: BusId) -> Result<usize, CaseError> {
        self.topology
            .bus_index(bus)
            .ok_or(CaseError::DanglingBus {
                element,
                bus: bus.value(),
            })
    }

    pub fn flow_limited(&self) -> &[usize] {
        &self.flow_limited
    }

    pub fn ramp_limited(&self) -> &[usize] {
        &self.ramp_limited
    }

    fn check_inputs(&self, profiles: &IntervalProfiles, carry: &CarryState) -> Result<(), ModelError> {
        let topo = self.topology;
        let hours = profiles.window.length;
        check_shape("demand", &profiles.demand, hours, topo.n_bus())?;
        check_shape("hydro", &profiles.hydro, hours, topo.hydro().len())?;
        check_shape("solar", &profiles.solar, hours, topo.solar().len())?;
        check_shape("wind", &profiles.wind, hours, topo.wind().len())?;

        if let Some(dispatch) = &carry.dispatch {
            check_carry("dispatch", dispatch, topo.n_gen())?;
        }
        if let Some(storage) = &self.storage {
            check_carry("state of charge", &carry.soc, storage.bus.len())?;
        }
        if self.flex.is_some() {
            check_carry("flexibility balance", &carry.flex_balance, topo.n_bus())?;
        }
        Ok(())
    }

    /// Build the LP for `profiles.window`, seeded by `carry`.
    ///
    /// `last_interval` turns on flexibility settlement when configured.
    pub fn build(
        &self,
        profiles: &IntervalProfiles,
        carry: &CarryState,
        last_interval: bool,
    ) -> Result<IntervalModel, ModelError> {
        self.check_inputs(profiles, carry)?;

        let topo = self.topology;
        let hours = profiles.window.length;
        let n_bus = topo.n_bus();
        let mut lp = LinearProgram::new();
        let mut objective = ObjectiveTerms::default();

        // Generation, bounded by pmin and any finite pmax
        let (pmin, pmax) = (topo.gen_pmin(), topo.gen_pmax());
        let pg = grid(&mut lp, hours, topo.n_gen(), |_, g| {
            let def = variable().min(pmin[g]);
            if pmax[g].is_finite() {
                def.max(pmax[g])
            } else {
                def
            }
        });
        let pf = grid(&mut lp, hours, topo.n_branch(), |_, _| variable());
        let theta = grid(&mut lp, hours, n_bus, |_, _| variable());

        objective.constant = hours as f64 * topo.gen_cost().iter().map(|c| c.b).sum::<f64>();
        for row in &pg {
            for (g, &var) in row.iter().enumerate() {
                objective.add(topo.gen_cost()[g].a, var);
            }
        }

        let storage = self.storage.as_ref().map(|set| StorageVariables {
            charge: grid(&mut lp, hours, set.bus.len(), |_, u| {
                variable().min(0.0).max(set.max_charge[u])
            }),
            discharge: grid(&mut lp, hours, set.bus.len(), |_, u| {
                variable().min(0.0).max(set.max_discharge[u])
            }),
            soc: grid(&mut lp, hours, set.bus.len(), |_, u| {
                variable().min(0.0).max(set.capacity[u])
            }),
        });

        let flex = self.flex.as_ref().map(|set| {
            let cap = |h: usize, k: usize| set.fraction[k] * profiles.demand[h][set.buses[k]].max(0.0);
            let width = set.buses.len();
            let curtail = grid(&mut lp, hours, width, |h, k| variable().min(0.0).max(cap(h, k)));
            let recover = grid(&mut lp, hours, width, |h, k| variable().min(0.0).max(cap(h, k)));
            let balance = grid(&mut lp, hours, width, |_, _| match set.balance_cap {
                Some(limit) => variable().min(0.0).max(limit),
                None => variable().min(0.0),
            });
            FlexVariables {
                buses: set.buses.clone(),
                curtail,
                recover,
                balance,
            }
        });

        let shed = self.shed_penalty.map(|penalty| {
            let shed = grid(&mut lp, hours, n_bus, |h, b| {
                variable().min(0.0).max(profiles.demand[h][b].max(0.0))
            });
            for row in &shed {
                for &var in row {
                    objective.add(penalty, var);
                }
            }
            shed
        });

        // Nodal power balance from the incidence rows
        let mut storage_at_bus: Vec<Vec<usize>> = vec![Vec::new(); n_bus];
        if let Some(set) = &self.storage {
            for (u, &bus) in set.bus.iter().enumerate() {
                storage_at_bus[bus].push(u);
            }
        }
        let mut flex_at_bus: Vec<Option<usize>> = vec![None; n_bus];
        if let Some(set) = &self.flex {
            for (k, &bus) in set.buses.iter().enumerate() {
                flex_at_bus[bus] = Some(k);
            }
        }
        let (gen_rows, branch_rows) = (topo.gen_to_bus(), topo.branch_to_bus());
        for h in 0..hours {
            for bus in 0..n_bus {
                let mut injection = Expression::from(0.0);
                if let Some(row) = gen_rows.outer_view(bus) {
                    for (g, &coef) in row.iter() {
                        injection += coef * pg[h][g];
                    }
                }
                if let Some(row) = branch_rows.outer_view(bus) {
                    for (l, &coef) in row.iter() {
                        injection += coef * pf[h][l];
                    }
                }
                if let Some(vars) = &storage {
                    for &u in &storage_at_bus[bus] {
                        injection += vars.discharge[h][u];
                        injection -= vars.charge[h][u];
                    }
                }
                if let (Some(vars), Some(k)) = (&flex, flex_at_bus[bus]) {
                    injection += vars.curtail[h][k];
                    injection -= vars.recover[h][k];
                }
                if let Some(shed) = &shed {
                    injection += shed[h][bus];
                }
                let demand = profiles.demand[h][bus];
                lp.add_constraint("power_balance", constraint!(injection == demand));
            }
        }

        // DC power flow on AC branches
        let (from, to, reactance) = (topo.branch_from(), topo.branch_to(), topo.ac_reactance());
        for h in 0..hours {
            for l in 0..topo.n_ac_branch() {
                let mut angle = Expression::from(reactance[l] * pf[h][l]);
                angle -= theta[h][to[l]];
                angle += theta[h][from[l]];
                lp.add_constraint("branch_angle", constraint!(angle == 0.0));
            }
            for &bus in topo.reference_buses() {
                let var = theta[h][bus];
                lp.add_constraint("angle_reference", constraint!(var == 0.0));
            }
        }

        let rating = topo.branch_rating();
        for h in 0..hours {
            for &l in &self.flow_limited {
                let (var, limit) = (pf[h][l], rating[l]);
                lp.add_constraint("flow_limit", constraint!(var <= limit));
                lp.add_constraint("flow_limit", constraint!(var >= -limit));
            }
        }

        // Ramp limits, including the step in from the carried dispatch
        let ramp30 = topo.gen_ramp30();
        for &g in &self.ramp_limited {
            let limit = 2.0 * ramp30[g];
            if let Some(prev) = &carry.dispatch {
                let (var, before) = (pg[0][g], prev[g]);
                lp.add_constraint("ramp_up", constraint!(var <= before + limit));
                lp.add_constraint("ramp_down", constraint!(var >= before - limit));
            }
            for h in 1..hours {
                let (var, before) = (pg[h][g], pg[h - 1][g]);
                lp.add_constraint("ramp_up", constraint!(var - before <= limit));
                lp.add_constraint("ramp_down", constraint!(before - var <= limit));
            }
        }

        // Profile-driven generators
        for h in 0..hours {
            for (k, &g) in topo.hydro().iter().enumerate() {
                let (var, fixed) = (pg[h][g], profiles.hydro[h][k]);
                lp.add_constraint("hydro_fixed", constraint!(var == fixed));
            }
            for (k, &g) in topo.solar().iter().enumerate() {
                let (var, available) = (pg[h][g], profiles.solar[h][k]);
                lp.add_constraint("solar_max", constraint!(var <= available));
            }
            for (k, &g) in topo.wind().iter().enumerate() {
                let (var, available) = (pg[h][g], profiles.wind[h][k]);
                lp.add_constraint("wind_max", constraint!(var <= available));
            }
        }

        if let (Some(set), Some(vars)) = (&self.storage, &storage) {
            for u in 0..set.bus.len() {
                let e = set.efficiency[u];
                for h in 0..hours {
                    let mut dynamics = Expression::from(vars.soc[h][u]);
                    if h == 0 {
                        dynamics -= carry.soc[u];
                    } else {
                        dynamics -= vars.soc[h - 1][u];
                    }
                    dynamics -= e * vars.charge[h][u];
                    dynamics += (1.0 / e) * vars.discharge[h][u];
                    lp.add_constraint("storage_soc", constraint!(dynamics == 0.0));
                }
            }
        }

        if let (Some(set), Some(vars)) = (&self.flex, &flex) {
            for (k, &bus) in set.buses.iter().enumerate() {
                let mut curtailed = Expression::from(0.0);
                for h in 0..hours {
                    let mut dynamics = Expression::from(vars.balance[h][k]);
                    if h == 0 {
                        dynamics -= carry.flex_balance[bus];
                    } else {
                        dynamics -= vars.balance[h - 1][k];
                    }
                    dynamics -= vars.curtail[h][k];
                    dynamics += vars.recover[h][k];
                    lp.add_constraint("flex_balance", constraint!(dynamics == 0.0));

                    curtailed += vars.curtail[h][k];
                    objective.add(set.cost_per_mwh, vars.curtail[h][k]);
                }
                if set.interval_cap.is_finite() {
                    let cap = set.interval_cap;
                    lp.add_constraint("flex_interval_cap", constraint!(curtailed <= cap));
                }
                if last_interval && set.settle_at_horizon_end {
                    let owed = vars.balance[hours - 1][k];
                    lp.add_constraint("flex_settle", constraint!(owed == 0.0));
                }
            }
        }

        for &(var, coefficient) in &objective.terms {
            lp.add_objective_term(coefficient, var);
        }
        lp.add_objective_constant(objective.constant);

        tracing::debug!(
            start = profiles.window.start_index,
            hours,
            variables = lp.n_variables(),
            constraints = lp.n_constraints(),
            "built interval model"
        );

        Ok(IntervalModel {
            lp,
            layout: ModelLayout {
                window: profiles.window,
                vars: IntervalVariables {
                    pg,
                    pf,
                    theta,
                    storage,
                    flex,
                    shed,
                },
                objective,
                flow_limited: self.flow_limited.clone(),
                ramp_limited: self.ramp_limited.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_core::{BusData, BranchData, Case, CaseData, DcLineData, Fuel, GenData, StorageUnit};
    use std::collections::BTreeMap;

    fn gen(id: u64, bus: u64, fuel: Fuel, ramp30: f64) -> GenData {
        GenData {
            id,
            bus,
            fuel,
            pmin: 0.0,
            pmax: 100.0,
            ramp30,
            c0: 0.0,
            c1: 10.0,
            c2: 0.0,
            pg0: 0.0,
        }
    }

    fn case() -> Case {
        Case::from_data(CaseData {
            buses: vec![
                BusData { id: 1, demand: 0.0, zone: 1 },
                BusData { id: 2, demand: 0.0, zone: 1 },
                BusData { id: 3, demand: 60.0, zone: 1 },
            ],
            branches: vec![
                BranchData { id: 1, from_bus: 1, to_bus: 2, reactance: 0.1, rating: 0.0 },
                BranchData { id: 2, from_bus: 2, to_bus: 3, reactance: 0.1, rating: 50.0 },
            ],
            dc_lines: vec![],
            gens: vec![
                gen(1, 1, Fuel::Coal, 5.0),
                gen(2, 2, Fuel::Solar, 0.0),
                gen(3, 3, Fuel::Ng, 0.0),
            ],
        })
        .unwrap()
    }

    fn profiles(hours: usize) -> IntervalProfiles {
        IntervalProfiles {
            window: IntervalWindow::new(1, hours).unwrap(),
            demand: vec![vec![0.0, 0.0, 60.0]; hours],
            hydro: vec![Vec::new(); hours],
            solar: vec![vec![20.0]; hours],
            wind: vec![Vec::new(); hours],
        }
    }

    #[test]
    fn test_zero_rating_branch_not_flow_limited() {
        let case = case();
        let topo = Topology::build(&case).unwrap();
        let model = ModelBuilder::new(&topo)
            .build(&profiles(3), &CarryState::default(), true)
            .unwrap();
        assert_eq!(model.layout.flow_limited, vec![1]);
        assert_eq!(model.lp.family_count("flow_limit"), 2 * 3);
    }

    #[test]
    fn test_dc_line_has_flow_but_no_angle_relation() {
        let case = Case::from_data(CaseData {
            buses: vec![
                BusData { id: 1, demand: 0.0, zone: 1 },
                BusData { id: 2, demand: 0.0, zone: 1 },
                BusData { id: 3, demand: 60.0, zone: 1 },
            ],
            branches: vec![
                BranchData { id: 1, from_bus: 1, to_bus: 2, reactance: 0.1, rating: 0.0 },
                BranchData { id: 2, from_bus: 2, to_bus: 3, reactance: 0.1, rating: 50.0 },
            ],
            dc_lines: vec![DcLineData { id: 3, from_bus: 3, to_bus: 1, rating: 25.0 }],
            gens: vec![
                gen(1, 1, Fuel::Coal, 5.0),
                gen(2, 2, Fuel::Solar, 0.0),
                gen(3, 3, Fuel::Ng, 0.0),
            ],
        })
        .unwrap();
        let topo = Topology::build(&case).unwrap();
        let hours = 2;
        let model = ModelBuilder::new(&topo)
            .build(&profiles(hours), &CarryState::default(), true)
            .unwrap();

        assert_eq!(model.layout.vars.pf[0].len(), 3);
        assert_eq!(model.lp.family_count("branch_angle"), 2 * hours);
        // Branch 2 and the DC line are rated; branch 1 is not
        assert_eq!(model.layout.flow_limited, vec![1, 2]);
        assert_eq!(model.lp.family_count("flow_limit"), 2 * 2 * hours);
        assert_eq!(model.lp.family_count("angle_reference"), hours);
    }

    #[test]
    fn test_constraint_families() {
        let case = case();
        let topo = Topology::build(&case).unwrap();
        let builder = ModelBuilder::new(&topo);
        let hours = 4;
        let model = builder
            .build(&profiles(hours), &CarryState::default(), true)
            .unwrap();
        let lp = &model.lp;

        assert_eq!(lp.family_count("power_balance"), 3 * hours);
        assert_eq!(lp.family_count("branch_angle"), 2 * hours);
        assert_eq!(lp.family_count("angle_reference"), hours);
        assert_eq!(lp.family_count("solar_max"), hours);
        assert_eq!(lp.family_count("hydro_fixed"), 0);
        // Only gen 1 has a finite ramp; no carried dispatch, so intra-interval only
        assert_eq!(model.layout.ramp_limited, vec![0]);
        assert_eq!(lp.family_count("ramp_up"), hours - 1);
        assert_eq!(lp.family_count("ramp_down"), hours - 1);
        assert_eq!(lp.n_variables(), (3 + 2 + 3) * hours);
    }

    #[test]
    fn test_carried_dispatch_adds_first_hour_ramp() {
        let case = case();
        let topo = Topology::build(&case).unwrap();
        let carry = CarryState {
            dispatch: Some(vec![30.0, 0.0, 30.0]),
            ..Default::default()
        };
        let model = ModelBuilder::new(&topo)
            .build(&profiles(1), &carry, true)
            .unwrap();
        assert_eq!(model.lp.family_count("ramp_up"), 1);
        assert_eq!(model.lp.family_count("ramp_down"), 1);
    }

    #[test]
    fn test_objective_constant_scales_with_hours() {
        let mut data = CaseData {
            buses: vec![BusData { id: 1, demand: 10.0, zone: 1 }],
            ..Default::default()
        };
        let mut g = gen(1, 1, Fuel::Ng, 0.0);
        g.c0 = 7.0;
        data.gens.push(g);
        let case = Case::from_data(data).unwrap();
        let topo = Topology::build(&case).unwrap();
        let profiles = IntervalProfiles {
            window: IntervalWindow::new(1, 5).unwrap(),
            demand: vec![vec![10.0]; 5],
            hydro: vec![Vec::new(); 5],
            solar: vec![Vec::new(); 5],
            wind: vec![Vec::new(); 5],
        };
        let model = ModelBuilder::new(&topo)
            .build(&profiles, &CarryState::default(), true)
            .unwrap();
        assert_eq!(model.layout.objective.constant, 35.0);
        assert_eq!(model.layout.objective.terms.len(), 5);
    }

    #[test]
    fn test_storage_and_flex_families() {
        let case = case();
        let topo = Topology::build(&case).unwrap();
        let storage = Storage::new(vec![StorageUnit {
            bus: BusId::new(3),
            capacity: 40.0,
            max_charge: 10.0,
            max_discharge: 10.0,
            efficiency: 0.95,
            initial_soc: 20.0,
        }]);
        let flex = DemandFlexibility {
            enabled: true,
            fraction: BTreeMap::from([(BusId::new(3), 0.1)]),
            interval_cap: 12.0,
            ..Default::default()
        };
        let builder = ModelBuilder::new(&topo)
            .with_storage(&storage)
            .unwrap()
            .with_flexibility(&flex)
            .unwrap()
            .with_load_shed(9000.0);
        let carry = CarryState {
            dispatch: None,
            soc: vec![20.0],
            flex_balance: vec![0.0; 3],
        };

        let hours = 3;
        let model = builder.build(&profiles(hours), &carry, false).unwrap();
        assert_eq!(model.lp.family_count("storage_soc"), hours);
        assert_eq!(model.lp.family_count("flex_balance"), hours);
        assert_eq!(model.lp.family_count("flex_interval_cap"), 1);
        assert_eq!(model.lp.family_count("flex_settle"), 0);
        assert_eq!(model.layout.vars.flex.as_ref().unwrap().buses, vec![2]);
        assert_eq!(model.layout.vars.shed.as_ref().unwrap()[0].len(), 3);

        let last = builder.build(&profiles(hours), &carry, true).unwrap();
        assert_eq!(last.lp.family_count("flex_settle"), 1);
    }

    #[test]
    fn test_shape_mismatches_rejected() {
        let case = case();
        let topo = Topology::build(&case).unwrap();
        let builder = ModelBuilder::new(&topo);

        let mut bad = profiles(2);
        bad.solar = vec![Vec::new(); 2];
        assert!(matches!(
            builder.build(&bad, &CarryState::default(), true),
            Err(ModelError::ProfileShape { what: "solar", .. })
        ));

        let carry = CarryState {
            dispatch: Some(vec![0.0]),
            ..Default::default()
        };
        assert_eq!(
            builder.build(&profiles(2), &carry, true).unwrap_err(),
            ModelError::CarryShape {
                what: "dispatch",
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn test_storage_on_unknown_bus_rejected() {
        let case = case();
        let topo = Topology::build(&case).unwrap();
        let storage = Storage::new(vec![StorageUnit {
            bus: BusId::new(42),
            capacity: 1.0,
            max_charge: 1.0,
            max_discharge: 1.0,
            efficiency: 1.0,
            initial_soc: 0.0,
        }]);
        assert!(matches!(
            ModelBuilder::new(&topo).with_storage(&storage),
            Err(CaseError::DanglingBus { bus: 42, .. })
        ));
    }
}
