//! Results extraction: solved variable values to plain hour-by-element tables.
//!
//! Tables are `[hour][element]` with hours numbered absolutely (1-based, as in
//! the profile tables). Per-interval tables are appended onto the scenario
//! tables in interval order.

use pcm_core::{BranchId, BusId, GenId, Topology};
use serde::Serialize;

use crate::backends::Assignment;
use crate::model::ModelLayout;
use crate::state::CarryState;

pub type Table = Vec<Vec<f64>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageTrajectory {
    pub charge: Table,
    pub discharge: Table,
    /// State of charge at the end of each hour
    pub soc: Table,
}

impl StorageTrajectory {
    fn extend(&mut self, other: &StorageTrajectory) {
        self.charge.extend_from_slice(&other.charge);
        self.discharge.extend_from_slice(&other.discharge);
        self.soc.extend_from_slice(&other.soc);
    }
}

/// Flexible demand per bus; inflexible buses read zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlexUsage {
    pub curtail: Table,
    pub recover: Table,
    /// Owed balance at the end of each hour
    pub balance: Table,
}

impl FlexUsage {
    fn extend(&mut self, other: &FlexUsage) {
        self.curtail.extend_from_slice(&other.curtail);
        self.recover.extend_from_slice(&other.recover);
        self.balance.extend_from_slice(&other.balance);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalResults {
    /// 0-based interval index
    pub interval: usize,
    pub hours: Vec<usize>,
    pub objective: f64,
    pub pg: Table,
    pub pf: Table,
    pub theta: Table,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageTrajectory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flex: Option<FlexUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_shed: Option<Table>,
}

fn read(assignment: &Assignment, vars: &[Vec<good_lp::Variable>]) -> Table {
    vars.iter()
        .map(|row| row.iter().map(|&v| assignment.value(v)).collect())
        .collect()
}

/// Read an interval's values and derive the state that seeds the next one.
///
/// Carried dispatch, state of charge and owed balance are taken from the last
/// hour of the interval exactly as solved.
pub fn extract(
    layout: &ModelLayout,
    assignment: &Assignment,
    interval: usize,
    n_bus: usize,
    previous: &CarryState,
) -> (IntervalResults, CarryState) {
    let vars = &layout.vars;
    let pg = read(assignment, &vars.pg);

    let storage = vars.storage.as_ref().map(|s| StorageTrajectory {
        charge: read(assignment, &s.charge),
        discharge: read(assignment, &s.discharge),
        soc: read(assignment, &s.soc),
    });

    let flex = vars.flex.as_ref().map(|f| {
        let spread = |table: &[Vec<good_lp::Variable>], base: Option<&[f64]>| -> Table {
            table
                .iter()
                .map(|row| {
                    let mut full = match base {
                        Some(values) => values.to_vec(),
                        None => vec![0.0; n_bus],
                    };
                    for (k, &var) in row.iter().enumerate() {
                        full[f.buses[k]] = assignment.value(var);
                    }
                    full
                })
                .collect()
        };
        FlexUsage {
            curtail: spread(&f.curtail, None),
            recover: spread(&f.recover, None),
            balance: spread(&f.balance, Some(previous.flex_balance.as_slice())),
        }
    });

    let next = CarryState {
        dispatch: pg.last().cloned(),
        soc: storage
            .as_ref()
            .and_then(|s| s.soc.last().cloned())
            .unwrap_or_else(|| previous.soc.clone()),
        flex_balance: flex
            .as_ref()
            .and_then(|f| f.balance.last().cloned())
            .unwrap_or_else(|| previous.flex_balance.clone()),
    };

    let results = IntervalResults {
        interval,
        hours: layout.window.hours().collect(),
        objective: layout.objective.evaluate(assignment),
        pg,
        pf: read(assignment, &vars.pf),
        theta: read(assignment, &vars.theta),
        storage,
        flex,
        load_shed: vars.shed.as_ref().map(|s| read(assignment, s)),
    };
    (results, next)
}

/// Full-horizon tables accumulated by the rolling-horizon loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioResults {
    pub gen_ids: Vec<GenId>,
    pub branch_ids: Vec<BranchId>,
    pub bus_ids: Vec<BusId>,
    /// Bus of each storage unit
    pub storage_buses: Vec<BusId>,
    pub hours: Vec<usize>,
    /// Objective of each completed interval
    pub interval_objectives: Vec<f64>,
    pub pg: Table,
    pub pf: Table,
    pub theta: Table,
    pub storage: Option<StorageTrajectory>,
    pub flex: Option<FlexUsage>,
    pub load_shed: Option<Table>,
    /// State after the last completed interval
    pub final_state: CarryState,
}

impl ScenarioResults {
    pub fn new(topology: &Topology, storage_buses: Vec<BusId>, initial: CarryState) -> Self {
        Self {
            gen_ids: topology.gen_ids().to_vec(),
            branch_ids: topology.branch_ids().to_vec(),
            bus_ids: topology.bus_ids().to_vec(),
            storage_buses,
            final_state: initial,
            ..Default::default()
        }
    }

    pub fn append(&mut self, interval: &IntervalResults, state: &CarryState) {
        self.hours.extend_from_slice(&interval.hours);
        self.interval_objectives.push(interval.objective);
        self.pg.extend_from_slice(&interval.pg);
        self.pf.extend_from_slice(&interval.pf);
        self.theta.extend_from_slice(&interval.theta);
        if let Some(storage) = &interval.storage {
            self.storage.get_or_insert_with(Default::default).extend(storage);
        }
        if let Some(flex) = &interval.flex {
            self.flex.get_or_insert_with(Default::default).extend(flex);
        }
        if let Some(shed) = &interval.load_shed {
            self.load_shed
                .get_or_insert_with(Vec::new)
                .extend_from_slice(shed);
        }
        self.final_state = state.clone();
    }

    pub fn intervals_completed(&self) -> usize {
        self.interval_objectives.len()
    }

    /// 0-based index of the last completed interval.
    pub fn last_completed(&self) -> Option<usize> {
        self.intervals_completed().checked_sub(1)
    }

    pub fn total_objective(&self) -> f64 {
        self.interval_objectives.iter().sum()
    }

    /// Total unserved energy across the horizon (MWh).
    pub fn total_load_shed(&self) -> f64 {
        self.load_shed
            .as_ref()
            .map_or(0.0, |t| t.iter().flatten().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(index: usize, hours: Vec<usize>, objective: f64) -> IntervalResults {
        let n = hours.len();
        IntervalResults {
            interval: index,
            hours,
            objective,
            pg: vec![vec![1.0, 2.0]; n],
            pf: vec![vec![0.5]; n],
            theta: vec![vec![0.0, 0.1]; n],
            storage: None,
            flex: None,
            load_shed: Some(vec![vec![0.0, 0.25]; n]),
        }
    }

    #[test]
    fn test_append_concatenates_in_order() {
        let mut results = ScenarioResults::default();
        assert_eq!(results.last_completed(), None);

        let state = CarryState {
            dispatch: Some(vec![1.0, 2.0]),
            ..Default::default()
        };
        results.append(&interval(0, vec![1, 2], 10.0), &state);
        results.append(&interval(1, vec![3, 4], 12.5), &state);

        assert_eq!(results.hours, vec![1, 2, 3, 4]);
        assert_eq!(results.pg.len(), 4);
        assert_eq!(results.intervals_completed(), 2);
        assert_eq!(results.last_completed(), Some(1));
        assert_eq!(results.total_objective(), 22.5);
        assert_eq!(results.total_load_shed(), 1.0);
        assert_eq!(results.final_state, state);
        assert!(results.storage.is_none());
    }
}
