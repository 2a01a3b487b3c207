//! Dense index sets and sparse incidence matrices derived from a [`Case`].
//!
//! ```text
//! gen_to_bus    (n_bus × n_gen):    G[bus(g), g] = 1
//! branch_to_bus (n_bus × n_branch): A[to(br), br] = +1, A[from(br), br] = -1
//! ```
//!
//! Branch columns list AC branches first, then DC lines. With those two
//! matrices the nodal balance for one hour reads `G·pg + A·pf = demand`, so
//! model builders walk matrix rows instead of searching element lists.
//!
//! Data-cleaning conventions are applied here, once: a rating, `pmax` or
//! `ramp30` of exactly zero becomes `+∞`, and profile-driven generators
//! (hydro, solar, wind) get an unbounded `pmax` since their ceiling comes from
//! their availability profile.

use std::collections::{HashMap, HashSet};

use petgraph::unionfind::UnionFind;
use sprs::{CsMat, TriMat};

use crate::case::LinearCost;
use crate::diagnostics::Diagnostics;
use crate::error::{CaseError, CaseResult};
use crate::{BranchId, BusId, Case, GenId};

fn zero_as_unbounded(value: f64) -> f64 {
    if value == 0.0 {
        f64::INFINITY
    } else {
        value
    }
}

#[derive(Debug, Clone)]
pub struct Topology {
    bus_ids: Vec<BusId>,
    bus_index: HashMap<BusId, usize>,
    gen_ids: Vec<GenId>,
    gen_bus: Vec<usize>,
    gen_pmin: Vec<f64>,
    gen_pmax: Vec<f64>,
    gen_ramp30: Vec<f64>,
    gen_cost: Vec<LinearCost>,
    gen_pg0: Vec<f64>,
    branch_ids: Vec<BranchId>,
    branch_from: Vec<usize>,
    branch_to: Vec<usize>,
    branch_rating: Vec<f64>,
    ac_reactance: Vec<f64>,
    gen_to_bus: CsMat<f64>,
    branch_to_bus: CsMat<f64>,
    hydro: Vec<usize>,
    solar: Vec<usize>,
    wind: Vec<usize>,
    reference_buses: Vec<usize>,
    island_of_bus: Vec<usize>,
    bus_share: Vec<f64>,
}

impl Topology {
    /// Derive index maps, incidence matrices and fuel subsets from `case`.
    ///
    /// Fails with [`CaseError::DanglingBus`] when any generator or branch
    /// references a bus missing from the bus table.
    pub fn build(case: &Case) -> CaseResult<Self> {
        let bus_ids: Vec<BusId> = case.buses().iter().map(|b| b.id).collect();
        let bus_index: HashMap<BusId, usize> = bus_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();
        let n_bus = bus_ids.len();

        let lookup = |element: String, bus: BusId| -> CaseResult<usize> {
            bus_index
                .get(&bus)
                .copied()
                .ok_or(CaseError::DanglingBus {
                    element,
                    bus: bus.value(),
                })
        };

        let gens = case.gens();
        let mut gen_bus = Vec::with_capacity(gens.len());
        let mut gen_triplets = TriMat::new((n_bus, gens.len()));
        for (g, gen) in gens.iter().enumerate() {
            let bus = lookup(gen.id.to_string(), gen.bus)?;
            gen_triplets.add_triplet(bus, g, 1.0);
            gen_bus.push(bus);
        }

        let n_branch = case.branches().len() + case.dc_lines().len();
        let mut branch_ids = Vec::with_capacity(n_branch);
        let mut branch_from = Vec::with_capacity(n_branch);
        let mut branch_to = Vec::with_capacity(n_branch);
        let mut branch_rating = Vec::with_capacity(n_branch);
        let mut ac_reactance = Vec::with_capacity(case.branches().len());

        for branch in case.branches() {
            branch_ids.push(branch.id);
            branch_from.push(lookup(branch.id.to_string(), branch.from_bus)?);
            branch_to.push(lookup(branch.id.to_string(), branch.to_bus)?);
            branch_rating.push(zero_as_unbounded(branch.rating));
            ac_reactance.push(branch.reactance);
        }
        for line in case.dc_lines() {
            let label = format!("dc line {}", line.id.value());
            branch_ids.push(line.id);
            branch_from.push(lookup(label.clone(), line.from_bus)?);
            branch_to.push(lookup(label, line.to_bus)?);
            branch_rating.push(zero_as_unbounded(line.rating));
        }

        let mut branch_triplets = TriMat::new((n_bus, n_branch));
        for br in 0..n_branch {
            branch_triplets.add_triplet(branch_to[br], br, 1.0);
            branch_triplets.add_triplet(branch_from[br], br, -1.0);
        }

        let mut hydro = Vec::new();
        let mut solar = Vec::new();
        let mut wind = Vec::new();
        for (g, gen) in gens.iter().enumerate() {
            if gen.fuel.is_hydro() {
                hydro.push(g);
            } else if gen.fuel.is_solar() {
                solar.push(g);
            } else if gen.fuel.is_wind() {
                wind.push(g);
            }
        }

        let gen_pmax = gens
            .iter()
            .map(|g| {
                if g.fuel.is_profile_driven() {
                    f64::INFINITY
                } else {
                    zero_as_unbounded(g.pmax)
                }
            })
            .collect();

        // Angle references follow AC connectivity only; islands for supply
        // checks also follow DC lines.
        let n_ac = ac_reactance.len();
        let mut ac_sets = UnionFind::<usize>::new(n_bus);
        let mut all_sets = UnionFind::<usize>::new(n_bus);
        for br in 0..n_branch {
            if br < n_ac {
                ac_sets.union(branch_from[br], branch_to[br]);
            }
            all_sets.union(branch_from[br], branch_to[br]);
        }
        let mut seen_roots = HashSet::new();
        let mut reference_buses = Vec::new();
        for bus in 0..n_bus {
            if seen_roots.insert(ac_sets.find(bus)) {
                reference_buses.push(bus);
            }
        }
        let island_of_bus = (0..n_bus).map(|bus| all_sets.find(bus)).collect();

        Ok(Self {
            bus_ids,
            bus_index,
            gen_ids: gens.iter().map(|g| g.id).collect(),
            gen_bus,
            gen_pmin: gens.iter().map(|g| g.pmin).collect(),
            gen_pmax,
            gen_ramp30: gens.iter().map(|g| zero_as_unbounded(g.ramp30)).collect(),
            gen_cost: gens.iter().map(|g| g.cost).collect(),
            gen_pg0: gens.iter().map(|g| g.pg0).collect(),
            branch_ids,
            branch_from,
            branch_to,
            branch_rating,
            ac_reactance,
            gen_to_bus: gen_triplets.to_csr(),
            branch_to_bus: branch_triplets.to_csr(),
            hydro,
            solar,
            wind,
            reference_buses,
            island_of_bus,
            bus_share: case.bus_zone_shares(),
        })
    }

    pub fn n_bus(&self) -> usize {
        self.bus_ids.len()
    }

    pub fn n_gen(&self) -> usize {
        self.gen_ids.len()
    }

    /// AC branches plus DC lines.
    pub fn n_branch(&self) -> usize {
        self.branch_ids.len()
    }

    pub fn n_ac_branch(&self) -> usize {
        self.ac_reactance.len()
    }

    pub fn bus_ids(&self) -> &[BusId] {
        &self.bus_ids
    }

    pub fn bus_index(&self, id: BusId) -> Option<usize> {
        self.bus_index.get(&id).copied()
    }

    pub fn gen_ids(&self) -> &[GenId] {
        &self.gen_ids
    }

    pub fn branch_ids(&self) -> &[BranchId] {
        &self.branch_ids
    }

    /// Generator-to-bus incidence, CSR with bus rows.
    pub fn gen_to_bus(&self) -> &CsMat<f64> {
        &self.gen_to_bus
    }

    /// Branch-to-bus incidence, CSR with bus rows.
    pub fn branch_to_bus(&self) -> &CsMat<f64> {
        &self.branch_to_bus
    }

    pub fn gen_bus(&self) -> &[usize] {
        &self.gen_bus
    }

    pub fn gen_pmin(&self) -> &[f64] {
        &self.gen_pmin
    }

    /// Dispatch ceiling; `+∞` for profile-driven units and zero source values.
    pub fn gen_pmax(&self) -> &[f64] {
        &self.gen_pmax
    }

    /// Half-hour ramp limit; `+∞` where the source value is zero.
    pub fn gen_ramp30(&self) -> &[f64] {
        &self.gen_ramp30
    }

    pub fn gen_cost(&self) -> &[LinearCost] {
        &self.gen_cost
    }

    /// Dispatch at scenario start, used for first-interval ramp continuity.
    pub fn gen_pg0(&self) -> &[f64] {
        &self.gen_pg0
    }

    pub fn branch_from(&self) -> &[usize] {
        &self.branch_from
    }

    pub fn branch_to(&self) -> &[usize] {
        &self.branch_to
    }

    /// Rating per branch column; `+∞` where the source rating is zero.
    pub fn branch_rating(&self) -> &[f64] {
        &self.branch_rating
    }

    /// Reactance of the AC branch columns (the first `n_ac_branch`).
    pub fn ac_reactance(&self) -> &[f64] {
        &self.ac_reactance
    }

    pub fn hydro(&self) -> &[usize] {
        &self.hydro
    }

    pub fn solar(&self) -> &[usize] {
        &self.solar
    }

    pub fn wind(&self) -> &[usize] {
        &self.wind
    }

    /// Branch columns with a finite rating.
    pub fn bounded_branches(&self) -> Vec<usize> {
        (0..self.n_branch())
            .filter(|&br| self.branch_rating[br].is_finite())
            .collect()
    }

    /// Generators with a finite dispatch ceiling.
    pub fn bounded_gens(&self) -> Vec<usize> {
        (0..self.n_gen())
            .filter(|&g| self.gen_pmax[g].is_finite())
            .collect()
    }

    /// Generators with a finite ramp limit.
    pub fn ramp_limited_gens(&self) -> Vec<usize> {
        (0..self.n_gen())
            .filter(|&g| self.gen_ramp30[g].is_finite())
            .collect()
    }

    /// One bus per AC-connected island whose angle is pinned to zero.
    pub fn reference_buses(&self) -> &[usize] {
        &self.reference_buses
    }

    /// Number of islands when AC branches and DC lines both connect buses.
    pub fn island_count(&self) -> usize {
        let mut roots = self.island_of_bus.clone();
        roots.sort_unstable();
        roots.dedup();
        roots.len()
    }

    /// Islands that contain no generator at all.
    ///
    /// Such an island is an error when any of its buses takes a share of
    /// zonal demand, since every interval is then infeasible without load
    /// shedding. Otherwise it is only a warning.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();
        let supplied: HashSet<usize> = self
            .gen_bus
            .iter()
            .map(|&bus| self.island_of_bus[bus])
            .collect();
        let demanded: HashSet<usize> = (0..self.n_bus())
            .filter(|&bus| self.bus_share[bus] > 0.0)
            .map(|bus| self.island_of_bus[bus])
            .collect();

        let mut reported = HashSet::new();
        for bus in 0..self.n_bus() {
            let root = self.island_of_bus[bus];
            if supplied.contains(&root) || !reported.insert(root) {
                continue;
            }
            let entity = self.bus_ids[bus].to_string();
            if demanded.contains(&root) {
                diag.add_error_with_entity(
                    "topology",
                    "island has demand but no generation",
                    &entity,
                );
            } else {
                diag.add_warning_with_entity("topology", "island has no generation", &entity);
            }
        }
        diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{CaseData, DcLineData, Fuel};
    use crate::fixtures::three_bus_data;

    fn topology(data: CaseData) -> Topology {
        Topology::build(&Case::from_data(data).unwrap()).unwrap()
    }

    #[test]
    fn test_bus_index_map() {
        let mut data = three_bus_data();
        data.buses[0].id = 10;
        data.branches[0].from_bus = 10;
        data.gens[0].bus = 10;
        let topo = topology(data);
        assert_eq!(topo.bus_index(BusId::new(10)), Some(0));
        assert_eq!(topo.bus_index(BusId::new(3)), Some(2));
        assert_eq!(topo.bus_index(BusId::new(1)), None);
    }

    #[test]
    fn test_gen_incidence_one_per_column() {
        let topo = topology(three_bus_data());
        let g = topo.gen_to_bus();
        assert_eq!(g.shape(), (3, 3));
        assert_eq!(g.nnz(), topo.n_gen());

        let by_column = g.to_csc();
        for col in 0..topo.n_gen() {
            let column = by_column.outer_view(col).unwrap();
            assert_eq!(column.nnz(), 1);
            let (row, &value) = column.iter().next().unwrap();
            assert_eq!(row, topo.gen_bus()[col]);
            assert_eq!(value, 1.0);
        }
    }

    #[test]
    fn test_branch_incidence_two_per_column() {
        let mut data = three_bus_data();
        data.dc_lines.push(DcLineData {
            id: 5,
            from_bus: 3,
            to_bus: 1,
            rating: 25.0,
        });
        let topo = topology(data);
        assert_eq!(topo.n_branch(), 3);
        assert_eq!(topo.n_ac_branch(), 2);

        let by_column = topo.branch_to_bus().to_csc();
        for col in 0..topo.n_branch() {
            let column = by_column.outer_view(col).unwrap();
            assert_eq!(column.nnz(), 2);
            let sum: f64 = column.iter().map(|(_, &v)| v).sum();
            assert_eq!(sum, 0.0);
            for (row, &value) in column.iter() {
                if value > 0.0 {
                    assert_eq!(row, topo.branch_to()[col]);
                    assert_eq!(value, 1.0);
                } else {
                    assert_eq!(row, topo.branch_from()[col]);
                    assert_eq!(value, -1.0);
                }
            }
        }
        // DC line is the last column
        assert_eq!(topo.branch_ids()[2], BranchId::new(5));
        assert_eq!(topo.branch_from()[2], 2);
        assert_eq!(topo.branch_to()[2], 0);
    }

    #[test]
    fn test_zero_rating_is_unbounded() {
        let mut data = three_bus_data();
        data.branches[0].rating = 0.0;
        let topo = topology(data);
        assert!(topo.branch_rating()[0].is_infinite());
        assert_eq!(topo.bounded_branches(), vec![1]);
    }

    #[test]
    fn test_profile_gens_unbounded_pmax() {
        let mut data = three_bus_data();
        data.gens[0].fuel = Fuel::Wind;
        data.gens[1].fuel = Fuel::Hydro;
        data.gens[2].ramp30 = 5.0;
        let topo = topology(data);
        assert_eq!(topo.wind(), &[0]);
        assert_eq!(topo.hydro(), &[1]);
        assert!(topo.solar().is_empty());
        assert_eq!(topo.bounded_gens(), vec![2]);
        assert_eq!(topo.ramp_limited_gens(), vec![2]);
    }

    #[test]
    fn test_reference_bus_per_ac_island() {
        let mut data = three_bus_data();
        // Drop the 2-3 branch and tie bus 3 back with a DC line
        data.branches.pop();
        data.dc_lines.push(DcLineData {
            id: 9,
            from_bus: 2,
            to_bus: 3,
            rating: 100.0,
        });
        let topo = topology(data);
        assert_eq!(topo.reference_buses(), &[0, 2]);
        assert_eq!(topo.island_count(), 1);
        assert_eq!(topo.diagnostics().warning_count(), 0);
    }

    #[test]
    fn test_island_without_generation_reported() {
        let mut data = three_bus_data();
        data.branches.pop();
        data.gens.pop();
        let topo = topology(data);
        assert_eq!(topo.island_count(), 2);
        // Bus 3 carries all of zone 1's demand
        let diag = topo.diagnostics();
        assert_eq!(diag.warning_count(), 0);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.errors().any(|i| i.entity.as_deref() == Some("bus 3")));
    }

    #[test]
    fn test_unsupplied_island_without_demand_is_warning() {
        let mut data = three_bus_data();
        data.branches.pop();
        data.gens.pop();
        data.buses[2].demand = 0.0;
        data.buses[0].demand = 10.0;
        let topo = topology(data);
        let diag = topo.diagnostics();
        assert!(!diag.has_errors());
        assert_eq!(diag.warning_count(), 1);
        assert!(diag.warnings().any(|i| i.entity.as_deref() == Some("bus 3")));
    }
}
