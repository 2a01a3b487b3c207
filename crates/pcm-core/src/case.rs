//! The scenario case: buses, AC branches, DC lines and generators.
//!
//! Loaders produce a [`CaseData`] (plain deserializable tables). Converting it
//! with [`Case::from_data`] validates every id and cross reference once, so the
//! resulting [`Case`] is a closed, strongly typed record.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{CaseError, CaseResult};
use crate::{BranchId, BusId, GenId, ZoneId};

/// Generator fuel type.
///
/// Hydro, solar and wind units are profile-driven: their output ceiling comes
/// from a time series rather than from `pmax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fuel {
    Coal,
    Dfo,
    Ng,
    Nuclear,
    Geothermal,
    Biomass,
    Hydro,
    Solar,
    Wind,
    WindOffshore,
    #[serde(other)]
    Other,
}

impl Fuel {
    pub fn is_hydro(self) -> bool {
        matches!(self, Fuel::Hydro)
    }

    pub fn is_solar(self) -> bool {
        matches!(self, Fuel::Solar)
    }

    pub fn is_wind(self) -> bool {
        matches!(self, Fuel::Wind | Fuel::WindOffshore)
    }

    /// Output is bounded by an availability profile instead of `pmax`.
    pub fn is_profile_driven(self) -> bool {
        self.is_hydro() || self.is_solar() || self.is_wind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusData {
    pub id: u64,
    /// Static demand (MW), used only to derive zonal shares
    pub demand: f64,
    pub zone: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchData {
    pub id: u64,
    pub from_bus: u64,
    pub to_bus: u64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    /// Thermal rating (MW); zero means unconstrained
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcLineData {
    pub id: u64,
    pub from_bus: u64,
    pub to_bus: u64,
    /// Transfer rating (MW); zero means unconstrained
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenData {
    pub id: u64,
    pub bus: u64,
    pub fuel: Fuel,
    pub pmin: f64,
    /// Maximum output (MW); zero means unconstrained
    pub pmax: f64,
    /// Ramp limit per half hour (MW); zero means unconstrained
    #[serde(default)]
    pub ramp30: f64,
    /// Quadratic cost coefficients: `c0 + c1*P + c2*P^2`
    #[serde(default)]
    pub c0: f64,
    #[serde(default)]
    pub c1: f64,
    #[serde(default)]
    pub c2: f64,
    /// Dispatch at scenario start (MW)
    #[serde(default)]
    pub pg0: f64,
}

/// Raw tabular case as produced by a loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseData {
    pub buses: Vec<BusData>,
    #[serde(default)]
    pub branches: Vec<BranchData>,
    #[serde(default)]
    pub dc_lines: Vec<DcLineData>,
    pub gens: Vec<GenData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: BusId,
    pub demand: f64,
    pub zone: ZoneId,
}

/// AC branch. Participates in the DC power-flow angle relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub id: BranchId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub reactance: f64,
    pub rating: f64,
}

/// DC line. A controllable transfer with no angle relation.
#[derive(Debug, Clone, PartialEq)]
pub struct DcLine {
    pub id: BranchId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub rating: f64,
}

/// Single-segment cost: `b` per hour committed plus `a` per MWh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LinearCost {
    /// Marginal cost ($/MWh)
    pub a: f64,
    /// Fixed cost ($/h)
    pub b: f64,
}

impl LinearCost {
    /// Collapse a quadratic curve onto the chord between `pmin` and `pmax`.
    ///
    /// The line `a*P + b` matches `c0 + c1*P + c2*P^2` at both endpoints:
    /// `a = c2*(pmax + pmin) + c1`, `b = c0 - c2*pmax*pmin`.
    pub fn from_quadratic(c0: f64, c1: f64, c2: f64, pmin: f64, pmax: f64) -> Self {
        Self {
            a: c2 * (pmax + pmin) + c1,
            b: c0 - c2 * pmax * pmin,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gen {
    pub id: GenId,
    pub bus: BusId,
    pub fuel: Fuel,
    pub pmin: f64,
    pub pmax: f64,
    pub ramp30: f64,
    pub cost: LinearCost,
    pub pg0: f64,
}

/// Validated, immutable per-scenario facts.
#[derive(Debug, Clone)]
pub struct Case {
    buses: Vec<Bus>,
    bus_set: HashSet<BusId>,
    branches: Vec<Branch>,
    dc_lines: Vec<DcLine>,
    gens: Vec<Gen>,
}

fn check_unique<I>(collection: &'static str, ids: I) -> CaseResult<()>
where
    I: IntoIterator<Item = u64>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CaseError::DuplicateId { collection, id });
        }
    }
    Ok(())
}

fn check_finite(element: &str, field: &'static str, value: f64) -> CaseResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CaseError::invalid(element, field, format!("{value} is not finite")))
    }
}

impl Case {
    /// Validate raw tables and convert them into a typed case.
    ///
    /// Fails on duplicate ids, dangling bus references, zero reactance,
    /// branches that start and end on one bus, negative limits, or
    /// non-finite numbers.
    pub fn from_data(data: CaseData) -> CaseResult<Self> {
        if data.buses.is_empty() {
            return Err(CaseError::Empty("buses"));
        }
        if data.gens.is_empty() {
            return Err(CaseError::Empty("generators"));
        }

        check_unique("bus", data.buses.iter().map(|b| b.id))?;
        check_unique("generator", data.gens.iter().map(|g| g.id))?;
        check_unique(
            "branch",
            data.branches
                .iter()
                .map(|b| b.id)
                .chain(data.dc_lines.iter().map(|d| d.id)),
        )?;

        let known: HashSet<u64> = data.buses.iter().map(|b| b.id).collect();
        let resolve = |element: String, bus: u64| -> CaseResult<BusId> {
            if known.contains(&bus) {
                Ok(BusId::new(bus))
            } else {
                Err(CaseError::DanglingBus { element, bus })
            }
        };

        let mut buses = Vec::with_capacity(data.buses.len());
        for bus in &data.buses {
            let label = format!("bus {}", bus.id);
            check_finite(&label, "demand", bus.demand)?;
            buses.push(Bus {
                id: BusId::new(bus.id),
                demand: bus.demand,
                zone: ZoneId::new(bus.zone),
            });
        }

        let mut branches = Vec::with_capacity(data.branches.len());
        for branch in &data.branches {
            let label = format!("branch {}", branch.id);
            check_finite(&label, "reactance", branch.reactance)?;
            check_finite(&label, "rating", branch.rating)?;
            if branch.reactance.abs() < 1e-12 {
                return Err(CaseError::invalid(label, "reactance", "must be non-zero"));
            }
            if branch.rating < 0.0 {
                return Err(CaseError::invalid(label, "rating", "must be non-negative"));
            }
            if branch.from_bus == branch.to_bus {
                return Err(CaseError::invalid(label, "to_bus", "must differ from from_bus"));
            }
            branches.push(Branch {
                id: BranchId::new(branch.id),
                from_bus: resolve(label.clone(), branch.from_bus)?,
                to_bus: resolve(label, branch.to_bus)?,
                reactance: branch.reactance,
                rating: branch.rating,
            });
        }

        let mut dc_lines = Vec::with_capacity(data.dc_lines.len());
        for line in &data.dc_lines {
            let label = format!("dc line {}", line.id);
            check_finite(&label, "rating", line.rating)?;
            if line.rating < 0.0 {
                return Err(CaseError::invalid(label, "rating", "must be non-negative"));
            }
            if line.from_bus == line.to_bus {
                return Err(CaseError::invalid(label, "to_bus", "must differ from from_bus"));
            }
            dc_lines.push(DcLine {
                id: BranchId::new(line.id),
                from_bus: resolve(label.clone(), line.from_bus)?,
                to_bus: resolve(label, line.to_bus)?,
                rating: line.rating,
            });
        }

        let mut gens = Vec::with_capacity(data.gens.len());
        for gen in &data.gens {
            let label = format!("gen {}", gen.id);
            for (field, value) in [
                ("pmin", gen.pmin),
                ("pmax", gen.pmax),
                ("ramp30", gen.ramp30),
                ("c0", gen.c0),
                ("c1", gen.c1),
                ("c2", gen.c2),
                ("pg0", gen.pg0),
            ] {
                check_finite(&label, field, value)?;
            }
            if gen.pmin < 0.0 {
                return Err(CaseError::invalid(label, "pmin", "must be non-negative"));
            }
            if gen.ramp30 < 0.0 {
                return Err(CaseError::invalid(label, "ramp30", "must be non-negative"));
            }
            if gen.pmax > 0.0 && gen.pmin > gen.pmax {
                return Err(CaseError::invalid(
                    label,
                    "pmin",
                    format!("{} exceeds pmax {}", gen.pmin, gen.pmax),
                ));
            }
            gens.push(Gen {
                id: GenId::new(gen.id),
                bus: resolve(label, gen.bus)?,
                fuel: gen.fuel,
                pmin: gen.pmin,
                pmax: gen.pmax,
                ramp30: gen.ramp30,
                cost: LinearCost::from_quadratic(gen.c0, gen.c1, gen.c2, gen.pmin, gen.pmax),
                pg0: gen.pg0,
            });
        }

        Ok(Self {
            bus_set: buses.iter().map(|b| b.id).collect(),
            buses,
            branches,
            dc_lines,
            gens,
        })
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn dc_lines(&self) -> &[DcLine] {
        &self.dc_lines
    }

    pub fn gens(&self) -> &[Gen] {
        &self.gens
    }

    /// Check whether a bus id exists.
    pub fn has_bus(&self, id: BusId) -> bool {
        self.bus_set.contains(&id)
    }

    /// Distinct zones in first-seen bus order.
    pub fn zones(&self) -> Vec<ZoneId> {
        let mut seen = HashSet::new();
        self.buses
            .iter()
            .map(|b| b.zone)
            .filter(|z| seen.insert(*z))
            .collect()
    }

    /// Static share of each bus in its zone's demand, in bus order.
    ///
    /// Zones whose static demand sums to zero split evenly across their buses.
    pub fn bus_zone_shares(&self) -> Vec<f64> {
        let mut zone_total: HashMap<ZoneId, f64> = HashMap::new();
        let mut zone_count: HashMap<ZoneId, usize> = HashMap::new();
        for bus in &self.buses {
            *zone_total.entry(bus.zone).or_insert(0.0) += bus.demand;
            *zone_count.entry(bus.zone).or_insert(0) += 1;
        }
        self.buses
            .iter()
            .map(|bus| {
                let total = zone_total[&bus.zone];
                if total.abs() < 1e-12 {
                    1.0 / zone_count[&bus.zone] as f64
                } else {
                    bus.demand / total
                }
            })
            .collect()
    }

    /// Non-fatal data warnings (cleaning conventions applied, odd zones).
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();

        for branch in &self.branches {
            if branch.rating == 0.0 {
                diag.add_warning_with_entity(
                    "limits",
                    "zero rating treated as unconstrained",
                    &branch.id.to_string(),
                );
            }
        }
        for line in &self.dc_lines {
            if line.rating == 0.0 {
                diag.add_warning_with_entity(
                    "limits",
                    "zero rating treated as unconstrained",
                    &format!("dc line {}", line.id.value()),
                );
            }
        }
        for gen in &self.gens {
            if gen.pmax == 0.0 && !gen.fuel.is_profile_driven() {
                diag.add_warning_with_entity(
                    "limits",
                    "zero pmax treated as unconstrained",
                    &gen.id.to_string(),
                );
            }
        }
        let unramped = self
            .gens
            .iter()
            .filter(|g| g.ramp30 == 0.0 && !g.fuel.is_profile_driven())
            .count();
        if unramped > 0 {
            diag.add_warning(
                "limits",
                &format!("{unramped} generator(s) with zero ramp30 treated as ramp-unconstrained"),
            );
        }

        let mut zone_total: HashMap<ZoneId, f64> = HashMap::new();
        for bus in &self.buses {
            *zone_total.entry(bus.zone).or_insert(0.0) += bus.demand;
        }
        for zone in self.zones() {
            if zone_total[&zone].abs() < 1e-12 {
                diag.add_warning_with_entity(
                    "demand",
                    "zone has no static demand; profile demand split evenly across its buses",
                    &zone.to_string(),
                );
            }
        }

        diag
    }
}
