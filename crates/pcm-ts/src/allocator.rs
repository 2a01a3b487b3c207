//! Slice profile tables to one interval and push zonal demand down to buses.
//!
//! Each bus receives a fixed share of its zone's demand (bus demand over zone
//! demand in the case), computed once and reused for every interval. Only the
//! zonal totals move hour to hour.

use pcm_core::{Case, Fuel};

use crate::error::{ProfileError, ProfileResult};
use crate::table::HourlyTable;
use crate::window::IntervalWindow;

/// Full-horizon input tables.
///
/// Availability tables may be omitted when the case has no generator of
/// that fuel.
#[derive(Debug, Clone)]
pub struct Profiles {
    /// Demand by zone id
    pub demand: HourlyTable,
    /// Hydro output by generator id
    pub hydro: Option<HourlyTable>,
    /// Solar availability by generator id
    pub solar: Option<HourlyTable>,
    /// Wind availability by generator id
    pub wind: Option<HourlyTable>,
}

/// Profile values for the hours of one interval.
///
/// Hydro/solar/wind columns follow case generator order within each fuel
/// subset, matching `Topology::hydro()` and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalProfiles {
    pub window: IntervalWindow,
    /// `demand[hour][bus]`
    pub demand: Vec<Vec<f64>>,
    /// `hydro[hour][k]` for the k-th hydro generator
    pub hydro: Vec<Vec<f64>>,
    pub solar: Vec<Vec<f64>>,
    pub wind: Vec<Vec<f64>>,
}

struct Source<'a> {
    name: &'static str,
    table: &'a HourlyTable,
    columns: Vec<usize>,
}

impl Source<'_> {
    fn check(&self, window: &IntervalWindow) -> ProfileResult<()> {
        if window.rows().end > self.table.n_hours() {
            return Err(ProfileError::WindowOutOfRange {
                table: self.name,
                start_index: window.start_index,
                length: window.length,
                available: self.table.n_hours(),
            });
        }
        Ok(())
    }

    fn slice(&self, window: &IntervalWindow) -> Vec<Vec<f64>> {
        window
            .rows()
            .filter_map(|hour| self.table.row(hour))
            .map(|row| self.columns.iter().map(|&c| row[c]).collect())
            .collect()
    }
}

pub struct ProfileAllocator<'a> {
    demand: Source<'a>,
    bus_share: Vec<f64>,
    hydro: Option<Source<'a>>,
    solar: Option<Source<'a>>,
    wind: Option<Source<'a>>,
}

fn fuel_source<'a>(
    name: &'static str,
    table: Option<&'a HourlyTable>,
    case: &Case,
    matches: fn(Fuel) -> bool,
) -> ProfileResult<Option<Source<'a>>> {
    let ids: Vec<u64> = case
        .gens()
        .iter()
        .filter(|g| matches(g.fuel))
        .map(|g| g.id.value())
        .collect();
    if ids.is_empty() {
        return Ok(None);
    }
    let table = table.ok_or(ProfileError::MissingTable(name))?;
    let columns = ids
        .iter()
        .map(|&id| {
            table
                .column(id)
                .ok_or(ProfileError::MissingColumn { table: name, id })
        })
        .collect::<ProfileResult<Vec<_>>>()?;
    Ok(Some(Source {
        name,
        table,
        columns,
    }))
}

impl<'a> ProfileAllocator<'a> {
    /// Resolve table columns for every bus zone and profile-driven generator.
    pub fn new(case: &Case, profiles: &'a Profiles) -> ProfileResult<Self> {
        let columns = case
            .buses()
            .iter()
            .map(|bus| {
                profiles
                    .demand
                    .column(bus.zone.value())
                    .ok_or(ProfileError::MissingColumn {
                        table: "demand",
                        id: bus.zone.value(),
                    })
            })
            .collect::<ProfileResult<Vec<_>>>()?;

        Ok(Self {
            demand: Source {
                name: "demand",
                table: &profiles.demand,
                columns,
            },
            bus_share: case.bus_zone_shares(),
            hydro: fuel_source("hydro", profiles.hydro.as_ref(), case, Fuel::is_hydro)?,
            solar: fuel_source("solar", profiles.solar.as_ref(), case, Fuel::is_solar)?,
            wind: fuel_source("wind", profiles.wind.as_ref(), case, Fuel::is_wind)?,
        })
    }

    fn sources(&self) -> impl Iterator<Item = &Source<'a>> {
        std::iter::once(&self.demand)
            .chain(self.hydro.as_ref())
            .chain(self.solar.as_ref())
            .chain(self.wind.as_ref())
    }

    /// Hours available in every table the case needs.
    pub fn available_hours(&self) -> usize {
        self.sources()
            .map(|s| s.table.n_hours())
            .min()
            .unwrap_or(0)
    }

    /// Bus share of zonal demand, in case bus order.
    pub fn bus_shares(&self) -> &[f64] {
        &self.bus_share
    }

    /// Profile values for exactly `window.length` hours.
    pub fn window(&self, window: IntervalWindow) -> ProfileResult<IntervalProfiles> {
        for source in self.sources() {
            source.check(&window)?;
        }

        let demand = self
            .demand
            .slice(&window)
            .into_iter()
            .map(|zonal| {
                zonal
                    .iter()
                    .zip(&self.bus_share)
                    .map(|(zone_demand, share)| zone_demand * share)
                    .collect()
            })
            .collect();

        let fuel = |source: &Option<Source<'a>>| match source {
            Some(s) => s.slice(&window),
            None => vec![Vec::new(); window.length],
        };

        Ok(IntervalProfiles {
            window,
            demand,
            hydro: fuel(&self.hydro),
            solar: fuel(&self.solar),
            wind: fuel(&self.wind),
        })
    }
}
