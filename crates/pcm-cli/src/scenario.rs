//! Scenario files: which inputs to load and how to tile the horizon.
//!
//! ```toml
//! output_dir = "output"
//!
//! [inputs]
//! case = "case.json"
//! demand = "demand.csv"
//! solar = "solar.csv"
//!
//! [simulation]
//! interval_length = 24
//! storage_enabled = true
//!
//! [dates]
//! profile_start = "2016-01-01 00:00:00"
//! start_date = "2016-01-02"
//! end_date = "2016-01-08"
//! ```
//!
//! Relative paths are resolved against the scenario file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use pcm_algo::{ScenarioConfig, Simulation, SolverKind};
use pcm_core::{Case, CaseData, DemandFlexibility, Storage};
use pcm_ts::{HourlyTable, Profiles};
use serde::Deserialize;

use crate::cli::Overrides;

#[derive(Debug, Clone, Deserialize)]
pub struct Inputs {
    /// Case JSON (buses, branches, dc_lines, gens)
    pub case: PathBuf,
    /// Zonal demand CSV
    pub demand: PathBuf,
    #[serde(default)]
    pub hydro: Option<PathBuf>,
    #[serde(default)]
    pub solar: Option<PathBuf>,
    #[serde(default)]
    pub wind: Option<PathBuf>,
    /// Storage units JSON
    #[serde(default)]
    pub storage: Option<PathBuf>,
    /// Demand flexibility JSON
    #[serde(default)]
    pub flexibility: Option<PathBuf>,
}

/// Calendar range mapped onto profile rows.
#[derive(Debug, Clone, Deserialize)]
pub struct DateRange {
    /// Timestamp of the first profile row
    pub profile_start: String,
    pub start_date: String,
    /// Inclusive; a bare date covers its whole day
    pub end_date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    pub inputs: Inputs,
    #[serde(default)]
    pub simulation: ScenarioConfig,
    #[serde(default)]
    pub dates: Option<DateRange>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let mut scenario: ScenarioFile = toml::from_str(&text)
            .with_context(|| format!("parsing scenario {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let inputs = &mut scenario.inputs;
        inputs.case = resolve(base, &inputs.case);
        inputs.demand = resolve(base, &inputs.demand);
        for optional in [
            &mut inputs.hydro,
            &mut inputs.solar,
            &mut inputs.wind,
            &mut inputs.storage,
            &mut inputs.flexibility,
        ] {
            if let Some(p) = optional.as_mut() {
                *p = resolve(base, p);
            }
        }
        if let Some(dir) = scenario.output_dir.as_mut() {
            *dir = resolve(base, dir);
        }
        Ok(scenario)
    }

    /// Final scenario settings: file values, then dates, then CLI overrides.
    pub fn config(&self, overrides: &Overrides) -> Result<ScenarioConfig> {
        let mut config = self.simulation.clone();
        if let Some(length) = overrides.interval_length {
            config.interval_length = length;
        }
        if let Some(dates) = &self.dates {
            let (start_index, n_interval) = dates.resolve(config.interval_length)?;
            config.start_index = start_index;
            config.n_interval = n_interval;
        }
        if let Some(start) = overrides.start_index {
            config.start_index = start;
        }
        if let Some(n) = overrides.n_interval {
            config.n_interval = n;
        }
        if let Some(threads) = overrides.threads {
            config.solver.threads = Some(threads);
        }
        if let Some(name) = &overrides.solver {
            config.solver.kind = name.parse::<SolverKind>()?;
        }
        Ok(config)
    }
}

fn parse_timestamp(value: &str, end_of_day: bool) -> Result<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("unrecognized timestamp '{value}'"))?;
    let hour = if end_of_day { 23 } else { 0 };
    date.and_hms_opt(hour, 0, 0)
        .with_context(|| format!("invalid time on {value}"))
}

impl DateRange {
    /// Start index (1-based) and interval count covering the range.
    pub fn resolve(&self, interval_length: usize) -> Result<(usize, usize)> {
        if interval_length == 0 {
            bail!("interval_length must be at least 1");
        }
        let origin = parse_timestamp(&self.profile_start, false)?;
        let start = parse_timestamp(&self.start_date, false)?;
        let end = parse_timestamp(&self.end_date, true)?;

        if start < origin {
            bail!("start_date {start} precedes the first profile hour {origin}");
        }
        if end < start {
            bail!("end_date {end} precedes start_date {start}");
        }
        let offset = start - origin;
        if offset.num_seconds() % 3600 != 0 {
            bail!("start_date {start} is not on an hour boundary of the profiles");
        }

        let hours = ((end - start).num_hours() + 1) as usize;
        if hours % interval_length != 0 {
            bail!(
                "{hours} hours from {start} to {end} is not a whole number of {interval_length}-hour intervals"
            );
        }
        Ok((offset.num_hours() as usize + 1, hours / interval_length))
    }
}

/// Everything a simulation borrows, loaded from disk.
#[derive(Debug)]
pub struct LoadedInputs {
    pub case: Case,
    pub profiles: Profiles,
    pub storage: Option<Storage>,
    pub flexibility: Option<DemandFlexibility>,
}

fn read_json<T: serde::de::DeserializeOwned>(what: &str, path: &Path) -> Result<T> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening {what} {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing {what} {}", path.display()))
}

fn read_profile(what: &str, path: &Path) -> Result<HourlyTable> {
    HourlyTable::from_csv_path(path)
        .with_context(|| format!("reading {what} profile {}", path.display()))
}

fn read_optional_profile(what: &str, path: Option<&PathBuf>) -> Result<Option<HourlyTable>> {
    path.map(|p| read_profile(what, p)).transpose()
}

impl LoadedInputs {
    pub fn load(inputs: &Inputs) -> Result<Self> {
        let data: CaseData = read_json("case", &inputs.case)?;
        let case = Case::from_data(data)
            .with_context(|| format!("validating case {}", inputs.case.display()))?;

        let profiles = Profiles {
            demand: read_profile("demand", &inputs.demand)?,
            hydro: read_optional_profile("hydro", inputs.hydro.as_ref())?,
            solar: read_optional_profile("solar", inputs.solar.as_ref())?,
            wind: read_optional_profile("wind", inputs.wind.as_ref())?,
        };

        let storage = inputs
            .storage
            .as_deref()
            .map(|p| read_json::<Storage>("storage", p))
            .transpose()?;
        let flexibility = inputs
            .flexibility
            .as_deref()
            .map(|p| read_json::<DemandFlexibility>("demand flexibility", p))
            .transpose()?;

        tracing::info!(
            buses = case.buses().len(),
            gens = case.gens().len(),
            branches = case.branches().len() + case.dc_lines().len(),
            hours = profiles.demand.n_hours(),
            "loaded scenario inputs"
        );

        Ok(Self {
            case,
            profiles,
            storage,
            flexibility,
        })
    }

    /// Validate everything against `config` and attach optional resources.
    pub fn simulation(&self, config: ScenarioConfig) -> Result<Simulation<'_>> {
        let mut sim = Simulation::new(&self.case, &self.profiles, config)?;
        if let Some(storage) = &self.storage {
            sim = sim.with_storage(storage)?;
        }
        if let Some(flexibility) = &self.flexibility {
            sim = sim.with_flexibility(flexibility)?;
        }
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(profile_start: &str, start: &str, end: &str) -> DateRange {
        DateRange {
            profile_start: profile_start.into(),
            start_date: start.into(),
            end_date: end.into(),
        }
    }

    #[test]
    fn test_dates_cover_whole_days() {
        let dates = range("2016-01-01 00:00:00", "2016-01-02", "2016-01-03");
        assert_eq!(dates.resolve(24).unwrap(), (25, 2));
        assert_eq!(dates.resolve(48).unwrap(), (25, 1));
    }

    #[test]
    fn test_dates_with_hours() {
        let dates = range("2016-01-01", "2016-01-01 06:00:00", "2016-01-01 17:00:00");
        assert_eq!(dates.resolve(3).unwrap(), (7, 4));
    }

    #[test]
    fn test_dates_must_tile_intervals() {
        let dates = range("2016-01-01", "2016-01-01", "2016-01-02");
        let err = dates.resolve(36).unwrap_err();
        assert!(err.to_string().contains("whole number"));
    }

    #[test]
    fn test_dates_before_profiles_rejected() {
        let dates = range("2016-01-02", "2016-01-01", "2016-01-03");
        assert!(dates.resolve(24).is_err());
    }

    #[test]
    fn test_config_precedence() {
        let scenario: ScenarioFile = toml::from_str(
            r#"
            [inputs]
            case = "case.json"
            demand = "demand.csv"

            [simulation]
            interval_length = 24
            n_interval = 5
            start_index = 1

            [dates]
            profile_start = "2016-01-01"
            start_date = "2016-01-03"
            end_date = "2016-01-04"
            "#,
        )
        .unwrap();

        let config = scenario.config(&Overrides::default()).unwrap();
        assert_eq!((config.start_index, config.n_interval), (49, 2));

        let overrides = Overrides {
            interval_length: Some(12),
            n_interval: Some(1),
            threads: Some(2),
            ..Default::default()
        };
        let config = scenario.config(&overrides).unwrap();
        assert_eq!(config.interval_length, 12);
        assert_eq!((config.start_index, config.n_interval), (49, 1));
        assert_eq!(config.solver.threads, Some(2));
    }

    #[test]
    fn test_unknown_solver_override() {
        let scenario: ScenarioFile = toml::from_str(
            r#"
            [inputs]
            case = "case.json"
            demand = "demand.csv"
            "#,
        )
        .unwrap();
        let overrides = Overrides {
            solver: Some("gurobi".into()),
            ..Default::default()
        };
        assert!(scenario.config(&overrides).is_err());
        assert_eq!(scenario.simulation, ScenarioConfig::default());
    }
}
