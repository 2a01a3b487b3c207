//! Result files written by `pcm run`.
//!
//! - `interval_<i>.json` as each interval is solved
//! - `pg.csv`, `pf.csv`, `theta.csv` and, when present, `storage_*.csv`,
//!   `flex_*.csv`, `load_shed.csv`: one row per simulated hour
//! - `final_state.json`: the carried state, reusable with `--initial-state`
//! - `summary.json`

use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pcm_algo::{CarryState, IntervalResults, IntervalSink, ScenarioResults, SolveFailure, Table};
use serde::Serialize;

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))
}

/// Writes each solved interval to `interval_<i>.json`.
pub struct JsonIntervalSink {
    dir: PathBuf,
}

#[derive(Serialize)]
struct IntervalFile<'a> {
    results: &'a IntervalResults,
    state: &'a CarryState,
}

impl JsonIntervalSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl IntervalSink for JsonIntervalSink {
    fn accept(
        &mut self,
        results: &IntervalResults,
        state: &CarryState,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let path = self.dir.join(format!("interval_{}.json", results.interval));
        write_json(&path, &IntervalFile { results, state })?;
        tracing::debug!(path = %path.display(), "wrote interval results");
        Ok(())
    }
}

fn write_table(path: &Path, columns: &[String], hours: &[usize], table: &Table) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push("hour".to_string());
    header.extend(columns.iter().cloned());
    writer.write_record(&header)?;
    for (hour, row) in hours.iter().zip(table) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(hour.to_string());
        record.extend(row.iter().map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn labels<T: ToString>(ids: impl IntoIterator<Item = T>) -> Vec<String> {
    ids.into_iter().map(|id| id.to_string()).collect()
}

/// Write every full-horizon table; returns the files written.
pub fn write_tables(dir: &Path, results: &ScenarioResults) -> Result<Vec<PathBuf>> {
    let gens = labels(results.gen_ids.iter().map(|id| id.value()));
    let branches = labels(results.branch_ids.iter().map(|id| id.value()));
    let buses = labels(results.bus_ids.iter().map(|id| id.value()));
    let units = labels(0..results.storage_buses.len());

    let mut tables: Vec<(&str, &Vec<String>, &Table)> = vec![
        ("pg.csv", &gens, &results.pg),
        ("pf.csv", &branches, &results.pf),
        ("theta.csv", &buses, &results.theta),
    ];
    if let Some(storage) = &results.storage {
        tables.push(("storage_charge.csv", &units, &storage.charge));
        tables.push(("storage_discharge.csv", &units, &storage.discharge));
        tables.push(("storage_soc.csv", &units, &storage.soc));
    }
    if let Some(flex) = &results.flex {
        tables.push(("flex_curtail.csv", &buses, &flex.curtail));
        tables.push(("flex_recover.csv", &buses, &flex.recover));
        tables.push(("flex_balance.csv", &buses, &flex.balance));
    }
    if let Some(shed) = &results.load_shed {
        tables.push(("load_shed.csv", &buses, shed));
    }

    let mut written = Vec::with_capacity(tables.len());
    for (name, columns, table) in tables {
        let path = dir.join(name);
        write_table(&path, columns, &results.hours, table)?;
        written.push(path);
    }
    Ok(written)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Halted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub solver: String,
    pub started_at: DateTime<Utc>,
    /// Wall-clock time as `h:mm`
    pub runtime: String,
    pub start_index: usize,
    pub interval_length: usize,
    pub intervals_requested: usize,
    pub intervals_completed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_interval: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SolveFailure>,
    pub total_objective: f64,
    pub total_load_shed: f64,
    pub final_state: CarryState,
}

impl RunSummary {
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("summary.json");
        write_json(&path, self)?;
        Ok(path)
    }
}

/// Persist the carried state so a follow-on run can start from it.
pub fn write_state(dir: &Path, state: &CarryState) -> Result<PathBuf> {
    let path = dir.join("final_state.json");
    write_json(&path, state)?;
    Ok(path)
}

pub fn read_state(path: &Path) -> Result<CarryState> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading state {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing state {}", path.display()))
}

/// Elapsed time as `h:mm`, truncated to the minute.
pub fn format_runtime(elapsed: Duration) -> String {
    let minutes = elapsed.as_secs() / 60;
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_core::{BusId, GenId};
    use tempfile::tempdir;

    #[test]
    fn test_format_runtime() {
        assert_eq!(format_runtime(Duration::from_secs(59)), "0:00");
        assert_eq!(format_runtime(Duration::from_secs(125)), "0:02");
        assert_eq!(format_runtime(Duration::from_secs(3 * 3600 + 7 * 60 + 30)), "3:07");
    }

    #[test]
    fn test_write_tables() {
        let dir = tempdir().unwrap();
        let results = ScenarioResults {
            gen_ids: vec![GenId::new(7), GenId::new(9)],
            bus_ids: vec![BusId::new(1)],
            hours: vec![5, 6],
            interval_objectives: vec![1.0],
            pg: vec![vec![1.5, 0.0], vec![2.0, 3.0]],
            pf: vec![vec![], vec![]],
            theta: vec![vec![0.0], vec![0.0]],
            ..Default::default()
        };

        let written = write_tables(dir.path(), &results).unwrap();
        assert_eq!(written.len(), 3);

        let pg = fs::read_to_string(dir.path().join("pg.csv")).unwrap();
        let lines: Vec<&str> = pg.lines().collect();
        assert_eq!(lines, vec!["hour,7,9", "5,1.5,0", "6,2,3"]);
    }

    #[test]
    fn test_state_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let state = CarryState {
            dispatch: Some(vec![10.0, 20.5]),
            soc: vec![3.0],
            flex_balance: vec![],
        };
        let path = write_state(dir.path(), &state).unwrap();
        assert_eq!(read_state(&path).unwrap(), state);
    }
}
