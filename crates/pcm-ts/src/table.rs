//! Hour-by-column tables of profile values.
//!
//! On disk a table is a CSV whose first column labels the hour (a timestamp
//! or counter, never interpreted) and whose remaining headers are element
//! ids: zone ids for demand, generator ids for hydro/solar/wind.
//!
//! ```text
//! UTC,1,2
//! 2016-01-01 00:00:00,120.0,80.5
//! 2016-01-01 01:00:00,118.2,79.9
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::{ProfileError, ProfileResult};

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyTable {
    ids: Vec<u64>,
    index: HashMap<u64, usize>,
    /// Row-major: `rows[hour][column]`
    rows: Vec<Vec<f64>>,
}

impl HourlyTable {
    /// Build a table from column ids and row-major values.
    pub fn new(ids: Vec<u64>, rows: Vec<Vec<f64>>) -> ProfileResult<Self> {
        let mut index = HashMap::with_capacity(ids.len());
        for (col, id) in ids.iter().enumerate() {
            if index.insert(*id, col).is_some() {
                return Err(ProfileError::DuplicateColumn(*id));
            }
        }
        for (row, values) in rows.iter().enumerate() {
            if values.len() != ids.len() {
                return Err(ProfileError::Ragged {
                    row,
                    expected: ids.len(),
                    found: values.len(),
                });
            }
        }
        Ok(Self { ids, index, rows })
    }

    /// Read a table from a CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_csv(reader)?;
        tracing::debug!(
            path = %path.display(),
            hours = table.n_hours(),
            columns = table.n_columns(),
            "loaded hourly table"
        );
        Ok(table)
    }

    /// Read a table from any CSV source with a header row.
    pub fn from_reader<R: Read>(reader: R) -> ProfileResult<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> ProfileResult<Self> {
        let ids = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|h| {
                h.trim()
                    .parse::<u64>()
                    .map_err(|_| ProfileError::BadHeader(h.to_string()))
            })
            .collect::<ProfileResult<Vec<_>>>()?;

        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let found = record.len().saturating_sub(1);
            if found != ids.len() {
                return Err(ProfileError::Ragged {
                    row,
                    expected: ids.len(),
                    found,
                });
            }
            let values = record
                .iter()
                .skip(1)
                .zip(&ids)
                .map(|(raw, id)| {
                    raw.trim().parse::<f64>().map_err(|_| ProfileError::ParseValue {
                        row,
                        column: *id,
                        value: raw.to_string(),
                    })
                })
                .collect::<ProfileResult<Vec<_>>>()?;
            rows.push(values);
        }
        Self::new(ids, rows)
    }

    pub fn n_hours(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn column(&self, id: u64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Values of one hour (0-based row).
    pub fn row(&self, hour: usize) -> Option<&[f64]> {
        self.rows.get(hour).map(Vec::as_slice)
    }
}
