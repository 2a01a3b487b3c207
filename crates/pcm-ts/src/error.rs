use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading hourly tables or slicing them into windows.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Column headers after the first must be element ids.
    #[error("column header {0:?} is not a numeric id")]
    BadHeader(String),

    #[error("duplicate column {0}")]
    DuplicateColumn(u64),

    #[error("row {row} has {found} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}, column {column}: cannot parse {value:?}")]
    ParseValue {
        row: usize,
        column: u64,
        value: String,
    },

    #[error("{table} table has no column for id {id}")]
    MissingColumn { table: &'static str, id: u64 },

    /// A fuel subset is non-empty but its availability table was not given.
    #[error("{0} table is required by the case but was not provided")]
    MissingTable(&'static str),

    #[error("interval window needs start_index >= 1, length >= 1 and an end within range, got ({start_index}, {length})")]
    InvalidWindow { start_index: usize, length: usize },

    #[error("interval {interval} of {length} hours from hour {start_index} overflows the hour index")]
    WindowOverflow {
        start_index: usize,
        length: usize,
        interval: usize,
    },

    #[error(
        "window of {length} hours at hour {start_index} exceeds the {available} hours in the {table} table"
    )]
    WindowOutOfRange {
        table: &'static str,
        start_index: usize,
        length: usize,
        available: usize,
    },
}

pub type ProfileResult<T> = Result<T, ProfileError>;
