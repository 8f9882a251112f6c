//! Columnar file formats understood by the pipeline.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::loaders::{read_csv, read_root};
use super::table::{EventTable, TableError};
use super::writers::{write_csv, write_root};

/// Errors that can occur while reading or writing a table file.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The container could not be opened (missing, truncated, not a ROOT file).
    #[error("failed to open '{path}': {reason}")]
    Open { path: String, reason: String },

    /// The requested tree is absent from the container.
    #[error("tree '{tree}' not found in '{path}'")]
    MissingTree { path: String, tree: String },

    #[error("failed to read '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write '{path}': {reason}")]
    Write { path: String, reason: String },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error for '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("parse error in '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("inconsistent table in '{path}': {source}")]
    Table {
        path: String,
        #[source]
        source: TableError,
    },
}

impl FormatError {
    /// True when the file was readable but lacks the expected tree.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, FormatError::MissingTree { .. })
    }
}

/// Result type for format operations.
pub type Result<T> = std::result::Result<T, FormatError>;

/// On-disk table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// ROOT file with one TTree per table.
    #[default]
    Root,
    /// CSV with `name:type` header cells.
    Csv,
}

impl TableFormat {
    /// File extension written for derived datasets, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Root => "root",
            TableFormat::Csv => "csv",
        }
    }

    /// Load the table stored under `tree` in `path`.
    ///
    /// CSV files hold a single table, so `tree` is ignored for them.
    pub fn read(&self, path: &Path, tree: &str) -> Result<EventTable> {
        match self {
            TableFormat::Root => read_root(path, tree),
            TableFormat::Csv => read_csv(path),
        }
    }

    /// Serialize `table` to `path` under `tree`, replacing any existing file.
    pub fn write(&self, path: &Path, tree: &str, table: &EventTable) -> Result<()> {
        match self {
            TableFormat::Root => write_root(path, tree, table),
            TableFormat::Csv => write_csv(path, table),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "root" => Ok(TableFormat::Root),
            "csv" => Ok(TableFormat::Csv),
            other => Err(format!("unknown table format '{other}' (expected root or csv)")),
        }
    }
}
