//! Data writers for ROOT and CSV formats.
//!
//! This module provides functions for writing event tables and reports:
//! - ROOT trees through the `oxyroot` writer
//! - Typed CSV tables (header cells `name:type`)
//! - Plain CSV reports from serializable records

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use oxyroot::{RootFile, WriterTree};
use serde::Serialize;

use super::format::{FormatError, Result};
use super::table::{Column, EventTable};

/// Create `path` and all missing parents. Existing directories are fine.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).map_err(|e| FormatError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Write an [`EventTable`] as a ROOT tree.
///
/// One branch is created per column, in table order, keeping the column's
/// element type.
///
/// # Errors
///
/// Returns an error if the file cannot be created, the tree cannot be
/// serialized, or the file cannot be closed.
pub fn write_root(path: &Path, tree_name: &str, table: &EventTable) -> Result<()> {
    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();

    let mut file = RootFile::create(path).map_err(|e| FormatError::Write {
        path: path_str.clone(),
        reason: format!("create: {e}"),
    })?;

    let mut tree = WriterTree::new(tree_name);
    for (name, column) in table.columns() {
        let name = name.to_string();
        match column.clone() {
            Column::F64(values) => {
                tree.new_branch(name, values.into_iter());
            }
            Column::F32(values) => {
                tree.new_branch(name, values.into_iter());
            }
            Column::I32(values) => {
                tree.new_branch(name, values.into_iter());
            }
            Column::I64(values) => {
                tree.new_branch(name, values.into_iter());
            }
            Column::Str(values) => {
                tree.new_branch(name, values.into_iter());
            }
        }
    }

    tree.write(&mut file).map_err(|e| FormatError::Write {
        path: path_str.clone(),
        reason: format!("tree '{tree_name}': {e}"),
    })?;

    file.close().map_err(|e| FormatError::Write {
        path: path_str,
        reason: format!("close: {e}"),
    })?;

    Ok(())
}

/// Write an [`EventTable`] as CSV with typed headers.
///
/// Floats use Rust's shortest round-trip formatting, so reading the file
/// back gives the same values.
pub fn write_csv(path: &Path, table: &EventTable) -> Result<()> {
    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();

    let file = File::create(path).map_err(|e| FormatError::Io {
        path: path_str.clone(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    let header: Vec<String> = table
        .columns()
        .map(|(name, column)| format!("{}:{}", name, column.dtype().tag()))
        .collect();
    csv_writer
        .write_record(&header)
        .map_err(|e| FormatError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

    let columns: Vec<&Column> = table.columns().map(|(_, column)| column).collect();
    for row in 0..table.num_rows() {
        csv_writer
            .write_record(columns.iter().map(|column| column.format_value(row)))
            .map_err(|e| FormatError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| FormatError::Io {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write serializable records to CSV, one row per record with a header.
pub fn write_records_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();

    let file = File::create(path).map_err(|e| FormatError::Io {
        path: path_str.clone(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    for record in records {
        csv_writer.serialize(record).map_err(|e| FormatError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
    }

    csv_writer.flush().map_err(|e| FormatError::Io {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
