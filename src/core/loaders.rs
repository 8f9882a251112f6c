//! Table loaders for ROOT and CSV files.
//!
//! This module provides readers for:
//! - ROOT trees written by the simulation's phase-space actor
//! - Typed CSV tables (header cells `name:type`, type optional)

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use csv::ReaderBuilder;
use indexmap::IndexMap;
use log::debug;
use oxyroot::{Branch, Named, RootFile};

use super::format::{FormatError, Result};
use super::table::{Column, ColumnType, EventTable};

/// Map a ROOT branch item type onto a column type.
///
/// Returns `None` for types the pipeline does not handle (vectors, arrays,
/// small integers); such branches are skipped at load time.
fn branch_column_type(branch: &Branch) -> Option<ColumnType> {
    let lower = branch.item_type_name().to_ascii_lowercase();
    if lower.contains("vector") || lower.contains('[') {
        return None;
    }
    match lower.as_str() {
        "double" | "double_t" | "double32_t" | "f64" => Some(ColumnType::F64),
        "float" | "float_t" | "float32_t" | "f32" => Some(ColumnType::F32),
        "int" | "int_t" | "int32_t" | "i32" => Some(ColumnType::I32),
        "long64_t" | "int64_t" | "long" | "long_t" | "i64" => Some(ColumnType::I64),
        "string" | "std::string" | "tstring" | "char*" | "const char*" => Some(ColumnType::Str),
        _ => None,
    }
}

/// Load a ROOT tree into an [`EventTable`].
///
/// Every branch with a supported scalar type becomes a column, in branch
/// order. The column set is not validated against any fixed schema.
///
/// # Errors
///
/// - [`FormatError::Open`] if the file is missing or not a readable ROOT file
/// - [`FormatError::MissingTree`] if `tree_name` is absent
/// - [`FormatError::Read`] if a branch cannot be decoded
pub fn read_root(path: &Path, tree_name: &str) -> Result<EventTable> {
    let path_str = path.display().to_string();

    let mut file = RootFile::open(path).map_err(|e| FormatError::Open {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;

    let has_tree = file
        .keys()
        .into_iter()
        .any(|key| key.name().to_string() == tree_name);
    if !has_tree {
        return Err(FormatError::MissingTree {
            path: path_str,
            tree: tree_name.to_string(),
        });
    }

    let tree = file.get_tree(tree_name).map_err(|e| FormatError::Read {
        path: path_str.clone(),
        reason: format!("tree '{tree_name}': {e}"),
    })?;

    let mut columns: IndexMap<String, Column> = IndexMap::new();
    for branch in tree.branches() {
        let name = branch.name().to_string();
        let Some(kind) = branch_column_type(branch) else {
            debug!(
                "{}: skipping branch '{}' of type '{}'",
                path_str,
                name,
                branch.item_type_name()
            );
            continue;
        };

        let column = match kind {
            ColumnType::F64 => branch.as_iter::<f64>().map(|it| Column::F64(it.collect())),
            ColumnType::F32 => branch.as_iter::<f32>().map(|it| Column::F32(it.collect())),
            ColumnType::I32 => branch.as_iter::<i32>().map(|it| Column::I32(it.collect())),
            ColumnType::I64 => branch.as_iter::<i64>().map(|it| Column::I64(it.collect())),
            ColumnType::Str => branch.as_iter::<String>().map(|it| Column::Str(it.collect())),
        }
        .map_err(|e| FormatError::Read {
            path: path_str.clone(),
            reason: format!("branch '{name}': {e}"),
        })?;

        columns.insert(name, column);
    }

    EventTable::new(columns).map_err(|source| FormatError::Table {
        path: path_str,
        source,
    })
}

/// Split a header cell into its column name and optional type tag.
fn parse_header_cell(cell: &str) -> (String, Option<ColumnType>) {
    if let Some((name, tag)) = cell.rsplit_once(':') {
        if let Some(dtype) = ColumnType::from_tag(tag) {
            return (name.to_string(), Some(dtype));
        }
    }
    (cell.to_string(), None)
}

/// Pick a type for an untyped column: integers, then floats, then strings.
fn infer_column_type(values: &[String]) -> ColumnType {
    if values.is_empty() {
        return ColumnType::F64;
    }
    if values.iter().all(|v| v.trim().parse::<i64>().is_ok()) {
        ColumnType::I64
    } else if values.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
        ColumnType::F64
    } else {
        ColumnType::Str
    }
}

fn parse_values<T: std::str::FromStr>(
    values: Vec<String>,
    column: &str,
    path: &str,
) -> Result<Vec<T>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, raw)| {
            raw.trim().parse::<T>().map_err(|_| FormatError::Parse {
                path: path.to_string(),
                reason: format!("row {row}, column '{column}': cannot parse '{raw}'"),
            })
        })
        .collect()
}

/// Load a typed CSV table.
///
/// The first row holds column names, optionally suffixed with `:f64`,
/// `:f32`, `:i32`, `:i64` or `:str`. Untyped columns are inferred from
/// their values.
pub fn read_csv(path: &Path) -> Result<EventTable> {
    let path_str = path.display().to_string();

    let file = File::open(path).map_err(|e| FormatError::Open {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    // Unnamed cells (a pandas index column) are dropped; each kept header
    // remembers its position in the record.
    let headers: Vec<(usize, String, Option<ColumnType>)> = reader
        .headers()
        .map_err(|e| FormatError::Csv {
            path: path_str.clone(),
            source: e,
        })?
        .iter()
        .enumerate()
        .filter(|(_, cell)| !cell.is_empty())
        .map(|(idx, cell)| {
            let (name, dtype) = parse_header_cell(cell);
            (idx, name, dtype)
        })
        .collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in reader.records() {
        let record = result.map_err(|e| FormatError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
        for ((idx, _, _), values) in headers.iter().zip(raw.iter_mut()) {
            values.push(record.get(*idx).unwrap_or_default().to_string());
        }
    }

    let mut columns: IndexMap<String, Column> = IndexMap::with_capacity(headers.len());
    for ((_, name, dtype), values) in headers.into_iter().zip(raw) {
        let dtype = dtype.unwrap_or_else(|| infer_column_type(&values));
        let column = match dtype {
            ColumnType::F64 => Column::F64(parse_values(values, &name, &path_str)?),
            ColumnType::F32 => Column::F32(parse_values(values, &name, &path_str)?),
            ColumnType::I32 => Column::I32(parse_values(values, &name, &path_str)?),
            ColumnType::I64 => Column::I64(parse_values(values, &name, &path_str)?),
            ColumnType::Str => Column::Str(values),
        };
        columns.insert(name, column);
    }

    EventTable::new(columns).map_err(|source| FormatError::Table {
        path: path_str,
        source,
    })
}
