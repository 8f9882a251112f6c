//! In-memory columnar event table.
//!
//! An [`EventTable`] holds one simulation run's phase-space hits: an ordered
//! set of named columns, all of the same length. Tables are immutable once
//! built; row selection produces a new table.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised by table construction and column access.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{0}' is not numeric")]
    NotNumeric(String),

    #[error("column '{name}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("selection mask has {mask_len} entries but table has {rows} rows")]
    MaskLength { mask_len: usize, rows: usize },
}

impl TableError {
    /// True for errors caused by a column that is absent or of the wrong kind.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, TableError::MissingColumn(_) | TableError::NotNumeric(_))
    }
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    F64,
    F32,
    I32,
    I64,
    Str,
}

impl ColumnType {
    /// Short tag used in typed CSV headers.
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnType::F64 => "f64",
            ColumnType::F32 => "f32",
            ColumnType::I32 => "i32",
            ColumnType::I64 => "i64",
            ColumnType::Str => "str",
        }
    }

    /// Parse a tag written by [`ColumnType::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "f64" => Some(ColumnType::F64),
            "f32" => Some(ColumnType::F32),
            "i32" => Some(ColumnType::I32),
            "i64" => Some(ColumnType::I64),
            "str" => Some(ColumnType::Str),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnType::Str)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A homogeneous column of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Str(Vec<String>),
}

impl Column {
    /// Number of values in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::F64(v) => v.len(),
            Column::F32(v) => v.len(),
            Column::I32(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> ColumnType {
        match self {
            Column::F64(_) => ColumnType::F64,
            Column::F32(_) => ColumnType::F32,
            Column::I32(_) => ColumnType::I32,
            Column::I64(_) => ColumnType::I64,
            Column::Str(_) => ColumnType::Str,
        }
    }

    /// Values widened to `f64`, or `None` for categorical columns.
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        match self {
            Column::F64(v) => Some(v.clone()),
            Column::F32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::I32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::I64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::Str(_) => None,
        }
    }

    /// Render the value at `row` as text (used by the CSV writer).
    pub fn format_value(&self, row: usize) -> String {
        match self {
            Column::F64(v) => v[row].to_string(),
            Column::F32(v) => v[row].to_string(),
            Column::I32(v) => v[row].to_string(),
            Column::I64(v) => v[row].to_string(),
            Column::Str(v) => v[row].clone(),
        }
    }

    /// Keep only the values where `mask` is true. The mask length is checked
    /// by the owning table.
    pub fn select(&self, mask: &[bool]) -> Column {
        fn pick<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter_map(|(v, &keep)| keep.then(|| v.clone()))
                .collect()
        }

        match self {
            Column::F64(v) => Column::F64(pick(v, mask)),
            Column::F32(v) => Column::F32(pick(v, mask)),
            Column::I32(v) => Column::I32(pick(v, mask)),
            Column::I64(v) => Column::I64(pick(v, mask)),
            Column::Str(v) => Column::Str(pick(v, mask)),
        }
    }
}

/// Ordered set of equally sized named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventTable {
    columns: IndexMap<String, Column>,
    rows: usize,
}

impl EventTable {
    /// Build a table, checking that every column has the same length.
    pub fn new(columns: IndexMap<String, Column>) -> Result<Self> {
        let rows = columns.values().next().map_or(0, Column::len);
        for (name, column) in &columns {
            if column.len() != rows {
                return Err(TableError::LengthMismatch {
                    name: name.clone(),
                    expected: rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from `(name, column)` pairs, keeping their order.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|(name, column)| (name.into(), column))
                .collect(),
        )
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Iterate over `(name, column)` pairs in table order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), column))
    }

    /// Numeric view of a column, widened to `f64`.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .numeric_values()
            .ok_or_else(|| TableError::NotNumeric(name.to_string()))
    }

    /// New table with the rows where `mask[i]` is true.
    ///
    /// Column order and element types are preserved. An all-false mask
    /// yields a valid zero-row table.
    pub fn select(&self, mask: &[bool]) -> Result<EventTable> {
        if mask.len() != self.rows {
            return Err(TableError::MaskLength {
                mask_len: mask.len(),
                rows: self.rows,
            });
        }

        let columns: IndexMap<String, Column> = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.select(mask)))
            .collect();
        let rows = mask.iter().filter(|&&keep| keep).count();

        Ok(EventTable { columns, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> EventTable {
        EventTable::from_columns([
            ("EventID", Column::I32(vec![1, 2, 3])),
            ("ParticleName", Column::Str(vec!["opticalphoton".into(), "e-".into(), "opticalphoton".into()])),
            ("Direction_Z", Column::F64(vec![0.5, -0.3, 0.0])),
            ("KineticEnergy", Column::F32(vec![2.5e-6, 0.42, 3.1e-6])),
        ])
        .unwrap()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = EventTable::from_columns([
            ("a", Column::F64(vec![1.0, 2.0])),
            ("b", Column::F64(vec![1.0])),
        ]);

        match result {
            Err(TableError::LengthMismatch { name, expected, actual }) => {
                assert_eq!(name, "b");
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_select_preserves_order_and_types() {
        let table = sample_table();
        let selected = table.select(&[true, false, true]).unwrap();

        assert_eq!(selected.num_rows(), 2);
        assert_eq!(
            selected.column_names(),
            vec!["EventID", "ParticleName", "Direction_Z", "KineticEnergy"]
        );
        assert_eq!(selected.column("EventID").unwrap(), &Column::I32(vec![1, 3]));
        assert_eq!(selected.column("KineticEnergy").unwrap().dtype(), ColumnType::F32);
        assert_eq!(
            selected.column("ParticleName").unwrap(),
            &Column::Str(vec!["opticalphoton".into(), "opticalphoton".into()])
        );
        // Source is untouched
        assert_eq!(table.num_rows(), 3);
    }

    #[test]
    fn test_select_all_false_gives_empty_table() {
        let table = sample_table();
        let selected = table.select(&[false, false, false]).unwrap();

        assert!(selected.is_empty());
        assert_eq!(selected.num_columns(), 4);
    }

    #[test]
    fn test_select_mask_length_checked() {
        let table = sample_table();
        assert_eq!(
            table.select(&[true]),
            Err(TableError::MaskLength { mask_len: 1, rows: 3 })
        );
    }

    #[test]
    fn test_numeric_access() {
        let table = sample_table();

        assert_eq!(table.numeric("EventID").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(
            table.numeric("Position_Z"),
            Err(TableError::MissingColumn("Position_Z".into()))
        );
        let err = table.numeric("ParticleName").unwrap_err();
        assert!(err.is_schema_error());
        assert_eq!(err, TableError::NotNumeric("ParticleName".into()));
    }

    #[test]
    fn test_empty_table_has_no_rows() {
        let table = EventTable::default();
        assert_eq!(table.num_rows(), 0);
        assert!(table.column_names().is_empty());
    }

    #[test]
    fn test_column_type_tags() {
        for dtype in [
            ColumnType::F64,
            ColumnType::F32,
            ColumnType::I32,
            ColumnType::I64,
            ColumnType::Str,
        ] {
            assert_eq!(ColumnType::from_tag(dtype.tag()), Some(dtype));
        }
        assert_eq!(ColumnType::from_tag("u8"), None);
    }
}
