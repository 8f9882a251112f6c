//! Named row filters over event tables.
//!
//! Filters are declarative `(name, column, comparator, threshold)` records,
//! so every filter can be tested on its own and custom ones can be read
//! from the YAML config.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::table::{EventTable, Result as TableResult};

/// Keeps hits travelling towards +Z (out of the crystal, into the pixel).
pub const POSITIVE_DZ_FILTER: &str = "positive_dZ_filter";
/// Keeps hits travelling towards -Z.
pub const NEGATIVE_DZ_FILTER: &str = "negative_dZ_filter";
/// Keeps hits below the low Z threshold.
pub const LT_THRESHOLD_FILTER: &str = "lt_threshold_filter";
/// Keeps hits above the high Z threshold.
pub const GT_THRESHOLD_FILTER: &str = "gt_threshold_filter";

pub const DIRECTION_Z: &str = "Direction_Z";
pub const POSITION_Z: &str = "Position_Z";

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("duplicate filter name '{0}'")]
    DuplicateName(String),

    #[error("invalid filter name '{0}': must be non-empty and free of path separators")]
    InvalidName(String),
}

/// Comparison applied between a column value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparator {
    #[inline]
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Lt => value < threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Le => value <= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
        }
    }
}

/// One named filter: keep rows where `column <comparator> threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    pub column: String,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl FilterSpec {
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        comparator: Comparator,
        threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            comparator,
            threshold,
        }
    }

    /// Boolean row mask for `table`.
    ///
    /// Fails with a schema error if the column is absent or not numeric.
    /// NaN values never pass.
    pub fn mask(&self, table: &EventTable) -> TableResult<Vec<bool>> {
        let values = table.numeric(&self.column)?;
        Ok(values
            .into_iter()
            .map(|v| self.comparator.holds(v, self.threshold))
            .collect())
    }

    /// New table holding the rows that pass this filter.
    pub fn apply(&self, table: &EventTable) -> TableResult<EventTable> {
        let mask = self.mask(table)?;
        table.select(&mask)
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} {}",
            self.name,
            self.column,
            self.comparator.symbol(),
            self.threshold
        )
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Ordered, immutable set of filters applied to every raw table.
#[derive(Debug, Clone)]
pub struct PredicateRegistry {
    specs: Vec<FilterSpec>,
}

impl PredicateRegistry {
    /// The four standard phase-space filters, in registration order.
    ///
    /// # Arguments
    ///
    /// * `threshold_low` - Upper bound for `lt_threshold_filter` on `Position_Z`
    /// * `threshold_high` - Lower bound for `gt_threshold_filter` on `Position_Z`
    pub fn standard(threshold_low: f64, threshold_high: f64) -> Self {
        Self {
            specs: vec![
                FilterSpec::new(POSITIVE_DZ_FILTER, DIRECTION_Z, Comparator::Gt, 0.0),
                FilterSpec::new(NEGATIVE_DZ_FILTER, DIRECTION_Z, Comparator::Lt, 0.0),
                FilterSpec::new(LT_THRESHOLD_FILTER, POSITION_Z, Comparator::Lt, threshold_low),
                FilterSpec::new(GT_THRESHOLD_FILTER, POSITION_Z, Comparator::Gt, threshold_high),
            ],
        }
    }

    /// Build a registry from arbitrary specs, checking their names.
    pub fn from_specs(specs: Vec<FilterSpec>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::with_capacity(specs.len());
        for spec in &specs {
            validate_name(&spec.name)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(RegistryError::DuplicateName(spec.name.clone()));
            }
        }
        Ok(Self { specs })
    }

    /// Append extra specs after the existing ones.
    pub fn with_extra(self, extra: Vec<FilterSpec>) -> Result<Self, RegistryError> {
        let mut specs = self.specs;
        specs.extend(extra);
        Self::from_specs(specs)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterSpec> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FilterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Apply every filter to the same input table.
    ///
    /// Filters are independent: none sees another's output. A schema error
    /// in one filter is reported under its name and does not affect the
    /// others.
    pub fn apply_all(&self, table: &EventTable) -> IndexMap<String, TableResult<EventTable>> {
        self.specs
            .iter()
            .map(|spec| (spec.name.clone(), spec.apply(table)))
            .collect()
    }
}
