//! On-disk layout for derived datasets.
//!
//! Every filtered subset lives at
//! `<root>/<source_file_id>/<filter_name>/<filter_name>.<ext>`, so its
//! location is a pure function of where it came from. The store answers
//! "is this already done?" and reads/writes tables; the decision to skip
//! belongs to the runner.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::core::format::{FormatError, TableFormat};
use crate::core::table::EventTable;
use crate::core::writers::ensure_dir;

/// Name of the per-dataset folder holding histogram images.
pub const GRAPHS_DIR: &str = "distribution_graphs";

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The dataset was never written.
    #[error("derived dataset not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to prepare '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Whether a derived dataset was produced in this run or found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Written during this run.
    Fresh,
    /// Present before this run; re-read from storage.
    Cached,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Fresh => f.write_str("fresh"),
            Provenance::Cached => f.write_str("cached"),
        }
    }
}

/// Address of one derived dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivedDatasetRef {
    pub source_file_id: String,
    pub filter_name: String,
    pub storage_path: PathBuf,
}

impl DerivedDatasetRef {
    /// Folder that holds the dataset file and its graphs.
    pub fn folder(&self) -> &Path {
        self.storage_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Folder that holds the dataset's histogram images.
    pub fn graphs_dir(&self) -> PathBuf {
        self.folder().join(GRAPHS_DIR)
    }
}

/// Compute `<root>/<source_file_id>/<filter_name>/<filter_name>.<ext>`.
pub fn derived_path(root: &Path, source_file_id: &str, filter_name: &str, ext: &str) -> PathBuf {
    root.join(source_file_id)
        .join(filter_name)
        .join(format!("{filter_name}.{ext}"))
}

/// True when `path` is a regular file with at least one byte.
pub fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Reads and writes derived datasets under one output root.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
    format: TableFormat,
    tree_name: String,
}

impl DatasetStore {
    /// # Arguments
    ///
    /// * `root` - Output root directory
    /// * `format` - Format used for derived datasets
    /// * `tree_name` - Tree key the tables are stored under
    pub fn new(root: impl Into<PathBuf>, format: TableFormat, tree_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            format,
            tree_name: tree_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }

    pub fn reference(&self, source_file_id: &str, filter_name: &str) -> DerivedDatasetRef {
        DerivedDatasetRef {
            source_file_id: source_file_id.to_string(),
            filter_name: filter_name.to_string(),
            storage_path: derived_path(
                &self.root,
                source_file_id,
                filter_name,
                self.format.extension(),
            ),
        }
    }

    /// True iff the dataset file is present and non-empty.
    pub fn exists(&self, reference: &DerivedDatasetRef) -> bool {
        is_non_empty_file(&reference.storage_path)
    }

    pub fn provenance(&self, reference: &DerivedDatasetRef) -> Provenance {
        if self.exists(reference) {
            Provenance::Cached
        } else {
            Provenance::Fresh
        }
    }

    /// Write `table` to the dataset's path, replacing any existing file.
    ///
    /// Data goes to a `.partial` sibling first and is renamed into place,
    /// so an interrupted write never passes [`DatasetStore::exists`].
    pub fn write(&self, reference: &DerivedDatasetRef, table: &EventTable) -> Result<()> {
        let folder = reference.folder();
        ensure_dir(folder).map_err(|source| StoreError::Io {
            path: folder.to_path_buf(),
            source,
        })?;

        let mut partial = reference.storage_path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        self.format.write(&partial, &self.tree_name, table)?;
        fs::rename(&partial, &reference.storage_path).map_err(|source| StoreError::Io {
            path: reference.storage_path.clone(),
            source,
        })?;

        debug!(
            "wrote {} rows to {}",
            table.num_rows(),
            reference.storage_path.display()
        );
        Ok(())
    }

    /// Read a dataset back. Fails with [`StoreError::NotFound`] if it was never written.
    pub fn read(&self, reference: &DerivedDatasetRef) -> Result<EventTable> {
        if !reference.storage_path.is_file() {
            return Err(StoreError::NotFound(reference.storage_path.clone()));
        }
        Ok(self.format.read(&reference.storage_path, &self.tree_name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Column;
    use std::fs::File;
    use tempfile::TempDir;

    fn csv_store(dir: &TempDir) -> DatasetStore {
        DatasetStore::new(dir.path().join("filtered"), TableFormat::Csv, "tree")
    }

    fn small_table() -> EventTable {
        EventTable::from_columns([
            ("Direction_Z", Column::F64(vec![0.5, 0.25])),
            ("TrackID", Column::I32(vec![4, 9])),
        ])
        .unwrap()
    }

    #[test]
    fn test_storage_path_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let store = csv_store(&dir);

        let first = store.reference("run_042", "positive_dZ_filter");
        let second = store.reference("run_042", "positive_dZ_filter");

        assert_eq!(first, second);
        assert_eq!(
            first.storage_path,
            dir.path()
                .join("filtered")
                .join("run_042")
                .join("positive_dZ_filter")
                .join("positive_dZ_filter.csv")
        );
        assert_eq!(
            first.graphs_dir(),
            dir.path()
                .join("filtered/run_042/positive_dZ_filter/distribution_graphs")
        );
    }

    #[test]
    fn test_filters_get_distinct_folders() {
        let dir = TempDir::new().unwrap();
        let store = csv_store(&dir);

        let positive = store.reference("run", "positive_dZ_filter");
        let negative = store.reference("run", "negative_dZ_filter");

        assert_ne!(positive.folder(), negative.folder());
    }

    #[test]
    fn test_exists_requires_non_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = csv_store(&dir);
        let reference = store.reference("run", "positive_dZ_filter");

        assert!(!store.exists(&reference));
        assert_eq!(store.provenance(&reference), Provenance::Fresh);

        fs::create_dir_all(reference.folder()).unwrap();
        File::create(&reference.storage_path).unwrap();
        assert!(!store.exists(&reference));

        store.write(&reference, &small_table()).unwrap();
        assert!(store.exists(&reference));
        assert_eq!(store.provenance(&reference), Provenance::Cached);
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = csv_store(&dir);
        let reference = store.reference("run", "positive_dZ_filter");
        let table = small_table();

        store.write(&reference, &table).unwrap();
        // A second write over existing directories must not fail
        store.write(&reference, &table).unwrap();

        assert_eq!(store.read(&reference).unwrap(), table);
        let mut partial = reference.storage_path.clone().into_os_string();
        partial.push(".partial");
        assert!(!PathBuf::from(partial).exists());
    }

    #[test]
    fn test_write_empty_table() {
        let dir = TempDir::new().unwrap();
        let store = csv_store(&dir);
        let reference = store.reference("run", "gt_threshold_filter");
        let empty = small_table().select(&[false, false]).unwrap();

        store.write(&reference, &empty).unwrap();

        assert!(store.exists(&reference));
        let loaded = store.read(&reference).unwrap();
        assert_eq!(loaded.num_rows(), 0);
        assert_eq!(loaded.column_names(), vec!["Direction_Z", "TrackID"]);
    }

    #[test]
    fn test_read_missing_dataset() {
        let dir = TempDir::new().unwrap();
        let store = csv_store(&dir);
        let reference = store.reference("never", "written");

        match store.read(&reference) {
            Err(StoreError::NotFound(path)) => assert_eq!(path, reference.storage_path),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}
