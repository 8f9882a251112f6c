//! Per-file filtering: load once, apply every filter, persist or re-read.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use thiserror::Error;

use crate::core::format::{FormatError, TableFormat};
use crate::core::table::EventTable;

use super::predicates::PredicateRegistry;
use super::store::{DatasetStore, DerivedDatasetRef, Provenance};

/// Errors that can occur while discovering raw files.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("input directory not found: {0}")]
    InputDirNotFound(PathBuf),

    #[error("failed to list '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Find raw files in `input_dir` with the given extension.
///
/// Only regular files directly inside `input_dir` are considered; the
/// extension match is case-insensitive and a leading dot is ignored.
/// Everything else is silently skipped.
///
/// Two files that differ only in extension case (`run.csv`, `run.CSV`)
/// would share one source file id and one output folder; only the first
/// in sorted order is kept and the others are skipped with a warning.
///
/// # Returns
///
/// Matching paths, sorted.
pub fn discover_raw_files(input_dir: &Path, extension: &str) -> Result<Vec<PathBuf>, RunnerError> {
    if !input_dir.is_dir() {
        return Err(RunnerError::InputDirNotFound(input_dir.to_path_buf()));
    }
    let wanted = extension.trim_start_matches('.');

    let entries = fs::read_dir(input_dir).map_err(|source| RunnerError::ReadDir {
        path: input_dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        })
        .collect();

    files.sort();

    let mut seen = HashSet::with_capacity(files.len());
    files.retain(|path| {
        let id = source_file_id(path);
        if seen.insert(id.clone()) {
            true
        } else {
            warn!(
                "{}: skipped, source file id '{}' is already taken by another file",
                path.display(),
                id
            );
            false
        }
    });
    Ok(files)
}

/// Namespace key for a raw file: its name with the final extension stripped.
pub fn source_file_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Result of one filter on one raw file.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Persisted { provenance: Provenance, rows: usize },
    Failed { reason: String },
}

impl fmt::Display for FilterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOutcome::Persisted { provenance, rows } => write!(f, "{rows} rows ({provenance})"),
            FilterOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRecord {
    pub filter_name: String,
    pub outcome: FilterOutcome,
}

impl FilterRecord {
    /// Whether the dataset was already on disk before this run, if it was persisted at all.
    pub fn exists_before(&self) -> Option<bool> {
        match self.outcome {
            FilterOutcome::Persisted { provenance, .. } => Some(provenance == Provenance::Cached),
            FilterOutcome::Failed { .. } => None,
        }
    }

    pub fn rows(&self) -> Option<usize> {
        match self.outcome {
            FilterOutcome::Persisted { rows, .. } => Some(rows),
            FilterOutcome::Failed { .. } => None,
        }
    }
}

/// Completion record for one raw file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub source_file_id: String,
    pub source_path: PathBuf,
    /// Row count of the raw table, if it could be loaded.
    pub raw_rows: Option<usize>,
    pub filters: Vec<FilterRecord>,
    /// File-level failure (load or storage error).
    pub error: Option<String>,
}

impl FileReport {
    fn new(source_file_id: &str, source_path: &Path) -> Self {
        Self {
            source_file_id: source_file_id.to_string(),
            source_path: source_path.to_path_buf(),
            raw_rows: None,
            filters: Vec::new(),
            error: None,
        }
    }

    pub fn filter(&self, name: &str) -> Option<&FilterRecord> {
        self.filters.iter().find(|record| record.filter_name == name)
    }

    pub fn persisted_count(&self) -> usize {
        self.filters.iter().filter(|record| record.rows().is_some()).count()
    }

    /// A file succeeds when at least one derived dataset is available for it.
    pub fn succeeded(&self) -> bool {
        self.persisted_count() > 0
    }
}

/// A derived dataset ready for reporting.
#[derive(Debug)]
pub struct DerivedDataset {
    pub reference: DerivedDatasetRef,
    pub provenance: Provenance,
    pub table: EventTable,
}

/// Output of [`FilterRunner::process_file`].
#[derive(Debug)]
pub struct FileRun {
    pub report: FileReport,
    pub datasets: Vec<DerivedDataset>,
}

/// Applies the registry to raw files and persists the results.
#[derive(Debug, Clone)]
pub struct FilterRunner {
    registry: PredicateRegistry,
    store: DatasetStore,
    raw_format: TableFormat,
    raw_tree: String,
}

impl FilterRunner {
    pub fn new(
        registry: PredicateRegistry,
        store: DatasetStore,
        raw_format: TableFormat,
        raw_tree: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            raw_format,
            raw_tree: raw_tree.into(),
        }
    }

    pub fn registry(&self) -> &PredicateRegistry {
        &self.registry
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Load a raw file's event tree.
    pub fn load(&self, path: &Path) -> Result<EventTable, FormatError> {
        self.raw_format.read(path, &self.raw_tree)
    }

    /// Filter one raw file.
    ///
    /// A file that cannot be loaded yields a report with `error` set and no
    /// datasets; it never panics or aborts the batch.
    pub fn process_file(&self, path: &Path) -> FileRun {
        let id = source_file_id(path);

        match self.load(path) {
            Ok(table) => self.process_table(&id, path, &table),
            Err(e) => {
                error!("{}: failed to load {}: {}", id, path.display(), e);
                let mut report = FileReport::new(&id, path);
                report.error = Some(e.to_string());
                FileRun {
                    report,
                    datasets: Vec::new(),
                }
            }
        }
    }

    /// Filter an already loaded raw table.
    ///
    /// For each filter, in registration order:
    /// - if the dataset is already stored, it is re-read from disk (not
    ///   recomputed) so cached and fresh datasets look the same downstream;
    /// - otherwise the filter is applied and the result written.
    ///
    /// A schema error fails only that filter. A storage error stops the
    /// remaining filters for this file.
    pub fn process_table(&self, id: &str, source_path: &Path, table: &EventTable) -> FileRun {
        let raw_rows = table.num_rows();
        let mut report = FileReport::new(id, source_path);
        report.raw_rows = Some(raw_rows);
        let mut datasets = Vec::with_capacity(self.registry.len());

        for spec in self.registry.iter() {
            let reference = self.store.reference(id, &spec.name);
            let provenance = self.store.provenance(&reference);

            let filtered = match provenance {
                Provenance::Cached => match self.store.read(&reference) {
                    Ok(filtered) => filtered,
                    Err(e) => {
                        error!("{} / {}: failed to read cached dataset: {}", id, spec.name, e);
                        report.error = Some(e.to_string());
                        break;
                    }
                },
                Provenance::Fresh => {
                    let filtered = match spec.apply(table) {
                        Ok(filtered) => filtered,
                        Err(e) => {
                            warn!("{} / {}: skipped, {}", id, spec.name, e);
                            report.filters.push(FilterRecord {
                                filter_name: spec.name.clone(),
                                outcome: FilterOutcome::Failed {
                                    reason: e.to_string(),
                                },
                            });
                            continue;
                        }
                    };
                    if let Err(e) = self.store.write(&reference, &filtered) {
                        error!("{} / {}: failed to write dataset: {}", id, spec.name, e);
                        report.error = Some(e.to_string());
                        break;
                    }
                    filtered
                }
            };

            let rows = filtered.num_rows();
            info!(
                "{} / {}: {} of {} rows ({})",
                id, spec.name, rows, raw_rows, provenance
            );
            report.filters.push(FilterRecord {
                filter_name: spec.name.clone(),
                outcome: FilterOutcome::Persisted { provenance, rows },
            });
            datasets.push(DerivedDataset {
                reference,
                provenance,
                table: filtered,
            });
        }

        FileRun { report, datasets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Column;
    use crate::core::writers::write_csv;
    use crate::processors::predicates::{
        GT_THRESHOLD_FILTER, LT_THRESHOLD_FILTER, NEGATIVE_DZ_FILTER, POSITIVE_DZ_FILTER,
    };
    use std::fs::File;
    use tempfile::TempDir;

    fn scenario_table() -> EventTable {
        EventTable::from_columns([
            ("EventID", Column::I32(vec![0, 1, 2])),
            ("Direction_Z", Column::F64(vec![0.5, -0.3, 0.0])),
            ("Position_Z", Column::F64(vec![20.00, 20.05, 20.20])),
        ])
        .unwrap()
    }

    fn csv_runner(dir: &TempDir) -> FilterRunner {
        FilterRunner::new(
            PredicateRegistry::standard(20.02, 20.11),
            DatasetStore::new(dir.path().join("out"), TableFormat::Csv, "tree"),
            TableFormat::Csv,
            "Phase",
        )
    }

    fn write_raw(dir: &TempDir, name: &str, table: &EventTable) -> PathBuf {
        let path = dir.path().join("raw").join(name);
        write_csv(&path, table).unwrap();
        path
    }

    #[test]
    fn test_discover_raw_files() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        fs::create_dir_all(raw.join("nested.root")).unwrap();
        File::create(raw.join("b.root")).unwrap();
        File::create(raw.join("a.ROOT")).unwrap();
        File::create(raw.join("notes.txt")).unwrap();
        File::create(raw.join("c.root.bak")).unwrap();

        let files = discover_raw_files(&raw, ".root").unwrap();

        assert_eq!(files, vec![raw.join("a.ROOT"), raw.join("b.root")]);
    }

    #[test]
    fn test_discover_skips_colliding_source_ids() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        fs::create_dir_all(&raw).unwrap();
        File::create(raw.join("run.CSV")).unwrap();
        File::create(raw.join("run.csv")).unwrap();
        File::create(raw.join("other.csv")).unwrap();

        let files = discover_raw_files(&raw, "csv").unwrap();

        assert_eq!(files, vec![raw.join("other.csv"), raw.join("run.CSV")]);
        let ids: Vec<String> = files.iter().map(|p| source_file_id(p)).collect();
        assert_eq!(ids, vec!["other", "run"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = TempDir::new().unwrap();
        let result = discover_raw_files(&dir.path().join("absent"), "root");
        assert!(matches!(result, Err(RunnerError::InputDirNotFound(_))));
    }

    #[test]
    fn test_source_file_id() {
        assert_eq!(source_file_id(Path::new("/data/run_7.root")), "run_7");
        assert_eq!(source_file_id(Path::new("phase.space.root")), "phase.space");
    }

    #[test]
    fn test_process_file_fresh_then_cached() {
        let dir = TempDir::new().unwrap();
        let runner = csv_runner(&dir);
        let raw = write_raw(&dir, "run_1.csv", &scenario_table());

        let first = runner.process_file(&raw);
        assert!(first.report.error.is_none());
        assert_eq!(first.report.raw_rows, Some(3));
        assert_eq!(first.datasets.len(), 4);
        for record in &first.report.filters {
            assert_eq!(record.exists_before(), Some(false));
            assert_eq!(record.rows(), Some(1), "{}", record.filter_name);
        }

        let path = runner.store().reference("run_1", POSITIVE_DZ_FILTER).storage_path;
        let bytes_before = fs::read(&path).unwrap();

        let second = runner.process_file(&raw);
        assert_eq!(second.datasets.len(), 4);
        for (record, dataset) in second.report.filters.iter().zip(&second.datasets) {
            assert_eq!(record.exists_before(), Some(true));
            assert_eq!(dataset.provenance, Provenance::Cached);
            assert_eq!(dataset.table.num_rows(), 1);
        }
        assert_eq!(fs::read(&path).unwrap(), bytes_before);
    }

    #[test]
    fn test_cached_dataset_is_read_back_not_recomputed() {
        let dir = TempDir::new().unwrap();
        let runner = csv_runner(&dir);
        let raw = write_raw(&dir, "run_1.csv", &scenario_table());

        // Pre-seed the positive filter output with different content
        let reference = runner.store().reference("run_1", POSITIVE_DZ_FILTER);
        let seeded = EventTable::from_columns([("Direction_Z", Column::F64(vec![0.1, 0.2, 0.3]))]).unwrap();
        runner.store().write(&reference, &seeded).unwrap();

        let run = runner.process_file(&raw);
        let positive = &run.datasets[0];

        assert_eq!(positive.reference.filter_name, POSITIVE_DZ_FILTER);
        assert_eq!(positive.provenance, Provenance::Cached);
        assert_eq!(positive.table, seeded);
        assert_eq!(run.datasets[1].provenance, Provenance::Fresh);
    }

    #[test]
    fn test_missing_column_fails_only_threshold_filters() {
        let dir = TempDir::new().unwrap();
        let runner = csv_runner(&dir);
        let table = EventTable::from_columns([("Direction_Z", Column::F64(vec![0.5, -0.3, 0.0]))]).unwrap();
        let raw = write_raw(&dir, "no_position.csv", &table);

        let run = runner.process_file(&raw);

        assert!(run.report.error.is_none());
        assert!(run.report.succeeded());
        assert_eq!(run.report.filter(POSITIVE_DZ_FILTER).unwrap().rows(), Some(1));
        assert_eq!(run.report.filter(NEGATIVE_DZ_FILTER).unwrap().rows(), Some(1));
        for name in [LT_THRESHOLD_FILTER, GT_THRESHOLD_FILTER] {
            let record = run.report.filter(name).unwrap();
            assert!(matches!(record.outcome, FilterOutcome::Failed { .. }));
            assert!(!runner.store().exists(&runner.store().reference("no_position", name)));
        }
        assert_eq!(run.datasets.len(), 2);
    }

    #[test]
    fn test_empty_raw_table_persists_every_filter() {
        let dir = TempDir::new().unwrap();
        let runner = csv_runner(&dir);
        let empty = scenario_table().select(&[false, false, false]).unwrap();
        let raw = write_raw(&dir, "empty.csv", &empty);

        let run = runner.process_file(&raw);

        assert_eq!(run.report.raw_rows, Some(0));
        assert_eq!(run.report.persisted_count(), 4);
        for dataset in &run.datasets {
            assert_eq!(dataset.table.num_rows(), 0);
            assert!(runner.store().exists(&dataset.reference));
        }
    }

    #[test]
    fn test_unreadable_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let runner = csv_runner(&dir);
        let raw = dir.path().join("raw").join("broken.csv");
        fs::create_dir_all(raw.parent().unwrap()).unwrap();
        fs::write(&raw, "Position_Z:f64\noops\n").unwrap();

        let run = runner.process_file(&raw);

        assert!(run.report.error.is_some());
        assert!(run.report.filters.is_empty());
        assert!(run.datasets.is_empty());
        assert!(!run.report.succeeded());
        assert!(!dir.path().join("out").join("broken").exists());
    }
}
