//! Batch driver: discover raw files, filter them, render their graphs and
//! write the run summary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::core::writers::write_records_csv;
use crate::processors::predicates::PredicateRegistry;
use crate::processors::runner::{discover_raw_files, FileReport, FilterOutcome, FilterRunner};
use crate::processors::store::{DatasetStore, Provenance};
use crate::visualization::{DistributionReporter, RenderSummary};

/// File name of the per-run summary written under the output root.
pub const SUMMARY_FILE: &str = "filter_summary.csv";

/// One line of `filter_summary.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub source_file_id: String,
    pub filter_name: String,
    pub status: String,
    pub raw_rows: Option<usize>,
    pub filtered_rows: Option<usize>,
    pub detail: String,
}

impl SummaryRow {
    /// Flatten a file report into summary rows: one per filter, plus one
    /// for a file-level error.
    pub fn from_report(report: &FileReport) -> Vec<SummaryRow> {
        let mut rows: Vec<SummaryRow> = report
            .filters
            .iter()
            .map(|record| {
                let (status, filtered_rows, detail) = match &record.outcome {
                    FilterOutcome::Persisted { provenance, rows } => {
                        (provenance.to_string(), Some(*rows), String::new())
                    }
                    FilterOutcome::Failed { reason } => ("failed".to_string(), None, reason.clone()),
                };
                SummaryRow {
                    source_file_id: report.source_file_id.clone(),
                    filter_name: record.filter_name.clone(),
                    status,
                    raw_rows: report.raw_rows,
                    filtered_rows,
                    detail,
                }
            })
            .collect();

        if let Some(message) = &report.error {
            rows.push(SummaryRow {
                source_file_id: report.source_file_id.clone(),
                filter_name: String::new(),
                status: "error".to_string(),
                raw_rows: report.raw_rows,
                filtered_rows: None,
                detail: message.clone(),
            });
        }
        rows
    }
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub reports: Vec<FileReport>,
    pub images_rendered: usize,
    pub images_skipped: usize,
    pub render_failures: usize,
    pub summary_path: PathBuf,
}

impl PipelineSummary {
    pub fn files_found(&self) -> usize {
        self.reports.len()
    }

    pub fn files_failed(&self) -> usize {
        self.reports.iter().filter(|report| !report.succeeded()).count()
    }

    fn count_filters(&self, pred: impl Fn(&FilterOutcome) -> bool) -> usize {
        self.reports
            .iter()
            .flat_map(|report| &report.filters)
            .filter(|record| pred(&record.outcome))
            .count()
    }

    pub fn datasets_written(&self) -> usize {
        self.count_filters(|outcome| {
            matches!(outcome, FilterOutcome::Persisted { provenance, .. } if *provenance == Provenance::Fresh)
        })
    }

    pub fn datasets_cached(&self) -> usize {
        self.count_filters(|outcome| {
            matches!(outcome, FilterOutcome::Persisted { provenance, .. } if *provenance == Provenance::Cached)
        })
    }

    pub fn filters_failed(&self) -> usize {
        self.count_filters(|outcome| matches!(outcome, FilterOutcome::Failed { .. }))
    }

    /// `1` when files were found and none of them produced a dataset.
    ///
    /// A file whose storage failed part-way still counts as succeeded if
    /// at least one filter was persisted before the failure; the error is
    /// kept in its report and in `filter_summary.csv`.
    pub fn exit_code(&self) -> i32 {
        if !self.reports.is_empty() && self.files_failed() == self.reports.len() {
            1
        } else {
            0
        }
    }
}

/// Per-file result including graph counts.
struct ProcessedFile {
    report: FileReport,
    graphs: RenderSummary,
    render_failures: usize,
}

/// Wires the registry, store, runner and reporter from one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    runner: FilterRunner,
    reporter: DistributionReporter,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;

        let registry = PredicateRegistry::standard(
            config.filters.threshold_low,
            config.filters.threshold_high,
        )
        .with_extra(config.filters.custom.clone())
        .context("Invalid custom filter list")?;

        let store = DatasetStore::new(
            config.paths.output_root.clone(),
            config.io.format,
            config.io.derived_tree_name.clone(),
        );
        let runner = FilterRunner::new(
            registry,
            store,
            config.io.raw_format(),
            config.io.raw_tree_name.clone(),
        );
        let reporter = DistributionReporter::new(
            config.reporting.histogram_bin_count,
            config.reporting.width,
            config.reporting.height,
        );

        Ok(Self {
            config,
            runner,
            reporter,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn runner(&self) -> &FilterRunner {
        &self.runner
    }

    pub fn summary_path(&self) -> PathBuf {
        self.config.paths.output_root.join(SUMMARY_FILE)
    }

    /// Raw files in the configured input directory, sorted.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let input_dir = &self.config.paths.input_dir;
        discover_raw_files(input_dir, &self.config.io.raw_file_extension)
            .with_context(|| format!("Failed to scan input directory: {}", input_dir.display()))
    }

    /// Filter one raw file and render graphs for every dataset it produced.
    pub fn process_file(&self, path: &Path) -> FileReport {
        self.process(path).report
    }

    fn process(&self, path: &Path) -> ProcessedFile {
        let run = self.runner.process_file(path);
        let mut graphs = RenderSummary::default();
        let mut render_failures = 0;

        for dataset in &run.datasets {
            match self.reporter.render(dataset) {
                Ok(summary) => {
                    graphs.rendered += summary.rendered;
                    graphs.skipped += summary.skipped;
                }
                Err(e) => {
                    error!(
                        "{} / {}: failed to render graphs: {}",
                        dataset.reference.source_file_id, dataset.reference.filter_name, e
                    );
                    render_failures += 1;
                }
            }
        }

        ProcessedFile {
            report: run.report,
            graphs,
            render_failures,
        }
    }

    /// Discover and process every raw file.
    pub fn run(&self) -> Result<PipelineSummary> {
        let files = self.discover()?;
        self.run_files(&files, |_| {})
    }

    /// Process `files` in order, calling `on_file` after each one, then
    /// write `filter_summary.csv`.
    pub fn run_files<F>(&self, files: &[PathBuf], mut on_file: F) -> Result<PipelineSummary>
    where
        F: FnMut(&FileReport),
    {
        info!(
            "Processing {} raw file(s) from {}",
            files.len(),
            self.config.paths.input_dir.display()
        );

        let mut summary = PipelineSummary {
            summary_path: self.summary_path(),
            ..PipelineSummary::default()
        };

        for path in files {
            let processed = self.process(path);
            summary.images_rendered += processed.graphs.rendered;
            summary.images_skipped += processed.graphs.skipped;
            summary.render_failures += processed.render_failures;
            on_file(&processed.report);
            summary.reports.push(processed.report);
        }

        let rows: Vec<SummaryRow> = summary.reports.iter().flat_map(SummaryRow::from_report).collect();
        write_records_csv(&summary.summary_path, &rows).with_context(|| {
            format!("Failed to write run summary: {}", summary.summary_path.display())
        })?;

        info!(
            "{} file(s), {} failed; {} dataset(s) written, {} cached",
            summary.files_found(),
            summary.files_failed(),
            summary.datasets_written(),
            summary.datasets_cached()
        );
        Ok(summary)
    }
}
