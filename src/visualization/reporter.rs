//! Per-dataset distribution graphs.

use std::path::{Path, PathBuf};

use log::debug;

use crate::core::table::{Column, EventTable};
use crate::core::writers::ensure_dir;
use crate::processors::runner::DerivedDataset;
use crate::processors::store::{is_non_empty_file, Provenance};

use super::{category_counts, plot_category_counts, plot_histogram, Histogram, Result, VisualizationError};

/// Counts of images produced for one dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub skipped: usize,
}

/// Renders one histogram per column of a derived dataset.
#[derive(Debug, Clone)]
pub struct DistributionReporter {
    bins: usize,
    size: (u32, u32),
}

impl DistributionReporter {
    pub fn new(bins: usize, width: u32, height: u32) -> Self {
        Self {
            bins: bins.max(1),
            size: (width, height),
        }
    }

    /// `<graphs_dir>/<column>_histogram.png`, with path separators in the
    /// column name replaced.
    pub fn histogram_path(graphs_dir: &Path, column: &str) -> PathBuf {
        let safe: String = column
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        graphs_dir.join(format!("{safe}_histogram.png"))
    }

    /// Render the graphs of a derived dataset into its `distribution_graphs` folder.
    pub fn render(&self, dataset: &DerivedDataset) -> Result<RenderSummary> {
        self.render_table(
            &dataset.table,
            &dataset.reference.graphs_dir(),
            dataset.provenance,
        )
    }

    /// Render one image per column of `table` into `graphs_dir`.
    ///
    /// A cached dataset keeps the images it already has; a fresh one is
    /// always re-rendered. Zero-row tables still get one (empty) image per
    /// column; a table without columns produces nothing.
    pub fn render_table(
        &self,
        table: &EventTable,
        graphs_dir: &Path,
        provenance: Provenance,
    ) -> Result<RenderSummary> {
        let mut summary = RenderSummary::default();
        if table.num_columns() == 0 {
            return Ok(summary);
        }

        ensure_dir(graphs_dir).map_err(|source| VisualizationError::Io {
            path: graphs_dir.display().to_string(),
            source,
        })?;

        for (name, column) in table.columns() {
            let path = Self::histogram_path(graphs_dir, name);

            if provenance == Provenance::Cached && is_non_empty_file(&path) {
                summary.skipped += 1;
                continue;
            }

            match column {
                Column::Str(values) => {
                    plot_category_counts(&path, &category_counts(values), name, self.size)?;
                }
                numeric => {
                    let values = numeric.numeric_values().unwrap_or_default();
                    let histogram = Histogram::from_values(&values, self.bins);
                    plot_histogram(&path, &histogram, name, self.size)?;
                }
            }
            debug!("rendered {}", path.display());
            summary.rendered += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn reporter() -> DistributionReporter {
        DistributionReporter::new(20, 320, 240)
    }

    fn table() -> EventTable {
        EventTable::from_columns([
            ("Position_Z", Column::F64(vec![20.0, 20.05, 20.2])),
            ("TrackID", Column::I32(vec![1, 1, 2])),
            ("ParticleName", Column::Str(vec!["opticalphoton".into(), "e-".into(), "opticalphoton".into()])),
        ])
        .unwrap()
    }

    #[test]
    fn test_histogram_path() {
        let dir = Path::new("/out/run/positive_dZ_filter/distribution_graphs");
        assert_eq!(
            DistributionReporter::histogram_path(dir, "Position_Z"),
            dir.join("Position_Z_histogram.png")
        );
        assert_eq!(
            DistributionReporter::histogram_path(dir, "a/b"),
            dir.join("a_b_histogram.png")
        );
    }

    #[test]
    fn test_render_fresh_writes_one_image_per_column() {
        let dir = TempDir::new().unwrap();
        let graphs = dir.path().join("distribution_graphs");

        let summary = reporter().render_table(&table(), &graphs, Provenance::Fresh).unwrap();

        assert_eq!(summary, RenderSummary { rendered: 3, skipped: 0 });
        for column in ["Position_Z", "TrackID", "ParticleName"] {
            assert!(DistributionReporter::histogram_path(&graphs, column).exists());
        }
    }

    #[test]
    fn test_cached_dataset_keeps_existing_images() {
        let dir = TempDir::new().unwrap();
        let graphs = dir.path().join("distribution_graphs");
        reporter().render_table(&table(), &graphs, Provenance::Fresh).unwrap();

        // Replace one image with a marker; a cached render must not touch it
        let marker = DistributionReporter::histogram_path(&graphs, "TrackID");
        fs::write(&marker, b"marker").unwrap();
        // Remove another; a cached render must restore it
        let missing = DistributionReporter::histogram_path(&graphs, "Position_Z");
        fs::remove_file(&missing).unwrap();

        let summary = reporter().render_table(&table(), &graphs, Provenance::Cached).unwrap();

        assert_eq!(summary, RenderSummary { rendered: 1, skipped: 2 });
        assert_eq!(fs::read(&marker).unwrap(), b"marker");
        assert!(missing.exists());
    }

    #[test]
    fn test_fresh_dataset_rerenders() {
        let dir = TempDir::new().unwrap();
        let graphs = dir.path().join("distribution_graphs");
        reporter().render_table(&table(), &graphs, Provenance::Fresh).unwrap();
        let marker = DistributionReporter::histogram_path(&graphs, "TrackID");
        fs::write(&marker, b"marker").unwrap();

        let summary = reporter().render_table(&table(), &graphs, Provenance::Fresh).unwrap();

        assert_eq!(summary.rendered, 3);
        assert_ne!(fs::read(&marker).unwrap(), b"marker");
    }

    #[test]
    fn test_zero_row_table_renders_empty_histograms() {
        let dir = TempDir::new().unwrap();
        let graphs = dir.path().join("distribution_graphs");
        let empty = table().select(&[false, false, false]).unwrap();

        let summary = reporter().render_table(&empty, &graphs, Provenance::Fresh).unwrap();

        assert_eq!(summary.rendered, 3);
        assert_eq!(fs::read_dir(&graphs).unwrap().count(), 3);
    }

    #[test]
    fn test_table_without_columns_renders_nothing() {
        let dir = TempDir::new().unwrap();
        let graphs = dir.path().join("distribution_graphs");

        let summary = reporter()
            .render_table(&EventTable::default(), &graphs, Provenance::Fresh)
            .unwrap();

        assert_eq!(summary, RenderSummary::default());
        assert!(!graphs.exists());
    }
}
