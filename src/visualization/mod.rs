//! Visualization tools for event table columns.
//!
//! This module computes plain frequency histograms and renders them as PNG
//! bar charts using the plotters library. plotters is built without a
//! font backend, so the charts are bars and grid only.

pub mod reporter;

use std::collections::BTreeMap;
use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

pub use reporter::{DistributionReporter, RenderSummary};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("failed to prepare '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Plotting error: {0}")]
    PlottingError(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Bar fill colour (blue).
const BAR_COLOR: RGBColor = RGBColor(55, 126, 184);

/// Fixed-bin frequency histogram over a closed value range.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their finite range.
    ///
    /// Non-finite values are ignored. With no finite values the range is
    /// `[0, 1)` and every bin is empty; a single repeated value gets its
    /// range widened by one unit on each side. The maximum lands in the
    /// last bin.
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

        let (mut min, mut max) = if finite.is_empty() {
            (0.0, 1.0)
        } else {
            finite
                .iter()
                .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
        };
        if max <= min {
            min -= 1.0;
            max += 1.0;
        }

        let width = (max - min) / bins as f64;
        let mut counts = vec![0usize; bins];
        for v in finite {
            let idx = (((v - min) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self { min, max, counts }
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    /// Lower and upper edge of bin `idx`.
    pub fn bin_edges(&self, idx: usize) -> (f64, f64) {
        let width = self.bin_width();
        let lo = self.min + width * idx as f64;
        (lo, lo + width)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Count occurrences of each distinct category, sorted by category.
pub fn category_counts(values: &[String]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(category, count)| (category.to_string(), count))
        .collect()
}

/// Draw `(x0, x1, count)` bars on a white canvas and save as PNG.
///
/// plotters is built without a font backend, so the chart carries no
/// caption, axis labels or tick text; any text draw would panic.
fn draw_bars(
    output_path: &Path,
    x_range: (f64, f64),
    bars: &[(f64, f64, usize)],
    size: (u32, u32),
) -> Result<()> {
    let y_max = bars.iter().map(|&(_, _, count)| count).max().unwrap_or(0).max(1) as f64;

    let root = BitMapBackend::new(output_path, size).into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(x_range.0..x_range.1, 0.0..(y_max * 1.05))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(
            bars.iter()
                .filter(|&&(_, _, count)| count > 0)
                .map(|&(x0, x1, count)| {
                    Rectangle::new([(x0, 0.0), (x1, count as f64)], BAR_COLOR.mix(0.8).filled())
                }),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Render a numeric histogram as a PNG bar chart.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `histogram` - Binned values
/// * `_title` - Column name (unused: no text is drawn)
/// * `size` - Image size in pixels
pub fn plot_histogram(
    output_path: &Path,
    histogram: &Histogram,
    _title: &str,
    size: (u32, u32),
) -> Result<()> {
    let bars: Vec<(f64, f64, usize)> = histogram
        .counts
        .iter()
        .enumerate()
        .map(|(idx, &count)| {
            let (lo, hi) = histogram.bin_edges(idx);
            (lo, hi, count)
        })
        .collect();

    draw_bars(output_path, (histogram.min, histogram.max), &bars, size)
}

/// Render category counts as a PNG bar chart, one bar per category.
///
/// Bars follow the order of `counts`, one unit apart.
pub fn plot_category_counts(
    output_path: &Path,
    counts: &[(String, usize)],
    _title: &str,
    size: (u32, u32),
) -> Result<()> {
    let bars: Vec<(f64, f64, usize)> = counts
        .iter()
        .enumerate()
        .map(|(idx, (_, count))| (idx as f64 - 0.4, idx as f64 + 0.4, *count))
        .collect();

    let upper = counts.len().max(1) as f64 - 0.5;
    draw_bars(output_path, (-0.5, upper), &bars, size)
}
