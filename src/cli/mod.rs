//! Command-line interface for the phase-space pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::format::TableFormat;
use crate::pipeline::Pipeline;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "phasespace-pipeline")]
#[command(about = "Filter phase-space simulation output and plot its distributions", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter every raw file in a directory and render histograms
    Run {
        /// Directory containing raw phase-space files
        input_dir: PathBuf,
        /// Root directory for filtered datasets
        output_root: PathBuf,
        /// Position_Z bound for lt_threshold_filter
        #[arg(long)]
        threshold_low: Option<f64>,
        /// Position_Z bound for gt_threshold_filter
        #[arg(long)]
        threshold_high: Option<f64>,
        /// Raw file extension to pick up
        #[arg(long)]
        extension: Option<String>,
        /// Bins per histogram
        #[arg(long)]
        bins: Option<usize>,
        /// Storage format for filtered datasets (root or csv)
        #[arg(long)]
        format: Option<TableFormat>,
    },

    /// Print the row count and columns of one file
    Inspect {
        /// ROOT or CSV file
        file: PathBuf,
        /// Tree to read (defaults to the raw tree name)
        #[arg(long)]
        tree: Option<String>,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Output YAML path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a bar for a known number of files
fn create_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config; a config that was asked for but cannot be read is fatal
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Run {
            input_dir,
            output_root,
            threshold_low,
            threshold_high,
            extension,
            bins,
            format,
        } => {
            let mut config = config;
            config.paths.input_dir = input_dir;
            config.paths.output_root = output_root;
            if let Some(low) = threshold_low {
                config.filters.threshold_low = low;
            }
            if let Some(high) = threshold_high {
                config.filters.threshold_high = high;
            }
            if let Some(ext) = extension {
                config.io.raw_file_extension = ext;
            }
            if let Some(bins) = bins {
                config.reporting.histogram_bin_count = bins;
            }
            if let Some(format) = format {
                config.io.format = format;
            }
            cmd_run(config);
        }
        Commands::Inspect { file, tree } => {
            cmd_inspect(&file, tree, &config);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path);
        }
    }
}

fn cmd_run(config: PipelineConfig) {
    let start = Instant::now();

    let pipeline = match Pipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    let config = pipeline.config();

    println!("Filtering phase-space files...");
    println!("Input directory: {}", config.paths.input_dir.display());
    println!("Output root: {}", config.paths.output_root.display());
    println!("Filters: {}", pipeline.runner().registry().names().join(", "));

    let files = match pipeline.discover() {
        Ok(files) => files,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let pb = create_progress_bar(files.len());
    let result = pipeline.run_files(&files, |report| {
        pb.set_message(report.source_file_id.clone());
        pb.inc(1);
    });
    pb.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    print_summary(
        "Filtering Complete",
        &[
            ("Input directory", config.paths.input_dir.display().to_string()),
            ("Output root", config.paths.output_root.display().to_string()),
            ("Files found", summary.files_found().to_string()),
            ("Files failed", summary.files_failed().to_string()),
            ("Datasets written", summary.datasets_written().to_string()),
            ("Datasets cached", summary.datasets_cached().to_string()),
            ("Filters failed", summary.filters_failed().to_string()),
            ("Images rendered", summary.images_rendered.to_string()),
            ("Images kept", summary.images_skipped.to_string()),
            ("Summary CSV", summary.summary_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    let code = summary.exit_code();
    if code != 0 {
        error!("No raw file produced a filtered dataset");
        std::process::exit(code);
    }
}

fn cmd_inspect(file: &Path, tree: Option<String>, config: &PipelineConfig) {
    let format = file
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse::<TableFormat>().ok())
        .unwrap_or_default();
    let tree = tree.unwrap_or_else(|| config.io.raw_tree_name.clone());

    let spinner = create_spinner(&format!("Loading {}...", file.display()));
    let table = match format.read(file, &tree) {
        Ok(t) => t,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load {}: {}", file.display(), e);
            std::process::exit(1);
        }
    };
    spinner.finish_and_clear();

    let mut items = vec![
        ("File", file.display().to_string()),
        ("Format", format.to_string()),
        ("Rows", table.num_rows().to_string()),
        ("Columns", table.num_columns().to_string()),
    ];
    if format == TableFormat::Root {
        items.insert(2, ("Tree", tree));
    }
    print_summary("Table Summary", &items);

    for (name, column) in table.columns() {
        println!("  {:<30} {}", name, column.dtype());
    }
}

fn cmd_init_config(path: &Path) {
    match PipelineConfig::default().to_yaml(path) {
        Ok(()) => println!("Wrote default configuration to {}", path.display()),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
