//! Filtering and distribution reporting for optical phase-space datasets.
//!
//! This crate provides tools for:
//! - Loading event tables from ROOT trees or typed CSV files
//! - Splitting each table with named, declarative row filters
//! - Persisting every filtered subset idempotently under a fixed layout
//! - Rendering one histogram per column of every filtered subset
//!
//! # Example
//!
//! ```no_run
//! use phasespace_pipeline::{Pipeline, PipelineConfig};
//!
//! let mut config = PipelineConfig::default();
//! config.paths.input_dir = "data/raw".into();
//! config.paths.output_root = "data/filtered".into();
//!
//! let summary = Pipeline::new(config).unwrap().run().unwrap();
//! std::process::exit(summary.exit_code());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod processors;
pub mod visualization;

pub use config::{ConfigError, PipelineConfig};
pub use core::{Column, ColumnType, EventTable, TableFormat};
pub use pipeline::{Pipeline, PipelineSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
