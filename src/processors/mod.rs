//! Data processing modules.

pub mod predicates;
pub mod runner;
pub mod store;

// Re-export key types for convenience
pub use predicates::{Comparator, FilterSpec, PredicateRegistry, RegistryError};
pub use runner::{
    discover_raw_files, source_file_id, DerivedDataset, FileReport, FileRun, FilterOutcome,
    FilterRecord, FilterRunner, RunnerError,
};
pub use store::{derived_path, DatasetStore, DerivedDatasetRef, Provenance, StoreError};
