//! Core data types and I/O operations.

pub mod format;
pub mod loaders;
pub mod table;
pub mod writers;

pub use format::{FormatError, TableFormat};
pub use table::{Column, ColumnType, EventTable, TableError};
pub use writers::ensure_dir;
