//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input path of a batch run is not a directory.
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// A list file names no data files.
    #[error("list file {} is empty", .0.display())]
    EmptyList(PathBuf),

    /// HIPO reading error.
    #[error("HIPO error: {0}")]
    Hipo(#[from] dcwire_hipo::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] dcwire_core::Error),

    /// JSON output or configuration parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HDF5 output error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// An output container does not have the expected layout.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),
}
