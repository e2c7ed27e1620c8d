//! HIPO-specific error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for HIPO operations.
pub type Result<T> = std::result::Result<T, Error>;

/// HIPO-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A listed data file could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file or record header does not carry the HIPO magic word.
    #[error("bad magic word {found:#010x} at offset {offset}")]
    BadMagic { offset: usize, found: u32 },

    /// Fewer bytes than a header or payload needs.
    #[error("truncated data at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Structurally invalid file content.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Record compression type this reader cannot decode.
    #[error("unsupported record compression type {0}")]
    UnsupportedCompression(u32),

    /// LZ4 decompression failed.
    #[error("record decompression failed: {0}")]
    Decompress(String),

    /// Schema string could not be parsed.
    #[error("schema error: {0}")]
    Schema(String),

    /// JSON schema parse error.
    #[error("schema JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A bank required by the reader is not in the file dictionary.
    #[error("bank {0} not found in dictionary")]
    MissingBank(String),

    /// A column required by the reader is not in a bank schema.
    #[error("bank {bank} has no column {column}")]
    MissingColumn { bank: String, column: String },
}
