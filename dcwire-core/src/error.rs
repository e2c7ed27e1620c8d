//! Error types for dcwire-core.

use thiserror::Error;

/// Result type alias for dcwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for dcwire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A decoded record could not be placed in the detector grid.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Two histograms with different binning were combined.
    #[error("binning mismatch for histogram {name}")]
    BinningMismatch { name: String },

    /// A histogram expected in the occupancy grid was not supplied.
    #[error("missing histogram {0}")]
    MissingHistogram(String),
}

/// A decoded field is outside the detector geometry.
///
/// Values carry the field as it was decoded (1-based).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("sector {0} outside 1..=6")]
    SectorOutOfRange(i32),

    #[error("superlayer {0} outside 1..=6")]
    SuperlayerOutOfRange(i32),

    #[error("layer {0} outside 1..=6")]
    LayerOutOfRange(i32),
}
