//! dcwire-core: Core types for drift-chamber occupancy analysis.
//!
//! This crate holds everything that does not depend on the HIPO file
//! format: detector geometry constants, hit and segment records, fixed-bin
//! histograms, and the occupancy aggregation state.
//!
//! # Key Components
//!
//! - [`Hist1D`] / [`Hist2D`] - Fixed-width histograms with under/overflow bins
//! - [`OccupancyHistograms`] - The full per-run histogram grid
//! - [`OccupancyAccumulator`] - Validates records and fills the grid
//! - [`DriftChamberEvent`] - Narrow event interface implemented by readers
//! - [`find_bad_wires`] - Low-occupancy wire selection against a fitted shape

pub mod badwire;
pub mod error;
pub mod geometry;
pub mod histogram;
pub mod occupancy;
pub mod record;

pub use badwire::{find_bad_wires, BadWire, WireShape};
pub use error::{DecodeError, Error, Result};
pub use geometry::{N_LAYERS_PER_SUPERLAYER, N_SECTORS, N_SUPERLAYERS};
pub use histogram::{Axis, Hist1D, Hist2D, Histogram, HistogramRef};
pub use occupancy::{FillStatistics, OccupancyAccumulator, OccupancyHistograms};
pub use record::{DcEvent, DriftChamberEvent, HitRecord, RawHit, RawSegment, SegmentRecord};
