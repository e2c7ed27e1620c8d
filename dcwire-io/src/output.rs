//! Output containers for histogram grids.
//!
//! A container is created before any data is read, so an unwritable
//! destination fails before the (slow) event loop starts. The grid is
//! written once, at the end, under the [`OVERVIEW_GROUP`] group.

use crate::config::OutputFormat;
use crate::json::JsonOverviewWriter;
use crate::Result;
use dcwire_core::{Histogram, OccupancyHistograms};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

#[cfg(feature = "hdf5")]
use crate::hdf5::Hdf5OverviewWriter;

/// Name of the group holding all histograms.
pub const OVERVIEW_GROUP: &str = "overview";
/// Version tag stored in every container.
pub const FORMAT_VERSION: &str = "1.0";

const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Contents of an output container, as read back.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub format_version: String,
    /// Data files the histograms were filled from.
    pub sources: Vec<String>,
    pub histograms: Vec<Histogram>,
}

impl Overview {
    /// Rebuilds the histogram grid.
    ///
    /// # Errors
    /// Returns an error if a histogram is missing or has unexpected binning.
    pub fn into_grid(self) -> Result<OccupancyHistograms> {
        Ok(OccupancyHistograms::from_histograms(self.histograms)?)
    }
}

/// An open output container.
pub enum OutputContainer {
    Json(JsonOverviewWriter),
    #[cfg(feature = "hdf5")]
    Hdf5(Hdf5OverviewWriter),
}

impl OutputContainer {
    /// Creates (truncates) the container file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the format is not
    /// available in this build.
    pub fn create<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        match format {
            OutputFormat::Json => Ok(OutputContainer::Json(JsonOverviewWriter::create(path)?)),
            #[cfg(feature = "hdf5")]
            OutputFormat::Hdf5 => Ok(OutputContainer::Hdf5(Hdf5OverviewWriter::create(path)?)),
            #[cfg(not(feature = "hdf5"))]
            OutputFormat::Hdf5 => Err(crate::Error::Config(
                "HDF5 output requires the hdf5 feature".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            OutputContainer::Json(w) => w.path(),
            #[cfg(feature = "hdf5")]
            OutputContainer::Hdf5(w) => w.path(),
        }
    }

    /// Writes the grid and closes the container.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_overview(self, grid: &OccupancyHistograms, sources: &[PathBuf]) -> Result<()> {
        let sources: Vec<String> = sources
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        match self {
            OutputContainer::Json(w) => w.write(grid, &sources),
            #[cfg(feature = "hdf5")]
            OutputContainer::Hdf5(w) => w.write(grid, &sources),
        }
    }
}

/// Reads a container of either format, detected from the file signature.
///
/// # Errors
/// Returns an error if the file cannot be read or has an unexpected layout.
pub fn read_overview<P: AsRef<Path>>(path: P) -> Result<Overview> {
    let path = path.as_ref();
    let mut signature = [0u8; 8];
    let is_hdf5 =
        File::open(path)?.read_exact(&mut signature).is_ok() && signature == HDF5_SIGNATURE;
    if is_hdf5 {
        #[cfg(feature = "hdf5")]
        return crate::hdf5::read_overview_hdf5(path);
        #[cfg(not(feature = "hdf5"))]
        return Err(crate::Error::Config(format!(
            "{} is an HDF5 file; reading it requires the hdf5 feature",
            path.display()
        )));
    }
    crate::json::read_overview_json(path)
}
