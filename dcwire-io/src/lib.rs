//! dcwire-io: Batch processing and histogram output for dcwire.
//!
//! This crate turns list files of HIPO paths into histogram containers:
//! list parsing and output naming, the run configuration, JSON and HDF5
//! containers, the directory-level batch driver, and the bad-wire status
//! tables derived from a finished container.
//!

pub mod batch;
pub mod config;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod json;
pub mod listfile;
pub mod lists;
pub mod output;
pub mod status;

pub use batch::{fill_from_files, process_directory, process_list_file, BatchReport, ListOutcome};
pub use config::{OutputFormat, RunConfig};
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_overview_hdf5, Hdf5OverviewWriter};
pub use json::{read_overview_json, JsonOverviewWriter};
pub use listfile::{derive_output_name, read_list_file};
pub use lists::{generate_lists, GeneratedList, DEFAULT_LIST_DIR};
pub use output::{read_overview, OutputContainer, Overview};
pub use status::{process_status, run_label, StatusReport};
