//! JSON output container.
//!
//! ```json
//! {
//!   "format_version": "1.0",
//!   "sources": ["/data/run1.hipo"],
//!   "groups": {
//!     "overview": [
//!       {"kind": "h2", "name": "layVScomp_left_S0", "x": {...}, "y": {...}, "counts": [...]},
//!       {"kind": "h1", "name": "avgWire_S0_SL0", "axis": {...}, "counts": [...]}
//!     ]
//!   }
//! }
//! ```
//!
//! Counts include the underflow and overflow bins.

use crate::output::{Overview, FORMAT_VERSION, OVERVIEW_GROUP};
use crate::{Error, Result};
use dcwire_core::{Histogram, HistogramRef, OccupancyHistograms};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct DocumentRef<'a> {
    format_version: &'a str,
    sources: &'a [String],
    groups: BTreeMap<&'a str, Vec<HistogramRef<'a>>>,
}

#[derive(Deserialize)]
struct Document {
    format_version: String,
    #[serde(default)]
    sources: Vec<String>,
    groups: BTreeMap<String, Vec<Histogram>>,
}

/// Writer for the JSON container.
pub struct JsonOverviewWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonOverviewWriter {
    /// Creates the output file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.as_ref().to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the grid in output order and flushes the file.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn write(mut self, grid: &OccupancyHistograms, sources: &[String]) -> Result<()> {
        let mut groups = BTreeMap::new();
        groups.insert(OVERVIEW_GROUP, grid.histograms());
        let document = DocumentRef {
            format_version: FORMAT_VERSION,
            sources,
            groups,
        };
        serde_json::to_writer(&mut self.writer, &document)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads the overview group of a JSON container.
///
/// # Errors
/// Returns an error if the file cannot be parsed, has no overview group or
/// holds inconsistent histograms.
pub fn read_overview_json<P: AsRef<Path>>(path: P) -> Result<Overview> {
    let file = File::open(path)?;
    let mut document: Document = serde_json::from_reader(BufReader::new(file))?;
    let histograms = document
        .groups
        .remove(OVERVIEW_GROUP)
        .ok_or_else(|| Error::InvalidFormat(format!("no '{OVERVIEW_GROUP}' group")))?;
    if let Some(bad) = histograms.iter().find(|h| !h.is_consistent()) {
        return Err(Error::InvalidFormat(format!(
            "histogram {} has counts that do not match its axes",
            bad.name()
        )));
    }
    Ok(Overview {
        format_version: document.format_version,
        sources: document.sources,
        histograms,
    })
}
