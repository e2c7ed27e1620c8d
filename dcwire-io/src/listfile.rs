//! List files and output naming.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Reads the whitespace-separated data file paths of a list file.
///
/// # Errors
/// Returns an error if the file cannot be read or names no files.
pub fn read_list_file<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let files: Vec<PathBuf> = text.split_whitespace().map(PathBuf::from).collect();
    if files.is_empty() {
        return Err(Error::EmptyList(path.to_path_buf()));
    }
    Ok(files)
}

/// Output file name for a list whose first entry is `first`.
///
/// The base name is cut at the first occurrence of `marker` (if present
/// and non-empty), then `.extension` is appended:
/// `/data/run123.evio.0001.hipo` with marker `.evio` and extension `root`
/// gives `run123.root`.
#[must_use]
pub fn derive_output_name(first: &Path, marker: &str, extension: &str) -> String {
    let base = first
        .file_name()
        .map_or_else(|| first.to_string_lossy(), |name| name.to_string_lossy());
    let stem = match base.find(marker) {
        Some(index) if !marker.is_empty() => &base[..index],
        _ => &base[..],
    };
    format!("{stem}.{extension}")
}

/// Whether `path` is a regular file whose name ends in `.extension`.
///
/// A bare `.extension` name counts too.
#[must_use]
pub fn has_extension(path: &Path, extension: &str) -> bool {
    let suffix = format!(".{extension}");
    path.is_file()
        && path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(&suffix))
}
