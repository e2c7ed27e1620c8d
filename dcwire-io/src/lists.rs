//! List-file generation.
//!
//! Walks a directory tree and writes one list file per directory that
//! holds `.hipo` files. The list is named after the directory path
//! relative to the base, with separators replaced by `_`; the base
//! directory itself gives `root.txt`.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Default directory for generated lists, relative to the working directory.
pub const DEFAULT_LIST_DIR: &str = "run_paths";

const DATA_EXTENSION: &str = "hipo";
const LIST_EXTENSION: &str = "txt";

/// One written list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedList {
    pub path: PathBuf,
    /// Number of data files listed.
    pub files: usize,
}

/// List-file name for `dir` relative to `base`.
#[must_use]
pub fn list_name_for(base: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(base).unwrap_or(dir);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let stem = if parts.is_empty() {
        "root".to_string()
    } else {
        parts.join("_")
    };
    format!("{stem}.{LIST_EXTENSION}")
}

/// Writes list files for every directory under `base_dir` with `.hipo` files.
///
/// Paths are written absolute, one per line, in file-name order. Lists are
/// returned in directory order.
///
/// # Errors
/// Returns [`Error::NotADirectory`] if `base_dir` is not a directory, or an
/// error if the tree cannot be walked or a list cannot be written.
pub fn generate_lists<P, Q>(base_dir: P, output_dir: Q) -> Result<Vec<GeneratedList>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let base_dir = base_dir.as_ref();
    let output_dir = output_dir.as_ref();
    if !base_dir.is_dir() {
        return Err(Error::NotADirectory(base_dir.to_path_buf()));
    }
    let base = fs::canonicalize(base_dir)?;

    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(&base).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == DATA_EXTENSION) {
            let dir = path.parent().unwrap_or(&base).to_path_buf();
            by_dir.entry(dir).or_default().push(path.to_path_buf());
        }
    }

    fs::create_dir_all(output_dir)?;
    let mut written = Vec::with_capacity(by_dir.len());
    for (dir, files) in by_dir {
        let list_path = output_dir.join(list_name_for(&base, &dir));
        let mut writer = BufWriter::new(fs::File::create(&list_path)?);
        for file in &files {
            writeln!(writer, "{}", file.display())?;
        }
        writer.flush()?;
        log::info!(
            "saved {} .{DATA_EXTENSION} paths to {}",
            files.len(),
            list_path.display()
        );
        written.push(GeneratedList {
            path: list_path,
            files: files.len(),
        });
    }

    if written.is_empty() {
        log::warn!("no .{DATA_EXTENSION} files under {}", base.display());
    }
    Ok(written)
}
