//! List-file processing.
//!
//! [`process_list_file`] turns one list file into one output container:
//! every listed HIPO file is read in order into a single histogram grid.
//! [`process_directory`] runs it for every list file of a directory.

use crate::config::RunConfig;
use crate::listfile::{derive_output_name, has_extension, read_list_file};
use crate::output::OutputContainer;
use crate::{Error, Result};
use dcwire_core::{FillStatistics, OccupancyAccumulator, OccupancyHistograms};
use dcwire_hipo::{DcEventStream, HipoChain};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Result of one processed list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOutcome {
    pub list: PathBuf,
    pub output: PathBuf,
    /// Number of data files read.
    pub files: usize,
    pub statistics: FillStatistics,
}

/// Summary of a directory run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<ListOutcome>,
    /// List files that failed, with the error.
    pub failed: Vec<(PathBuf, Error)>,
}

impl BatchReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total events over all successful list files.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.processed.iter().map(|o| o.statistics.events).sum()
    }
}

/// Processes one list file into `output_dir`.
///
/// The output container is created before any data file is opened. If
/// reading fails, the partial output file is removed.
///
/// # Errors
/// Returns an error if the list is unreadable or empty, the output cannot
/// be created, or a data file is missing, corrupt or lacks a required bank.
pub fn process_list_file<P, Q>(list_path: P, output_dir: Q, config: &RunConfig) -> Result<ListOutcome>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let list_path = list_path.as_ref();
    let output_dir = output_dir.as_ref();
    let start = Instant::now();

    let files = read_list_file(list_path)?;
    let name = derive_output_name(&files[0], &config.name_marker, config.output_extension());
    fs::create_dir_all(output_dir)?;
    let output = output_dir.join(name);

    log::info!(
        "{}: {} data files -> {}",
        list_path.display(),
        files.len(),
        output.display()
    );
    let container = OutputContainer::create(&output, config.output_format)?;

    let filled = fill_from_files(&files, config)
        .and_then(|(grid, stats)| container.write_overview(&grid, &files).map(|()| stats));
    let statistics = match filled {
        Ok(stats) => stats,
        Err(err) => {
            if let Err(remove_err) = fs::remove_file(&output) {
                log::debug!("could not remove {}: {remove_err}", output.display());
            }
            return Err(err);
        }
    };

    if statistics.rejected() > 0 {
        log::warn!(
            "{}: skipped {} hits and {} segments outside the detector",
            list_path.display(),
            statistics.rejected_hits,
            statistics.rejected_segments
        );
    }
    log::info!(
        "wrote {} ({} events, {} hits, {} segments) in {:.2?}",
        output.display(),
        statistics.events,
        statistics.hits,
        statistics.segments,
        start.elapsed()
    );

    Ok(ListOutcome {
        list: list_path.to_path_buf(),
        output,
        files: files.len(),
        statistics,
    })
}

/// Reads every event of `files` into a fresh grid.
///
/// # Errors
/// Returns an error if a file is missing, unreadable or lacks a bank.
pub fn fill_from_files(
    files: &[PathBuf],
    config: &RunConfig,
) -> Result<(OccupancyHistograms, FillStatistics)> {
    let chain = HipoChain::new(files)?;
    let mut stream = DcEventStream::new(chain, config.bank_names());
    let mut accumulator = OccupancyAccumulator::new();
    while let Some(event) = stream.next_event()? {
        accumulator.process_event(&event);
    }
    Ok(accumulator.finish())
}

/// Processes every list file in `input_dir`.
///
/// List files are regular files whose extension is the configured list
/// extension, taken in directory order. A failing list is logged and
/// recorded in the report; the remaining lists are still processed.
///
/// # Errors
/// Returns [`Error::NotADirectory`] if `input_dir` is not a directory, or
/// an I/O error if it cannot be listed or `output_dir` cannot be created.
pub fn process_directory<P, Q>(input_dir: P, output_dir: Q, config: &RunConfig) -> Result<BatchReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();
    if !input_dir.is_dir() {
        return Err(Error::NotADirectory(input_dir.to_path_buf()));
    }
    fs::create_dir_all(output_dir)?;

    let entries = fs::read_dir(input_dir)?.map(|entry| entry.map(|e| e.path()));
    let lists = select_list_files(entries, &config.list_extension);

    let mut report = BatchReport::default();
    for path in lists {
        match process_list_file(&path, output_dir, config) {
            Ok(outcome) => report.processed.push(outcome),
            Err(err) => {
                log::error!("{}: {err}", path.display());
                report.failed.push((path, err));
            }
        }
    }

    log::info!(
        "processed {} list files ({} failed), {} events",
        report.processed.len() + report.failed.len(),
        report.failed.len(),
        report.total_events()
    );
    Ok(report)
}

/// Keeps the list files among directory entries, in iteration order.
///
/// Entries that cannot be read are logged and skipped.
fn select_list_files<I>(entries: I, extension: &str) -> Vec<PathBuf>
where
    I: IntoIterator<Item = std::io::Result<PathBuf>>,
{
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(path) if has_extension(&path, extension) => Some(path),
            Ok(path) => {
                log::debug!("ignoring {}", path.display());
                None
            }
            Err(err) => {
                log::warn!("skipping unreadable directory entry: {err}");
                None
            }
        })
        .collect()
}
