//! Several HIPO files read back to back as one event stream.

use crate::event::Event;
use crate::reader::HipoReader;
use crate::schema::Dictionary;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Ordered list of files read as one stream.
///
/// Files are opened lazily, one at a time, in the order given.
pub struct HipoChain {
    paths: Vec<PathBuf>,
    current: Option<HipoReader>,
    next_file: usize,
    events_read: u64,
}

impl HipoChain {
    /// Creates a chain over `paths`.
    ///
    /// Every path must exist; files are not opened until read.
    ///
    /// # Errors
    /// Returns [`Error::Open`] for the first path that does not exist.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(Error::Open {
                path: missing.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such data file"),
            });
        }
        Ok(Self {
            paths,
            current: None,
            next_file: 0,
            events_read: 0,
        })
    }

    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Index of the file the last event came from.
    #[must_use]
    pub fn current_file_index(&self) -> Option<usize> {
        self.current.as_ref().map(|_| self.next_file - 1)
    }

    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(HipoReader::path)
    }

    /// Dictionary of the file currently being read.
    #[must_use]
    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.current.as_ref().map(HipoReader::dictionary)
    }

    /// Total events read so far across all files.
    #[must_use]
    pub fn events_read(&self) -> u64 {
        self.events_read
    }

    /// Reads the next event of the chain into `event`, opening the next
    /// file when the current one is exhausted.
    ///
    /// # Errors
    /// Returns an error if a file cannot be opened or is corrupt.
    pub fn next_event(&mut self, event: &mut Event) -> Result<bool> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if reader.next_event(event)? {
                    self.events_read += 1;
                    return Ok(true);
                }
                log::debug!("finished {}", reader.path().display());
            }
            let Some(path) = self.paths.get(self.next_file) else {
                self.current = None;
                return Ok(false);
            };
            log::info!(
                "reading file {}/{}: {}",
                self.next_file + 1,
                self.paths.len(),
                path.display()
            );
            self.current = Some(HipoReader::open(path)?);
            self.next_file += 1;
        }
    }
}
