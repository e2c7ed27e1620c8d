//! Memory-mapped HIPO file reader.

use crate::event::Event;
use crate::header::{FileHeader, RecordHeader, HEADER_BYTES};
use crate::record::RecordBuffer;
use crate::schema::Dictionary;
use crate::{Compression, Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Counts gathered by walking the record headers of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub version: u32,
    pub file_size: usize,
    pub records: usize,
    /// Records holding no events (trailers, index records).
    pub empty_records: usize,
    pub events: u64,
    pub compressed_records: usize,
    pub bank_count: usize,
}

/// Sequential event reader over one memory-mapped HIPO file.
///
/// Records are decompressed one at a time into an internal buffer; events
/// are copied into the caller's [`Event`].
pub struct HipoReader {
    mmap: Mmap,
    path: PathBuf,
    header: FileHeader,
    dictionary: Dictionary,
    end: usize,
    next_record: usize,
    record: RecordBuffer,
    next_event: usize,
}

impl HipoReader {
    /// Opens a file, parses its header and dictionary.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, or if the
    /// header or dictionary record is malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let size = file.metadata()?.len();
        if size < HEADER_BYTES as u64 {
            return Err(Error::Truncated {
                offset: 0,
                needed: HEADER_BYTES,
                available: usize::try_from(size).unwrap_or(0),
            });
        }
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        let header = FileHeader::parse(&mmap)?;
        let dictionary = read_dictionary(&mmap, &header)?;
        let end = match usize::try_from(header.trailer_position) {
            Ok(0) | Err(_) => mmap.len(),
            Ok(trailer) => trailer.min(mmap.len()),
        };
        let next_record = header.first_record_offset();

        log::debug!(
            "opened {} (version {}, {} banks in dictionary)",
            path.display(),
            header.version(),
            dictionary.len()
        );

        Ok(Self {
            mmap,
            path,
            header,
            dictionary,
            end,
            next_record,
            record: RecordBuffer::new(),
            next_event: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Reads the next event into `event`.
    ///
    /// Returns `Ok(false)` once the file is exhausted.
    ///
    /// # Errors
    /// Returns an error on a corrupt record or event.
    pub fn next_event(&mut self, event: &mut Event) -> Result<bool> {
        loop {
            if let Some(bytes) = self.record.event(self.next_event) {
                event.load(bytes)?;
                self.next_event += 1;
                return Ok(true);
            }
            if !self.load_next_record()? {
                return Ok(false);
            }
        }
    }

    /// Starts reading again from the first record.
    pub fn rewind(&mut self) {
        self.next_record = self.header.first_record_offset();
        self.record = RecordBuffer::new();
        self.next_event = 0;
    }

    /// Walks all record headers without decompressing anything.
    ///
    /// # Errors
    /// Returns an error if a record header is malformed.
    pub fn summary(&self) -> Result<FileSummary> {
        let mut summary = FileSummary {
            version: self.header.version(),
            file_size: self.mmap.len(),
            records: 0,
            empty_records: 0,
            events: 0,
            compressed_records: 0,
            bank_count: self.dictionary.len(),
        };
        let mut position = self.header.first_record_offset();
        while let Some(header) = self.record_header_at(position)? {
            summary.records += 1;
            if header.event_count == 0 {
                summary.empty_records += 1;
            }
            if header.compression != Compression::None {
                summary.compressed_records += 1;
            }
            summary.events += u64::from(header.event_count);
            position += header.record_bytes();
        }
        Ok(summary)
    }

    /// Header of the record at `position`, or `None` past the last record.
    fn record_header_at(&self, position: usize) -> Result<Option<RecordHeader>> {
        if position >= self.end {
            return Ok(None);
        }
        if position + HEADER_BYTES > self.end {
            return Err(Error::Truncated {
                offset: position,
                needed: HEADER_BYTES,
                available: self.end - position,
            });
        }
        let header = RecordHeader::parse(&self.mmap[..self.end], position)?;
        if position + header.record_bytes() > self.end {
            return Err(Error::Truncated {
                offset: position,
                needed: header.record_bytes(),
                available: self.end - position,
            });
        }
        Ok(Some(header))
    }

    fn load_next_record(&mut self) -> Result<bool> {
        while let Some(header) = self.record_header_at(self.next_record)? {
            let position = self.next_record;
            self.next_record += header.record_bytes();
            if header.event_count == 0 {
                log::trace!("skipping empty record at offset {position}");
                continue;
            }
            self.record.load(&self.mmap, position, &header)?;
            self.next_event = 0;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Parses the dictionary record stored in the file user header.
fn read_dictionary(bytes: &[u8], header: &FileHeader) -> Result<Dictionary> {
    let mut dictionary = Dictionary::new();
    if header.user_header_length == 0 {
        return Ok(dictionary);
    }

    let offset = header.user_header_offset();
    let record_header = RecordHeader::parse(bytes, offset)?;
    let mut record = RecordBuffer::new();
    record.load(bytes, offset, &record_header)?;

    let mut event = Event::new();
    for index in 0..record.len() {
        if let Some(data) = record.event(index) {
            event.load(data)?;
            dictionary.add_from_event(&event)?;
        }
    }
    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, Schema};
    use crate::writer::HipoWriter;
    use tempfile::tempdir;

    fn dictionary() -> Dictionary {
        [Schema::new("Test::bank", 10, 1).with_column("value", ColumnType::Int)]
            .into_iter()
            .collect()
    }

    fn tagged_event(tag: u32) -> Event {
        let mut event = Event::new();
        event.set_tag(tag);
        event
    }

    #[test]
    fn test_reads_all_events_across_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.hipo");
        let mut writer = HipoWriter::create(&path, &dictionary(), Compression::Lz4).unwrap();
        writer.set_events_per_record(4);
        for tag in 0..10 {
            writer.write_event(&tagged_event(tag)).unwrap();
        }
        writer.close().unwrap();

        let mut reader = HipoReader::open(&path).unwrap();
        assert_eq!(reader.header().record_count, 3);
        assert!(reader.dictionary().get("Test::bank").is_some());

        let mut event = Event::new();
        let mut tags = Vec::new();
        while reader.next_event(&mut event).unwrap() {
            tags.push(event.tag());
        }
        assert_eq!(tags, (0..10).collect::<Vec<_>>());
        assert!(!reader.next_event(&mut event).unwrap());

        reader.rewind();
        assert!(reader.next_event(&mut event).unwrap());
        assert_eq!(event.tag(), 0);
    }

    #[test]
    fn test_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.hipo");
        let mut writer = HipoWriter::create(&path, &dictionary(), Compression::None).unwrap();
        writer.set_events_per_record(5);
        for tag in 0..7 {
            writer.write_event(&tagged_event(tag)).unwrap();
        }
        writer.close().unwrap();

        let summary = HipoReader::open(&path).unwrap().summary().unwrap();
        assert_eq!(summary.records, 2, "reading stops at the trailer");
        assert_eq!(summary.empty_records, 0);
        assert_eq!(summary.events, 7);
        assert_eq!(summary.compressed_records, 0);
        assert_eq!(summary.bank_count, 1);
        assert_eq!(summary.version, 6);

        // without a trailer position the trailer record is walked and skipped
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[40..48].copy_from_slice(&0u64.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        let mut reader = HipoReader::open(&path).unwrap();
        let summary = reader.summary().unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.empty_records, 1);

        let mut event = Event::new();
        let mut count = 0;
        while reader.next_event(&mut event).unwrap() {
            count += 1;
        }
        assert_eq!(count, 7);
    }

    #[test]
    fn test_empty_file_has_no_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.hipo");
        HipoWriter::create(&path, &Dictionary::new(), Compression::Lz4)
            .unwrap()
            .close()
            .unwrap();

        let mut reader = HipoReader::open(&path).unwrap();
        assert!(reader.dictionary().is_empty());
        assert!(!reader.next_event(&mut Event::new()).unwrap());
    }

    #[test]
    fn test_open_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            HipoReader::open(dir.path().join("missing.hipo")),
            Err(Error::Open { .. })
        ));

        let short = dir.path().join("short.hipo");
        std::fs::write(&short, [0u8; 10]).unwrap();
        assert!(matches!(
            HipoReader::open(&short),
            Err(Error::Truncated { .. })
        ));

        let junk = dir.path().join("junk.hipo");
        std::fs::write(&junk, [0x55u8; 200]).unwrap();
        assert!(matches!(
            HipoReader::open(&junk),
            Err(Error::BadMagic { .. })
        ));
    }

    #[test]
    fn test_truncated_record_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cut.hipo");
        let mut writer = HipoWriter::create(&path, &dictionary(), Compression::None).unwrap();
        for tag in 0..3 {
            writer.write_event(&tagged_event(tag)).unwrap();
        }
        writer.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // drop the trailer and part of the data record
        let header = FileHeader::parse(&bytes).unwrap();
        let cut = header.first_record_offset() + 70;
        let mut patched = bytes[..cut].to_vec();
        patched[40..48].copy_from_slice(&0u64.to_le_bytes());
        std::fs::write(&path, &patched).unwrap();

        let mut reader = HipoReader::open(&path).unwrap();
        assert!(matches!(
            reader.next_event(&mut Event::new()),
            Err(Error::Truncated { .. })
        ));
    }
}
