//! Minimal HIPO writer.
//!
//! Writes the file header, the dictionary record as file user header, data
//! records of a fixed number of events and a closing trailer record. Used to
//! build reader fixtures and small synthetic runs.

use crate::event::Event;
use crate::header::{padding_for, FileHeader, HEADER_BYTES};
use crate::record::encode_record;
use crate::schema::{Dictionary, DICTIONARY_JSON_NODE};
use crate::{Compression, Error, Result};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const DEFAULT_EVENTS_PER_RECORD: usize = 1000;

/// Streams events into a HIPO file.
pub struct HipoWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    header: FileHeader,
    compression: Compression,
    events_per_record: usize,
    pending: Vec<Vec<u8>>,
    records_written: u32,
    position: u64,
}

impl HipoWriter {
    /// Creates the file and writes its header and dictionary.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written, or if the
    /// compression type is not supported for writing.
    pub fn create<P: AsRef<Path>>(
        path: P,
        dictionary: &Dictionary,
        compression: Compression,
    ) -> Result<Self> {
        if compression == Compression::Gzip {
            return Err(Error::UnsupportedCompression(compression.type_code()));
        }
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);

        let user_header = encode_dictionary(dictionary)?;
        let user_header_length = u32::try_from(user_header.len())
            .map_err(|_| Error::InvalidFormat("dictionary too large".to_string()))?;
        let header = FileHeader::new(user_header_length);

        writer.write_all(&header.encode())?;
        writer.write_all(&user_header)?;
        let padding = padding_for(user_header_length) as usize;
        writer.write_all(&[0u8; 3][..padding])?;

        let position = (HEADER_BYTES + user_header.len() + padding) as u64;
        Ok(Self {
            writer,
            path,
            header,
            compression,
            events_per_record: DEFAULT_EVENTS_PER_RECORD,
            pending: Vec::new(),
            records_written: 0,
            position,
        })
    }

    /// Sets how many events go into one record (at least one).
    pub fn set_events_per_record(&mut self, events: usize) {
        self.events_per_record = events.max(1);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queues an event, flushing a record once enough are pending.
    ///
    /// # Errors
    /// Returns an error if a record cannot be written.
    pub fn write_event(&mut self, event: &Event) -> Result<()> {
        self.pending.push(event.as_bytes().to_vec());
        if self.pending.len() >= self.events_per_record {
            self.flush_record()?;
        }
        Ok(())
    }

    fn flush_record(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.records_written += 1;
        let record = encode_record(
            self.pending.iter().map(Vec::as_slice),
            self.records_written,
            self.compression,
        )?;
        self.writer.write_all(&record)?;
        self.position += record.len() as u64;
        self.pending.clear();
        Ok(())
    }

    /// Writes pending events and the trailer, then patches the file header.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn close(mut self) -> Result<()> {
        self.flush_record()?;

        let trailer_position = self.position;
        let trailer = encode_record(
            std::iter::empty::<&[u8]>(),
            self.records_written + 1,
            Compression::None,
        )?;
        self.writer.write_all(&trailer)?;

        self.header.record_count = self.records_written;
        self.header.trailer_position = trailer_position;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&self.header.encode())?;
        self.writer.flush()?;

        log::debug!(
            "wrote {} records to {}",
            self.records_written,
            self.path.display()
        );
        Ok(())
    }
}

/// Encodes the dictionary as one uncompressed record with one schema per
/// event. An empty dictionary yields no user header.
fn encode_dictionary(dictionary: &Dictionary) -> Result<Vec<u8>> {
    if dictionary.is_empty() {
        return Ok(Vec::new());
    }
    let mut events = Vec::with_capacity(dictionary.len());
    for schema in dictionary.schemas() {
        let mut event = Event::new();
        event.add_string(DICTIONARY_JSON_NODE.0, DICTIONARY_JSON_NODE.1, &schema.to_json()?)?;
        events.push(event);
    }
    encode_record(events.iter().map(Event::as_bytes), 0, Compression::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::RecordHeader;
    use crate::schema::{ColumnType, Schema};
    use tempfile::tempdir;

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.hipo");
        let dictionary: Dictionary = [Schema::new("A::b", 1, 2).with_column("x", ColumnType::Int)]
            .into_iter()
            .collect();

        let mut writer = HipoWriter::create(&path, &dictionary, Compression::None).unwrap();
        writer.set_events_per_record(2);
        for _ in 0..3 {
            writer.write_event(&Event::new()).unwrap();
        }
        writer.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header = FileHeader::parse(&bytes).unwrap();
        assert_eq!(header.record_count, 2);
        assert_eq!(header.first_record_offset() % 4, 0);

        let first = RecordHeader::parse(&bytes, header.first_record_offset()).unwrap();
        assert_eq!(first.event_count, 2);
        assert_eq!(first.record_number, 1);

        let trailer_at = usize::try_from(header.trailer_position).unwrap();
        let trailer = RecordHeader::parse(&bytes, trailer_at).unwrap();
        assert_eq!(trailer.event_count, 0);
        assert_eq!(trailer_at + trailer.record_bytes(), bytes.len());
    }

    #[test]
    fn test_gzip_is_rejected() {
        let dir = tempdir().unwrap();
        let result = HipoWriter::create(
            dir.path().join("gz.hipo"),
            &Dictionary::new(),
            Compression::Gzip,
        );
        assert!(matches!(result, Err(Error::UnsupportedCompression(3))));
    }
}
