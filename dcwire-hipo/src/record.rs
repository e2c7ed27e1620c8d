//! Record payload decoding and encoding.

use crate::header::{
    padding_for, Compression, RecordHeader, FORMAT_VERSION, HEADER_BYTES, HEADER_WORDS,
};
use crate::{Error, Result};

/// Largest decompressed record payload accepted.
pub(crate) const MAX_RECORD_PAYLOAD: usize = 256 << 20;

/// Decompressed payload of one record plus the event boundaries in it.
///
/// The payload buffer is reused from record to record.
#[derive(Debug, Default)]
pub(crate) struct RecordBuffer {
    payload: Vec<u8>,
    events: Vec<(usize, usize)>,
}

impl RecordBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decodes the record at `offset` in `bytes`, whose header was already
    /// parsed into `header`.
    pub(crate) fn load(&mut self, bytes: &[u8], offset: usize, header: &RecordHeader) -> Result<()> {
        let start = offset + header.header_bytes();
        let expected = header.uncompressed_length();
        self.events.clear();

        match header.compression {
            Compression::None => {
                let payload = slice(bytes, start, expected)?;
                self.payload.clear();
                self.payload.extend_from_slice(payload);
            }
            Compression::Lz4 => {
                let compressed = slice(bytes, start, header.compressed_length())?;
                // an LZ4 block expands at most 255x
                let bound = compressed.len().saturating_mul(255).saturating_add(16);
                if expected > bound.min(MAX_RECORD_PAYLOAD) {
                    return Err(Error::InvalidFormat(format!(
                        "record {} claims {expected} bytes from a {}-byte LZ4 block",
                        header.record_number,
                        compressed.len()
                    )));
                }
                self.payload.clear();
                self.payload.resize(expected, 0);
                let written = lz4_flex::block::decompress_into(compressed, &mut self.payload)
                    .map_err(|e| {
                        Error::Decompress(format!("record {}: {e}", header.record_number))
                    })?;
                self.payload.truncate(written);
            }
            Compression::Gzip => return Err(Error::UnsupportedCompression(3)),
        }

        let event_count = header.event_count as usize;
        if self.payload.len() < event_count * 4 {
            return Err(Error::Truncated {
                offset: start,
                needed: event_count * 4,
                available: self.payload.len(),
            });
        }

        let mut position = header.events_offset();
        for i in 0..event_count {
            let length = u32::from_le_bytes([
                self.payload[i * 4],
                self.payload[i * 4 + 1],
                self.payload[i * 4 + 2],
                self.payload[i * 4 + 3],
            ]) as usize;
            if position + length > self.payload.len() {
                return Err(Error::Truncated {
                    offset: start + position,
                    needed: length,
                    available: self.payload.len().saturating_sub(position),
                });
            }
            self.events.push((position, length));
            position += length;
        }
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn event(&self, index: usize) -> Option<&[u8]> {
        let &(start, length) = self.events.get(index)?;
        self.payload.get(start..start + length)
    }
}

fn slice(bytes: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    let end = start.checked_add(len).ok_or(Error::Truncated {
        offset: start,
        needed: len,
        available: bytes.len().saturating_sub(start),
    })?;
    bytes.get(start..end).ok_or(Error::Truncated {
        offset: start,
        needed: len,
        available: bytes.len().saturating_sub(start),
    })
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidFormat(format!("{what} of {value} bytes is too large")))
}

/// Serializes events into one record (header included).
pub(crate) fn encode_record<'a, I>(
    events: I,
    record_number: u32,
    compression: Compression,
) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut index = Vec::new();
    let mut data = Vec::new();
    let mut event_count = 0u32;
    for event in events {
        index.extend_from_slice(&to_u32(event.len(), "event")?.to_le_bytes());
        data.extend_from_slice(event);
        event_count += 1;
    }

    let data_length = to_u32(data.len(), "record data")?;
    let data_padding = padding_for(data_length);

    let mut payload = index;
    let index_length = to_u32(payload.len(), "record index")?;
    payload.extend_from_slice(&data);
    payload.resize(payload.len() + data_padding as usize, 0);

    let (stored, compressed_padding) = match compression {
        Compression::None => (payload, 0),
        Compression::Lz4 => {
            let mut compressed = lz4_flex::block::compress(&payload);
            let pad = padding_for(to_u32(compressed.len(), "compressed record")?);
            compressed.resize(compressed.len() + pad as usize, 0);
            (compressed, pad)
        }
        Compression::Gzip => return Err(Error::UnsupportedCompression(3)),
    };

    let stored_words = to_u32(stored.len() / 4, "record")?;
    let header = RecordHeader {
        record_words: HEADER_WORDS + stored_words,
        record_number,
        header_words: HEADER_WORDS,
        event_count,
        index_length,
        bit_info: FORMAT_VERSION | (data_padding << 22) | (compressed_padding << 24),
        user_header_length: 0,
        data_length,
        compression,
        compressed_words: if compression == Compression::None {
            0
        } else {
            stored_words
        },
        user_register_1: 0,
        user_register_2: 0,
    };

    let mut out = Vec::with_capacity(HEADER_BYTES + stored.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&stored);
    Ok(out)
}
