//! File and record headers.
//!
//! Both headers are 14 little-endian 32-bit words. The record header layout
//! (word index, content):
//!
//! | word  | content                                             |
//! |-------|-----------------------------------------------------|
//! | 0     | record length in words, header included             |
//! | 1     | record number                                       |
//! | 2     | header length in words (14)                         |
//! | 3     | event count                                         |
//! | 4     | index array length in bytes                         |
//! | 5     | bit info: version, padding of user header/data/compressed payload |
//! | 6     | user header length in bytes                         |
//! | 7     | magic word `0xC0DA0100`                             |
//! | 8     | uncompressed event data length in bytes             |
//! | 9     | compression type (top 4 bits), compressed words     |
//! | 10-13 | two 64-bit user registers                           |

use crate::{Error, Result};

/// Magic word at word 7 of every header.
pub const HIPO_MAGIC: u32 = 0xC0DA_0100;
/// The magic word as seen when the writer used the other byte order.
pub const HIPO_MAGIC_SWAPPED: u32 = 0x0001_DAC0;
/// "HIPO" as the file unique id.
pub const HIPO_UNIQUE_ID: u32 = 0x4F50_4948;
/// Header length in words for both file and record headers.
pub const HEADER_WORDS: u32 = 14;
/// Header length in bytes.
pub const HEADER_BYTES: usize = 56;
/// Format version written into bit info.
pub const FORMAT_VERSION: u32 = 6;

#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(Error::Truncated {
            offset,
            needed: 4,
            available: bytes.len().saturating_sub(offset),
        })
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> Result<u64> {
    bytes
        .get(offset..offset + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(Error::Truncated {
            offset,
            needed: 8,
            available: bytes.len().saturating_sub(offset),
        })
}

pub(crate) fn check_magic(bytes: &[u8], offset: usize) -> Result<()> {
    match read_u32(bytes, offset + 28)? {
        HIPO_MAGIC => Ok(()),
        HIPO_MAGIC_SWAPPED => Err(Error::InvalidFormat(format!(
            "big-endian header at offset {offset}; only little-endian files are supported"
        ))),
        found => Err(Error::BadMagic { offset, found }),
    }
}

fn words_to_bytes(words: u32) -> usize {
    // u32 -> usize is lossless on every supported target
    words as usize * 4
}

/// Record payload compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    /// LZ4 block format (types 1 "fast" and 2 "best" decode the same way).
    Lz4,
    Gzip,
}

impl Compression {
    /// Decodes the 4-bit compression type.
    ///
    /// # Errors
    /// Returns an error for unknown types.
    pub fn from_type(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Compression::None),
            1 | 2 => Ok(Compression::Lz4),
            3 => Ok(Compression::Gzip),
            other => Err(Error::UnsupportedCompression(other)),
        }
    }

    #[must_use]
    pub fn type_code(self) -> u32 {
        match self {
            Compression::None => 0,
            Compression::Lz4 => 1,
            Compression::Gzip => 3,
        }
    }
}

/// The header at the start of every HIPO file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub unique_id: u32,
    pub file_number: u32,
    pub header_words: u32,
    pub record_count: u32,
    pub index_length: u32,
    pub bit_info: u32,
    pub user_header_length: u32,
    pub user_register: u64,
    pub trailer_position: u64,
    pub user_int_1: u32,
    pub user_int_2: u32,
}

impl FileHeader {
    /// Parses the file header at the start of `bytes`.
    ///
    /// # Errors
    /// Returns an error if the data is too short or the magic word is wrong.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES {
            return Err(Error::Truncated {
                offset: 0,
                needed: HEADER_BYTES,
                available: bytes.len(),
            });
        }
        check_magic(bytes, 0)?;

        let header = Self {
            unique_id: read_u32(bytes, 0)?,
            file_number: read_u32(bytes, 4)?,
            header_words: read_u32(bytes, 8)?,
            record_count: read_u32(bytes, 12)?,
            index_length: read_u32(bytes, 16)?,
            bit_info: read_u32(bytes, 20)?,
            user_header_length: read_u32(bytes, 24)?,
            user_register: read_u64(bytes, 32)?,
            trailer_position: read_u64(bytes, 40)?,
            user_int_1: read_u32(bytes, 48)?,
            user_int_2: read_u32(bytes, 52)?,
        };

        if header.header_words < HEADER_WORDS {
            return Err(Error::InvalidFormat(format!(
                "file header length {} words is shorter than {HEADER_WORDS}",
                header.header_words
            )));
        }
        Ok(header)
    }

    /// Creates a header for a new file with the given user header size.
    #[must_use]
    pub fn new(user_header_length: u32) -> Self {
        Self {
            unique_id: HIPO_UNIQUE_ID,
            file_number: 1,
            header_words: HEADER_WORDS,
            record_count: 0,
            index_length: 0,
            bit_info: FORMAT_VERSION | (padding_for(user_header_length) << 20),
            user_header_length,
            user_register: 0,
            trailer_position: 0,
            user_int_1: 0,
            user_int_2: 0,
        }
    }

    /// Format version from the low byte of bit info.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.bit_info & 0xFF
    }

    #[must_use]
    pub fn user_header_padding(&self) -> usize {
        ((self.bit_info >> 20) & 0x3) as usize
    }

    /// Byte offset of the user header (holding the dictionary record).
    #[must_use]
    pub fn user_header_offset(&self) -> usize {
        words_to_bytes(self.header_words) + self.index_length as usize
    }

    /// Byte offset of the first data record.
    #[must_use]
    pub fn first_record_offset(&self) -> usize {
        self.user_header_offset() + self.user_header_length as usize + self.user_header_padding()
    }

    /// Encodes the header into its 56-byte form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        let words = [
            self.unique_id,
            self.file_number,
            self.header_words,
            self.record_count,
            self.index_length,
            self.bit_info,
            self.user_header_length,
            HIPO_MAGIC,
        ];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        out[32..40].copy_from_slice(&self.user_register.to_le_bytes());
        out[40..48].copy_from_slice(&self.trailer_position.to_le_bytes());
        out[48..52].copy_from_slice(&self.user_int_1.to_le_bytes());
        out[52..56].copy_from_slice(&self.user_int_2.to_le_bytes());
        out
    }
}

/// The header in front of every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_words: u32,
    pub record_number: u32,
    pub header_words: u32,
    pub event_count: u32,
    pub index_length: u32,
    pub bit_info: u32,
    pub user_header_length: u32,
    pub data_length: u32,
    pub compression: Compression,
    pub compressed_words: u32,
    pub user_register_1: u64,
    pub user_register_2: u64,
}

impl RecordHeader {
    /// Parses the record header starting at `offset`.
    ///
    /// # Errors
    /// Returns an error if the header is truncated, has a bad magic word or
    /// an unknown compression type.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self> {
        if bytes.len() < offset + HEADER_BYTES {
            return Err(Error::Truncated {
                offset,
                needed: HEADER_BYTES,
                available: bytes.len().saturating_sub(offset),
            });
        }
        check_magic(bytes, offset)?;

        let compression_word = read_u32(bytes, offset + 36)?;
        let header = Self {
            record_words: read_u32(bytes, offset)?,
            record_number: read_u32(bytes, offset + 4)?,
            header_words: read_u32(bytes, offset + 8)?,
            event_count: read_u32(bytes, offset + 12)?,
            index_length: read_u32(bytes, offset + 16)?,
            bit_info: read_u32(bytes, offset + 20)?,
            user_header_length: read_u32(bytes, offset + 24)?,
            data_length: read_u32(bytes, offset + 32)?,
            compression: Compression::from_type(compression_word >> 28)?,
            compressed_words: compression_word & 0x0FFF_FFFF,
            user_register_1: read_u64(bytes, offset + 40)?,
            user_register_2: read_u64(bytes, offset + 48)?,
        };

        if header.header_words < HEADER_WORDS || header.record_words < header.header_words {
            return Err(Error::InvalidFormat(format!(
                "record at offset {offset} has header length {} and record length {} words",
                header.header_words, header.record_words
            )));
        }
        Ok(header)
    }

    #[must_use]
    pub fn user_header_padding(&self) -> usize {
        ((self.bit_info >> 20) & 0x3) as usize
    }

    #[must_use]
    pub fn data_padding(&self) -> usize {
        ((self.bit_info >> 22) & 0x3) as usize
    }

    #[must_use]
    pub fn compressed_padding(&self) -> usize {
        ((self.bit_info >> 24) & 0x3) as usize
    }

    /// Total record size in bytes, header included.
    #[must_use]
    pub fn record_bytes(&self) -> usize {
        words_to_bytes(self.record_words)
    }

    #[must_use]
    pub fn header_bytes(&self) -> usize {
        words_to_bytes(self.header_words)
    }

    /// Size of the payload once decompressed.
    #[must_use]
    pub fn uncompressed_length(&self) -> usize {
        self.index_length as usize
            + self.user_header_length as usize
            + self.user_header_padding()
            + self.data_length as usize
            + self.data_padding()
    }

    /// Size of the stored (compressed) payload without padding.
    #[must_use]
    pub fn compressed_length(&self) -> usize {
        words_to_bytes(self.compressed_words).saturating_sub(self.compressed_padding())
    }

    /// Offset of the first event inside the uncompressed payload.
    #[must_use]
    pub fn events_offset(&self) -> usize {
        self.index_length as usize + self.user_header_length as usize + self.user_header_padding()
    }

    /// Encodes the header into its 56-byte form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        let words = [
            self.record_words,
            self.record_number,
            self.header_words,
            self.event_count,
            self.index_length,
            self.bit_info,
            self.user_header_length,
            HIPO_MAGIC,
            self.data_length,
            (self.compression.type_code() << 28) | (self.compressed_words & 0x0FFF_FFFF),
        ];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        out[40..48].copy_from_slice(&self.user_register_1.to_le_bytes());
        out[48..56].copy_from_slice(&self.user_register_2.to_le_bytes());
        out
    }
}

/// Bytes needed to pad `len` to a multiple of four.
#[must_use]
pub fn padding_for(len: u32) -> u32 {
    (4 - len % 4) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_header_roundtrip() {
        let header = FileHeader::new(122);
        assert_eq!(header.user_header_padding(), 2);
        let bytes = header.encode();
        let parsed = FileHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.version(), FORMAT_VERSION);
        assert_eq!(parsed.user_header_offset(), 56);
        assert_eq!(parsed.first_record_offset(), 56 + 122 + 2);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = FileHeader::new(0).encode();
        bytes[28] = 0xFF;
        assert!(matches!(
            FileHeader::parse(&bytes),
            Err(Error::BadMagic { offset: 0, .. })
        ));
    }

    #[test]
    fn test_swapped_magic_is_reported() {
        let mut bytes = FileHeader::new(0).encode();
        bytes[28..32].copy_from_slice(&HIPO_MAGIC_SWAPPED.to_le_bytes());
        let err = FileHeader::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("big-endian"), "{err}");
    }

    #[test]
    fn test_truncated_header() {
        let bytes = [0u8; 20];
        assert!(matches!(
            FileHeader::parse(&bytes),
            Err(Error::Truncated { needed: 56, .. })
        ));
    }

    #[test]
    fn test_record_header_fields() {
        let header = RecordHeader {
            record_words: 40,
            record_number: 3,
            header_words: HEADER_WORDS,
            event_count: 2,
            index_length: 8,
            bit_info: FORMAT_VERSION | (1 << 22) | (3 << 24),
            user_header_length: 0,
            data_length: 99,
            compression: Compression::Lz4,
            compressed_words: 26,
            user_register_1: 7,
            user_register_2: 9,
        };
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&header.encode());
        let parsed = RecordHeader::parse(&bytes, 4).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.data_padding(), 1);
        assert_eq!(parsed.compressed_padding(), 3);
        assert_eq!(parsed.uncompressed_length(), 8 + 99 + 1);
        assert_eq!(parsed.compressed_length(), 26 * 4 - 3);
        assert_eq!(parsed.events_offset(), 8);
        assert_eq!(parsed.record_bytes(), 160);
    }

    #[test]
    fn test_compression_codes() {
        assert_eq!(Compression::from_type(0).unwrap(), Compression::None);
        assert_eq!(Compression::from_type(2).unwrap(), Compression::Lz4);
        assert!(matches!(
            Compression::from_type(9),
            Err(Error::UnsupportedCompression(9))
        ));
    }
}
