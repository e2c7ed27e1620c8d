//! HIPO events and their nodes.
//!
//! Event layout: a 16-byte header (`EV4a` signature, total size in bytes,
//! tag, reserved) followed by nodes. Each node has an 8-byte header
//! (group `u16`, item `u8`, type `u8`, length word whose low 24 bits are the
//! data length) followed by its data.

use crate::bank::{Bank, BankBuilder};
use crate::header::read_u32;
use crate::schema::Schema;
use crate::{Error, Result};

/// `EV4a` read as a little-endian word.
pub const EVENT_SIGNATURE: u32 = u32::from_le_bytes(*b"EV4a");
pub const EVENT_HEADER_BYTES: usize = 16;
pub const NODE_HEADER_BYTES: usize = 8;
const NODE_LENGTH_MASK: u32 = 0x00FF_FFFF;

/// Node data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    String,
    Bank,
    Other(u8),
}

impl NodeType {
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            6 => NodeType::String,
            11 => NodeType::Bank,
            other => NodeType::Other(other),
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            NodeType::String => 6,
            NodeType::Bank => 11,
            NodeType::Other(code) => code,
        }
    }
}

/// A node located inside an event buffer.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    pub group: u16,
    pub item: u8,
    pub node_type: NodeType,
    pub data: &'a [u8],
}

/// One event, owned so the buffer can be reused across reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    data: Vec<u8>,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    /// Creates an empty event (header only).
    #[must_use]
    pub fn new() -> Self {
        let mut event = Self {
            data: Vec::with_capacity(1024),
        };
        event.reset();
        event
    }

    /// Clears all nodes.
    pub fn reset(&mut self) {
        self.data.clear();
        self.data.extend_from_slice(&EVENT_SIGNATURE.to_le_bytes());
        self.data.extend_from_slice(&[0u8; 12]);
        self.sync_size();
    }

    /// Replaces the content with a serialized event, reusing the buffer.
    ///
    /// # Errors
    /// Returns an error if the bytes do not start with a valid event header.
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() < EVENT_HEADER_BYTES {
            return Err(Error::Truncated {
                offset: 0,
                needed: EVENT_HEADER_BYTES,
                available: bytes.len(),
            });
        }
        let signature = read_u32(bytes, 0)?;
        if signature != EVENT_SIGNATURE {
            return Err(Error::InvalidFormat(format!(
                "bad event signature {signature:#010x}"
            )));
        }
        let size = read_u32(bytes, 4)? as usize;
        if size < EVENT_HEADER_BYTES || size > bytes.len() {
            return Err(Error::InvalidFormat(format!(
                "event size {size} outside buffer of {} bytes",
                bytes.len()
            )));
        }
        self.data.clear();
        self.data.extend_from_slice(&bytes[..size]);
        Ok(())
    }

    /// Serialized event bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total size in bytes, header included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn tag(&self) -> u32 {
        read_u32(&self.data, 8).unwrap_or(0)
    }

    pub fn set_tag(&mut self, tag: u32) {
        self.data[8..12].copy_from_slice(&tag.to_le_bytes());
    }

    /// Iterates over the nodes. Stops at the first node that does not fit.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        let data = self.data.as_slice();
        let mut position = EVENT_HEADER_BYTES;
        std::iter::from_fn(move || {
            let header = data.get(position..position + NODE_HEADER_BYTES)?;
            let group = u16::from_le_bytes([header[0], header[1]]);
            let item = header[2];
            let node_type = NodeType::from_code(header[3]);
            let length = (u32::from_le_bytes([header[4], header[5], header[6], header[7]])
                & NODE_LENGTH_MASK) as usize;
            let start = position + NODE_HEADER_BYTES;
            let node_data = data.get(start..start + length)?;
            position = start + length;
            Some(Node {
                group,
                item,
                node_type,
                data: node_data,
            })
        })
    }

    /// Finds the first node with the given identifiers.
    #[must_use]
    pub fn node(&self, group: u16, item: u8) -> Option<Node<'_>> {
        self.nodes().find(|n| n.group == group && n.item == item)
    }

    /// Appends a node.
    ///
    /// # Errors
    /// Returns an error if `data` exceeds the 24-bit node length limit.
    pub fn add_node(
        &mut self,
        group: u16,
        item: u8,
        node_type: NodeType,
        data: &[u8],
    ) -> Result<()> {
        let length = u32::try_from(data.len())
            .ok()
            .filter(|&len| len <= NODE_LENGTH_MASK)
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "node ({group},{item}) data of {} bytes exceeds the node size limit",
                    data.len()
                ))
            })?;
        self.data.extend_from_slice(&group.to_le_bytes());
        self.data.push(item);
        self.data.push(node_type.code());
        self.data.extend_from_slice(&length.to_le_bytes());
        self.data.extend_from_slice(data);
        self.sync_size();
        Ok(())
    }

    /// Appends a string node (NUL-terminated, as HIPO writes them).
    ///
    /// # Errors
    /// Returns an error if the string is too long for one node.
    pub fn add_string(&mut self, group: u16, item: u8, text: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        self.add_node(group, item, NodeType::String, &bytes)
    }

    /// Appends a bank node built with [`BankBuilder`].
    ///
    /// # Errors
    /// Returns an error if the bank is too large for one node.
    pub fn add_bank(&mut self, bank: &BankBuilder<'_>) -> Result<()> {
        let schema = bank.schema();
        self.add_node(schema.group(), schema.item(), NodeType::Bank, bank.data())
    }

    /// Text of a string node, without trailing NULs.
    #[must_use]
    pub fn string(&self, group: u16, item: u8) -> Option<&str> {
        let node = self.node(group, item)?;
        let text = std::str::from_utf8(node.data).ok()?;
        Some(text.trim_end_matches('\0'))
    }

    /// Bank described by `schema`, if the event carries it.
    #[must_use]
    pub fn bank<'a>(&'a self, schema: &'a Schema) -> Option<Bank<'a>> {
        self.node(schema.group(), schema.item())
            .map(|node| Bank::new(schema, node.data))
    }

    fn sync_size(&mut self) {
        // events are capped well below 4 GiB by the record format
        #[allow(clippy::cast_possible_truncation)]
        let size = self.data.len() as u32;
        self.data[4..8].copy_from_slice(&size.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_event() {
        let event = Event::new();
        assert_eq!(event.size(), EVENT_HEADER_BYTES);
        assert_eq!(&event.as_bytes()[..4], b"EV4a");
        assert_eq!(event.nodes().count(), 0);
    }

    #[test]
    fn test_nodes_and_strings() {
        let mut event = Event::new();
        event.set_tag(7);
        event.add_string(120, 2, "hello").unwrap();
        event.add_node(300, 1, NodeType::Other(3), &[1, 2, 3, 4])
            .unwrap();

        assert_eq!(event.size(), 16 + 8 + 6 + 8 + 4);
        assert_eq!(read_u32(event.as_bytes(), 4).unwrap() as usize, event.size());
        assert_eq!(event.tag(), 7);
        assert_eq!(event.string(120, 2), Some("hello"));
        assert_eq!(event.string(120, 1), None);

        let node = event.node(300, 1).unwrap();
        assert_eq!(node.node_type, NodeType::Other(3));
        assert_eq!(node.data, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_load_reuses_buffer() {
        let mut source = Event::new();
        source.add_string(1, 1, "abc").unwrap();
        let mut bytes = source.as_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA; 5]);

        let mut event = Event::new();
        event.load(&bytes).unwrap();
        assert_eq!(event, source);

        event.reset();
        assert_eq!(event, Event::new());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut event = Event::new();
        assert!(event.load(&[0u8; 8]).is_err());
        assert!(event.load(&[0u8; 32]).is_err());

        let mut bytes = Event::new().as_bytes().to_vec();
        bytes[4..8].copy_from_slice(&100u32.to_le_bytes());
        assert!(matches!(event.load(&bytes), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_truncated_node_ends_iteration() {
        let mut event = Event::new();
        event.add_node(1, 1, NodeType::Bank, &[0; 4]).unwrap();
        let mut bytes = event.as_bytes().to_vec();
        // second node header claims more data than present
        bytes.extend_from_slice(&[2, 0, 1, 11, 50, 0, 0, 0, 1, 2]);
        let len = u32::try_from(bytes.len()).unwrap();
        bytes[4..8].copy_from_slice(&len.to_le_bytes());

        let mut loaded = Event::new();
        loaded.load(&bytes).unwrap();
        assert_eq!(loaded.nodes().count(), 1);
    }
}
