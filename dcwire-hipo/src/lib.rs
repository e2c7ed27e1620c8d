//! dcwire-hipo: HIPO 4 file reader for CLAS12 reconstruction output.
//!
//! HIPO files are a sequence of (usually LZ4-compressed) records, each
//! holding a batch of events. Events are lists of nodes; the interesting
//! nodes are banks, column-major tables described by schemas stored in the
//! file dictionary.
//!
//! # Key Components
//!
//! - [`HipoReader`] - Memory-mapped single-file reader
//! - [`HipoChain`] - Reads several files back to back as one event stream
//! - [`Event`] / [`Bank`] - Node lookup and typed column access
//! - [`Dictionary`] / [`Schema`] - Bank layouts parsed from the file header
//! - [`DcEventStream`] - Adapter yielding drift-chamber hits and segments
//! - [`HipoWriter`] - Minimal writer, used to build fixtures
//!
//! # Reading Pipeline
//!
//! 1. Map the file, parse the file header and the dictionary record
//! 2. Walk record headers, decompress one record at a time
//! 3. Copy each event into a reusable [`Event`] buffer

mod bank;
pub mod chain;
pub mod dc;
mod error;
mod event;
pub mod header;
pub mod reader;
mod record;
pub mod schema;
pub mod writer;

pub use bank::{Bank, BankBuilder};
pub use chain::HipoChain;
pub use dc::{standard_dictionary, DcBankLayout, DcBankNames, DcEventStream, DcEventView};
pub use error::{Error, Result};
pub use event::{Event, Node, NodeType};
pub use header::{Compression, FileHeader, RecordHeader};
pub use reader::{FileSummary, HipoReader};
pub use schema::{Column, ColumnType, Dictionary, Schema};
pub use writer::HipoWriter;
