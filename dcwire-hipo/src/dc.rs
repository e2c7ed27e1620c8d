//! Drift-chamber view of HIPO events.
//!
//! [`DcBankLayout`] resolves the hit and segment banks and their column
//! indices once per file; [`DcEventView`] then exposes an event's rows as
//! [`RawHit`] and [`RawSegment`] records.

use crate::bank::{Bank, BankBuilder};
use crate::chain::HipoChain;
use crate::event::Event;
use crate::schema::{ColumnType, Dictionary, Schema};
use crate::{Error, Result};
use dcwire_core::{DcEvent, DriftChamberEvent, RawHit, RawSegment};
use std::path::Path;

/// Time-based tracking hits bank.
pub const TB_HITS: &str = "TimeBasedTrkg::TBHits";
/// Time-based tracking segments bank.
pub const TB_SEGMENTS: &str = "TimeBasedTrkg::TBSegments";

/// Names of the banks to read hits and segments from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcBankNames {
    pub hits: String,
    pub segments: String,
}

impl Default for DcBankNames {
    fn default() -> Self {
        Self {
            hits: TB_HITS.to_string(),
            segments: TB_SEGMENTS.to_string(),
        }
    }
}

/// Dictionary holding the hits and segments banks in the layout written by
/// the time-based tracking.
#[must_use]
pub fn standard_dictionary() -> Dictionary {
    let hits = Schema::new(TB_HITS, 20600, 1)
        .with_column("id", ColumnType::Short)
        .with_column("status", ColumnType::Short)
        .with_column("sector", ColumnType::Byte)
        .with_column("superlayer", ColumnType::Byte)
        .with_column("layer", ColumnType::Byte)
        .with_column("wire", ColumnType::Short)
        .with_column("TDC", ColumnType::Int)
        .with_column("doca", ColumnType::Float)
        .with_column("time", ColumnType::Float);
    let segments = Schema::new(TB_SEGMENTS, 20600, 4)
        .with_column("id", ColumnType::Short)
        .with_column("status", ColumnType::Short)
        .with_column("sector", ColumnType::Byte)
        .with_column("superlayer", ColumnType::Byte)
        .with_column("Cluster_ID", ColumnType::Short)
        .with_column("avgWire", ColumnType::Float)
        .with_column("fitChisqProb", ColumnType::Float);
    [hits, segments].into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HitColumns {
    sector: usize,
    layer: usize,
    superlayer: usize,
    wire: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegmentColumns {
    sector: usize,
    superlayer: usize,
    avg_wire: usize,
}

/// Bank schemas and column indices resolved from one file's dictionary.
#[derive(Debug, Clone)]
pub struct DcBankLayout {
    hits: Schema,
    hit_columns: HitColumns,
    segments: Schema,
    segment_columns: SegmentColumns,
}

impl DcBankLayout {
    /// Looks up both banks and all required columns.
    ///
    /// # Errors
    /// Returns [`Error::MissingBank`] or [`Error::MissingColumn`].
    pub fn resolve(dictionary: &Dictionary, names: &DcBankNames) -> Result<Self> {
        let hits = dictionary.require(&names.hits)?.clone();
        let hit_columns = HitColumns {
            sector: hits.require_column("sector")?,
            layer: hits.require_column("layer")?,
            superlayer: hits.require_column("superlayer")?,
            wire: hits.require_column("wire")?,
        };
        let segments = dictionary.require(&names.segments)?.clone();
        let segment_columns = SegmentColumns {
            sector: segments.require_column("sector")?,
            superlayer: segments.require_column("superlayer")?,
            avg_wire: segments.require_column("avgWire")?,
        };
        Ok(Self {
            hits,
            hit_columns,
            segments,
            segment_columns,
        })
    }

    #[must_use]
    pub fn hits_schema(&self) -> &Schema {
        &self.hits
    }

    #[must_use]
    pub fn segments_schema(&self) -> &Schema {
        &self.segments
    }

    /// Encodes `source` into `event` (cleared first). Empty record lists
    /// produce no bank node, like events without drift-chamber activity.
    ///
    /// # Errors
    /// Returns an error if a bank is too large for one node.
    pub fn write_event(&self, source: &DcEvent, event: &mut Event) -> Result<()> {
        event.reset();
        if !source.hits.is_empty() {
            let c = self.hit_columns;
            let mut bank = BankBuilder::new(&self.hits, source.hits.len());
            for (row, hit) in source.hits.iter().enumerate() {
                bank.put_int(c.sector, row, hit.sector)
                    .put_int(c.layer, row, hit.layer)
                    .put_int(c.superlayer, row, hit.superlayer)
                    .put_int(c.wire, row, hit.wire);
            }
            event.add_bank(&bank)?;
        }
        if !source.segments.is_empty() {
            let c = self.segment_columns;
            let mut bank = BankBuilder::new(&self.segments, source.segments.len());
            for (row, segment) in source.segments.iter().enumerate() {
                bank.put_int(c.sector, row, segment.sector)
                    .put_int(c.superlayer, row, segment.superlayer)
                    .put_float(c.avg_wire, row, segment.avg_wire);
            }
            event.add_bank(&bank)?;
        }
        Ok(())
    }

    /// Drift-chamber view of one event.
    #[must_use]
    pub fn view<'a>(&'a self, event: &'a Event) -> DcEventView<'a> {
        DcEventView {
            layout: self,
            hits: event.bank(&self.hits),
            segments: event.bank(&self.segments),
        }
    }
}

/// Hits and segments of one event.
///
/// Events lacking a bank yield no rows for it.
#[derive(Debug, Clone, Copy)]
pub struct DcEventView<'a> {
    layout: &'a DcBankLayout,
    hits: Option<Bank<'a>>,
    segments: Option<Bank<'a>>,
}

impl DcEventView<'_> {
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.map_or(0, |b| b.rows())
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.map_or(0, |b| b.rows())
    }
}

impl DriftChamberEvent for DcEventView<'_> {
    fn hits(&self) -> impl Iterator<Item = RawHit> + '_ {
        let c = self.layout.hit_columns;
        self.hits.iter().flat_map(move |bank| {
            (0..bank.rows()).map(move |row| {
                RawHit::new(
                    bank.get_int(c.sector, row),
                    bank.get_int(c.layer, row),
                    bank.get_int(c.superlayer, row),
                    bank.get_int(c.wire, row),
                )
            })
        })
    }

    fn segments(&self) -> impl Iterator<Item = RawSegment> + '_ {
        let c = self.layout.segment_columns;
        self.segments.iter().flat_map(move |bank| {
            (0..bank.rows()).map(move |row| {
                RawSegment::new(
                    bank.get_int(c.sector, row),
                    bank.get_int(c.superlayer, row),
                    bank.get_float(c.avg_wire, row),
                )
            })
        })
    }
}

/// Drift-chamber events of a [`HipoChain`].
///
/// The bank layout is resolved again whenever the chain moves to a new
/// file, since each file carries its own dictionary.
pub struct DcEventStream {
    chain: HipoChain,
    names: DcBankNames,
    layout: Option<(usize, DcBankLayout)>,
    event: Event,
}

impl DcEventStream {
    #[must_use]
    pub fn new(chain: HipoChain, names: DcBankNames) -> Self {
        Self {
            chain,
            names,
            layout: None,
            event: Event::new(),
        }
    }

    #[must_use]
    pub fn chain(&self) -> &HipoChain {
        &self.chain
    }

    /// Advances to the next event.
    ///
    /// Returns `Ok(None)` once every file has been read.
    ///
    /// # Errors
    /// Returns an error if a file is unreadable or corrupt, or if its
    /// dictionary lacks a required bank or column.
    pub fn next_event(&mut self) -> Result<Option<DcEventView<'_>>> {
        if !self.chain.next_event(&mut self.event)? {
            return Ok(None);
        }
        let file = self.chain.current_file_index().unwrap_or_default();

        let layout = match self.layout.take() {
            Some((index, layout)) if index == file => self.layout.insert((index, layout)),
            _ => {
                let dictionary = self
                    .chain
                    .dictionary()
                    .ok_or_else(|| Error::InvalidFormat("no file open in chain".to_string()))?;
                let layout = DcBankLayout::resolve(dictionary, &self.names).inspect_err(|e| {
                    log::error!("{}: {e}", display_path(self.chain.current_path()));
                })?;
                log::debug!(
                    "resolved {} and {} for {}",
                    layout.hits.name(),
                    layout.segments.name(),
                    display_path(self.chain.current_path())
                );
                self.layout.insert((file, layout))
            }
        };
        Ok(Some(layout.1.view(&self.event)))
    }
}

fn display_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "<none>".to_string(), |p| p.display().to_string())
}
