//! Drift-chamber hit and segment records.
//!
//! Readers produce [`RawHit`] and [`RawSegment`] values exactly as decoded
//! (sector, superlayer and layer are 1-based). [`RawHit::locate`] and
//! [`RawSegment::locate`] validate them into 0-based records that can be
//! used to index the histogram grid.

use crate::geometry::{combined_layer, N_LAYERS_PER_SUPERLAYER, N_SECTORS, N_SUPERLAYERS};
use crate::DecodeError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A hit row as decoded from the hits bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawHit {
    /// Sector, 1-based.
    pub sector: i32,
    /// Layer within the superlayer, 1-based.
    pub layer: i32,
    /// Superlayer, 1-based.
    pub superlayer: i32,
    /// Wire number.
    pub wire: i32,
}

impl RawHit {
    #[must_use]
    pub fn new(sector: i32, layer: i32, superlayer: i32, wire: i32) -> Self {
        Self {
            sector,
            layer,
            superlayer,
            wire,
        }
    }

    /// Converts to 0-based indices, rejecting values outside the detector.
    ///
    /// # Errors
    /// Returns the first out-of-range field.
    pub fn locate(&self) -> Result<HitRecord, DecodeError> {
        let sector =
            to_index(self.sector, N_SECTORS).ok_or(DecodeError::SectorOutOfRange(self.sector))?;
        let superlayer = to_index(self.superlayer, N_SUPERLAYERS)
            .ok_or(DecodeError::SuperlayerOutOfRange(self.superlayer))?;
        let layer = to_index(self.layer, N_LAYERS_PER_SUPERLAYER)
            .ok_or(DecodeError::LayerOutOfRange(self.layer))?;
        Ok(HitRecord {
            sector,
            superlayer,
            layer,
            wire: self.wire,
        })
    }
}

/// A segment row as decoded from the segments bank.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSegment {
    /// Sector, 1-based.
    pub sector: i32,
    /// Superlayer, 1-based.
    pub superlayer: i32,
    /// Average wire position of the segment.
    pub avg_wire: f32,
}

impl RawSegment {
    #[must_use]
    pub fn new(sector: i32, superlayer: i32, avg_wire: f32) -> Self {
        Self {
            sector,
            superlayer,
            avg_wire,
        }
    }

    /// Converts to 0-based indices, rejecting values outside the detector.
    ///
    /// # Errors
    /// Returns the first out-of-range field.
    pub fn locate(&self) -> Result<SegmentRecord, DecodeError> {
        let sector =
            to_index(self.sector, N_SECTORS).ok_or(DecodeError::SectorOutOfRange(self.sector))?;
        let superlayer = to_index(self.superlayer, N_SUPERLAYERS)
            .ok_or(DecodeError::SuperlayerOutOfRange(self.superlayer))?;
        Ok(SegmentRecord {
            sector,
            superlayer,
            avg_wire: self.avg_wire,
        })
    }
}

fn to_index(one_based: i32, len: usize) -> Option<usize> {
    usize::try_from(one_based)
        .ok()
        .and_then(|v| v.checked_sub(1))
        .filter(|&v| v < len)
}

/// A validated hit with 0-based indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord {
    pub sector: usize,
    pub superlayer: usize,
    pub layer: usize,
    pub wire: i32,
}

impl HitRecord {
    /// Layer index on the y axis of the layer-vs-wire maps.
    #[inline]
    #[must_use]
    pub fn combined_layer(&self) -> usize {
        combined_layer(self.superlayer, self.layer)
    }
}

/// A validated segment with 0-based indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRecord {
    pub sector: usize,
    pub superlayer: usize,
    pub avg_wire: f32,
}

/// Drift-chamber content of one event.
///
/// Implemented by file readers; the accumulator only needs the two record
/// streams.
pub trait DriftChamberEvent {
    /// Hit rows of the current event.
    fn hits(&self) -> impl Iterator<Item = RawHit> + '_;

    /// Segment rows of the current event.
    fn segments(&self) -> impl Iterator<Item = RawSegment> + '_;
}

/// An owned event, mostly useful for tests and synthetic input.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DcEvent {
    pub hits: Vec<RawHit>,
    pub segments: Vec<RawSegment>,
}

impl DcEvent {
    #[must_use]
    pub fn new(hits: Vec<RawHit>, segments: Vec<RawSegment>) -> Self {
        Self { hits, segments }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.segments.is_empty()
    }
}

impl DriftChamberEvent for DcEvent {
    fn hits(&self) -> impl Iterator<Item = RawHit> + '_ {
        self.hits.iter().copied()
    }

    fn segments(&self) -> impl Iterator<Item = RawSegment> + '_ {
        self.segments.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_hit_converts_to_zero_based() {
        let hit = RawHit::new(1, 1, 1, 50).locate().unwrap();
        assert_eq!(
            hit,
            HitRecord {
                sector: 0,
                superlayer: 0,
                layer: 0,
                wire: 50
            }
        );
        assert_eq!(hit.combined_layer(), 1);

        let hit = RawHit::new(6, 6, 6, 112).locate().unwrap();
        assert_eq!((hit.sector, hit.superlayer, hit.layer), (5, 5, 5));
        assert_eq!(hit.combined_layer(), 36);
    }

    #[test]
    fn test_locate_hit_rejects_out_of_range() {
        assert_eq!(
            RawHit::new(0, 1, 1, 1).locate(),
            Err(DecodeError::SectorOutOfRange(0))
        );
        assert_eq!(
            RawHit::new(7, 1, 1, 1).locate(),
            Err(DecodeError::SectorOutOfRange(7))
        );
        assert_eq!(
            RawHit::new(1, 1, -3, 1).locate(),
            Err(DecodeError::SuperlayerOutOfRange(-3))
        );
        assert_eq!(
            RawHit::new(1, 9, 1, 1).locate(),
            Err(DecodeError::LayerOutOfRange(9))
        );
    }

    #[test]
    fn test_wire_is_not_validated() {
        let hit = RawHit::new(2, 3, 4, 500).locate().unwrap();
        assert_eq!(hit.wire, 500);
    }

    #[test]
    fn test_locate_segment() {
        let seg = RawSegment::new(3, 2, 17.25).locate().unwrap();
        assert_eq!((seg.sector, seg.superlayer), (2, 1));
        assert!(RawSegment::new(3, 0, 1.0).locate().is_err());
    }
}
