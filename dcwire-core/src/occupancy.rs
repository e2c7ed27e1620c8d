//! Occupancy histogram grid and the event accumulator that fills it.
//!
//! One [`OccupancyHistograms`] is built per list file. Each hit fills six
//! histograms and each segment fills two; nothing else touches the grid.

use std::array;
use std::collections::HashMap;

use crate::geometry::{
    layer_axis, superlayer_layer_axis, wire_axis, wire_left_axis, wire_right_axis,
    N_LAYERS_PER_SUPERLAYER, N_SECTORS, N_SUPERLAYERS,
};
use crate::histogram::{Hist1D, Hist2D, Histogram, HistogramRef};
use crate::record::{DriftChamberEvent, HitRecord, RawHit, RawSegment, SegmentRecord};
use crate::{DecodeError, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

type PerSector<T> = [T; N_SECTORS];
type PerSuperlayer<T> = [T; N_SUPERLAYERS];
type PerLayer<T> = [T; N_LAYERS_PER_SUPERLAYER];

/// The full set of drift-chamber occupancy histograms.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyHistograms {
    avg_wire: PerSector<PerSuperlayer<Hist1D>>,
    wire_in_layer: PerSector<PerSuperlayer<PerLayer<Hist1D>>>,
    avg_wire_summed: PerSuperlayer<Hist1D>,
    layer_vs_wire_left: PerSector<Hist2D>,
    layer_vs_wire_right: PerSector<Hist2D>,
    layer_vs_wire_left_sl: PerSector<PerSuperlayer<Hist2D>>,
    layer_vs_wire_right_sl: PerSector<PerSuperlayer<Hist2D>>,
    layer_vs_wire_one_sl: PerSector<PerSuperlayer<Hist2D>>,
}

enum HistogramMut<'a> {
    H1(&'a mut Hist1D),
    H2(&'a mut Hist2D),
}

impl HistogramMut<'_> {
    fn name(&self) -> &str {
        match self {
            HistogramMut::H1(h) => h.name(),
            HistogramMut::H2(h) => h.name(),
        }
    }

    fn add(&mut self, other: HistogramRef<'_>) -> Result<()> {
        match (self, other) {
            (HistogramMut::H1(target), HistogramRef::H1(source)) => target.add(source),
            (HistogramMut::H2(target), HistogramRef::H2(source)) => target.add(source),
            (target, _) => Err(Error::BinningMismatch {
                name: target.name().to_string(),
            }),
        }
    }
}

impl Default for OccupancyHistograms {
    fn default() -> Self {
        Self::new()
    }
}

impl OccupancyHistograms {
    /// Allocates the grid with every bin at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            avg_wire: array::from_fn(|s| {
                array::from_fn(|sl| Hist1D::new(format!("avgWire_S{s}_SL{sl}"), wire_axis()))
            }),
            wire_in_layer: array::from_fn(|s| {
                array::from_fn(|sl| {
                    array::from_fn(|l| {
                        Hist1D::new(format!("wireINlayer_S{s}_SL{sl}_L{l}"), wire_axis())
                    })
                })
            }),
            avg_wire_summed: array::from_fn(|sl| {
                Hist1D::new(format!("avgWireSummed_SL{sl}"), wire_axis())
            }),
            layer_vs_wire_left: array::from_fn(|s| {
                Hist2D::new(format!("layVScomp_left_S{s}"), wire_left_axis(), layer_axis())
            }),
            layer_vs_wire_right: array::from_fn(|s| {
                Hist2D::new(format!("layVScomp_right_S{s}"), wire_right_axis(), layer_axis())
            }),
            layer_vs_wire_left_sl: array::from_fn(|s| {
                array::from_fn(|sl| {
                    Hist2D::new(
                        format!("layVScomp_leftSL_S{s}_SL{sl}"),
                        wire_left_axis(),
                        superlayer_layer_axis(sl),
                    )
                })
            }),
            layer_vs_wire_right_sl: array::from_fn(|s| {
                array::from_fn(|sl| {
                    Hist2D::new(
                        format!("layVScomp_rightSL_S{s}_SL{sl}"),
                        wire_right_axis(),
                        superlayer_layer_axis(sl),
                    )
                })
            }),
            layer_vs_wire_one_sl: array::from_fn(|s| {
                array::from_fn(|sl| {
                    Hist2D::new(
                        format!("layVScomp_oneSupLay_S{s}_SL{sl}"),
                        wire_right_axis(),
                        superlayer_layer_axis(sl),
                    )
                })
            }),
        }
    }

    /// Fills the six histograms a hit contributes to.
    pub fn fill_hit(&mut self, hit: &HitRecord) {
        let (s, sl, l) = (hit.sector, hit.superlayer, hit.layer);
        let wire = f64::from(hit.wire);
        #[allow(clippy::cast_precision_loss)]
        let layer = hit.combined_layer() as f64;

        self.layer_vs_wire_left[s].fill(wire, layer);
        self.layer_vs_wire_right[s].fill(wire, layer);
        self.layer_vs_wire_left_sl[s][sl].fill(wire, layer);
        self.layer_vs_wire_right_sl[s][sl].fill(wire, layer);
        self.wire_in_layer[s][sl][l].fill(wire);
        self.layer_vs_wire_one_sl[s][sl].fill(wire, layer);
    }

    /// Fills the two histograms a segment contributes to.
    pub fn fill_segment(&mut self, segment: &SegmentRecord) {
        let avg_wire = f64::from(segment.avg_wire);
        self.avg_wire_summed[segment.superlayer].fill(avg_wire);
        self.avg_wire[segment.sector][segment.superlayer].fill(avg_wire);
    }

    #[must_use]
    pub fn avg_wire(&self, sector: usize, superlayer: usize) -> &Hist1D {
        &self.avg_wire[sector][superlayer]
    }

    #[must_use]
    pub fn wire_in_layer(&self, sector: usize, superlayer: usize, layer: usize) -> &Hist1D {
        &self.wire_in_layer[sector][superlayer][layer]
    }

    #[must_use]
    pub fn avg_wire_summed(&self, superlayer: usize) -> &Hist1D {
        &self.avg_wire_summed[superlayer]
    }

    #[must_use]
    pub fn layer_vs_wire_left(&self, sector: usize) -> &Hist2D {
        &self.layer_vs_wire_left[sector]
    }

    #[must_use]
    pub fn layer_vs_wire_right(&self, sector: usize) -> &Hist2D {
        &self.layer_vs_wire_right[sector]
    }

    #[must_use]
    pub fn layer_vs_wire_left_sl(&self, sector: usize, superlayer: usize) -> &Hist2D {
        &self.layer_vs_wire_left_sl[sector][superlayer]
    }

    #[must_use]
    pub fn layer_vs_wire_right_sl(&self, sector: usize, superlayer: usize) -> &Hist2D {
        &self.layer_vs_wire_right_sl[sector][superlayer]
    }

    #[must_use]
    pub fn layer_vs_wire_one_sl(&self, sector: usize, superlayer: usize) -> &Hist2D {
        &self.layer_vs_wire_one_sl[sector][superlayer]
    }

    /// Number of histograms in the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        N_SECTORS * (2 + N_SUPERLAYERS * (4 + N_LAYERS_PER_SUPERLAYER)) + N_SUPERLAYERS
    }

    /// Always false; the grid has a fixed, non-zero size.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns every histogram in output order.
    ///
    /// Per sector: left, right, then per superlayer avgWire, oneSupLay,
    /// leftSL, rightSL and the six wireINlayer. The summed avgWire
    /// histograms come last.
    #[must_use]
    pub fn histograms(&self) -> Vec<HistogramRef<'_>> {
        let mut out = Vec::with_capacity(self.len());
        for s in 0..N_SECTORS {
            out.push(HistogramRef::H2(&self.layer_vs_wire_left[s]));
            out.push(HistogramRef::H2(&self.layer_vs_wire_right[s]));
            for sl in 0..N_SUPERLAYERS {
                out.push(HistogramRef::H1(&self.avg_wire[s][sl]));
                out.push(HistogramRef::H2(&self.layer_vs_wire_one_sl[s][sl]));
                out.push(HistogramRef::H2(&self.layer_vs_wire_left_sl[s][sl]));
                out.push(HistogramRef::H2(&self.layer_vs_wire_right_sl[s][sl]));
                for l in 0..N_LAYERS_PER_SUPERLAYER {
                    out.push(HistogramRef::H1(&self.wire_in_layer[s][sl][l]));
                }
            }
        }
        for sl in 0..N_SUPERLAYERS {
            out.push(HistogramRef::H1(&self.avg_wire_summed[sl]));
        }
        out
    }

    fn histograms_mut(&mut self) -> Vec<HistogramMut<'_>> {
        let mut out = Vec::with_capacity(self.len());
        let sectors = self
            .layer_vs_wire_left
            .iter_mut()
            .zip(self.layer_vs_wire_right.iter_mut())
            .zip(self.avg_wire.iter_mut())
            .zip(self.layer_vs_wire_one_sl.iter_mut())
            .zip(self.layer_vs_wire_left_sl.iter_mut())
            .zip(self.layer_vs_wire_right_sl.iter_mut())
            .zip(self.wire_in_layer.iter_mut());
        for ((((((left, right), avg), one), left_sl), right_sl), wires) in sectors {
            out.push(HistogramMut::H2(left));
            out.push(HistogramMut::H2(right));
            let superlayers = avg
                .iter_mut()
                .zip(one.iter_mut())
                .zip(left_sl.iter_mut())
                .zip(right_sl.iter_mut())
                .zip(wires.iter_mut());
            for ((((avg, one), left_sl), right_sl), layers) in superlayers {
                out.push(HistogramMut::H1(avg));
                out.push(HistogramMut::H2(one));
                out.push(HistogramMut::H2(left_sl));
                out.push(HistogramMut::H2(right_sl));
                out.extend(layers.iter_mut().map(HistogramMut::H1));
            }
        }
        out.extend(self.avg_wire_summed.iter_mut().map(HistogramMut::H1));
        out
    }

    /// Adds another grid bin by bin.
    ///
    /// # Errors
    /// Returns an error if any binning differs, which only happens for grids
    /// rebuilt from foreign files.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        let sources = other.histograms();
        for (mut target, source) in self.histograms_mut().into_iter().zip(sources) {
            target.add(source)?;
        }
        Ok(())
    }

    /// Rebuilds a grid from named histograms, e.g. read back from an
    /// output container. Extra histograms are ignored.
    ///
    /// # Errors
    /// Returns an error if a histogram is missing or its binning differs.
    pub fn from_histograms<I>(histograms: I) -> Result<Self>
    where
        I: IntoIterator<Item = Histogram>,
    {
        let mut by_name: HashMap<String, Histogram> = histograms
            .into_iter()
            .map(|h| (h.name().to_string(), h))
            .collect();

        let mut grid = Self::new();
        for mut slot in grid.histograms_mut() {
            let source = by_name
                .remove(slot.name())
                .ok_or_else(|| Error::MissingHistogram(slot.name().to_string()))?;
            slot.add(source.as_view())?;
        }
        Ok(grid)
    }
}

/// Counters kept while filling one grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FillStatistics {
    /// Events seen.
    pub events: u64,
    /// Hits that filled the grid.
    pub hits: u64,
    /// Segments that filled the grid.
    pub segments: u64,
    /// Hits skipped because a field was outside the detector.
    pub rejected_hits: u64,
    /// Segments skipped because a field was outside the detector.
    pub rejected_segments: u64,
}

impl FillStatistics {
    /// Adds another set of counters.
    pub fn merge(&mut self, other: &Self) {
        self.events += other.events;
        self.hits += other.hits;
        self.segments += other.segments;
        self.rejected_hits += other.rejected_hits;
        self.rejected_segments += other.rejected_segments;
    }

    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected_hits + self.rejected_segments
    }
}

/// Validates raw records and fills an [`OccupancyHistograms`] grid.
///
/// Records with out-of-range sector, superlayer or layer are skipped. The
/// first rejection of each record kind is logged; later ones are only
/// counted.
#[derive(Debug, Clone, Default)]
pub struct OccupancyAccumulator {
    histograms: OccupancyHistograms,
    stats: FillStatistics,
}

impl OccupancyAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the grid with every hit and segment of one event.
    pub fn process_event<E: DriftChamberEvent>(&mut self, event: &E) {
        self.stats.events += 1;
        for hit in event.hits() {
            let _ = self.fill_hit(hit);
        }
        for segment in event.segments() {
            let _ = self.fill_segment(segment);
        }
    }

    /// Validates and fills a single hit.
    ///
    /// # Errors
    /// Returns the decode error if the hit was skipped.
    pub fn fill_hit(&mut self, raw: RawHit) -> std::result::Result<(), DecodeError> {
        match raw.locate() {
            Ok(hit) => {
                self.histograms.fill_hit(&hit);
                self.stats.hits += 1;
                Ok(())
            }
            Err(err) => {
                if self.stats.rejected_hits == 0 {
                    log::warn!("skipping hit {raw:?}: {err} (further rejections are only counted)");
                }
                self.stats.rejected_hits += 1;
                Err(err)
            }
        }
    }

    /// Validates and fills a single segment.
    ///
    /// # Errors
    /// Returns the decode error if the segment was skipped.
    pub fn fill_segment(&mut self, raw: RawSegment) -> std::result::Result<(), DecodeError> {
        match raw.locate() {
            Ok(segment) => {
                self.histograms.fill_segment(&segment);
                self.stats.segments += 1;
                Ok(())
            }
            Err(err) => {
                if self.stats.rejected_segments == 0 {
                    log::warn!(
                        "skipping segment {raw:?}: {err} (further rejections are only counted)"
                    );
                }
                self.stats.rejected_segments += 1;
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn histograms(&self) -> &OccupancyHistograms {
        &self.histograms
    }

    #[must_use]
    pub fn statistics(&self) -> &FillStatistics {
        &self.stats
    }

    /// Hands over the filled grid and the counters.
    #[must_use]
    pub fn finish(self) -> (OccupancyHistograms, FillStatistics) {
        (self.histograms, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DcEvent;
    use std::collections::HashSet;

    fn nonzero(grid: &OccupancyHistograms) -> Vec<(String, u64)> {
        grid.histograms()
            .iter()
            .filter(|h| h.entries() > 0)
            .map(|h| (h.name().to_string(), h.entries()))
            .collect()
    }

    #[test]
    fn test_grid_size_and_unique_names() {
        let grid = OccupancyHistograms::new();
        let hists = grid.histograms();
        assert_eq!(hists.len(), grid.len());
        assert_eq!(hists.len(), 6 * (2 + 6 * 10) + 6);

        let names: HashSet<&str> = hists.iter().map(HistogramRef::name).collect();
        assert_eq!(names.len(), hists.len());
        assert!(names.contains("layVScomp_left_S0"));
        assert!(names.contains("wireINlayer_S5_SL5_L5"));
        assert!(names.contains("avgWireSummed_SL3"));
        assert!(names.contains("layVScomp_oneSupLay_S2_SL4"));
    }

    #[test]
    fn test_output_order() {
        let grid = OccupancyHistograms::new();
        let names: Vec<String> = grid
            .histograms()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names[0], "layVScomp_left_S0");
        assert_eq!(names[1], "layVScomp_right_S0");
        assert_eq!(names[2], "avgWire_S0_SL0");
        assert_eq!(names[3], "layVScomp_oneSupLay_S0_SL0");
        assert_eq!(names[4], "layVScomp_leftSL_S0_SL0");
        assert_eq!(names[5], "layVScomp_rightSL_S0_SL0");
        assert_eq!(names[6], "wireINlayer_S0_SL0_L0");
        assert_eq!(names[11], "wireINlayer_S0_SL0_L5");
        assert_eq!(names[12], "avgWire_S0_SL1");
        assert_eq!(names[names.len() - 1], "avgWireSummed_SL5");
    }

    #[test]
    fn test_mutable_order_matches_output_order() {
        let mut grid = OccupancyHistograms::new();
        let expected: Vec<String> = grid
            .histograms()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        let actual: Vec<String> = grid
            .histograms_mut()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_hit_fills_six_histograms() {
        let mut acc = OccupancyAccumulator::new();
        acc.fill_hit(RawHit::new(1, 1, 1, 50)).unwrap();

        let grid = acc.histograms();
        let touched = nonzero(grid);
        assert_eq!(touched.len(), 6, "touched: {touched:?}");
        assert!(touched.iter().all(|(_, n)| *n == 1));

        assert_eq!(grid.wire_in_layer(0, 0, 0).content_at(50.0), 1);
        // wire 50 is past the left maps' range and lands in their overflow
        assert_eq!(grid.layer_vs_wire_left(0).entries(), 1);
        assert_eq!(grid.layer_vs_wire_left(0).integral(), 0);
        assert_eq!(grid.layer_vs_wire_right(0).content_at(50.0, 1.0), 1);
        assert_eq!(grid.layer_vs_wire_right_sl(0, 0).content_at(50.0, 1.0), 1);
        assert_eq!(grid.layer_vs_wire_one_sl(0, 0).content_at(50.0, 1.0), 1);
        assert_eq!(grid.layer_vs_wire_left_sl(0, 0).entries(), 1);
        assert_eq!(grid.layer_vs_wire_left_sl(0, 0).integral(), 0);
    }

    #[test]
    fn test_segment_fills_two_histograms() {
        let mut acc = OccupancyAccumulator::new();
        acc.fill_segment(RawSegment::new(4, 3, 12.3)).unwrap();

        let grid = acc.histograms();
        let touched = nonzero(grid);
        assert_eq!(touched.len(), 2, "touched: {touched:?}");
        assert_eq!(grid.avg_wire(3, 2).content_at(12.3), 1);
        assert_eq!(grid.avg_wire_summed(2).content_at(12.3), 1);
    }

    #[test]
    fn test_rejected_records_leave_grid_untouched() {
        let mut acc = OccupancyAccumulator::new();
        let event = DcEvent::new(
            vec![RawHit::new(0, 1, 1, 10), RawHit::new(1, 7, 1, 10)],
            vec![RawSegment::new(1, 9, 3.0)],
        );
        acc.process_event(&event);

        assert!(nonzero(acc.histograms()).is_empty());
        let stats = acc.statistics();
        assert_eq!(stats.events, 1);
        assert_eq!(stats.rejected_hits, 2);
        assert_eq!(stats.rejected_segments, 1);
        assert_eq!(stats.rejected(), 3);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_merge_and_rebuild() {
        let mut a = OccupancyAccumulator::new();
        a.process_event(&DcEvent::new(
            vec![RawHit::new(2, 3, 4, 60)],
            vec![RawSegment::new(2, 4, 60.5)],
        ));
        let mut b = OccupancyAccumulator::new();
        b.process_event(&DcEvent::new(vec![RawHit::new(2, 3, 4, 60)], vec![]));

        let (mut grid, _) = a.finish();
        grid.merge(b.histograms()).unwrap();
        assert_eq!(grid.wire_in_layer(1, 3, 2).content_at(60.0), 2);
        assert_eq!(grid.avg_wire(1, 3).content_at(60.5), 1);

        let owned: Vec<Histogram> = grid
            .histograms()
            .iter()
            .map(HistogramRef::to_histogram)
            .collect();
        let rebuilt = OccupancyHistograms::from_histograms(owned).unwrap();
        assert_eq!(rebuilt, grid);
    }

    #[test]
    fn test_rebuild_reports_missing_histogram() {
        let owned: Vec<Histogram> = OccupancyHistograms::new()
            .histograms()
            .iter()
            .filter(|h| h.name() != "avgWireSummed_SL0")
            .map(HistogramRef::to_histogram)
            .collect();
        let err = OccupancyHistograms::from_histograms(owned).unwrap_err();
        assert!(matches!(err, Error::MissingHistogram(name) if name == "avgWireSummed_SL0"));
    }
}
