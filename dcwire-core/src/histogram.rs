//! Fixed-width histograms with underflow and overflow bins.
//!
//! Bin numbering follows the ROOT convention so outputs line up with the
//! existing CLAS12 monitoring plots: bin 0 is underflow, bins `1..=n` are
//! in range and bin `n + 1` is overflow.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-width binning `[min, max)` split into `bins` equal bins.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axis {
    bins: usize,
    min: f64,
    max: f64,
}

impl Axis {
    /// Creates a new axis.
    #[must_use]
    pub fn new(bins: usize, min: f64, max: f64) -> Self {
        Self { bins, min, max }
    }

    /// Number of in-range bins.
    #[inline]
    #[must_use]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Lower edge of the first bin.
    #[inline]
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper edge of the last bin.
    #[inline]
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Width of a single bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Number of cells including the two flow bins.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> usize {
        self.bins + 2
    }

    /// Finds the bin holding `x`.
    ///
    /// Returns 0 for `x < min`, `bins + 1` for `x >= max` or NaN.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::neg_cmp_op_on_partial_ord
    )]
    pub fn find_bin(&self, x: f64) -> usize {
        if x < self.min {
            0
        } else if !(x < self.max) {
            self.bins + 1
        } else {
            let bin = 1 + (self.bins as f64 * (x - self.min) / (self.max - self.min)) as usize;
            bin.min(self.bins)
        }
    }

    /// Lower edge of an in-range bin (1-based).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 1.0) * self.width()
    }

    /// Center of an in-range bin (1-based).
    #[must_use]
    pub fn bin_center(&self, bin: usize) -> f64 {
        self.bin_low_edge(bin) + 0.5 * self.width()
    }
}

/// A one-dimensional counting histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hist1D {
    name: String,
    axis: Axis,
    counts: Vec<u64>,
}

impl Hist1D {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new(name: impl Into<String>, axis: Axis) -> Self {
        Self {
            name: name.into(),
            axis,
            counts: vec![0; axis.cells()],
        }
    }

    /// Rebuilds a histogram from stored counts (flow bins included).
    ///
    /// # Errors
    /// Returns an error if `counts` does not match the axis.
    pub fn from_parts(name: impl Into<String>, axis: Axis, counts: Vec<u64>) -> Result<Self> {
        let name = name.into();
        if counts.len() != axis.cells() {
            return Err(Error::BinningMismatch { name });
        }
        Ok(Self { name, axis, counts })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    /// All cells, underflow first and overflow last.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Adds one entry at `x`.
    #[inline]
    pub fn fill(&mut self, x: f64) {
        let bin = self.axis.find_bin(x);
        self.counts[bin] += 1;
    }

    /// Content of a bin; 0 for bins past the overflow.
    #[must_use]
    pub fn bin_content(&self, bin: usize) -> u64 {
        self.counts.get(bin).copied().unwrap_or(0)
    }

    /// Content of the bin holding `x`.
    #[must_use]
    pub fn content_at(&self, x: f64) -> u64 {
        self.bin_content(self.axis.find_bin(x))
    }

    #[must_use]
    pub fn underflow(&self) -> u64 {
        self.counts[0]
    }

    #[must_use]
    pub fn overflow(&self) -> u64 {
        self.counts[self.axis.bins + 1]
    }

    /// Total number of fills, flows included.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Sum of the in-range bins.
    #[must_use]
    pub fn integral(&self) -> u64 {
        self.counts[1..=self.axis.bins].iter().sum()
    }

    /// Adds another histogram bin by bin.
    ///
    /// # Errors
    /// Returns an error if the binning differs.
    pub fn add(&mut self, other: &Self) -> Result<()> {
        if self.axis != other.axis || self.counts.len() != other.counts.len() {
            return Err(Error::BinningMismatch {
                name: self.name.clone(),
            });
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        Ok(())
    }

    /// Returns true if the stored cells match the axis.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.counts.len() == self.axis.cells()
    }
}

/// A two-dimensional counting histogram.
///
/// Cells are stored row-major by y: `counts[ybin * (nx + 2) + xbin]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hist2D {
    name: String,
    x: Axis,
    y: Axis,
    counts: Vec<u64>,
}

impl Hist2D {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new(name: impl Into<String>, x: Axis, y: Axis) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            counts: vec![0; x.cells() * y.cells()],
        }
    }

    /// Rebuilds a histogram from stored counts (flow bins included).
    ///
    /// # Errors
    /// Returns an error if `counts` does not match the axes.
    pub fn from_parts(
        name: impl Into<String>,
        x: Axis,
        y: Axis,
        counts: Vec<u64>,
    ) -> Result<Self> {
        let name = name.into();
        if counts.len() != x.cells() * y.cells() {
            return Err(Error::BinningMismatch { name });
        }
        Ok(Self { name, x, y, counts })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    #[must_use]
    pub fn y_axis(&self) -> &Axis {
        &self.y
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[inline]
    fn index(&self, xbin: usize, ybin: usize) -> usize {
        ybin * self.x.cells() + xbin
    }

    /// Adds one entry at `(x, y)`.
    #[inline]
    pub fn fill(&mut self, x: f64, y: f64) {
        let idx = self.index(self.x.find_bin(x), self.y.find_bin(y));
        self.counts[idx] += 1;
    }

    /// Content of a cell; 0 outside the grid.
    #[must_use]
    pub fn bin_content(&self, xbin: usize, ybin: usize) -> u64 {
        if xbin < self.x.cells() && ybin < self.y.cells() {
            self.counts[self.index(xbin, ybin)]
        } else {
            0
        }
    }

    /// Content of the cell holding `(x, y)`.
    #[must_use]
    pub fn content_at(&self, x: f64, y: f64) -> u64 {
        self.bin_content(self.x.find_bin(x), self.y.find_bin(y))
    }

    /// Total number of fills, flows included.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Sum of the cells that are in range on both axes.
    #[must_use]
    pub fn integral(&self) -> u64 {
        (1..=self.y.bins)
            .flat_map(|ybin| (1..=self.x.bins).map(move |xbin| (xbin, ybin)))
            .map(|(xbin, ybin)| self.counts[self.index(xbin, ybin)])
            .sum()
    }

    /// Adds another histogram cell by cell.
    ///
    /// # Errors
    /// Returns an error if the binning differs.
    pub fn add(&mut self, other: &Self) -> Result<()> {
        if self.x != other.x || self.y != other.y || self.counts.len() != other.counts.len() {
            return Err(Error::BinningMismatch {
                name: self.name.clone(),
            });
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        Ok(())
    }

    /// Returns true if the stored cells match the axes.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.counts.len() == self.x.cells() * self.y.cells()
    }
}

/// Either kind of histogram, as written to an output container.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind"))]
pub enum Histogram {
    #[cfg_attr(feature = "serde", serde(rename = "h1"))]
    H1(Hist1D),
    #[cfg_attr(feature = "serde", serde(rename = "h2"))]
    H2(Hist2D),
}

impl Histogram {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Histogram::H1(h) => h.name(),
            Histogram::H2(h) => h.name(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> u64 {
        match self {
            Histogram::H1(h) => h.entries(),
            Histogram::H2(h) => h.entries(),
        }
    }

    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self {
            Histogram::H1(h) => h.is_consistent(),
            Histogram::H2(h) => h.is_consistent(),
        }
    }

    /// Borrows as a [`HistogramRef`].
    #[must_use]
    pub fn as_view(&self) -> HistogramRef<'_> {
        match self {
            Histogram::H1(h) => HistogramRef::H1(h),
            Histogram::H2(h) => HistogramRef::H2(h),
        }
    }
}

/// A borrowed histogram of either kind.
///
/// Serializes exactly like [`Histogram`], so writers can emit the grid
/// without cloning it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind"))]
pub enum HistogramRef<'a> {
    #[cfg_attr(feature = "serde", serde(rename = "h1"))]
    H1(&'a Hist1D),
    #[cfg_attr(feature = "serde", serde(rename = "h2"))]
    H2(&'a Hist2D),
}

impl<'a> HistogramRef<'a> {
    /// Name of the referenced histogram, borrowed for the histogram's lifetime.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            HistogramRef::H1(h) => h.name(),
            HistogramRef::H2(h) => h.name(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> u64 {
        match self {
            HistogramRef::H1(h) => h.entries(),
            HistogramRef::H2(h) => h.entries(),
        }
    }

    /// Clones into an owned [`Histogram`].
    #[must_use]
    pub fn to_histogram(&self) -> Histogram {
        match self {
            HistogramRef::H1(h) => Histogram::H1((*h).clone()),
            HistogramRef::H2(h) => Histogram::H2((*h).clone()),
        }
    }
}
