//! Bad-wire selection from the wire occupancy grid.
//!
//! Each superlayer's sector-summed wire profile is fitted piecewise, three
//! cubics followed by `p0 + p1*x + p2/x` at high wire numbers. The fit is
//! rescaled to every sector and every layer by the ratio of integrals, and a
//! wire is bad when its layer occupancy falls outside a band around the
//! scaled shape and ends up at one count or less.

use crate::geometry::{N_LAYERS_PER_SUPERLAYER, N_SECTORS, N_SUPERLAYERS};
use crate::histogram::Hist1D;
use crate::occupancy::OccupancyHistograms;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fit windows per superlayer (0-based), in wire units.
const START_G1: [usize; N_SUPERLAYERS] = [0, 0, 0, 0, 0, 5];
const END_G1: [usize; N_SUPERLAYERS] = [7, 7, 7, 9, 9, 14];
const START_G2: [usize; N_SUPERLAYERS] = [6, 6, 6, 8, 9, 14];
const END_G2: [usize; N_SUPERLAYERS] = [32, 32, 28, 50, 20, 25];
const START_G3: [usize; N_SUPERLAYERS] = [30, 30, 26, 50, 20, 25];
const END_G3: [usize; N_SUPERLAYERS] = [75, 75, 75, 90, 75, 80];
const START_G4: [usize; N_SUPERLAYERS] = [75, 75, 75, 90, 75, 80];
const MAX_WIRE_FIT: usize = 114;

/// Bins of the summed profile raised to [`SUMMED_FLOOR`] before fitting.
const SUMMED_FLOOR_BINS: std::ops::RangeInclusive<usize> = 110..=115;
const SUMMED_FLOOR: f64 = 10.0;

const MAX_RATIO: f64 = 2.5;
const MIN_RATIO: f64 = 0.58;
const MIN_RATIO_MID: f64 = 0.62;

/// Isolated-spike test tolerances.
const SPIKE_MATCH: f64 = 0.2;
const SPIKE_JUMP: f64 = 0.25;

/// Wires examined for export; the outermost wires are never reported.
const FIRST_REPORTED_BIN: usize = 5;
const REPORTED_WIRES: std::ops::RangeInclusive<u16> = 6..=105;
/// Occupancy at or below which a rejected wire is reported.
const DEAD_LEVEL: f64 = 1.0;

/// One reported wire, 1-based in every field as in the calibration tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BadWire {
    pub superlayer: u8,
    pub sector: u8,
    /// Layer within the superlayer, 1..=6.
    pub layer: u8,
    pub wire: u16,
}

impl BadWire {
    /// Layer counted across superlayers, 1..=36.
    #[must_use]
    pub fn global_layer(&self) -> u16 {
        u16::from(self.layer) + u16::from(self.superlayer.saturating_sub(1)) * 6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Basis {
    /// `1, u, u^2, u^3`
    Cubic,
    /// `1, u, c/x`
    Hyperbolic,
}

impl Basis {
    fn dimension(self) -> usize {
        match self {
            Basis::Cubic => 4,
            Basis::Hyperbolic => 3,
        }
    }
}

/// One fitted piece. The basis is evaluated on `u = (x - center) / half_width`
/// to keep the normal equations well conditioned.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Piece {
    basis: Basis,
    center: f64,
    half_width: f64,
    coefficients: [f64; 4],
}

impl Piece {
    fn over(basis: Basis, low: f64, high: f64) -> Self {
        Self {
            basis,
            center: 0.5 * (low + high),
            half_width: (0.5 * (high - low)).max(0.5),
            coefficients: [0.0; 4],
        }
    }

    fn terms(&self, x: f64) -> [f64; 4] {
        let u = (x - self.center) / self.half_width;
        match self.basis {
            Basis::Cubic => [1.0, u, u * u, u * u * u],
            Basis::Hyperbolic => [1.0, u, self.center / x, 0.0],
        }
    }

    fn value(&self, x: f64) -> f64 {
        self.terms(x)
            .iter()
            .zip(&self.coefficients)
            .map(|(t, c)| t * c)
            .sum()
    }

    /// Unweighted least squares over `points`. Returns false, leaving the
    /// piece at zero, when the points cannot determine it.
    #[allow(clippy::needless_range_loop)]
    fn fit(&mut self, points: &[(f64, f64)]) -> bool {
        let n = self.basis.dimension();
        if points.len() < n {
            return false;
        }
        let mut normal = [[0.0; 4]; 4];
        let mut rhs = [0.0; 4];
        for &(x, y) in points {
            let t = self.terms(x);
            for i in 0..n {
                rhs[i] += t[i] * y;
                for j in 0..n {
                    normal[i][j] += t[i] * t[j];
                }
            }
        }
        match solve(normal, rhs, n) {
            Some(coefficients) => {
                self.coefficients = coefficients;
                true
            }
            None => false,
        }
    }
}

/// Gaussian elimination with partial pivoting on the leading `n x n` block.
#[allow(clippy::needless_range_loop)]
fn solve(mut a: [[f64; 4]; 4], mut b: [f64; 4], n: usize) -> Option<[f64; 4]> {
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    for col in 0..n {
        let pivot = (col..n).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() <= 1e-12 * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; 4];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Piecewise occupancy shape of one superlayer.
#[derive(Debug, Clone, PartialEq)]
pub struct WireShape {
    pieces: [Piece; 4],
    /// Upper wire of the first three pieces when evaluating.
    boundaries: [f64; 3],
    converged: bool,
}

impl WireShape {
    /// Fits the shape to a summed wire profile of `superlayer` (0-based).
    ///
    /// `profile` holds the cell contents, flow bins included; empty bins are
    /// left out of the fit. A piece with too few points stays at zero and
    /// [`converged`](Self::converged) reports false.
    ///
    /// # Panics
    /// Panics if `superlayer` is 6 or more.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(hist: &Hist1D, profile: &[f64], superlayer: usize) -> Self {
        let axis = hist.axis();
        let windows = [
            (Basis::Cubic, START_G1[superlayer], END_G1[superlayer]),
            (Basis::Cubic, START_G2[superlayer], END_G2[superlayer]),
            (Basis::Cubic, START_G3[superlayer], END_G3[superlayer]),
            (Basis::Hyperbolic, START_G4[superlayer], MAX_WIRE_FIT),
        ];
        let mut converged = true;
        let pieces = windows.map(|(basis, low, high)| {
            let (low, high) = (low as f64, high as f64);
            let points: Vec<(f64, f64)> = (1..=axis.bins())
                .map(|bin| (axis.bin_center(bin), profile.get(bin).copied().unwrap_or(0.0)))
                .filter(|&(x, y)| x >= low && x <= high && y > 0.0)
                .collect();
            let mut piece = Piece::over(basis, low, high);
            if !piece.fit(&points) {
                log::debug!(
                    "{}: no fit on wires {low}-{high} ({} points)",
                    hist.name(),
                    points.len()
                );
                converged = false;
            }
            piece
        });
        Self {
            pieces,
            boundaries: [
                START_G2[superlayer] as f64,
                START_G3[superlayer] as f64,
                START_G4[superlayer] as f64,
            ],
            converged,
        }
    }

    /// True if every piece was determined by the data.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// The shape multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let mut shape = self.clone();
        for piece in &mut shape.pieces {
            for c in &mut piece.coefficients {
                *c *= factor;
            }
        }
        shape
    }

    /// Expected occupancy at wire `x`.
    #[must_use]
    pub fn value(&self, x: f64) -> f64 {
        let index = self
            .boundaries
            .iter()
            .position(|&edge| x <= edge)
            .unwrap_or(3);
        self.pieces[index].value(x)
    }
}

/// Cell contents as floating point, flow bins included.
#[allow(clippy::cast_precision_loss)]
fn contents(hist: &Hist1D) -> Vec<f64> {
    hist.counts().iter().map(|&c| c as f64).collect()
}

/// Sum of cells `first..=MAX_WIRE_FIT`, where cell 0 is the underflow.
fn fit_integral(profile: &[f64], first: usize) -> f64 {
    profile.iter().take(MAX_WIRE_FIT + 1).skip(first).sum()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Whether `y` is compatible with the expected `f` in bin `bin`.
fn within_band(bin: usize, y: f64, f: f64) -> bool {
    (bin < 12 && y < MAX_RATIO * f && y > MIN_RATIO * f)
        || !(4..=105).contains(&bin)
        || ((12..75).contains(&bin) && y < 2.0 * MAX_RATIO * f && y > MIN_RATIO_MID * f)
        || ((75..100).contains(&bin) && y < 2.0 * MAX_RATIO * f && y > MIN_RATIO * f)
        || (bin >= 100 && y < 2.0 * MAX_RATIO * f && y > 0.6 * MIN_RATIO * f)
}

fn relative(a: f64, b: f64) -> Option<f64> {
    (b != 0.0).then(|| (a - b).abs() / b)
}

/// Layer contents after rejecting bins outside the band, indexed like the
/// histogram cells.
///
/// A bin far above both neighbours, while the neighbours match the shape,
/// is cleared as well.
#[must_use]
pub fn accepted_occupancy(layer: &Hist1D, shape: &WireShape) -> Vec<f64> {
    let axis = layer.axis();
    let observed = contents(layer);
    let mut accepted = vec![0.0; observed.len()];
    let (mut previous1, mut previous2) = (0.0, 0.0);

    for bin in 1..=axis.bins() {
        let x = axis.bin_center(bin);
        let y = observed[bin];
        let f = shape.value(x);
        if within_band(bin, y, f) {
            accepted[bin] = y;
        }

        if bin > 12 && bin < 90 {
            let (pr1, pr2) = (accepted[bin - 1], accepted[bin - 2]);
            let current = accepted[bin];
            let spike = current > 1.0
                && pr1 > 1.0
                && pr2 > 1.0
                && relative(current, f).is_some_and(|r| r < SPIKE_MATCH)
                && relative(pr1, previous1).is_some_and(|r| r > SPIKE_JUMP)
                && relative(pr1, current).is_some_and(|r| r > SPIKE_JUMP)
                && relative(pr1, pr2).is_some_and(|r| r > SPIKE_JUMP)
                && relative(pr2, previous2).is_some_and(|r| r < SPIKE_MATCH);
            if spike {
                accepted[bin - 1] = 0.0;
            }
        }
        previous2 = previous1;
        previous1 = f;
    }
    accepted
}

/// Wires of one layer reported as bad against `shape`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn bad_wires_in_layer(layer: &Hist1D, shape: &WireShape) -> Vec<u16> {
    let axis = layer.axis();
    let accepted = accepted_occupancy(layer, shape);
    (FIRST_REPORTED_BIN..=axis.bins())
        .filter(|&bin| accepted[bin] <= DEAD_LEVEL)
        .map(|bin| axis.bin_center(bin).round() as u16)
        .filter(|wire| REPORTED_WIRES.contains(wire))
        .collect()
}

/// Bad wires of the whole detector, ordered by superlayer, sector, layer
/// and wire.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn find_bad_wires(grid: &OccupancyHistograms) -> Vec<BadWire> {
    let mut bad = Vec::new();
    for sl in 0..N_SUPERLAYERS {
        let summed = grid.avg_wire_summed(sl);
        let mut profile = contents(summed);
        for bin in SUMMED_FLOOR_BINS {
            if let Some(cell) = profile.get_mut(bin) {
                *cell = cell.max(SUMMED_FLOOR);
            }
        }
        let shape = WireShape::fit(summed, &profile, sl);
        if !shape.converged() {
            log::warn!("superlayer {}: occupancy fit incomplete", sl + 1);
        }
        let first = START_G1[sl];
        let summed_integral = fit_integral(&profile, first);

        for sec in 0..N_SECTORS {
            let sector_integral = fit_integral(&contents(grid.avg_wire(sec, sl)), first);
            let sector_shape = shape.scaled(ratio(sector_integral, summed_integral));
            for lay in 0..N_LAYERS_PER_SUPERLAYER {
                let layer = grid.wire_in_layer(sec, sl, lay);
                let layer_integral = fit_integral(&contents(layer), first);
                let layer_shape = sector_shape.scaled(ratio(layer_integral, sector_integral));
                bad.extend(
                    bad_wires_in_layer(layer, &layer_shape)
                        .into_iter()
                        .map(|wire| BadWire {
                            superlayer: sl as u8 + 1,
                            sector: sec as u8 + 1,
                            layer: lay as u8 + 1,
                            wire,
                        }),
                );
            }
        }
    }
    log::debug!("{} bad wires selected", bad.len());
    bad
}
