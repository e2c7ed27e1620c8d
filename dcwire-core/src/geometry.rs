//! CLAS12 drift-chamber geometry and the fixed histogram binning.

use crate::histogram::Axis;

/// Number of azimuthal sectors.
pub const N_SECTORS: usize = 6;
/// Number of superlayers per sector.
pub const N_SUPERLAYERS: usize = 6;
/// Number of wire layers per superlayer.
pub const N_LAYERS_PER_SUPERLAYER: usize = 6;

/// Bins of the full wire axis.
pub const N_WIRE_BINS: usize = 115;
/// Bins of the combined layer axis (`superlayer * 6 + layer + 1` spans 1..=36).
pub const N_LAYER_BINS: usize = 39;

pub const WIRE_MIN: f64 = -0.5;
pub const WIRE_MAX: f64 = 114.5;
pub const WIRE_LEFT_BINS: usize = 41;
pub const WIRE_LEFT_MIN: f64 = -0.5;
pub const WIRE_LEFT_MAX: f64 = 40.5;
pub const WIRE_RIGHT_BINS: usize = 77;
pub const WIRE_RIGHT_MIN: f64 = 37.5;
pub const WIRE_RIGHT_MAX: f64 = 114.5;
pub const LAYER_MIN: f64 = -0.5;
pub const LAYER_MAX: f64 = 38.5;

/// Bins of the per-superlayer layer axis. The range is 7 wide, so bins are
/// 0.875 wide.
pub const SUPERLAYER_LAYER_BINS: usize = 8;

/// Full wire axis, used by every 1-D histogram.
#[must_use]
pub fn wire_axis() -> Axis {
    Axis::new(N_WIRE_BINS, WIRE_MIN, WIRE_MAX)
}

/// Low-wire half of the layer-vs-wire maps.
#[must_use]
pub fn wire_left_axis() -> Axis {
    Axis::new(WIRE_LEFT_BINS, WIRE_LEFT_MIN, WIRE_LEFT_MAX)
}

/// High-wire half of the layer-vs-wire maps. Overlaps the left half on
/// wires 38-40.
#[must_use]
pub fn wire_right_axis() -> Axis {
    Axis::new(WIRE_RIGHT_BINS, WIRE_RIGHT_MIN, WIRE_RIGHT_MAX)
}

/// Combined layer axis covering all six superlayers.
#[must_use]
pub fn layer_axis() -> Axis {
    Axis::new(N_LAYER_BINS, LAYER_MIN, LAYER_MAX)
}

/// Layer axis restricted to one superlayer (0-based).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn superlayer_layer_axis(superlayer: usize) -> Axis {
    let base = (superlayer * N_LAYERS_PER_SUPERLAYER) as f64;
    Axis::new(SUPERLAYER_LAYER_BINS, base - 0.5, base + 6.5)
}

/// Combined layer index used on the y axis of the 2-D maps.
///
/// Inputs are 0-based; the result is offset by one so layer 0 of
/// superlayer 0 plots at 1.
#[inline]
#[must_use]
pub fn combined_layer(superlayer: usize, layer: usize) -> usize {
    superlayer * N_LAYERS_PER_SUPERLAYER + layer + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_combined_layer_range() {
        assert_eq!(combined_layer(0, 0), 1);
        assert_eq!(combined_layer(5, 5), 36);
        assert_eq!(combined_layer(2, 3), 16);
    }

    #[test]
    fn test_superlayer_axis_covers_its_layers() {
        for sl in 0..N_SUPERLAYERS {
            let axis = superlayer_layer_axis(sl);
            assert_relative_eq!(axis.width(), 0.875);
            for layer in 0..N_LAYERS_PER_SUPERLAYER {
                #[allow(clippy::cast_precision_loss)]
                let y = combined_layer(sl, layer) as f64;
                let bin = axis.find_bin(y);
                assert!(
                    bin >= 1 && bin <= SUPERLAYER_LAYER_BINS,
                    "sl {sl} layer {layer} fell into flow bin {bin}"
                );
            }
        }
    }

    #[test]
    fn test_unit_width_axes() {
        assert_relative_eq!(wire_axis().width(), 1.0);
        assert_relative_eq!(wire_left_axis().width(), 1.0);
        assert_relative_eq!(wire_right_axis().width(), 1.0);
        assert_relative_eq!(layer_axis().width(), 1.0);
    }
}
