// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Grid-to-plane coordinate mapping.
//!
//! The map is a regular grid: layers are columns, levels are rows. Block
//! geometry and gaps give the spacing between block centres; everything
//! downstream derives coordinates from these two constants, so a viewer
//! can reconstruct the grid from any single block.

/// Rendered block width in pixels.
pub const BLOCK_WIDTH: f64 = 200.0;
/// Rendered block height in pixels.
pub const BLOCK_HEIGHT: f64 = 80.0;
/// Horizontal gap between adjacent layers.
pub const HORIZONTAL_GAP: f64 = 40.0;
/// Vertical gap between adjacent levels.
pub const VERTICAL_GAP: f64 = 50.0;

/// Step between layer centres: `BLOCK_WIDTH + HORIZONTAL_GAP`.
pub const LAYER_SPACING: f64 = BLOCK_WIDTH + HORIZONTAL_GAP;
/// Step between level centres: `BLOCK_HEIGHT + VERTICAL_GAP`.
pub const LEVEL_SPACING: f64 = BLOCK_HEIGHT + VERTICAL_GAP;

/// Small y offset applied per path index so longest-path vertices and
/// their neighbours do not render as one flat line. Does not move a
/// vertex off its grid level.
pub const PATH_Y_DELTA: f64 = 10.0;

/// Maps a grid slot to plane coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PositionCalculator {
    pub layer_spacing: f64,
    pub level_spacing: f64,
}

impl Default for PositionCalculator {
    fn default() -> Self {
        PositionCalculator {
            layer_spacing: LAYER_SPACING,
            level_spacing: LEVEL_SPACING,
        }
    }
}

impl PositionCalculator {
    /// `(layer, level)` to `(x, y)`.
    pub fn coordinates(&self, layer: i64, level: i64) -> (f64, f64) {
        (layer as f64 * self.layer_spacing, level as f64 * self.level_spacing)
    }

    /// Layer midway between the farthest predecessor and nearest
    /// successor; falls back to one past / one before whichever side
    /// exists, or layer 0 with no neighbours at all.
    pub fn optimal_layer(&self, pred_layers: &[i64], succ_layers: &[i64]) -> i64 {
        match (pred_layers.iter().max(), succ_layers.iter().min()) {
            (Some(&max_pred), Some(&min_succ)) => (max_pred + min_succ) / 2,
            (Some(&max_pred), None) => max_pred + 1,
            (None, Some(&min_succ)) => min_succ - 1,
            (None, None) => 0,
        }
    }

    /// Level just above the nearest successor, else just below the
    /// farthest predecessor, else 0. Levels are uncapped upward.
    pub fn optimal_level(&self, pred_levels: &[i64], succ_levels: &[i64]) -> i64 {
        if let Some(&min_succ) = succ_levels.iter().min() {
            return (min_succ - 1).max(0);
        }
        if let Some(&max_pred) = pred_levels.iter().max() {
            return max_pred + 1;
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_constants_derive_from_block_geometry() {
        assert_eq!(LAYER_SPACING, 240.0);
        assert_eq!(LEVEL_SPACING, 130.0);
    }

    #[test]
    fn coordinates_scale_linearly() {
        let calc = PositionCalculator::default();
        assert_eq!(calc.coordinates(0, 0), (0.0, 0.0));
        assert_eq!(calc.coordinates(1, 0), (240.0, 0.0));
        assert_eq!(calc.coordinates(3, 4), (720.0, 520.0));
    }

    #[test]
    fn optimal_layer_sits_between_neighbours() {
        let calc = PositionCalculator::default();
        assert_eq!(calc.optimal_layer(&[2, 4], &[10]), 7);
        assert_eq!(calc.optimal_layer(&[3], &[]), 4);
        assert_eq!(calc.optimal_layer(&[], &[5]), 4);
        assert_eq!(calc.optimal_layer(&[], &[]), 0);
    }

    #[test]
    fn optimal_level_prefers_successor_side_and_never_goes_negative() {
        let calc = PositionCalculator::default();
        assert_eq!(calc.optimal_level(&[7], &[3]), 2);
        assert_eq!(calc.optimal_level(&[], &[0]), 0);
        assert_eq!(calc.optimal_level(&[2], &[]), 3);
        assert_eq!(calc.optimal_level(&[], &[]), 0);
    }
}
