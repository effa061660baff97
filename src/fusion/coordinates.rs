//! Coordinate selection for the weather half of a fusion.
//!
//! Weather is sampled at one of a fixed list of candidate points. The
//! chosen index, not the coordinates, goes into the cache key, so the list
//! must stay append-only: reordering it would serve cached weather for the
//! wrong place until entries go stale.

use rand::Rng;

use crate::types::Coordinates;

/// Candidate sampling points.
pub const CANDIDATE_COORDINATES: &[Coordinates] = &[
    Coordinates::new(-12.05, -77.05),  // Lima
    Coordinates::new(40.71, -74.01),   // New York
    Coordinates::new(51.51, -0.13),    // London
    Coordinates::new(35.68, 139.69),   // Tokyo
    Coordinates::new(-33.87, 151.21),  // Sydney
    Coordinates::new(-34.60, -58.38),  // Buenos Aires
    Coordinates::new(30.04, 31.24),    // Cairo
    Coordinates::new(64.15, -21.94),   // Reykjavik
    Coordinates::new(19.43, -99.13),   // Mexico City
    Coordinates::new(1.35, 103.82),    // Singapore
];

/// Picks an index into a candidate list.
pub trait CoordinateSelector: Send + Sync {
    /// Index in `0..len`. `len` is never zero.
    fn select(&self, len: usize) -> usize;
}

/// Uniform pseudo-random choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl CoordinateSelector for RandomSelector {
    fn select(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Always the same index, clamped into range.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSelector(pub usize);

impl CoordinateSelector for FixedSelector {
    fn select(&self, len: usize) -> usize {
        self.0.min(len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_selection_stays_in_range() {
        let len = CANDIDATE_COORDINATES.len();
        for _ in 0..200 {
            assert!(RandomSelector.select(len) < len);
        }
    }

    #[test]
    fn fixed_selection_is_clamped() {
        assert_eq!(FixedSelector(2).select(10), 2);
        assert_eq!(FixedSelector(42).select(10), 9);
    }

    #[test]
    fn lima_is_the_first_candidate() {
        assert_eq!(CANDIDATE_COORDINATES[0], Coordinates::new(-12.05, -77.05));
    }
}
