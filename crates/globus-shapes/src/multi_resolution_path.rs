//! Paths that thin their positions with distance instead of tessellating.

use std::fmt;

use globus_render::DrawContext;

use crate::path::{Path, Tessellation};
use crate::ShapeError;

/// Chooses how many original positions to advance between drawn positions.
pub trait SkipCountComputer: fmt::Debug {
    /// Stride for a path whose nearest position is `eye_distance` meters from the eye.
    fn compute_skip_count(&self, dc: &DrawContext, eye_distance: f64) -> usize;
}

/// Skip counts by eye-distance band: 4 beyond 1000 km, 2 beyond 100 km, else 1.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceSkipCountComputer {
    /// `(minimum distance, skip count)`, farthest band first.
    bands: Vec<(f64, usize)>,
}

impl Default for DistanceSkipCountComputer {
    fn default() -> Self {
        Self {
            bands: vec![(1_000_000.0, 4), (100_000.0, 2)],
        }
    }
}

impl DistanceSkipCountComputer {
    /// Bands in any order; the distance-sorted list is kept.
    pub fn new(mut bands: Vec<(f64, usize)>) -> Self {
        bands.sort_by(|a, b| b.0.total_cmp(&a.0));
        Self { bands }
    }
}

impl SkipCountComputer for DistanceSkipCountComputer {
    fn compute_skip_count(&self, _dc: &DrawContext, eye_distance: f64) -> usize {
        self.bands
            .iter()
            .find(|(distance, _)| eye_distance > *distance)
            .map_or(1, |(_, skip)| (*skip).max(1))
    }
}

/// A [`Path`] drawn through every n-th position, n chosen per frame by a
/// [`SkipCountComputer`].
#[derive(Debug)]
pub struct MultiResolutionPath {
    path: Path,
    skip_count_computer: Box<dyn SkipCountComputer>,
}

impl MultiResolutionPath {
    pub fn new(path: Path) -> Self {
        Self {
            path,
            skip_count_computer: Box::new(DistanceSkipCountComputer::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_mut(&mut self) -> &mut Path {
        &mut self.path
    }

    pub fn set_skip_count_computer(&mut self, computer: Box<dyn SkipCountComputer>) {
        self.skip_count_computer = computer;
    }

    /// Queue the thinned path for ordered rendering. Returns `false` when
    /// there is nothing to draw this frame.
    pub fn render(&mut self, dc: &mut DrawContext) -> Result<bool, ShapeError> {
        if self.path.positions().len() < 2 {
            return self.path.render_with(dc, Tessellation::Skip(1));
        }
        let distance = self.path.nearest_eye_distance(dc)?;
        let skip = self.skip_count_computer.compute_skip_count(dc, distance);
        tracing::trace!(id = self.path.id().0, distance, skip, "multi-resolution path stride");
        self.path.render_with(dc, Tessellation::Skip(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use globus_math::{Position, SphericalGlobe};

    fn many_positions() -> Vec<Position> {
        (0..=12).map(|i| Position::from_degrees(0.0, -0.06 + 0.01 * f64::from(i), 100.0)).collect()
    }

    fn drawn_count(eye_altitude: f64) -> usize {
        let Frame { mut dc, .. } =
            test_support::frame_over(SphericalGlobe::earth(), Position::from_degrees(0.0, 0.0, eye_altitude));
        let mut path = MultiResolutionPath::new(Path::new(many_positions()));
        assert!(path.render(&mut dc).unwrap());
        path.path().path_data(&dc).unwrap().tessellated_positions().len()
    }

    /// Default bands give strides 4, 2, and 1 as the eye approaches.
    #[test]
    fn test_default_bands() {
        let dc = DrawContext::default();
        let c = DistanceSkipCountComputer::default();
        assert_eq!(c.compute_skip_count(&dc, 2_000_000.0), 4);
        assert_eq!(c.compute_skip_count(&dc, 500_000.0), 2);
        assert_eq!(c.compute_skip_count(&dc, 50_000.0), 1);
    }

    /// Far paths keep fewer of their positions, and none are subdivided.
    #[test]
    fn test_thinning_by_distance() {
        assert_eq!(drawn_count(50_000.0), 13);
        assert_eq!(drawn_count(500_000.0), 7);
        assert_eq!(drawn_count(2_000_000.0), 4);
    }

    /// A custom computer replaces the default bands.
    #[test]
    fn test_custom_computer() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut path = MultiResolutionPath::new(Path::new(many_positions()));
        path.set_skip_count_computer(Box::new(DistanceSkipCountComputer::new(vec![(0.0, 6)])));
        path.render(&mut dc).unwrap();
        let kept = path.path().path_data(&dc).unwrap().tessellated_positions().len();
        assert_eq!(kept, 3);
    }
}
