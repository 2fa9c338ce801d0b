//! Bounding spheres used as shape extents.

use glam::DVec3;

use crate::Frustum;

/// A bounding sphere in model coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: DVec3,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the points' bounding-box center and enclosing them all.
    /// Returns `None` for an empty slice.
    pub fn from_points(points: &[DVec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        let center = (min + max) * 0.5;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f64, f64::max);
        Some(Self { center, radius })
    }

    pub fn diameter(&self) -> f64 {
        self.radius * 2.0
    }

    /// Distance from `point` to the sphere's surface, zero when inside.
    pub fn distance_to(&self, point: DVec3) -> f64 {
        (point.distance(self.center) - self.radius).max(0.0)
    }

    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        frustum.intersects_sphere(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_encloses_all() {
        let pts = [
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::new(0.0, 3.0, 0.0),
        ];
        let s = Sphere::from_points(&pts).unwrap();
        for p in pts {
            assert!(p.distance(s.center) <= s.radius + 1e-12);
        }
        assert!(Sphere::from_points(&[]).is_none());
    }
}
