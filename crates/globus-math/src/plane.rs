//! Planes and lines in model space.

use glam::{DVec3, DVec4};

/// A plane `n . p + d = 0` with unit normal `n`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub distance: f64,
}

impl Plane {
    /// Build from a raw `(a, b, c, d)` vector, normalising the normal.
    /// Returns `None` for a degenerate normal.
    pub fn from_vec4(v: DVec4) -> Option<Self> {
        let n = v.truncate();
        let len = n.length();
        if len <= f64::EPSILON {
            return None;
        }
        Some(Self {
            normal: n / len,
            distance: v.w / len,
        })
    }

    /// The plane through `point` with the given normal.
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Option<Self> {
        let n = normal.try_normalize()?;
        Some(Self {
            normal: n,
            distance: -n.dot(point),
        })
    }

    pub fn to_vec4(&self) -> DVec4 {
        self.normal.extend(self.distance)
    }

    /// Signed distance from the plane; positive on the side the normal points to.
    #[inline]
    pub fn signed_distance(&self, point: DVec3) -> f64 {
        self.normal.dot(point) + self.distance
    }

    /// Whether the segment `a`-`b` crosses or touches the plane.
    pub fn intersects_segment(&self, a: DVec3, b: DVec3) -> bool {
        let da = self.signed_distance(a);
        let db = self.signed_distance(b);
        da == 0.0 || db == 0.0 || (da < 0.0) != (db < 0.0)
    }
}

/// A line through `origin` along `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Line {
    pub fn from_segment(a: DVec3, b: DVec3) -> Self {
        Self {
            origin: a,
            direction: b - a,
        }
    }

    pub fn point_at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Intersection with `plane`, `None` when the line is parallel to it.
    pub fn intersect_plane(&self, plane: &Plane) -> Option<DVec3> {
        let denom = plane.normal.dot(self.direction);
        if denom.abs() <= 1e-12 {
            return None;
        }
        let t = -plane.signed_distance(self.origin) / denom;
        Some(self.point_at(t))
    }
}
