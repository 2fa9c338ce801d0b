//! The globe facade consumed by shapes and the draw context, plus a spherical
//! reference globe.
//!
//! Model coordinates put the polar axis on +Y, the prime meridian/equator
//! intersection on +Z, and 90 degrees east on +X.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec3;

use crate::{Angle, LatLon, Position};

/// Mean equatorial radius of WGS84, in meters.
pub const WGS84_EQUATORIAL_RADIUS: f64 = 6_378_137.0;

static NEXT_GLOBE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity token of a globe's geometric state. Cached geometry is valid only
/// while the key that produced it is unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobeStateKey {
    pub globe_id: u64,
    pub elevation_version: u64,
}

/// Read-only globe geometry and elevation queries.
pub trait Globe {
    /// Identity of the globe's current geometric state.
    fn state_key(&self) -> GlobeStateKey;

    /// Equatorial radius in meters.
    fn radius(&self) -> f64;

    /// Model-space point at `height` meters above the ellipsoid.
    fn compute_point_from_position(&self, latitude: Angle, longitude: Angle, height: f64) -> DVec3;

    /// Geographic position of a model-space point.
    fn compute_position_from_point(&self, point: DVec3) -> Position;

    /// Outward unit normal of the ellipsoid at `location`.
    fn surface_normal_at_location(&self, location: LatLon) -> DVec3;

    /// Terrain elevation at `location` in meters, before vertical exaggeration.
    fn elevation(&self, location: LatLon) -> f64;

    /// Upper bound on terrain elevation anywhere on the globe.
    fn max_elevation(&self) -> f64;

    fn compute_point(&self, position: &Position) -> DVec3 {
        self.compute_point_from_position(position.latitude, position.longitude, position.elevation)
    }
}

type ElevationFn = Box<dyn Fn(LatLon) -> f64>;

/// A perfect sphere with an optional elevation function.
pub struct SphericalGlobe {
    id: u64,
    radius: f64,
    elevation_version: u64,
    elevation: Option<ElevationFn>,
    max_elevation: f64,
}

impl SphericalGlobe {
    /// A sphere of the given radius with flat (zero) terrain.
    pub fn new(radius: f64) -> Self {
        Self {
            id: NEXT_GLOBE_ID.fetch_add(1, Ordering::Relaxed),
            radius,
            elevation_version: 0,
            elevation: None,
            max_elevation: 0.0,
        }
    }

    /// A WGS84-radius sphere with flat terrain.
    pub fn earth() -> Self {
        Self::new(WGS84_EQUATORIAL_RADIUS)
    }

    /// Replace the elevation source. Changes the globe's state key.
    pub fn set_elevation<F>(&mut self, max_elevation: f64, elevation: F)
    where
        F: Fn(LatLon) -> f64 + 'static,
    {
        self.elevation = Some(Box::new(elevation));
        self.max_elevation = max_elevation;
        self.elevation_version += 1;
    }

    /// Builder form of [`set_elevation`](Self::set_elevation).
    pub fn with_elevation<F>(mut self, max_elevation: f64, elevation: F) -> Self
    where
        F: Fn(LatLon) -> f64 + 'static,
    {
        self.set_elevation(max_elevation, elevation);
        self
    }
}

impl fmt::Debug for SphericalGlobe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SphericalGlobe")
            .field("id", &self.id)
            .field("radius", &self.radius)
            .field("elevation_version", &self.elevation_version)
            .field("has_elevation", &self.elevation.is_some())
            .finish()
    }
}

impl Globe for SphericalGlobe {
    fn state_key(&self) -> GlobeStateKey {
        GlobeStateKey {
            globe_id: self.id,
            elevation_version: self.elevation_version,
        }
    }

    fn radius(&self) -> f64 {
        self.radius
    }

    fn compute_point_from_position(&self, latitude: Angle, longitude: Angle, height: f64) -> DVec3 {
        let r = self.radius + height;
        let cos_lat = latitude.cos();
        DVec3::new(
            r * cos_lat * longitude.sin(),
            r * latitude.sin(),
            r * cos_lat * longitude.cos(),
        )
    }

    fn compute_position_from_point(&self, point: DVec3) -> Position {
        let r = point.length();
        if r <= f64::EPSILON {
            return Position::new(Angle::ZERO, Angle::ZERO, -self.radius);
        }
        let latitude = (point.y / r).clamp(-1.0, 1.0).asin();
        let longitude = point.x.atan2(point.z);
        Position::new(
            Angle::from_radians(latitude),
            Angle::from_radians(longitude),
            r - self.radius,
        )
    }

    fn surface_normal_at_location(&self, location: LatLon) -> DVec3 {
        self.compute_point_from_position(location.latitude, location.longitude, 0.0)
            .normalize()
    }

    fn elevation(&self, location: LatLon) -> f64 {
        self.elevation.as_ref().map_or(0.0, |f| f(location))
    }

    fn max_elevation(&self) -> f64 {
        self.max_elevation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Point and position conversions are inverse to each other.
    #[test]
    fn test_point_position_round_trip() {
        let globe = SphericalGlobe::new(1000.0);
        let p = Position::from_degrees(35.0, -120.0, 25.0);
        let back = globe.compute_position_from_point(globe.compute_point(&p));
        assert!((back.latitude.degrees() - 35.0).abs() < 1e-9);
        assert!((back.longitude.degrees() + 120.0).abs() < 1e-9);
        assert!((back.elevation - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_axes_convention() {
        let globe = SphericalGlobe::new(1.0);
        let north = globe.compute_point_from_position(Angle::POS90, Angle::ZERO, 0.0);
        assert!((north - DVec3::Y).length() < 1e-12);
        let prime = globe.compute_point_from_position(Angle::ZERO, Angle::ZERO, 0.0);
        assert!((prime - DVec3::Z).length() < 1e-12);
    }

    /// Changing the elevation source changes the state key.
    #[test]
    fn test_elevation_change_bumps_state_key() {
        let mut globe = SphericalGlobe::new(1000.0);
        let before = globe.state_key();
        globe.set_elevation(10.0, |_| 5.0);
        assert_ne!(before, globe.state_key());
        assert_eq!(globe.elevation(LatLon::ZERO), 5.0);
    }

    #[test]
    fn test_distinct_globes_have_distinct_keys() {
        assert_ne!(SphericalGlobe::earth().state_key(), SphericalGlobe::earth().state_key());
    }
}
