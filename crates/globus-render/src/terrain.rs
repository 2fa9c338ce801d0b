//! Terrain facade consumed by shapes, and a per-frame elevation memo.

use std::rc::Rc;

use glam::DVec3;
use globus_math::{Angle, Globe, LatLon};
use rustc_hash::FxHashMap;

/// Elevation and surface-point queries against the currently displayed terrain.
/// Elevations are unexaggerated; callers scale them by the draw context's
/// vertical exaggeration.
pub trait Terrain {
    fn globe(&self) -> &dyn Globe;

    /// Terrain elevation in meters, or `None` where terrain is not loaded.
    fn elevation(&self, location: LatLon) -> Option<f64>;

    /// Model point `offset` meters above the terrain surface raised by
    /// `vertical_exaggeration`.
    fn surface_point(
        &self,
        latitude: Angle,
        longitude: Angle,
        offset: f64,
        vertical_exaggeration: f64,
    ) -> Option<DVec3> {
        let elevation = self.elevation(LatLon::new(latitude, longitude))?;
        Some(self.globe().compute_point_from_position(
            latitude,
            longitude,
            elevation * vertical_exaggeration + offset,
        ))
    }
}

/// Terrain derived directly from a globe's elevation model.
pub struct GlobeTerrain {
    globe: Rc<dyn Globe>,
}

impl GlobeTerrain {
    pub fn new(globe: Rc<dyn Globe>) -> Self {
        Self { globe }
    }
}

impl Terrain for GlobeTerrain {
    fn globe(&self) -> &dyn Globe {
        self.globe.as_ref()
    }

    fn elevation(&self, location: LatLon) -> Option<f64> {
        Some(self.globe.elevation(location))
    }
}

/// Memoizes terrain elevation per location so a shape regenerating many
/// vertices queries each distinct location once. Cleared by its owner.
#[derive(Debug, Default)]
pub struct ElevationLookup {
    elevations: FxHashMap<(u64, u64), f64>,
    queries: u64,
}

impl ElevationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elevation at `location` scaled by `vertical_exaggeration`; missing
    /// terrain reads as zero. The memo holds raw elevations, so one lookup
    /// serves any exaggeration.
    pub fn elevation(&mut self, terrain: &dyn Terrain, location: LatLon, vertical_exaggeration: f64) -> f64 {
        let raw = *self
            .elevations
            .entry(location.key_bits())
            .or_insert_with(|| {
                self.queries += 1;
                terrain.elevation(location).unwrap_or(0.0)
            });
        raw * vertical_exaggeration
    }

    /// Number of terrain queries that missed the memo.
    pub fn query_count(&self) -> u64 {
        self.queries
    }

    pub fn len(&self) -> usize {
        self.elevations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevations.is_empty()
    }

    pub fn clear(&mut self) {
        self.elevations.clear();
    }
}
