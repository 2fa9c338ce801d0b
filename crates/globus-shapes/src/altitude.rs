//! How shape altitudes relate to the globe and its terrain.

use std::rc::Rc;

use glam::DVec3;
use globus_math::{Globe, Position};
use globus_render::{DrawContext, RenderError, Terrain};

/// Reference surface of one airspace altitude.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AltitudeDatum {
    /// Altitude above the ellipsoid; terrain is ignored.
    #[default]
    AboveMeanSeaLevel,
    /// Altitude above the terrain directly beneath each vertex.
    AboveGroundLevel,
    /// Altitude above the terrain at a single ground reference location.
    AboveGroundReference,
}

impl AltitudeDatum {
    /// Whether vertices at this altitude follow the terrain beneath them.
    pub fn is_terrain_conforming(self) -> bool {
        self == AltitudeDatum::AboveGroundLevel
    }

    /// Whether this altitude depends on terrain elevation at all.
    pub fn uses_terrain(self) -> bool {
        self != AltitudeDatum::AboveMeanSeaLevel
    }

    pub(crate) fn code(self) -> i64 {
        match self {
            AltitudeDatum::AboveMeanSeaLevel => 0,
            AltitudeDatum::AboveGroundLevel => 1,
            AltitudeDatum::AboveGroundReference => 2,
        }
    }
}

/// How a path or placemark position's elevation is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AltitudeMode {
    /// Elevation above the ellipsoid, scaled by vertical exaggeration.
    #[default]
    Absolute,
    /// Elevation above the terrain.
    RelativeToGround,
    /// On the terrain; elevation is ignored.
    ClampToGround,
}

/// Model points for positions under one [`AltitudeMode`].
pub(crate) struct PointMapper {
    pub(crate) globe: Rc<dyn Globe>,
    terrain: Option<Rc<dyn Terrain>>,
    vertical_exaggeration: f64,
    altitude_mode: AltitudeMode,
}

impl PointMapper {
    /// Mapper over the globe and terrain of `dc`. Terrain is optional; without
    /// it terrain-relative points sit on the ellipsoid.
    pub(crate) fn new(dc: &DrawContext, altitude_mode: AltitudeMode) -> Result<Self, RenderError> {
        Ok(Self {
            globe: dc.globe()?,
            terrain: dc.terrain().ok(),
            vertical_exaggeration: dc.vertical_exaggeration(),
            altitude_mode,
        })
    }

    pub(crate) fn point(&self, p: &Position) -> DVec3 {
        match self.altitude_mode {
            AltitudeMode::Absolute => self.globe.compute_point_from_position(
                p.latitude,
                p.longitude,
                p.elevation * self.vertical_exaggeration,
            ),
            AltitudeMode::ClampToGround => self.terrain_point(p, 0.0),
            AltitudeMode::RelativeToGround => self.terrain_point(p, p.elevation),
        }
    }

    /// Point on the terrain beneath `p`.
    pub(crate) fn ground_point(&self, p: &Position) -> DVec3 {
        self.terrain_point(p, 0.0)
    }

    fn terrain_point(&self, p: &Position, offset: f64) -> DVec3 {
        self.terrain
            .as_ref()
            .and_then(|t| t.surface_point(p.latitude, p.longitude, offset, self.vertical_exaggeration))
            .unwrap_or_else(|| {
                self.globe
                    .compute_point_from_position(p.latitude, p.longitude, offset)
            })
    }
}
