//! Volumetric airspace shapes and their shared rendering protocol.
//!
//! Every airspace composes an [`AirspaceBase`] for attributes, altitudes,
//! level of detail, extent caching, and cached geometry. During its render
//! pass a visible airspace generates (or reuses) its geometry for the current
//! detail level and queues an [`OrderedAirspace`] that an [`AirspaceRenderer`]
//! draws back-to-front with the other ordered renderables.

pub mod base;
pub mod box_airspace;
pub mod cylinder;
pub mod orbit;
pub mod renderer;
pub mod track;

use std::rc::Rc;

use globus_geometry::Geometry;
use globus_math::{Globe, LatLon, Position, Sphere};
use globus_render::stats::keys;
use globus_render::DrawContext;

pub use base::{AirspaceBase, AirspaceInfo};
pub use box_airspace::BoxAirspace;
pub use cylinder::PartialCappedCylinder;
pub use orbit::{Orbit, OrbitType};
pub use renderer::{AirspaceRenderer, OrderedAirspace};
pub use track::{Route, TrackAirspace};

use crate::detail::DetailLevel;
use crate::error::invalid;
use crate::ShapeError;

/// A vertex buffer and the element buffer that indexes it. The two are cached
/// separately: elements depend only on tessellation, vertices on placement.
#[derive(Clone, Debug)]
pub struct GeometryPart {
    pub vertices: Rc<Geometry>,
    pub indices: Rc<Geometry>,
}

impl GeometryPart {
    pub fn new(vertices: Rc<Geometry>, indices: Rc<Geometry>) -> Self {
        Self { vertices, indices }
    }
}

/// Everything needed to draw one airspace for one frame. Each part's vertices
/// carry their own reference center.
#[derive(Clone, Debug, Default)]
pub struct AirspaceGeometry {
    pub fill: Vec<GeometryPart>,
    pub outline: Vec<GeometryPart>,
}

impl AirspaceGeometry {
    pub fn vertex_count(&self) -> usize {
        self.fill.iter().map(|p| p.vertices.vertex_count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fill.is_empty() && self.outline.is_empty()
    }

    pub fn extend(&mut self, other: AirspaceGeometry) {
        self.fill.extend(other.fill);
        self.outline.extend(other.outline);
    }
}

/// Capabilities shared by every airspace shape.
pub trait Airspace {
    fn base(&self) -> &AirspaceBase;

    fn base_mut(&mut self) -> &mut AirspaceBase;

    /// Short type name reported with picked objects.
    fn kind(&self) -> &'static str;

    /// Location that anchors the shape; `None` until the shape is placed.
    fn reference_location(&self) -> Option<LatLon>;

    /// Locations whose lower and upper points bound the shape.
    fn extent_locations(&self, globe: &dyn Globe) -> Vec<LatLon>;

    /// Generate or fetch from the cache the geometry for one detail level.
    fn make_geometry(
        &mut self,
        dc: &DrawContext,
        level: &DetailLevel,
    ) -> Result<AirspaceGeometry, ShapeError>;

    /// Bounding sphere on the draw context's globe, cached per globe.
    fn compute_extent(&mut self, dc: &DrawContext) -> Result<Sphere, ShapeError> {
        let reference = self
            .reference_location()
            .ok_or_else(|| invalid(format!("{} has no location", self.kind())))?;
        let globe = dc.globe()?;
        let locations = self.extent_locations(globe.as_ref());
        self.base_mut().compute_extent(dc, reference, &locations)
    }

    /// Geometry for the detail level the extent selects in the current view.
    fn geometry_for_view(&mut self, dc: &DrawContext) -> Result<AirspaceGeometry, ShapeError> {
        let extent = self.compute_extent(dc)?;
        let level = self.base().select_detail_level(dc, &extent);
        self.make_geometry(dc, &level)
    }

    /// Queue the shape for the ordered-rendering phase. Returns `false` when
    /// it is hidden, unplaced, or outside the view.
    fn render(
        &mut self,
        dc: &mut DrawContext,
        renderer: &Rc<AirspaceRenderer>,
    ) -> Result<bool, ShapeError> {
        if !self.base().is_visible() {
            return Ok(false);
        }
        if self.reference_location().is_none() {
            tracing::trace!(kind = self.kind(), "airspace has no location, skipping");
            return Ok(false);
        }
        let extent = self.compute_extent(dc)?;
        if !dc.is_visible(&extent) {
            return Ok(false);
        }
        let level = self.base().select_detail_level(dc, &extent);
        let geometry = self.make_geometry(dc, &level)?;
        if geometry.is_empty() {
            return Ok(false);
        }

        dc.increment_per_frame_statistic(keys::AIRSPACE_GEOMETRY_COUNT, "Airspace geometries", 1.0);
        dc.increment_per_frame_statistic(
            keys::AIRSPACE_VERTEX_COUNT,
            "Airspace vertices",
            geometry.vertex_count() as f64,
        );

        let eye_distance = dc.view()?.eye_point().distance(extent.center);
        let reference = self
            .reference_location()
            .map(|l| Position::from_lat_lon(l, self.base().altitudes().0));
        let ordered = OrderedAirspace::new(
            Rc::clone(renderer),
            self.base().id(),
            self.kind(),
            geometry,
            self.base().active_attributes().clone(),
            eye_distance,
        )
        .with_layer(dc.current_layer())
        .with_position(reference);
        dc.add_ordered_renderable(Box::new(ordered));
        Ok(true)
    }
}
