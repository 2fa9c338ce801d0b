//! State and bookkeeping shared by every airspace shape.
//!
//! Each airspace composes one [`AirspaceBase`]: attributes, altitudes and their
//! datums, level-of-detail tiers, the injected geometry cache, per-globe
//! extents, and the per-frame elevation memo.

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec3;
use globus_geometry::{CacheKey, DrawMode, ExpiryPolicy, Geometry, GeometryBuilder, GeometryCache};
use globus_math::{Angle, Globe, GlobeStateKey, LatLon, Sphere};
use globus_render::{DrawContext, ElevationLookup, ObjectId, Terrain};
use rustc_hash::FxHashMap;

use crate::detail::{self, DetailLevel};
use crate::error::invalid;
use crate::{AltitudeDatum, ShapeAttributes, ShapeError};

/// Derived state of an airspace for one globe.
#[derive(Clone, Debug)]
pub struct AirspaceInfo {
    pub globe_key: GlobeStateKey,
    pub vertical_exaggeration: f64,
    pub extent: Sphere,
    pub minimal_geometry: Vec<DVec3>,
}

impl AirspaceInfo {
    fn is_valid(&self, globe_key: GlobeStateKey, vertical_exaggeration: f64) -> bool {
        self.globe_key == globe_key && self.vertical_exaggeration == vertical_exaggeration
    }
}

/// How one altitude picks up terrain elevation.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Conformance {
    None,
    /// Every vertex uses this elevation.
    Fixed(f64),
    /// Each vertex uses the terrain elevation beneath it.
    PerVertex,
}

/// Maps `(location, altitude fraction)` pairs to model points for one
/// regeneration of an airspace's vertices.
pub(crate) struct VertexMapper<'a> {
    globe: Rc<dyn Globe>,
    terrain: Option<Rc<dyn Terrain>>,
    lookup: &'a mut ElevationLookup,
    vertical_exaggeration: f64,
    altitudes: [f64; 2],
    conformance: [Conformance; 2],
}

impl VertexMapper<'_> {
    fn elevation(&mut self, location: LatLon) -> f64 {
        match &self.terrain {
            Some(t) => self
                .lookup
                .elevation(t.as_ref(), location, self.vertical_exaggeration),
            None => 0.0,
        }
    }

    fn height_at(&mut self, index: usize, location: LatLon) -> f64 {
        let offset = match self.conformance[index] {
            Conformance::None => 0.0,
            Conformance::Fixed(e) => e,
            Conformance::PerVertex => self.elevation(location),
        };
        self.altitudes[index] + offset
    }

    /// Height above the ellipsoid of a vertex a fraction `z` of the way from
    /// the lower to the upper altitude.
    pub(crate) fn height(&mut self, location: LatLon, z: f64) -> f64 {
        let lower = self.height_at(0, location);
        if z <= 0.0 {
            return lower;
        }
        let upper = self.height_at(1, location);
        lower + (upper - lower) * z
    }

    pub(crate) fn point(&mut self, location: LatLon, z: f64) -> DVec3 {
        let h = self.height(location, z);
        self.globe
            .compute_point_from_position(location.latitude, location.longitude, h)
    }

    /// Whether any vertex follows terrain, which makes generated vertices
    /// expire over time.
    pub(crate) fn is_terrain_conforming(&self) -> bool {
        self.conformance.contains(&Conformance::PerVertex)
    }

    /// Model points of local east/north/fraction template vertices placed
    /// around `center`.
    pub(crate) fn map_template(&mut self, center: LatLon, template: &[DVec3]) -> Vec<DVec3> {
        let radius = self.globe.radius();
        template
            .iter()
            .map(|t| {
                let location = template_location(center, *t, radius);
                self.point(location, t.z)
            })
            .collect()
    }

    /// Model points of a bilinear face between four `(location, fraction)`
    /// control vertices ordered `[p00, p10, p01, p11]`.
    pub(crate) fn map_bilinear(
        &mut self,
        control: [(LatLon, f64); 4],
        u_stacks: u32,
        v_stacks: u32,
    ) -> Result<Vec<DVec3>, ShapeError> {
        let builder = GeometryBuilder::new();
        let surface = control.map(|(l, _)| {
            self.globe
                .compute_point_from_position(l.latitude, l.longitude, 0.0)
        });
        let fractions = control.map(|(_, z)| DVec3::new(z, 0.0, 0.0));
        let points = builder.bilinear_surface(&surface, u_stacks, v_stacks)?;
        let zs = builder.bilinear_surface(&fractions, u_stacks, v_stacks)?;
        Ok(points
            .into_iter()
            .zip(zs)
            .map(|(p, z)| {
                let location = self.globe.compute_position_from_point(p).lat_lon();
                self.point(location, z.x)
            })
            .collect())
    }
}

/// Location of a template vertex `x` meters east and `y` meters north of
/// `center`, measured along the great circle.
pub(crate) fn template_location(center: LatLon, template: DVec3, radius: f64) -> LatLon {
    let distance = template.x.hypot(template.y);
    if distance == 0.0 {
        return center;
    }
    LatLon::great_circle_end_position(
        center,
        Angle::from_radians(template.x.atan2(template.y)),
        Angle::from_radians(distance / radius),
    )
}

/// Where a template-built part is placed and how it conforms.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placement {
    pub center: LatLon,
    pub reference: LatLon,
    pub reference_center: DVec3,
    pub terrain_enabled: bool,
}

/// Validity context stamped onto vertex geometry.
pub(crate) struct FrameStamp {
    pub now_ms: u64,
    pub globe_key: GlobeStateKey,
    pub vertical_exaggeration: f64,
}

/// Common airspace state.
pub struct AirspaceBase {
    id: ObjectId,
    attributes: ShapeAttributes,
    highlight_attributes: ShapeAttributes,
    highlighted: bool,
    visible: bool,
    altitudes: [f64; 2],
    datums: [AltitudeDatum; 2],
    ground_reference: Option<LatLon>,
    enable_level_of_detail: bool,
    detail_levels: Vec<DetailLevel>,
    expiry: ExpiryPolicy,
    cache: Rc<RefCell<GeometryCache>>,
    infos: FxHashMap<u64, AirspaceInfo>,
    elevations: ElevationLookup,
    elevations_frame: Option<u64>,
}

impl std::fmt::Debug for AirspaceBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirspaceBase")
            .field("id", &self.id)
            .field("altitudes", &self.altitudes)
            .field("datums", &self.datums)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

impl AirspaceBase {
    pub fn new(cache: Rc<RefCell<GeometryCache>>) -> Self {
        Self {
            id: ObjectId::next(),
            attributes: ShapeAttributes::default(),
            highlight_attributes: ShapeAttributes::highlight(),
            highlighted: false,
            visible: true,
            altitudes: [0.0, 1.0],
            datums: [AltitudeDatum::AboveMeanSeaLevel; 2],
            ground_reference: None,
            enable_level_of_detail: true,
            detail_levels: detail::default_detail_levels(),
            expiry: ExpiryPolicy::default(),
            cache,
            infos: FxHashMap::default(),
            elevations: ElevationLookup::new(),
            elevations_frame: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn attributes(&self) -> &ShapeAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut ShapeAttributes {
        &mut self.attributes
    }

    pub fn set_highlight_attributes(&mut self, attributes: ShapeAttributes) {
        self.highlight_attributes = attributes;
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    /// Attributes to draw with this frame.
    pub fn active_attributes(&self) -> &ShapeAttributes {
        if self.highlighted {
            &self.highlight_attributes
        } else {
            &self.attributes
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Lower and upper altitude in meters.
    pub fn altitudes(&self) -> (f64, f64) {
        (self.altitudes[0], self.altitudes[1])
    }

    pub fn set_altitudes(&mut self, lower: f64, upper: f64) -> Result<(), ShapeError> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(invalid(format!("altitudes must be finite, got {lower} and {upper}")));
        }
        self.altitudes = [lower, upper];
        self.set_extent_out_of_date();
        Ok(())
    }

    pub fn datums(&self) -> (AltitudeDatum, AltitudeDatum) {
        (self.datums[0], self.datums[1])
    }

    pub fn set_altitude_datums(&mut self, lower: AltitudeDatum, upper: AltitudeDatum) {
        self.datums = [lower, upper];
        self.set_extent_out_of_date();
    }

    /// Shorthand for above-ground (`true`) or above-sea-level datums.
    pub fn set_terrain_conforming(&mut self, lower: bool, upper: bool) {
        let datum = |conforming: bool| {
            if conforming {
                AltitudeDatum::AboveGroundLevel
            } else {
                AltitudeDatum::AboveMeanSeaLevel
            }
        };
        self.set_altitude_datums(datum(lower), datum(upper));
    }

    pub fn is_terrain_conforming(&self) -> (bool, bool) {
        (self.datums[0].uses_terrain(), self.datums[1].uses_terrain())
    }

    pub fn ground_reference(&self) -> Option<LatLon> {
        self.ground_reference
    }

    pub fn set_ground_reference(&mut self, location: Option<LatLon>) {
        self.ground_reference = location;
        self.set_extent_out_of_date();
    }

    pub fn enable_level_of_detail(&self) -> bool {
        self.enable_level_of_detail
    }

    pub fn set_enable_level_of_detail(&mut self, enable: bool) {
        self.enable_level_of_detail = enable;
    }

    pub fn detail_levels(&self) -> &[DetailLevel] {
        &self.detail_levels
    }

    pub fn set_detail_levels(&mut self, mut levels: Vec<DetailLevel>) -> Result<(), ShapeError> {
        if levels.is_empty() {
            return Err(invalid("detail levels are empty"));
        }
        detail::sort_detail_levels(&mut levels);
        self.detail_levels = levels;
        Ok(())
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry
    }

    pub fn set_expiry_policy(&mut self, policy: ExpiryPolicy) {
        self.expiry = policy;
    }

    pub fn cache(&self) -> &Rc<RefCell<GeometryCache>> {
        &self.cache
    }

    /// Drop per-globe derived state; called whenever a defining parameter changes.
    pub fn set_extent_out_of_date(&mut self) {
        self.infos.clear();
    }

    /// Derived state for the draw context's current globe, if still valid.
    pub fn info(&self, dc: &DrawContext) -> Option<&AirspaceInfo> {
        let key = dc.globe_state_key().ok()?;
        self.infos
            .get(&key.globe_id)
            .filter(|i| i.is_valid(key, dc.vertical_exaggeration()))
    }

    /// Point the shape's vertices are stored relative to: the reference
    /// location at the lower altitude, ignoring terrain.
    pub(crate) fn reference_center(&self, globe: &dyn Globe, location: LatLon) -> DVec3 {
        globe.compute_point_from_position(location.latitude, location.longitude, self.altitudes[0])
    }

    pub(crate) fn altitude_key(&self, key: CacheKey) -> CacheKey {
        let mut key = key
            .float(self.altitudes[0])
            .float(self.altitudes[1])
            .int(self.datums[0].code())
            .int(self.datums[1].code());
        if let Some(g) = self.ground_reference {
            key = key.lat_lon(g);
        }
        key
    }

    /// Level of detail for an extent of the given on-screen size.
    pub fn select_detail_level(&self, dc: &DrawContext, extent: &Sphere) -> DetailLevel {
        let finest = || {
            self.detail_levels
                .first()
                .cloned()
                .unwrap_or_else(|| DetailLevel::new(0.0))
        };
        if !self.enable_level_of_detail {
            return finest();
        }
        let Ok(view) = dc.view() else {
            return finest();
        };
        let size = detail::screen_size_of(view.as_ref(), extent);
        detail::select_detail_level(&self.detail_levels, size)
            .cloned()
            .unwrap_or_else(finest)
    }

    /// A vertex mapper for the current frame. `reference` supplies the ground
    /// elevation when terrain conformance is disabled at coarse detail.
    pub(crate) fn vertex_mapper(
        &mut self,
        dc: &DrawContext,
        reference: LatLon,
        terrain_enabled: bool,
    ) -> Result<VertexMapper<'_>, ShapeError> {
        let globe = dc.globe()?;
        let terrain = dc.terrain().ok();
        let vertical_exaggeration = dc.vertical_exaggeration();
        if self.elevations_frame != Some(dc.frame_number()) {
            self.elevations.clear();
            self.elevations_frame = Some(dc.frame_number());
        }

        let mut fixed = |location: LatLon| match &terrain {
            Some(t) => self
                .elevations
                .elevation(t.as_ref(), location, vertical_exaggeration),
            None => 0.0,
        };
        let mut conformance = [Conformance::None; 2];
        for (i, datum) in self.datums.iter().enumerate() {
            conformance[i] = match datum {
                AltitudeDatum::AboveMeanSeaLevel => Conformance::None,
                AltitudeDatum::AboveGroundLevel if terrain_enabled => Conformance::PerVertex,
                AltitudeDatum::AboveGroundLevel => Conformance::Fixed(fixed(reference)),
                AltitudeDatum::AboveGroundReference => {
                    Conformance::Fixed(fixed(self.ground_reference.unwrap_or(reference)))
                }
            };
        }

        Ok(VertexMapper {
            globe,
            terrain,
            lookup: &mut self.elevations,
            vertical_exaggeration,
            altitudes: self.altitudes,
            conformance,
        })
    }

    /// Extent for the current globe, recomputed from `locations` when stale.
    pub(crate) fn compute_extent(
        &mut self,
        dc: &DrawContext,
        reference: LatLon,
        locations: &[LatLon],
    ) -> Result<Sphere, ShapeError> {
        if let Some(info) = self.info(dc) {
            return Ok(info.extent);
        }
        let mut mapper = self.vertex_mapper(dc, reference, true)?;
        let minimal_geometry: Vec<DVec3> = locations
            .iter()
            .flat_map(|l| [(*l, 0.0), (*l, 1.0)])
            .map(|(l, z)| mapper.point(l, z))
            .collect();
        self.store_extent(dc, minimal_geometry)
    }

    /// Cache the sphere bounding `minimal_geometry` as the extent for the
    /// current globe and exaggeration.
    pub(crate) fn store_extent(
        &mut self,
        dc: &DrawContext,
        minimal_geometry: Vec<DVec3>,
    ) -> Result<Sphere, ShapeError> {
        let globe_key = dc.globe_state_key()?;
        let extent = Sphere::from_points(&minimal_geometry)
            .ok_or_else(|| invalid("airspace has no locations"))?;
        self.infos.insert(
            globe_key.globe_id,
            AirspaceInfo {
                globe_key,
                vertical_exaggeration: dc.vertical_exaggeration(),
                extent,
                minimal_geometry,
            },
        );
        Ok(extent)
    }

    pub(crate) fn frame_stamp(dc: &DrawContext) -> Result<FrameStamp, ShapeError> {
        Ok(FrameStamp {
            now_ms: dc.frame_timestamp(),
            globe_key: dc.globe_state_key()?,
            vertical_exaggeration: dc.vertical_exaggeration(),
        })
    }

    /// Element geometry from the cache, generated on a miss. Element buffers
    /// depend only on tessellation counts and orientation, so they never expire.
    pub(crate) fn cached_indices(
        &self,
        key: CacheKey,
        mode: DrawMode,
        make: impl FnOnce() -> Vec<u32>,
    ) -> Rc<Geometry> {
        let mut cache = self.cache.borrow_mut();
        if let Some(g) = cache.get(&key) {
            return g;
        }
        cache.put(key, Geometry::from_indices(mode, make()), None)
    }

    /// Vertices of a template part placed around `placement.center`. `make`
    /// returns the template and the triangle indices used for its normals;
    /// it runs only on a cache miss.
    pub(crate) fn cached_template_vertices(
        &mut self,
        dc: &DrawContext,
        stamp: &FrameStamp,
        key: CacheKey,
        placement: Placement,
        make: impl FnOnce() -> Result<(Vec<DVec3>, Vec<u32>), ShapeError>,
    ) -> Result<Rc<Geometry>, ShapeError> {
        let key = self
            .altitude_key(key.lat_lon(placement.center))
            .flag(placement.terrain_enabled);
        self.cached_vertices(key, stamp, |base| {
            let (template, indices) = make()?;
            let mut mapper = base.vertex_mapper(dc, placement.reference, placement.terrain_enabled)?;
            let points = mapper.map_template(placement.center, &template);
            let normals = GeometryBuilder::new().compute_normals(&points, &indices);
            let geometry = Geometry::from_points(&points, placement.reference_center)
                .with_normals(&normals)
                .with_mode(DrawMode::Triangles);
            Ok((geometry, mapper.is_terrain_conforming()))
        })
    }

    /// Vertex geometry from the cache, regenerated when missing or expired.
    pub(crate) fn cached_vertices(
        &mut self,
        key: CacheKey,
        stamp: &FrameStamp,
        make: impl FnOnce(&mut Self) -> Result<(Geometry, bool), ShapeError>,
    ) -> Result<Rc<Geometry>, ShapeError> {
        let key = key.int(stamp.globe_key.globe_id as i64);
        if let Some(g) = self.cache.borrow_mut().get_valid(
            &key,
            stamp.now_ms,
            stamp.globe_key,
            stamp.vertical_exaggeration,
        ) {
            return Ok(g);
        }
        let (geometry, terrain_conforming) = make(self)?;
        let expiry = self.expiry.stamp(
            stamp.now_ms,
            stamp.globe_key,
            stamp.vertical_exaggeration,
            terrain_conforming,
        );
        tracing::trace!(class = key.class(), vertices = geometry.vertex_count(), "airspace vertices regenerated");
        Ok(self.cache.borrow_mut().put(key, geometry, Some(expiry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globus_math::SphericalGlobe;
    use globus_render::{GlobeTerrain, HeadlessBackend};

    fn context(globe: SphericalGlobe) -> DrawContext {
        let globe: Rc<dyn Globe> = Rc::new(globe);
        let mut dc = DrawContext::default();
        dc.set_globe(globe.clone());
        dc.set_terrain(Rc::new(GlobeTerrain::new(globe)));
        dc
    }

    fn base() -> AirspaceBase {
        AirspaceBase::new(Rc::new(RefCell::new(GeometryCache::new(1 << 20))))
    }

    /// Above-ground altitudes add the terrain elevation beneath each vertex.
    #[test]
    fn test_vertex_heights_follow_datums() {
        let dc = context(SphericalGlobe::new(1000.0).with_elevation(100.0, |l| l.latitude.degrees()));
        let mut b = base();
        b.set_altitudes(10.0, 20.0).unwrap();
        b.set_altitude_datums(AltitudeDatum::AboveGroundLevel, AltitudeDatum::AboveMeanSeaLevel);
        let reference = LatLon::from_degrees(0.0, 0.0);
        let mut mapper = b.vertex_mapper(&dc, reference, true).unwrap();
        assert!(mapper.is_terrain_conforming());
        let loc = LatLon::from_degrees(5.0, 0.0);
        assert_eq!(mapper.height(loc, 0.0), 15.0);
        assert_eq!(mapper.height(loc, 1.0), 20.0);
        assert_eq!(mapper.height(loc, 0.5), 17.5);
    }

    /// Terrain elevation under above-ground vertices is scaled by the draw
    /// context's vertical exaggeration.
    #[test]
    fn test_vertex_heights_scale_with_exaggeration() {
        let mut dc = context(SphericalGlobe::new(1000.0).with_elevation(100.0, |l| l.latitude.degrees()));
        dc.set_vertical_exaggeration(3.0);
        let mut b = base();
        b.set_altitudes(10.0, 20.0).unwrap();
        b.set_altitude_datums(AltitudeDatum::AboveGroundLevel, AltitudeDatum::AboveGroundLevel);
        let loc = LatLon::from_degrees(5.0, 0.0);
        let mut mapper = b.vertex_mapper(&dc, loc, true).unwrap();
        assert_eq!(mapper.height(loc, 0.0), 25.0);
        assert_eq!(mapper.height(loc, 1.0), 35.0);
    }

    /// The elevation memo starts over on each new frame, even one that
    /// repeats the previous frame's timestamp.
    #[test]
    fn test_elevation_memo_cleared_per_frame() {
        let mut dc = context(SphericalGlobe::new(1000.0).with_elevation(100.0, |_| 10.0));
        let gl = Rc::new(RefCell::new(HeadlessBackend::new(4, 4)));
        dc.initialize(gl.clone());
        dc.set_frame_timestamp(1_000);
        let mut b = base();
        b.set_altitude_datums(AltitudeDatum::AboveGroundLevel, AltitudeDatum::AboveGroundLevel);
        let loc = LatLon::from_degrees(1.0, 1.0);
        assert_eq!(b.vertex_mapper(&dc, loc, true).unwrap().height(loc, 0.0), 10.0);

        let higher: Rc<dyn Globe> = Rc::new(SphericalGlobe::new(1000.0).with_elevation(100.0, |_| 30.0));
        dc.set_terrain(Rc::new(GlobeTerrain::new(higher)));
        dc.initialize(gl);
        dc.set_frame_timestamp(1_000);
        assert_eq!(b.vertex_mapper(&dc, loc, true).unwrap().height(loc, 0.0), 30.0);
    }

    /// With conformance disabled every vertex uses the reference elevation.
    #[test]
    fn test_disabled_conformance_uses_reference() {
        let dc = context(SphericalGlobe::new(1000.0).with_elevation(100.0, |l| l.latitude.degrees()));
        let mut b = base();
        b.set_terrain_conforming(true, true);
        let reference = LatLon::from_degrees(2.0, 0.0);
        let mut mapper = b.vertex_mapper(&dc, reference, false).unwrap();
        assert!(!mapper.is_terrain_conforming());
        assert_eq!(mapper.height(LatLon::from_degrees(40.0, 0.0), 0.0), 2.0);
    }

    /// Extents are cached per globe and dropped when parameters change.
    #[test]
    fn test_extent_cached_until_out_of_date() {
        let dc = context(SphericalGlobe::new(1000.0));
        let mut b = base();
        let locs = [LatLon::from_degrees(0.0, 0.0), LatLon::from_degrees(0.0, 10.0)];
        let e1 = b.compute_extent(&dc, locs[0], &locs).unwrap();
        assert!(b.info(&dc).is_some());
        b.set_altitudes(0.0, 500.0).unwrap();
        assert!(b.info(&dc).is_none());
        let e2 = b.compute_extent(&dc, locs[0], &locs).unwrap();
        assert!(e2.radius > e1.radius);
        assert!(b.compute_extent(&dc, locs[0], &[]).is_ok());
    }

    #[test]
    fn test_invalid_altitudes_rejected() {
        let mut b = base();
        assert!(matches!(
            b.set_altitudes(f64::NAN, 1.0),
            Err(ShapeError::InvalidArgument(_))
        ));
        assert!(b.set_detail_levels(Vec::new()).is_err());
    }
}
