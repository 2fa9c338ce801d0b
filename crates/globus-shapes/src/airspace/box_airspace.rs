//! A box airspace: a straight leg between two locations with independent left
//! and right widths, extruded between the lower and upper altitudes.

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec3;
use globus_geometry::{CacheKey, DrawMode, Geometry, GeometryBuilder, GeometryCache, Orientation};
use globus_math::{Angle, Globe, LatLon};
use globus_render::DrawContext;

use super::base::VertexMapper;
use super::{Airspace, AirspaceBase, AirspaceGeometry, GeometryPart};
use crate::detail::DetailLevel;
use crate::error::invalid;
use crate::ShapeError;

/// The six quadrilateral faces of a box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Face {
    Left,
    Right,
    Bottom,
    Top,
    StartCap,
    EndCap,
}

impl Face {
    /// Control vertices `[p00, p10, p01, p11]` from corners ordered
    /// `[begin-left, begin-right, end-left, end-right]`.
    fn control(self, c: &[LatLon; 4]) -> [(LatLon, f64); 4] {
        let [bl, br, el, er] = *c;
        match self {
            Face::Left => [(bl, 0.0), (el, 0.0), (bl, 1.0), (el, 1.0)],
            Face::Right => [(br, 0.0), (er, 0.0), (br, 1.0), (er, 1.0)],
            Face::Bottom => [(bl, 0.0), (el, 0.0), (br, 0.0), (er, 0.0)],
            Face::Top => [(bl, 1.0), (el, 1.0), (br, 1.0), (er, 1.0)],
            Face::StartCap => [(bl, 0.0), (br, 0.0), (bl, 1.0), (br, 1.0)],
            Face::EndCap => [(el, 0.0), (er, 0.0), (el, 1.0), (er, 1.0)],
        }
    }

    fn code(self) -> i64 {
        self as i64
    }
}

/// Straight leg airspace.
#[derive(Debug)]
pub struct BoxAirspace {
    base: AirspaceBase,
    locations: Option<[LatLon; 2]>,
    left_width: f64,
    right_width: f64,
    enable_start_cap: bool,
    enable_end_cap: bool,
    begin_corners: Option<[LatLon; 2]>,
    end_corners: Option<[LatLon; 2]>,
}

impl BoxAirspace {
    pub fn new(cache: Rc<RefCell<GeometryCache>>) -> Self {
        Self {
            base: AirspaceBase::new(cache),
            locations: None,
            left_width: 1.0,
            right_width: 1.0,
            enable_start_cap: true,
            enable_end_cap: true,
            begin_corners: None,
            end_corners: None,
        }
    }

    pub fn locations(&self) -> Option<(LatLon, LatLon)> {
        self.locations.map(|[a, b]| (a, b))
    }

    pub fn set_locations(&mut self, begin: LatLon, end: LatLon) {
        self.locations = Some([begin, end]);
        self.begin_corners = None;
        self.end_corners = None;
        self.base.set_extent_out_of_date();
    }

    /// Left and right widths in meters.
    pub fn widths(&self) -> (f64, f64) {
        (self.left_width, self.right_width)
    }

    pub fn set_widths(&mut self, left: f64, right: f64) -> Result<(), ShapeError> {
        for w in [left, right] {
            if !w.is_finite() || w < 0.0 {
                return Err(invalid(format!("box width must be non-negative, got {w}")));
            }
        }
        self.left_width = left;
        self.right_width = right;
        self.base.set_extent_out_of_date();
        Ok(())
    }

    pub fn caps(&self) -> (bool, bool) {
        (self.enable_start_cap, self.enable_end_cap)
    }

    pub fn set_enable_caps(&mut self, start: bool, end: bool) {
        self.enable_start_cap = start;
        self.enable_end_cap = end;
    }

    /// Corners before any joining, ordered `[begin-left, begin-right,
    /// end-left, end-right]`.
    pub fn standard_corners(&self, globe: &dyn Globe) -> Option<[LatLon; 4]> {
        let [begin, end] = self.locations?;
        let radius = globe.radius();
        let forward = LatLon::great_circle_azimuth(begin, end);
        let back = LatLon::great_circle_azimuth(end, begin);
        let quarter = Angle::from_degrees(90.0);
        let left = Angle::from_radians(self.left_width / radius);
        let right = Angle::from_radians(self.right_width / radius);
        Some([
            LatLon::great_circle_end_position(begin, forward - quarter, left),
            LatLon::great_circle_end_position(begin, forward + quarter, right),
            LatLon::great_circle_end_position(end, back + quarter, left),
            LatLon::great_circle_end_position(end, back - quarter, right),
        ])
    }

    /// Corners with any joined overrides applied.
    pub fn corners(&self, globe: &dyn Globe) -> Option<[LatLon; 4]> {
        let mut c = self.standard_corners(globe)?;
        if let Some([l, r]) = self.begin_corners {
            c[0] = l;
            c[1] = r;
        }
        if let Some([l, r]) = self.end_corners {
            c[2] = l;
            c[3] = r;
        }
        Some(c)
    }

    /// Replace the begin-edge corners `[left, right]`, e.g. where a track
    /// joins this leg to the previous one.
    pub(crate) fn set_begin_corners(&mut self, corners: Option<[LatLon; 2]>) {
        if self.begin_corners != corners {
            self.begin_corners = corners;
            self.base.set_extent_out_of_date();
        }
    }

    pub(crate) fn set_end_corners(&mut self, corners: Option<[LatLon; 2]>) {
        if self.end_corners != corners {
            self.end_corners = corners;
            self.base.set_extent_out_of_date();
        }
    }

    /// Faces to draw. An end joined to a neighbouring leg has no cap.
    fn faces(&self) -> Vec<Face> {
        let mut faces = vec![Face::Left, Face::Right, Face::Bottom, Face::Top];
        if self.enable_start_cap && self.begin_corners.is_none() {
            faces.push(Face::StartCap);
        }
        if self.enable_end_cap && self.end_corners.is_none() {
            faces.push(Face::EndCap);
        }
        faces
    }
}

/// Orientation that makes a face's triangles point away from `center`.
fn face_orientation(mapper: &mut VertexMapper<'_>, control: [(LatLon, f64); 4], center: DVec3) -> Orientation {
    let [a, b, c, d] = control.map(|(l, z)| mapper.point(l, z));
    let normal = (b - a).cross(c - a);
    let face_center = (a + b + c + d) / 4.0;
    if normal.dot(face_center - center) < 0.0 {
        Orientation::Inside
    } else {
        Orientation::Outside
    }
}

impl Airspace for BoxAirspace {
    fn base(&self) -> &AirspaceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AirspaceBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "Box"
    }

    fn reference_location(&self) -> Option<LatLon> {
        self.locations.map(|[begin, _]| begin)
    }

    fn extent_locations(&self, globe: &dyn Globe) -> Vec<LatLon> {
        let Some(corners) = self.corners(globe) else {
            return Vec::new();
        };
        let mut out = corners.to_vec();
        for (a, b) in [(corners[0], corners[2]), (corners[1], corners[3])] {
            out.push(LatLon::interpolate_great_circle(0.5, a, b));
        }
        out
    }

    fn make_geometry(
        &mut self,
        dc: &DrawContext,
        level: &DetailLevel,
    ) -> Result<AirspaceGeometry, ShapeError> {
        let globe = dc.globe()?;
        let (corners, reference) = match (self.corners(globe.as_ref()), self.reference_location()) {
            (Some(c), Some(r)) => (c, r),
            _ => return Err(invalid("box has no locations")),
        };
        let terrain_enabled = !level.disable_terrain_conformance;
        let pillars = level.pillars.max(1);
        let stacks = level.stacks.max(1);
        let stamp = AirspaceBase::frame_stamp(dc)?;
        let reference_center = self.base.reference_center(globe.as_ref(), reference);

        let face_list = self.faces();
        let faces: Vec<(Face, Orientation)> = {
            let mut mapper = self.base.vertex_mapper(dc, reference, terrain_enabled)?;
            let center = corners
                .iter()
                .map(|c| mapper.point(*c, 0.5))
                .sum::<DVec3>()
                / 4.0;
            face_list
                .into_iter()
                .map(|f| (f, face_orientation(&mut mapper, f.control(&corners), center)))
                .collect()
        };

        let mut geometry = AirspaceGeometry::default();
        for (face, orientation) in faces {
            let control = face.control(&corners);
            let builder = GeometryBuilder::with_orientation(orientation);
            let inside = orientation == Orientation::Inside;

            let mut key = CacheKey::new("Box.vertices").int(face.code());
            for (location, _) in control {
                key = key.lat_lon(location);
            }
            let key = self
                .base
                .altitude_key(key)
                .int(i64::from(pillars))
                .int(i64::from(stacks))
                .flag(terrain_enabled)
                .flag(inside);
            let vertices = self.base.cached_vertices(key, &stamp, |base| {
                let mut mapper = base.vertex_mapper(dc, reference, terrain_enabled)?;
                let points = mapper.map_bilinear(control, pillars, stacks)?;
                let indices = builder.bilinear_surface_indices(pillars, stacks);
                let normals = builder.compute_normals(&points, &indices);
                let geometry = Geometry::from_points(&points, reference_center)
                    .with_normals(&normals)
                    .with_mode(DrawMode::Triangles);
                Ok((geometry, mapper.is_terrain_conforming()))
            })?;

            let fill = self.base.cached_indices(
                CacheKey::new("Box.indices")
                    .int(i64::from(pillars))
                    .int(i64::from(stacks))
                    .flag(inside),
                DrawMode::Triangles,
                || builder.bilinear_surface_indices(pillars, stacks),
            );
            let outline = self.base.cached_indices(
                CacheKey::new("Box.outline")
                    .int(i64::from(pillars))
                    .int(i64::from(stacks)),
                DrawMode::Lines,
                || builder.grid_outline_indices(pillars, stacks),
            );
            geometry.fill.push(GeometryPart::new(Rc::clone(&vertices), fill));
            geometry.outline.push(GeometryPart::new(vertices, outline));
        }
        Ok(geometry)
    }
}
