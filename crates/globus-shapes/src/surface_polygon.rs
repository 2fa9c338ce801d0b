//! Polygons draped over the terrain.
//!
//! The interior is triangulated in latitude/longitude by ear clipping and the
//! outline follows the polygon's edges along its path type, densified so long
//! edges bend with the globe.

use std::any::Any;
use std::rc::Rc;

use glam::{DVec2, DVec3};
use globus_geometry::{DrawMode, Geometry};
use globus_math::{Color, GlobeStateKey, LatLon, Sector, Sphere};
use globus_render::{
    DrawContext, LayerId, ObjectId, OrderedRenderable, PickedObject, RenderError, SurfaceObject,
    SurfaceStateKey,
};

use crate::error::invalid;
use crate::surface::{self, SurfaceItem};
use crate::{PathType, ShapeAttributes, ShapeError};

/// Outline points inserted along each edge, the edge's start included.
pub const DEFAULT_EDGE_SUBDIVISIONS: u32 = 8;

#[derive(Debug)]
struct PolygonGeometry {
    globe_key: GlobeStateKey,
    vertical_exaggeration: f64,
    interior: Rc<Geometry>,
    indices: Rc<[u32]>,
    outline: Rc<Geometry>,
    extent: Sphere,
}

/// A closed polygon of locations draped on the terrain.
#[derive(Debug)]
pub struct SurfacePolygon {
    id: ObjectId,
    locations: Vec<LatLon>,
    path_type: PathType,
    edge_subdivisions: u32,
    attributes: ShapeAttributes,
    highlight_attributes: ShapeAttributes,
    highlighted: bool,
    visible: bool,
    version: u64,
    geometry: Option<PolygonGeometry>,
}

impl SurfacePolygon {
    /// A polygon through `locations`. A closing location equal to the first
    /// is dropped.
    pub fn new(locations: impl IntoIterator<Item = LatLon>) -> Self {
        let mut attributes = ShapeAttributes::default();
        attributes.set_draw_outline(true);
        Self {
            id: ObjectId::next(),
            locations: open_ring(locations.into_iter().collect()),
            path_type: PathType::GreatCircle,
            edge_subdivisions: DEFAULT_EDGE_SUBDIVISIONS,
            attributes,
            highlight_attributes: ShapeAttributes::highlight(),
            highlighted: false,
            visible: true,
            version: 0,
            geometry: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn locations(&self) -> &[LatLon] {
        &self.locations
    }

    pub fn set_locations(&mut self, locations: impl IntoIterator<Item = LatLon>) {
        self.locations = open_ring(locations.into_iter().collect());
        self.invalidate();
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn set_path_type(&mut self, path_type: PathType) {
        self.path_type = path_type;
        self.invalidate();
    }

    pub fn edge_subdivisions(&self) -> u32 {
        self.edge_subdivisions
    }

    pub fn set_edge_subdivisions(&mut self, count: u32) -> Result<(), ShapeError> {
        if count == 0 {
            return Err(invalid("edge subdivisions must be positive"));
        }
        self.edge_subdivisions = count;
        self.invalidate();
        Ok(())
    }

    pub fn attributes(&self) -> &ShapeAttributes {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: ShapeAttributes) {
        self.attributes = attributes;
        self.version += 1;
    }

    pub fn set_highlight_attributes(&mut self, attributes: ShapeAttributes) {
        self.highlight_attributes = attributes;
        self.version += 1;
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
        self.version += 1;
    }

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

    fn invalidate(&mut self) {
        self.geometry = None;
        self.version += 1;
    }

    fn geometry_is_stale(&self, dc: &DrawContext) -> bool {
        match &self.geometry {
            Some(g) => {
                dc.globe_state_key().ok() != Some(g.globe_key)
                    || g.vertical_exaggeration != dc.vertical_exaggeration()
            }
            None => true,
        }
    }

    fn build_geometry(&self, dc: &DrawContext) -> Result<Option<PolygonGeometry>, ShapeError> {
        if self.locations.len() < 3 {
            tracing::debug!(id = self.id.0, locations = self.locations.len(), "surface polygon has too few locations");
            return Ok(None);
        }
        let Some(sector) = Sector::bounding(self.locations.iter().copied()) else {
            return Ok(None);
        };
        let globe = dc.globe()?;
        let terrain = dc.terrain().ok();
        let ve = dc.vertical_exaggeration();
        let drape = |l: LatLon| surface::draped_point(globe.as_ref(), terrain.as_deref(), ve, l);
        let center = drape(sector.centroid());

        let corners: Vec<DVec3> = self.locations.iter().map(|l| drape(*l)).collect();
        let planar: Vec<DVec2> = self
            .locations
            .iter()
            .map(|l| DVec2::new(l.longitude.degrees(), l.latitude.degrees()))
            .collect();
        let indices = triangulate(&planar);

        let n = self.edge_subdivisions;
        let mut outline = Vec::with_capacity(self.locations.len() * n as usize);
        for (i, a) in self.locations.iter().enumerate() {
            let b = self.locations[(i + 1) % self.locations.len()];
            for k in 0..n {
                let t = f64::from(k) / f64::from(n);
                outline.push(drape(self.path_type.interpolate_location(t, *a, b)));
            }
        }

        let extent = Sphere::from_points(&outline).ok_or_else(|| invalid("surface polygon outline is empty"))?;
        tracing::trace!(
            id = self.id.0,
            triangles = indices.len() / 3,
            outline = outline.len(),
            "built surface polygon geometry"
        );
        Ok(Some(PolygonGeometry {
            globe_key: dc.globe_state_key()?,
            vertical_exaggeration: dc.vertical_exaggeration(),
            interior: Rc::new(Geometry::from_points(&corners, center).with_mode(DrawMode::Triangles)),
            indices: Rc::from(indices),
            outline: Rc::new(Geometry::from_points(&outline, center).with_mode(DrawMode::LineLoop)),
            extent,
        }))
    }

    fn enqueue(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        if !self.visible {
            return Ok(());
        }
        self.pre_render(dc)?;
        let Some(geometry) = &self.geometry else {
            return Ok(());
        };
        if !dc.is_visible(&geometry.extent) {
            return Ok(());
        }
        let distance = dc
            .view()
            .map(|v| geometry.extent.distance_to(v.eye_point()))
            .unwrap_or(0.0);
        dc.add_ordered_surface_renderable(Box::new(OrderedSurfacePolygon {
            id: self.id,
            attributes: self.active_attributes().clone(),
            interior: Rc::clone(&geometry.interior),
            indices: Rc::clone(&geometry.indices),
            outline: Rc::clone(&geometry.outline),
            layer: dc.current_layer(),
            distance,
        }));
        Ok(())
    }
}

impl SurfaceObject for SurfacePolygon {
    fn pre_render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        if self.geometry_is_stale(dc) {
            self.geometry = self.build_geometry(dc)?;
        }
        Ok(())
    }

    fn state_key(&self, dc: &DrawContext) -> SurfaceStateKey {
        SurfaceStateKey {
            object: self.id,
            version: self.version,
            globe: dc.globe_state_key().ok(),
        }
    }

    fn sectors(&self, _dc: &DrawContext) -> Vec<Sector> {
        Sector::bounding(self.locations.iter().copied()).into_iter().collect()
    }

    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.enqueue(dc)
    }

    fn pick(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.enqueue(dc)
    }
}

/// A surface polygon queued for the ordered-surface phase.
pub struct OrderedSurfacePolygon {
    id: ObjectId,
    attributes: ShapeAttributes,
    interior: Rc<Geometry>,
    indices: Rc<[u32]>,
    outline: Rc<Geometry>,
    layer: Option<LayerId>,
    distance: f64,
}

impl OrderedSurfacePolygon {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl SurfaceItem for OrderedSurfacePolygon {
    fn draw(&self, dc: &mut DrawContext, pick_color: Option<Color>) -> Result<(), RenderError> {
        let a = &self.attributes;
        dc.push_reference_center(self.interior.reference_center())?;
        {
            let mut gl = dc.gl()?;
            if a.draw_interior() && !self.indices.is_empty() {
                gl.set_color(pick_color.unwrap_or_else(|| a.effective_interior_color()));
                gl.draw_elements(DrawMode::Triangles, self.interior.vertices(), None, &self.indices);
            }
            if a.draw_outline() {
                gl.set_line_width(a.outline_width() as f32);
                gl.set_color(pick_color.unwrap_or_else(|| a.effective_outline_color()));
                gl.draw_arrays(DrawMode::LineLoop, self.outline.vertices());
            }
        }
        dc.pop_reference_center()
    }

    fn picked_object(&self, color: Color) -> PickedObject {
        PickedObject::new(color.rgb_code(), self.id, self.kind()).with_layer(self.layer)
    }

    fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    fn kind(&self) -> &'static str {
        "SurfacePolygon"
    }
}

impl OrderedRenderable for OrderedSurfacePolygon {
    fn distance_from_eye(&self) -> f64 {
        self.distance
    }

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        surface::render_run(dc, self)
    }

    fn pick(&self, dc: &mut DrawContext, pick_point: Option<DVec2>) -> Result<(), RenderError> {
        surface::pick_run(dc, self, pick_point)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn open_ring(mut locations: Vec<LatLon>) -> Vec<LatLon> {
    if locations.len() > 1 && locations.first() == locations.last() {
        locations.pop();
    }
    locations
}

fn cross(o: DVec2, a: DVec2, b: DVec2) -> f64 {
    (a - o).perp_dot(b - o)
}

fn in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Triangle indices covering the simple polygon `points` by ear clipping.
/// Triangles wind counter-clockwise whatever the input winding. A polygon
/// with no remaining ear (self-intersecting input) is left partly filled.
pub(crate) fn triangulate(points: &[DVec2]) -> Vec<u32> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let area: f64 = (0..n).map(|i| points[i].perp_dot(points[(i + 1) % n])).sum();
    let mut ring: Vec<usize> = (0..n).collect();
    if area < 0.0 {
        ring.reverse();
    }

    let mut indices = Vec::with_capacity((n - 2) * 3);
    while ring.len() > 3 {
        let m = ring.len();
        let ear = (0..m).find(|&i| {
            let (a, b, c) = (ring[(i + m - 1) % m], ring[i], ring[(i + 1) % m]);
            let (pa, pb, pc) = (points[a], points[b], points[c]);
            cross(pa, pb, pc) > 0.0
                && !ring
                    .iter()
                    .filter(|&&j| j != a && j != b && j != c)
                    .any(|&j| in_triangle(points[j], pa, pb, pc))
        });
        let Some(i) = ear else {
            tracing::debug!(remaining = m, "polygon has no ear left; triangulation stopped");
            return indices;
        };
        indices.extend([ring[(i + m - 1) % m], ring[i], ring[(i + 1) % m]].map(|v| v as u32));
        ring.remove(i);
    }
    indices.extend([ring[0], ring[1], ring[2]].map(|v| v as u32));
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use crate::{ImageSource, SurfaceImage};
    use globus_math::Rect;
    use globus_render::Command;

    fn square() -> Vec<LatLon> {
        vec![
            LatLon::from_degrees(-1.0, -1.0),
            LatLon::from_degrees(-1.0, 1.0),
            LatLon::from_degrees(1.0, 1.0),
            LatLon::from_degrees(1.0, -1.0),
        ]
    }

    fn area(points: &[DVec2], indices: &[u32]) -> f64 {
        indices
            .chunks(3)
            .map(|t| cross(points[t[0] as usize], points[t[1] as usize], points[t[2] as usize]) / 2.0)
            .sum()
    }

    /// A square splits into two triangles covering its area.
    #[test]
    fn test_triangulate_square() {
        let points: Vec<DVec2> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .map(|(x, y)| DVec2::new(x, y))
            .to_vec();
        let indices = triangulate(&points);
        assert_eq!(indices.len(), 6);
        assert!((area(&points, &indices) - 1.0).abs() < 1e-12);
    }

    /// A clockwise concave polygon is covered exactly, without reflex ears.
    #[test]
    fn test_triangulate_concave_clockwise() {
        let mut points: Vec<DVec2> = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)]
            .map(|(x, y)| DVec2::new(x, y))
            .to_vec();
        points.reverse();
        let indices = triangulate(&points);
        assert_eq!(indices.len(), 12);
        assert!((area(&points, &indices) - 3.0).abs() < 1e-12);
        for t in indices.chunks(3) {
            assert!(cross(points[t[0] as usize], points[t[1] as usize], points[t[2] as usize]) > 0.0);
        }
    }

    /// A repeated closing location is dropped and sectors bound the polygon.
    #[test]
    fn test_closing_location_dropped() {
        let Frame { dc, .. } = test_support::frame();
        let mut locations = square();
        locations.push(locations[0]);
        let polygon = SurfacePolygon::new(locations);
        assert_eq!(polygon.locations().len(), 4);
        assert_eq!(polygon.sectors(&dc), vec![Sector::from_degrees(-1.0, 1.0, -1.0, 1.0)]);
    }

    /// The outline has one point per edge subdivision and the interior two triangles.
    #[test]
    fn test_geometry_counts() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut polygon = SurfacePolygon::new(square());
        polygon.set_edge_subdivisions(5).unwrap();
        polygon.pre_render(&mut dc).unwrap();
        let geometry = polygon.geometry.as_ref().unwrap();
        assert_eq!(geometry.outline.vertex_count(), 20);
        assert_eq!(geometry.indices.len(), 6);
        assert_eq!(geometry.interior.vertex_count(), 4);
        assert!(polygon.set_edge_subdivisions(0).is_err());
    }

    /// Polygons with fewer than three locations queue nothing.
    #[test]
    fn test_degenerate_polygon_skipped() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut polygon = SurfacePolygon::new(square().into_iter().take(2));
        polygon.render(&mut dc).unwrap();
        assert_eq!(dc.ordered_surface_renderable_count(), 0);
    }

    /// Surface items drain in submission order with state set up per same-type run.
    #[test]
    fn test_runs_follow_submission_order() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let image = ImageSource::new("tile", 1, 1, Rc::from(vec![0u8; 4])).unwrap();
        let mut first = SurfacePolygon::new(square());
        let mut second = SurfacePolygon::new(square());
        let mut tile = SurfaceImage::new(Sector::from_degrees(-2.0, 2.0, -2.0, 2.0), image);
        let mut last = SurfacePolygon::new(square());
        first.render(&mut dc).unwrap();
        second.render(&mut dc).unwrap();
        tile.render(&mut dc).unwrap();
        last.render(&mut dc).unwrap();
        gl.borrow_mut().take_commands();
        dc.draw_ordered_surface_renderables();
        let modes: Vec<DrawMode> = gl
            .borrow()
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::DrawElements { mode, .. } => Some(*mode),
                Command::DrawArrays { mode, .. } => Some(*mode),
                _ => None,
            })
            .collect();
        use DrawMode::{LineLoop, Triangles};
        assert_eq!(modes, vec![Triangles, LineLoop, Triangles, LineLoop, Triangles, Triangles, LineLoop]);
        let runs = gl.borrow().commands().iter().filter(|c| **c == Command::Blending(true)).count();
        assert_eq!(runs, 3);
    }

    /// The pick pass resolves the polygon under the pick point.
    #[test]
    fn test_pick_resolves_polygon() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let mut below = SurfacePolygon::new(square());
        let mut above = SurfacePolygon::new(square());
        dc.set_picking_mode(true);
        dc.set_pick_point(Some(DVec2::new(50.0, 40.0)));
        below.pick(&mut dc).unwrap();
        above.pick(&mut dc).unwrap();
        gl.borrow_mut()
            .fill_rect(Rect::new(0, 0, test_support::WIDTH, test_support::HEIGHT), 2);
        dc.draw_ordered_surface_renderables();
        let top = dc.picked_objects().top_picked_object().unwrap();
        assert_eq!(top.object, above.id());
        assert_eq!(top.kind, "SurfacePolygon");
    }
}
