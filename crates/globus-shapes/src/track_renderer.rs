//! Markers at the points of recorded tracks.
//!
//! A [`TrackRenderer`] draws one small solid (cube or cylinder) per track
//! point, sized in screen pixels so markers keep their apparent size as the
//! camera moves. The tracks themselves are only read.

use std::any::Any;
use std::rc::Rc;

use glam::{DMat3, DMat4, DVec2, DVec3};
use globus_geometry::{DrawMode, Geometry, GeometryBuilder, Orientation};
use globus_math::{Angle, Globe, LatLon, Position, Sphere};
use globus_render::{
    DrawContext, LayerId, ObjectId, OrderedRenderable, PickSupport, PickedObject, RenderError,
};

use crate::error::invalid;
use crate::{ShapeAttributes, ShapeError};

pub const DEFAULT_MARKER_PIXELS: f64 = 8.0;
/// Smallest marker size in meters.
pub const DEFAULT_MIN_MARKER_SIZE: f64 = 3.0;
const CYLINDER_SLICES: u32 = 16;

/// One recorded point of a track.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
    position: Position,
    /// Milliseconds since the Unix epoch, when recorded.
    time: Option<u64>,
}

impl TrackPoint {
    pub fn new(position: Position) -> Self {
        Self { position, time: None }
    }

    pub fn with_time(mut self, time_ms: u64) -> Self {
        self.time = Some(time_ms);
        self
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn time(&self) -> Option<u64> {
        self.time
    }
}

/// An uninterrupted run of track points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackSegment {
    points: Vec<TrackPoint>,
}

impl TrackSegment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }
}

/// A named track made of segments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    name: String,
    segments: Vec<TrackSegment>,
}

impl Track {
    pub fn new(name: impl Into<String>, segments: Vec<TrackSegment>) -> Self {
        Self {
            name: name.into(),
            segments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// Every point of every segment in order.
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.segments.iter().flat_map(|s| s.points.iter())
    }

    pub fn num_points(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }
}

/// Solid drawn at each track point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarkerShape {
    #[default]
    Cube,
    Cylinder,
}

/// Unit-sized marker mesh centered on the origin with its axis along +z.
#[derive(Debug)]
struct MarkerMesh {
    geometry: Geometry,
    indices: Vec<u32>,
}

impl MarkerMesh {
    fn new(shape: MarkerShape) -> Result<Self, ShapeError> {
        let outside = GeometryBuilder::new();
        let (points, indices) = match shape {
            MarkerShape::Cube => (outside.unit_box(), outside.unit_box_indices()),
            MarkerShape::Cylinder => {
                let inside = GeometryBuilder::with_orientation(Orientation::Inside);
                let (n, full) = (CYLINDER_SLICES, Angle::from_degrees(360.0));
                let shift = |z: f64| move |p: DVec3| DVec3::new(p.x, p.y, p.z + z);

                let mut points: Vec<DVec3> = outside
                    .partial_cylinder(0.5, n, 1, Angle::ZERO, full)?
                    .into_iter()
                    .map(shift(-0.5))
                    .collect();
                let mut indices = outside.partial_cylinder_indices(n, 1);

                let top = points.len() as u32;
                points.extend(outside.partial_disk(0.0, 0.5, n, 1, Angle::ZERO, full)?.into_iter().map(shift(0.5)));
                indices.extend(outside.partial_disk_indices(n, 1).into_iter().map(|i| i + top));

                let bottom = points.len() as u32;
                points.extend(inside.partial_disk(0.0, 0.5, n, 1, Angle::ZERO, full)?.into_iter().map(shift(-0.5)));
                indices.extend(inside.partial_disk_indices(n, 1).into_iter().map(|i| i + bottom));
                (points, indices)
            }
        };
        let normals = outside.compute_normals(&points, &indices);
        Ok(Self {
            geometry: Geometry::from_points(&points, DVec3::ZERO)
                .with_normals(&normals)
                .with_mode(DrawMode::Triangles),
            indices,
        })
    }
}

/// Draws track point markers between client index limits.
#[derive(Debug)]
pub struct TrackRenderer {
    id: ObjectId,
    lower_limit: usize,
    upper_limit: usize,
    elevation: Option<f64>,
    marker_pixels: f64,
    min_marker_size: f64,
    shape: MarkerShape,
    attributes: ShapeAttributes,
    mesh: Option<Rc<MarkerMesh>>,
}

impl Default for TrackRenderer {
    fn default() -> Self {
        Self {
            id: ObjectId::next(),
            lower_limit: 0,
            upper_limit: usize::MAX,
            elevation: None,
            marker_pixels: DEFAULT_MARKER_PIXELS,
            min_marker_size: DEFAULT_MIN_MARKER_SIZE,
            shape: MarkerShape::default(),
            attributes: ShapeAttributes::default(),
            mesh: None,
        }
    }
}

impl TrackRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn lower_limit(&self) -> usize {
        self.lower_limit
    }

    /// First point index (across all tracks) that is drawn.
    pub fn set_lower_limit(&mut self, index: usize) -> Result<(), ShapeError> {
        if index > self.upper_limit {
            return Err(invalid(format!(
                "lower limit {index} is above the upper limit {}",
                self.upper_limit
            )));
        }
        self.lower_limit = index;
        Ok(())
    }

    pub fn upper_limit(&self) -> usize {
        self.upper_limit
    }

    /// Last point index (across all tracks) that is drawn.
    pub fn set_upper_limit(&mut self, index: usize) -> Result<(), ShapeError> {
        if index < self.lower_limit {
            return Err(invalid(format!(
                "upper limit {index} is below the lower limit {}",
                self.lower_limit
            )));
        }
        self.upper_limit = index;
        Ok(())
    }

    /// Elevation used for every marker instead of the points' own.
    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    pub fn set_elevation(&mut self, elevation: Option<f64>) {
        self.elevation = elevation;
    }

    pub fn marker_pixels(&self) -> f64 {
        self.marker_pixels
    }

    pub fn set_marker_pixels(&mut self, pixels: f64) -> Result<(), ShapeError> {
        if pixels.is_nan() || pixels <= 0.0 {
            return Err(invalid(format!("marker pixels must be positive, got {pixels}")));
        }
        self.marker_pixels = pixels;
        Ok(())
    }

    pub fn min_marker_size(&self) -> f64 {
        self.min_marker_size
    }

    pub fn set_min_marker_size(&mut self, meters: f64) -> Result<(), ShapeError> {
        if meters.is_nan() || meters < 0.0 {
            return Err(invalid(format!("minimum marker size must not be negative, got {meters}")));
        }
        self.min_marker_size = meters;
        Ok(())
    }

    pub fn shape(&self) -> MarkerShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: MarkerShape) {
        if shape != self.shape {
            self.shape = shape;
            self.mesh = None;
        }
    }

    pub fn attributes(&self) -> &ShapeAttributes {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: ShapeAttributes) {
        self.attributes = attributes;
    }

    fn mesh(&mut self) -> Result<Rc<MarkerMesh>, ShapeError> {
        if let Some(mesh) = &self.mesh {
            return Ok(Rc::clone(mesh));
        }
        let mesh = Rc::new(MarkerMesh::new(self.shape)?);
        self.mesh = Some(Rc::clone(&mesh));
        Ok(mesh)
    }

    /// Queue the visible markers of `tracks` within the index limits. Returns
    /// the number of markers queued.
    pub fn render(&mut self, dc: &mut DrawContext, tracks: &[Track]) -> Result<usize, ShapeError> {
        let view = dc.view()?;
        let globe = dc.globe()?;
        let ve = dc.vertical_exaggeration();
        let eye = view.eye_point();

        let mut markers = Vec::new();
        let points = tracks.iter().flat_map(Track::points).enumerate();
        for (index, point) in points.skip(self.lower_limit) {
            if index > self.upper_limit {
                break;
            }
            let position = point.position;
            let height = self.elevation.unwrap_or(position.elevation) * ve;
            let center = globe.compute_point_from_position(position.latitude, position.longitude, height);
            let distance = eye.distance(center);
            let size = (self.marker_pixels * view.compute_pixel_size_at_distance(distance)).max(self.min_marker_size);
            if !dc.is_visible(&Sphere::new(center, size)) {
                continue;
            }
            markers.push(Marker {
                position,
                transform: marker_transform(globe.as_ref(), position.lat_lon(), center, size),
                distance,
            });
        }
        if markers.is_empty() {
            tracing::trace!(id = self.id.0, "no track markers in view");
            return Ok(0);
        }

        let count = markers.len();
        let distance = markers.iter().map(|m| m.distance).fold(f64::INFINITY, f64::min);
        dc.add_ordered_renderable(Box::new(OrderedTrackMarkers {
            id: self.id,
            markers,
            mesh: self.mesh()?,
            attributes: self.attributes.clone(),
            layer: dc.current_layer(),
            distance,
        }));
        Ok(count)
    }
}

/// Local east/north/up frame at `location`, placed at `center` and scaled to `size`.
fn marker_transform(globe: &dyn Globe, location: LatLon, center: DVec3, size: f64) -> DMat4 {
    let up = globe.surface_normal_at_location(location);
    let east = DVec3::Y.cross(up).try_normalize().unwrap_or(DVec3::X);
    let north = up.cross(east);
    DMat4::from_translation(center) * DMat4::from_mat3(DMat3::from_cols(east, north, up)) * DMat4::from_scale(DVec3::splat(size))
}

#[derive(Clone, Debug)]
struct Marker {
    position: Position,
    /// Local frame scaled to the marker size, in model coordinates.
    transform: DMat4,
    distance: f64,
}

/// Track markers captured for the ordered-rendering phase.
pub struct OrderedTrackMarkers {
    id: ObjectId,
    markers: Vec<Marker>,
    mesh: Rc<MarkerMesh>,
    attributes: ShapeAttributes,
    layer: Option<LayerId>,
    distance: f64,
}

impl OrderedTrackMarkers {
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    fn draw(&self, dc: &mut DrawContext, mut pick: Option<&mut PickSupport>) -> Result<(), RenderError> {
        let modelview = dc.view()?.modelview();
        {
            let mut gl = dc.gl()?;
            gl.set_depth_test(true);
            gl.set_depth_mask(true);
            if pick.is_none() {
                gl.set_blending(true);
                gl.set_lighting(self.attributes.enable_lighting());
                gl.set_color(self.attributes.effective_interior_color());
            }
        }
        for marker in &self.markers {
            let pick_color = match pick.as_deref_mut() {
                Some(support) => {
                    let color = dc.unique_pick_color();
                    support.add_pickable_object(
                        PickedObject::new(color.rgb_code(), self.id, "TrackPoint")
                            .with_layer(self.layer)
                            .with_position(marker.position),
                    );
                    Some(color)
                }
                None => None,
            };
            let mut gl = dc.gl()?;
            if let Some(color) = pick_color {
                gl.set_color(color);
            }
            gl.load_modelview(modelview * marker.transform);
            gl.draw_elements(
                DrawMode::Triangles,
                self.mesh.geometry.vertices(),
                self.mesh.geometry.normals(),
                &self.mesh.indices,
            );
        }
        let mut gl = dc.gl()?;
        gl.load_modelview(modelview);
        gl.set_lighting(false);
        gl.set_blending(false);
        Ok(())
    }
}

impl OrderedRenderable for OrderedTrackMarkers {
    fn distance_from_eye(&self) -> f64 {
        self.distance
    }

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.draw(dc, None)
    }

    fn pick(&self, dc: &mut DrawContext, pick_point: Option<DVec2>) -> Result<(), RenderError> {
        let mut support = PickSupport::new();
        self.draw(dc, Some(&mut support))?;
        support.resolve_pick(dc, pick_point, self.layer)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use globus_math::Rect;
    use globus_render::Command;

    fn track(count: usize) -> Track {
        let points = (0..count)
            .map(|i| TrackPoint::new(Position::from_degrees(0.0, i as f64 * 0.1, 0.0)).with_time(i as u64))
            .collect();
        Track::new("run", vec![TrackSegment::new(points)])
    }

    fn queued(dc: &mut DrawContext) -> Box<dyn OrderedRenderable> {
        dc.poll_ordered_renderable().unwrap()
    }

    fn markers(item: &dyn OrderedRenderable) -> &OrderedTrackMarkers {
        item.as_any().downcast_ref::<OrderedTrackMarkers>().unwrap()
    }

    fn size(marker: &Marker) -> f64 {
        marker.transform.x_axis.truncate().length()
    }

    /// Only points between the lower and upper limit are drawn.
    #[test]
    fn test_index_limits() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut renderer = TrackRenderer::new();
        renderer.set_upper_limit(5).unwrap();
        renderer.set_lower_limit(2).unwrap();
        let tracks = [track(10)];
        assert_eq!(renderer.render(&mut dc, &tracks).unwrap(), 4);
        let item = queued(&mut dc);
        let first = &markers(item.as_ref()).markers[0];
        assert!((first.position.longitude.degrees() - 0.2).abs() < 1e-9);
        assert!(renderer.set_lower_limit(6).is_err());
        assert!(renderer.set_upper_limit(1).is_err());
    }

    /// Limits count points across every track and segment.
    #[test]
    fn test_limits_span_tracks() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut renderer = TrackRenderer::new();
        renderer.set_lower_limit(3).unwrap();
        let tracks = [track(2), track(4)];
        assert_eq!(tracks[1].num_points(), 4);
        assert_eq!(renderer.render(&mut dc, &tracks).unwrap(), 3);
    }

    /// Markers keep a fixed pixel size and respect the minimum size.
    #[test]
    fn test_marker_size_in_pixels() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut renderer = TrackRenderer::new();
        renderer.render(&mut dc, &[track(1)]).unwrap();
        let item = queued(&mut dc);
        let view = dc.view().unwrap();
        let expected = 8.0 * view.compute_pixel_size_at_distance(1_000_000.0);
        assert!((size(&markers(item.as_ref()).markers[0]) - expected).abs() < 1.0);

        renderer.set_marker_pixels(1e-6).unwrap();
        renderer.set_min_marker_size(50.0).unwrap();
        renderer.render(&mut dc, &[track(1)]).unwrap();
        let item = queued(&mut dc);
        assert!((size(&markers(item.as_ref()).markers[0]) - 50.0).abs() < 1e-9);
        assert!(renderer.set_marker_pixels(0.0).is_err());
    }

    /// The elevation override replaces the points' own elevation.
    #[test]
    fn test_elevation_override() {
        let Frame { mut dc, globe, .. } = test_support::frame();
        let mut renderer = TrackRenderer::new();
        renderer.set_elevation(Some(5_000.0));
        dc.set_vertical_exaggeration(2.0);
        renderer.render(&mut dc, &[track(1)]).unwrap();
        let item = queued(&mut dc);
        let center = markers(item.as_ref()).markers[0].transform.w_axis.truncate();
        assert!((center.length() - (globe.radius() + 10_000.0)).abs() < 1e-3);
    }

    /// Each marker is one indexed draw of the chosen solid.
    #[test]
    fn test_draws_one_solid_per_marker() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let mut renderer = TrackRenderer::new();
        renderer.render(&mut dc, &[track(3)]).unwrap();
        renderer.set_shape(MarkerShape::Cylinder);
        renderer.render(&mut dc, &[track(1)]).unwrap();
        gl.borrow_mut().take_commands();
        dc.draw_ordered_renderables();
        let mut counts: Vec<usize> = gl
            .borrow()
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::DrawElements { element_count, .. } => Some(*element_count),
                _ => None,
            })
            .collect();
        counts.sort_unstable();
        let cylinder = CYLINDER_SLICES as usize * 6 * 3;
        assert_eq!(counts, vec![36, 36, 36, cylinder]);
    }

    /// Picking resolves the track point under the pick point.
    #[test]
    fn test_pick_track_point() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let mut renderer = TrackRenderer::new();
        let tracks = [track(3)];
        dc.set_picking_mode(true);
        dc.set_pick_point(Some(DVec2::new(50.0, 40.0)));
        renderer.render(&mut dc, &tracks).unwrap();
        gl.borrow_mut()
            .fill_rect(Rect::new(0, 0, test_support::WIDTH, test_support::HEIGHT), 2);
        dc.draw_ordered_renderables();
        let top = dc.picked_objects().top_picked_object().unwrap();
        assert_eq!(top.kind, "TrackPoint");
        assert_eq!(top.object, renderer.id());
        let picked = top.position.unwrap();
        assert!((picked.longitude.degrees() - 0.1).abs() < 1e-9);
    }
}
