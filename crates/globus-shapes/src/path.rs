//! Polylines through geographic positions.
//!
//! A [`Path`] connects its positions with great-circle, rhumb-line or linear
//! segments, optionally following the terrain. Tessellation and the model
//! points derived from it are kept per globe in a [`PathData`] and rebuilt
//! when the globe, vertical exaggeration, or path changes, and every frame
//! for terrain-following paths, whose tessellation density depends on the
//! eye distance.

use std::any::Any;
use std::rc::Rc;

use glam::{DVec2, DVec3};
use globus_geometry::{DrawMode, Geometry};
use globus_math::{Color, GlobeStateKey, LatLon, Position, Sphere};
use globus_render::stats::keys;
use globus_render::{
    DrawContext, LayerId, ObjectId, OrderedRenderable, PickSupport, PickedObject, RenderError,
};
use rustc_hash::FxHashMap;

use crate::altitude::PointMapper;
use crate::error::invalid;
use crate::{AltitudeMode, ShapeAttributes, ShapeError};

pub const DEFAULT_NUM_SUBSEGMENTS: u32 = 10;
/// Screen distance in pixels between tessellated points of a terrain-following path.
pub const DEFAULT_TERRAIN_CONFORMANCE: f64 = 10.0;
/// Segments whose extent covers fewer pixels than this are not subdivided.
pub const DEFAULT_SMALL_SEGMENT_PIXELS: f64 = 8.0;
pub const DEFAULT_POSITION_MARKER_SIZE: f64 = 5.0;

/// Upper bound on points generated for one segment.
const MAX_POINTS_PER_SEGMENT: f64 = 10_000.0;

/// How consecutive positions are connected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PathType {
    /// Straight in latitude and longitude.
    Linear,
    #[default]
    GreatCircle,
    RhumbLine,
}

impl PathType {
    fn distance(self, a: LatLon, b: LatLon) -> f64 {
        match self {
            PathType::Linear => LatLon::linear_distance(a, b),
            PathType::GreatCircle => LatLon::great_circle_distance(a, b),
            PathType::RhumbLine => LatLon::rhumb_distance(a, b),
        }
        .radians()
    }

    pub(crate) fn interpolate_location(self, t: f64, a: LatLon, b: LatLon) -> LatLon {
        match self {
            PathType::Linear => LatLon::interpolate_linear(t, a, b),
            PathType::GreatCircle => LatLon::interpolate_great_circle(t, a, b),
            PathType::RhumbLine => LatLon::interpolate_rhumb(t, a, b),
        }
    }

    fn interpolate(self, t: f64, a: &Position, b: &Position) -> Position {
        let location = self.interpolate_location(t, a.lat_lon(), b.lat_lon());
        Position::from_lat_lon(location, a.elevation + (b.elevation - a.elevation) * t)
    }
}

/// How the original positions become the positions that are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tessellation {
    /// Subdivide each segment along the path type.
    Subdivide,
    /// Keep every n-th original position (and the last) without subdividing.
    Skip(usize),
}

/// Derived state of a path on one globe.
#[derive(Clone, Debug)]
pub struct PathData {
    globe_key: GlobeStateKey,
    vertical_exaggeration: f64,
    frame_number: u64,
    version: u64,
    tessellation: Tessellation,
    tessellated: Vec<Position>,
    /// Index in `tessellated` of each original position that was kept.
    position_indices: Vec<usize>,
    outline: Rc<Geometry>,
    extrusion: Option<Rc<Geometry>>,
    verticals: Option<Rc<Geometry>>,
    markers: Rc<Geometry>,
    extent: Sphere,
    eye_distance: f64,
}

impl PathData {
    pub fn tessellated_positions(&self) -> &[Position] {
        &self.tessellated
    }

    pub fn extent(&self) -> Sphere {
        self.extent
    }

    pub fn eye_distance(&self) -> f64 {
        self.eye_distance
    }

    pub fn reference_center(&self) -> DVec3 {
        self.outline.reference_center()
    }
}

/// A line through geographic positions.
#[derive(Debug)]
pub struct Path {
    id: ObjectId,
    positions: Vec<Position>,
    altitude_mode: AltitudeMode,
    path_type: PathType,
    follow_terrain: bool,
    extrude: bool,
    draw_verticals: bool,
    show_positions: bool,
    position_marker_size: f64,
    num_subsegments: u32,
    terrain_conformance: f64,
    small_segment_pixels: f64,
    attributes: ShapeAttributes,
    highlight_attributes: ShapeAttributes,
    highlighted: bool,
    visible: bool,
    version: u64,
    data: FxHashMap<u64, PathData>,
}

impl Path {
    pub fn new(positions: Vec<Position>) -> Self {
        let mut attributes = ShapeAttributes::default();
        attributes.set_draw_outline(true);
        Self {
            id: ObjectId::next(),
            positions,
            altitude_mode: AltitudeMode::Absolute,
            path_type: PathType::GreatCircle,
            follow_terrain: false,
            extrude: false,
            draw_verticals: true,
            show_positions: false,
            position_marker_size: DEFAULT_POSITION_MARKER_SIZE,
            num_subsegments: DEFAULT_NUM_SUBSEGMENTS,
            terrain_conformance: DEFAULT_TERRAIN_CONFORMANCE,
            small_segment_pixels: DEFAULT_SMALL_SEGMENT_PIXELS,
            attributes,
            highlight_attributes: ShapeAttributes::highlight(),
            highlighted: false,
            visible: true,
            version: 0,
            data: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn set_positions(&mut self, positions: Vec<Position>) {
        self.positions = positions;
        self.reset();
    }

    pub fn altitude_mode(&self) -> AltitudeMode {
        self.altitude_mode
    }

    pub fn set_altitude_mode(&mut self, mode: AltitudeMode) {
        self.altitude_mode = mode;
        self.reset();
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn set_path_type(&mut self, path_type: PathType) {
        self.path_type = path_type;
        self.reset();
    }

    pub fn is_follow_terrain(&self) -> bool {
        self.follow_terrain
    }

    pub fn set_follow_terrain(&mut self, follow: bool) {
        self.follow_terrain = follow;
        self.reset();
    }

    pub fn is_extrude(&self) -> bool {
        self.extrude
    }

    /// Draw a curtain from the path down to the terrain.
    pub fn set_extrude(&mut self, extrude: bool) {
        self.extrude = extrude;
        self.reset();
    }

    pub fn is_draw_verticals(&self) -> bool {
        self.draw_verticals
    }

    /// Draw vertical lines from each original position to the terrain when
    /// extruded.
    pub fn set_draw_verticals(&mut self, draw: bool) {
        self.draw_verticals = draw;
        self.reset();
    }

    pub fn is_show_positions(&self) -> bool {
        self.show_positions
    }

    pub fn set_show_positions(&mut self, show: bool) {
        self.show_positions = show;
    }

    pub fn position_marker_size(&self) -> f64 {
        self.position_marker_size
    }

    pub fn set_position_marker_size(&mut self, pixels: f64) -> Result<(), ShapeError> {
        if !(pixels.is_finite() && pixels > 0.0) {
            return Err(invalid(format!("position marker size must be positive, got {pixels}")));
        }
        self.position_marker_size = pixels;
        Ok(())
    }

    pub fn num_subsegments(&self) -> u32 {
        self.num_subsegments
    }

    /// Subsegments per segment of a path that does not follow terrain.
    pub fn set_num_subsegments(&mut self, count: u32) -> Result<(), ShapeError> {
        if count == 0 {
            return Err(invalid("number of subsegments must be positive"));
        }
        self.num_subsegments = count;
        self.reset();
        Ok(())
    }

    pub fn terrain_conformance(&self) -> f64 {
        self.terrain_conformance
    }

    pub fn set_terrain_conformance(&mut self, pixels: f64) -> Result<(), ShapeError> {
        if !(pixels.is_finite() && pixels > 0.0) {
            return Err(invalid(format!("terrain conformance must be positive, got {pixels}")));
        }
        self.terrain_conformance = pixels;
        self.reset();
        Ok(())
    }

    pub fn small_segment_pixels(&self) -> f64 {
        self.small_segment_pixels
    }

    pub fn set_small_segment_pixels(&mut self, pixels: f64) -> Result<(), ShapeError> {
        if !(pixels.is_finite() && pixels >= 0.0) {
            return Err(invalid(format!("small segment size must be non-negative, got {pixels}")));
        }
        self.small_segment_pixels = pixels;
        self.reset();
        Ok(())
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

    /// Data derived for the globe currently in `dc`, if any was generated.
    pub fn path_data(&self, dc: &DrawContext) -> Option<&PathData> {
        let key = dc.globe_state_key().ok()?;
        self.data.get(&key.globe_id)
    }

    /// Drop derived data on every globe.
    pub fn reset(&mut self) {
        self.version += 1;
        self.data.clear();
    }

    /// Whether the tessellation depends on the view and must be rebuilt each frame.
    fn is_view_dependent(&self) -> bool {
        self.follow_terrain
    }

    fn is_stale(&self, data: &PathData, dc: &DrawContext, key: GlobeStateKey, tessellation: Tessellation) -> bool {
        data.globe_key != key
            || data.vertical_exaggeration != dc.vertical_exaggeration()
            || data.version != self.version
            || data.tessellation != tessellation
            || (self.is_view_dependent() && data.frame_number != dc.frame_number())
    }

    /// Tessellate the path and queue it for ordered rendering. Returns `false`
    /// when there is nothing to draw this frame.
    pub fn render(&mut self, dc: &mut DrawContext) -> Result<bool, ShapeError> {
        self.render_with(dc, Tessellation::Subdivide)
    }

    pub(crate) fn render_with(
        &mut self,
        dc: &mut DrawContext,
        tessellation: Tessellation,
    ) -> Result<bool, ShapeError> {
        if !self.visible {
            return Ok(false);
        }
        if self.positions.len() < 2 {
            tracing::debug!(id = self.id.0, count = self.positions.len(), "path has too few positions to draw");
            return Ok(false);
        }
        let key = dc.globe_state_key()?;
        if !self.refresh_data(dc, key, tessellation)? {
            return Ok(false);
        }
        let Some(data) = self.data.get(&key.globe_id) else {
            return Ok(false);
        };
        if !dc.is_visible(&data.extent) {
            return Ok(false);
        }

        let count = data.tessellated.len();
        let attributes = self.active_attributes().clone();
        let ordered = OrderedPath {
            id: self.id,
            attributes,
            outline: Rc::clone(&data.outline),
            extrusion: data.extrusion.clone(),
            verticals: data.verticals.clone(),
            markers: self
                .show_positions
                .then(|| (Rc::clone(&data.markers), self.position_marker_size)),
            eye_distance: data.eye_distance,
            layer: dc.current_layer(),
            position: self.positions.first().copied(),
        };
        dc.increment_per_frame_statistic(keys::PATH_POSITIONS, "Path positions", count as f64);
        if self.altitude_mode == AltitudeMode::ClampToGround && self.follow_terrain {
            dc.add_ordered_renderable_behind(Box::new(ordered));
        } else {
            dc.add_ordered_renderable(Box::new(ordered));
        }
        Ok(true)
    }

    /// Distance from the eye to the nearest original position.
    pub(crate) fn nearest_eye_distance(&self, dc: &DrawContext) -> Result<f64, ShapeError> {
        let eye = dc.view()?.eye_point();
        let mapper = PointMapper::new(dc, self.altitude_mode)?;
        Ok(self
            .positions
            .iter()
            .map(|p| mapper.point(p).distance(eye))
            .fold(f64::INFINITY, f64::min))
    }

    /// Regenerate the data for the globe in `dc` if it is stale. Returns
    /// `false` when the path has nothing to draw.
    fn refresh_data(
        &mut self,
        dc: &DrawContext,
        key: GlobeStateKey,
        tessellation: Tessellation,
    ) -> Result<bool, ShapeError> {
        let stale = self
            .data
            .get(&key.globe_id)
            .is_none_or(|d| self.is_stale(d, dc, key, tessellation));
        if !stale {
            return Ok(true);
        }
        match self.make_path_data(dc, key, tessellation)? {
            Some(data) => {
                self.data.insert(key.globe_id, data);
                Ok(true)
            }
            None => {
                self.data.remove(&key.globe_id);
                Ok(false)
            }
        }
    }

    fn make_path_data(
        &self,
        dc: &DrawContext,
        key: GlobeStateKey,
        tessellation: Tessellation,
    ) -> Result<Option<PathData>, ShapeError> {
        let view = dc.view()?;
        let mapper = PointMapper::new(dc, self.altitude_mode)?;

        let (tessellated, position_indices) = match tessellation {
            Tessellation::Subdivide => self.tessellate(dc, &mapper),
            Tessellation::Skip(stride) => skip_positions(&self.positions, stride),
        };
        if tessellated.len() < 2 {
            tracing::debug!(id = self.id.0, "path tessellated to fewer than two positions");
            return Ok(None);
        }

        let points: Vec<DVec3> = tessellated.iter().map(|p| mapper.point(p)).collect();
        let reference_center = points[0];
        let eye = view.eye_point();
        let eye_distance = points
            .iter()
            .map(|p| p.distance(eye))
            .fold(f64::INFINITY, f64::min);

        let mut extent_points = points.clone();
        let extrude = self.extrude && self.altitude_mode != AltitudeMode::ClampToGround;
        let (extrusion, verticals) = if extrude {
            let ground: Vec<DVec3> = tessellated.iter().map(|p| mapper.ground_point(p)).collect();
            extent_points.extend_from_slice(&ground);
            let curtain: Vec<DVec3> = points
                .iter()
                .zip(&ground)
                .flat_map(|(top, bottom)| [*top, *bottom])
                .collect();
            let extrusion = Geometry::from_points(&curtain, reference_center).with_mode(DrawMode::TriangleStrip);
            let verticals = self.draw_verticals.then(|| {
                let lines: Vec<DVec3> = position_indices
                    .iter()
                    .flat_map(|&i| [points[i], ground[i]])
                    .collect();
                Rc::new(Geometry::from_points(&lines, reference_center).with_mode(DrawMode::Lines))
            });
            (Some(Rc::new(extrusion)), verticals)
        } else {
            (None, None)
        };

        let markers: Vec<DVec3> = position_indices.iter().map(|&i| points[i]).collect();
        let extent = Sphere::from_points(&extent_points)
            .ok_or_else(|| invalid("path has no points"))?;

        Ok(Some(PathData {
            globe_key: key,
            vertical_exaggeration: dc.vertical_exaggeration(),
            frame_number: dc.frame_number(),
            version: self.version,
            tessellation,
            outline: Rc::new(Geometry::from_points(&points, reference_center).with_mode(DrawMode::LineStrip)),
            extrusion,
            verticals,
            markers: Rc::new(Geometry::from_points(&markers, reference_center)),
            tessellated,
            position_indices,
            extent,
            eye_distance,
        }))
    }

    /// Subdivide every segment, collapsing segments that are off screen or
    /// too small to see when following terrain. The last position is always kept.
    fn tessellate(&self, dc: &DrawContext, mapper: &PointMapper) -> (Vec<Position>, Vec<usize>) {
        let mut out = Vec::new();
        let mut indices = Vec::with_capacity(self.positions.len());
        for pair in self.positions.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            indices.push(out.len());
            if self.follow_terrain && !self.is_segment_visible(dc, mapper, a, b) {
                out.push(*a);
                continue;
            }
            self.make_segment(dc, mapper, a, b, &mut out);
        }
        if let Some(last) = self.positions.last() {
            indices.push(out.len());
            out.push(*last);
        }
        (out, indices)
    }

    fn is_segment_visible(&self, dc: &DrawContext, mapper: &PointMapper, a: &Position, b: &Position) -> bool {
        let Some(extent) = Sphere::from_points(&[mapper.point(a), mapper.point(b)]) else {
            return false;
        };
        dc.is_visible(&extent) && !dc.is_small(&extent, self.small_segment_pixels)
    }

    /// Append `a` and the intermediate points toward `b`, excluding `b`.
    fn make_segment(
        &self,
        dc: &DrawContext,
        mapper: &PointMapper,
        a: &Position,
        b: &Position,
        out: &mut Vec<Position>,
    ) {
        let arc = self.path_type.distance(a.lat_lon(), b.lat_lon());
        if arc <= 0.0 || (self.path_type == PathType::Linear && !self.follow_terrain) {
            out.push(*a);
            return;
        }

        let count = if self.follow_terrain {
            (arc / self.terrain_step(dc, mapper, a, b)).ceil().clamp(1.0, MAX_POINTS_PER_SEGMENT)
        } else {
            f64::from(self.num_subsegments)
        };
        let count = count as usize;
        out.extend((0..count).map(|i| self.path_type.interpolate(i as f64 / count as f64, a, b)));
    }

    /// Arc step, in radians, that spaces points `terrain_conformance` pixels
    /// apart at the segment's distance from the eye.
    fn terrain_step(&self, dc: &DrawContext, mapper: &PointMapper, a: &Position, b: &Position) -> f64 {
        let Ok(view) = dc.view() else {
            return f64::INFINITY;
        };
        let eye = view.eye_point();
        let distance = mapper.point(a).distance(eye).min(mapper.point(b).distance(eye));
        let meters = (self.terrain_conformance * view.compute_pixel_size_at_distance(distance)).max(1.0);
        meters / mapper.globe.radius()
    }
}

/// Every `stride`-th position plus the last one.
pub(crate) fn skip_positions(positions: &[Position], stride: usize) -> (Vec<Position>, Vec<usize>) {
    if positions.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let stride = stride.max(1);
    let mut kept: Vec<Position> = positions.iter().step_by(stride).copied().collect();
    if (positions.len() - 1) % stride != 0
        && let Some(last) = positions.last()
    {
        kept.push(*last);
    }
    let indices = (0..kept.len()).collect();
    (kept, indices)
}

/// A path's draw data captured for the ordered-rendering phase.
pub struct OrderedPath {
    id: ObjectId,
    attributes: ShapeAttributes,
    outline: Rc<Geometry>,
    extrusion: Option<Rc<Geometry>>,
    verticals: Option<Rc<Geometry>>,
    markers: Option<(Rc<Geometry>, f64)>,
    eye_distance: f64,
    layer: Option<LayerId>,
    position: Option<Position>,
}

impl OrderedPath {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    fn draw(&self, dc: &mut DrawContext, pick_color: Option<Color>) -> Result<(), RenderError> {
        {
            let mut gl = dc.gl()?;
            gl.set_depth_test(true);
            gl.set_blending(pick_color.is_none());
        }
        dc.push_reference_center(self.outline.reference_center())?;
        let result = self.draw_geometry(dc, pick_color);
        dc.pop_reference_center()?;
        let mut gl = dc.gl()?;
        gl.set_blending(false);
        gl.set_line_width(1.0);
        gl.set_point_size(1.0);
        result
    }

    fn draw_geometry(&self, dc: &mut DrawContext, pick_color: Option<Color>) -> Result<(), RenderError> {
        let a = &self.attributes;
        let mut gl = dc.gl()?;
        if let Some(extrusion) = &self.extrusion
            && a.draw_interior()
        {
            gl.set_color(pick_color.unwrap_or_else(|| a.effective_interior_color()));
            gl.draw_arrays(extrusion.mode(), extrusion.vertices());
        }
        if a.draw_outline() {
            gl.set_line_width(a.outline_width() as f32);
            gl.set_color(pick_color.unwrap_or_else(|| a.effective_outline_color()));
            gl.draw_arrays(self.outline.mode(), self.outline.vertices());
            if let Some(verticals) = &self.verticals {
                gl.draw_arrays(verticals.mode(), verticals.vertices());
            }
        }
        if let Some((markers, size)) = &self.markers {
            gl.set_point_size(*size as f32);
            gl.set_color(pick_color.unwrap_or_else(|| a.effective_outline_color()));
            gl.draw_arrays(markers.mode(), markers.vertices());
        }
        Ok(())
    }
}

impl OrderedRenderable for OrderedPath {
    fn distance_from_eye(&self) -> f64 {
        self.eye_distance
    }

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.draw(dc, None)
    }

    fn pick(&self, dc: &mut DrawContext, pick_point: Option<DVec2>) -> Result<(), RenderError> {
        let color = dc.unique_pick_color();
        let mut object = PickedObject::new(color.rgb_code(), self.id, "Path").with_layer(self.layer);
        if let Some(p) = self.position {
            object = object.with_position(p);
        }
        let mut support = PickSupport::new();
        support.add_pickable_object(object);
        self.draw(dc, Some(color))?;
        support.resolve_pick(dc, pick_point, self.layer)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
