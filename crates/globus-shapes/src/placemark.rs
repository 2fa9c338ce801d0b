//! Screen-aligned point placemarks.
//!
//! A [`PointPlacemark`] marks one position with an image (or a dot when it
//! has none), an optional label, and an optional line down to the terrain.
//! Placemarks queue [`OrderedPlacemark`]s that a shared [`PlacemarkRenderer`]
//! draws in runs, the same way airspaces batch through their renderer.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use glam::{DVec2, DVec3};
use globus_geometry::{DrawMode, Vertex};
use globus_math::{Color, Position};
use globus_render::{
    DrawContext, LayerId, ObjectId, OrderedRenderable, PickSupport, PickedObject, RenderError,
};

use crate::altitude::PointMapper;
use crate::error::invalid;
use crate::image::ImageSource;
use crate::{AltitudeMode, ShapeError};

/// Category under which placemark textures are stored in the GPU resource cache.
pub const IMAGE_CACHE_CATEGORY: &str = "PlacemarkImage";
pub const DEFAULT_DOT_SIZE: f64 = 10.0;
pub const DEFAULT_LABEL_FONT: &str = "Arial-BOLD";
pub const DEFAULT_LABEL_SIZE: u32 = 14;

/// Appearance of a point placemark.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacemarkAttributes {
    image: Option<ImageSource>,
    image_color: Color,
    scale: f64,
    dot_size: f64,
    label_font: String,
    label_size: u32,
    label_color: Color,
    /// Label origin relative to the placemark's screen point, in pixels.
    label_offset: DVec2,
    line_color: Color,
    line_width: f64,
}

impl Default for PlacemarkAttributes {
    fn default() -> Self {
        Self {
            image: None,
            image_color: Color::WHITE,
            scale: 1.0,
            dot_size: DEFAULT_DOT_SIZE,
            label_font: DEFAULT_LABEL_FONT.to_owned(),
            label_size: DEFAULT_LABEL_SIZE,
            label_color: Color::WHITE,
            label_offset: DVec2::new(8.0, 8.0),
            line_color: Color::WHITE,
            line_width: 1.0,
        }
    }
}

impl PlacemarkAttributes {
    pub fn image(&self) -> Option<&ImageSource> {
        self.image.as_ref()
    }

    pub fn set_image(&mut self, image: Option<ImageSource>) {
        self.image = image;
    }

    pub fn image_color(&self) -> Color {
        self.image_color
    }

    pub fn set_image_color(&mut self, color: Color) {
        self.image_color = color;
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) -> Result<(), ShapeError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(invalid(format!("scale must be positive, got {scale}")));
        }
        self.scale = scale;
        Ok(())
    }

    pub fn dot_size(&self) -> f64 {
        self.dot_size
    }

    pub fn set_dot_size(&mut self, pixels: f64) -> Result<(), ShapeError> {
        if !(pixels.is_finite() && pixels > 0.0) {
            return Err(invalid(format!("dot size must be positive, got {pixels}")));
        }
        self.dot_size = pixels;
        Ok(())
    }

    pub fn label_font(&self) -> (&str, u32) {
        (&self.label_font, self.label_size)
    }

    pub fn set_label_font(&mut self, font: impl Into<String>, size: u32) -> Result<(), ShapeError> {
        if size == 0 {
            return Err(invalid("label font size must be positive"));
        }
        self.label_font = font.into();
        self.label_size = size;
        Ok(())
    }

    pub fn label_color(&self) -> Color {
        self.label_color
    }

    pub fn set_label_color(&mut self, color: Color) {
        self.label_color = color;
    }

    pub fn label_offset(&self) -> DVec2 {
        self.label_offset
    }

    pub fn set_label_offset(&mut self, offset: DVec2) {
        self.label_offset = offset;
    }

    pub fn line_color(&self) -> Color {
        self.line_color
    }

    pub fn set_line_color(&mut self, color: Color) {
        self.line_color = color;
    }

    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    pub fn set_line_width(&mut self, width: f64) -> Result<(), ShapeError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(invalid(format!("line width must be positive, got {width}")));
        }
        self.line_width = width;
        Ok(())
    }

    /// Highlighted placemarks draw half again as large.
    pub fn highlight() -> Self {
        Self {
            scale: 1.5,
            ..Self::default()
        }
    }

    /// Width and height of the drawn symbol in pixels.
    fn symbol_size(&self) -> DVec2 {
        match &self.image {
            Some(image) => {
                let (w, h) = image.size();
                DVec2::new(f64::from(w), f64::from(h)) * self.scale
            }
            None => DVec2::splat(self.dot_size * self.scale),
        }
    }
}

/// A marker at one geographic position.
#[derive(Debug)]
pub struct PointPlacemark {
    id: ObjectId,
    position: Position,
    altitude_mode: AltitudeMode,
    label: Option<String>,
    line_enabled: bool,
    attributes: PlacemarkAttributes,
    highlight_attributes: PlacemarkAttributes,
    highlighted: bool,
    visible: bool,
}

impl PointPlacemark {
    pub fn new(position: Position) -> Self {
        Self {
            id: ObjectId::next(),
            position,
            altitude_mode: AltitudeMode::ClampToGround,
            label: None,
            line_enabled: false,
            attributes: PlacemarkAttributes::default(),
            highlight_attributes: PlacemarkAttributes::highlight(),
            highlighted: false,
            visible: true,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn altitude_mode(&self) -> AltitudeMode {
        self.altitude_mode
    }

    pub fn set_altitude_mode(&mut self, mode: AltitudeMode) {
        self.altitude_mode = mode;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn is_line_enabled(&self) -> bool {
        self.line_enabled
    }

    /// Draw a line from the placemark down to the terrain. Ignored for
    /// clamped placemarks.
    pub fn set_line_enabled(&mut self, enabled: bool) {
        self.line_enabled = enabled;
    }

    pub fn attributes(&self) -> &PlacemarkAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut PlacemarkAttributes {
        &mut self.attributes
    }

    pub fn set_highlight_attributes(&mut self, attributes: PlacemarkAttributes) {
        self.highlight_attributes = attributes;
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn active_attributes(&self) -> &PlacemarkAttributes {
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

    /// Project the placemark and queue it for ordered rendering. Returns
    /// `false` when it is hidden, behind the eye, or off screen.
    pub fn render(&mut self, dc: &mut DrawContext, renderer: &Rc<PlacemarkRenderer>) -> Result<bool, ShapeError> {
        if !self.visible {
            return Ok(false);
        }
        let view = dc.view()?;
        let mapper = PointMapper::new(dc, self.altitude_mode)?;
        let point = mapper.point(&self.position);
        let Some(screen) = view.project(point) else {
            return Ok(false);
        };

        let attributes = self.active_attributes().clone();
        let half = attributes.symbol_size() / 2.0;
        let viewport = view.viewport();
        let on_screen = screen.x + half.x >= f64::from(viewport.x)
            && screen.x - half.x <= f64::from(viewport.max_x())
            && screen.y + half.y >= f64::from(viewport.y)
            && screen.y - half.y <= f64::from(viewport.max_y());
        if !on_screen {
            return Ok(false);
        }

        let ground = (self.line_enabled && self.altitude_mode != AltitudeMode::ClampToGround)
            .then(|| mapper.ground_point(&self.position));
        let ordered = OrderedPlacemark {
            renderer: Rc::clone(renderer),
            id: self.id,
            point,
            ground,
            screen: screen.truncate(),
            label: self.label.clone(),
            attributes,
            eye_distance: view.eye_point().distance(point),
            layer: dc.current_layer(),
            position: self.position,
        };
        dc.add_ordered_renderable(Box::new(ordered));
        Ok(true)
    }
}

/// A placemark's draw data captured for the ordered-rendering phase.
pub struct OrderedPlacemark {
    renderer: Rc<PlacemarkRenderer>,
    id: ObjectId,
    point: DVec3,
    ground: Option<DVec3>,
    /// Window coordinates, bottom-left origin.
    screen: DVec2,
    label: Option<String>,
    attributes: PlacemarkAttributes,
    eye_distance: f64,
    layer: Option<LayerId>,
    position: Position,
}

impl OrderedPlacemark {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn screen_point(&self) -> DVec2 {
        self.screen
    }
}

impl OrderedRenderable for OrderedPlacemark {
    fn distance_from_eye(&self) -> f64 {
        self.eye_distance
    }

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.renderer.render_ordered(dc, self)
    }

    fn pick(&self, dc: &mut DrawContext, pick_point: Option<DVec2>) -> Result<(), RenderError> {
        self.renderer.pick_ordered(dc, self, pick_point)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared renderer for point placemarks.
#[derive(Debug)]
pub struct PlacemarkRenderer {
    enable_batch_rendering: bool,
    enable_batch_picking: bool,
    pick_support: RefCell<PickSupport>,
}

impl Default for PlacemarkRenderer {
    fn default() -> Self {
        Self {
            enable_batch_rendering: true,
            enable_batch_picking: true,
            pick_support: RefCell::new(PickSupport::new()),
        }
    }
}

impl PlacemarkRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enable_batch_rendering(&self) -> bool {
        self.enable_batch_rendering
    }

    pub fn set_enable_batch_rendering(&mut self, enable: bool) {
        self.enable_batch_rendering = enable;
    }

    pub fn is_enable_batch_picking(&self) -> bool {
        self.enable_batch_picking
    }

    pub fn set_enable_batch_picking(&mut self, enable: bool) {
        self.enable_batch_picking = enable;
    }

    pub fn render_ordered(&self, dc: &mut DrawContext, first: &OrderedPlacemark) -> Result<(), RenderError> {
        self.begin_rendering(dc, false)?;
        self.draw_logged(dc, first, None);
        if self.enable_batch_rendering {
            while let Some(next) = dc.poll_ordered_renderable_if(|r| same_renderer(r, first, false)) {
                if let Some(placemark) = next.as_any().downcast_ref::<OrderedPlacemark>() {
                    self.draw_logged(dc, placemark, None);
                }
            }
        }
        self.end_rendering(dc)
    }

    pub fn pick_ordered(
        &self,
        dc: &mut DrawContext,
        first: &OrderedPlacemark,
        pick_point: Option<DVec2>,
    ) -> Result<(), RenderError> {
        self.pick_support.borrow_mut().clear_pick_list();
        self.begin_rendering(dc, true)?;
        self.pick_one(dc, first);
        if self.enable_batch_picking {
            while let Some(next) = dc.poll_ordered_renderable_if(|r| same_renderer(r, first, true)) {
                if let Some(placemark) = next.as_any().downcast_ref::<OrderedPlacemark>() {
                    self.pick_one(dc, placemark);
                }
            }
        }
        self.end_rendering(dc)?;
        self.pick_support
            .borrow_mut()
            .resolve_pick(dc, pick_point, first.layer)?;
        Ok(())
    }

    fn pick_one(&self, dc: &mut DrawContext, placemark: &OrderedPlacemark) {
        let color = dc.unique_pick_color();
        let object = PickedObject::new(color.rgb_code(), placemark.id, "PointPlacemark")
            .with_layer(placemark.layer)
            .with_position(placemark.position);
        self.pick_support.borrow_mut().add_pickable_object(object);
        self.draw_logged(dc, placemark, Some(color));
    }

    fn draw_logged(&self, dc: &mut DrawContext, placemark: &OrderedPlacemark, pick_color: Option<Color>) {
        if let Err(e) = self.draw(dc, placemark, pick_color) {
            tracing::warn!(error = %e, id = placemark.id.0, "placemark failed to draw");
        }
    }

    fn begin_rendering(&self, dc: &mut DrawContext, picking: bool) -> Result<(), RenderError> {
        let mut gl = dc.gl()?;
        gl.set_depth_test(true);
        gl.set_depth_mask(true);
        gl.set_blending(!picking);
        Ok(())
    }

    fn end_rendering(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        let mut gl = dc.gl()?;
        gl.bind_texture(None);
        gl.set_blending(false);
        gl.set_line_width(1.0);
        gl.set_point_size(1.0);
        Ok(())
    }

    fn draw(&self, dc: &mut DrawContext, placemark: &OrderedPlacemark, pick_color: Option<Color>) -> Result<(), RenderError> {
        let attributes = &placemark.attributes;
        if let Some(ground) = placemark.ground {
            dc.push_reference_center(placemark.point)?;
            {
                let mut gl = dc.gl()?;
                gl.set_line_width(attributes.line_width as f32);
                gl.set_color(pick_color.unwrap_or(attributes.line_color));
                let line = [Vertex::new(0.0, 0.0, 0.0), Vertex::relative_to(ground, placemark.point)];
                gl.draw_arrays(DrawMode::Lines, &line);
            }
            dc.pop_reference_center()?;
        }

        dc.begin_screen_space()?;
        let result = self.draw_symbol(dc, placemark, pick_color);
        dc.end_screen_space()?;
        result
    }

    /// Image or dot at the screen point, then the label. Labels are not picked.
    fn draw_symbol(&self, dc: &mut DrawContext, placemark: &OrderedPlacemark, pick_color: Option<Color>) -> Result<(), RenderError> {
        let attributes = &placemark.attributes;
        let s = placemark.screen;
        match &attributes.image {
            Some(image) => {
                let texture = match pick_color {
                    Some(_) => None,
                    None => Some(image.texture(dc, IMAGE_CACHE_CATEGORY)?),
                };
                let half = attributes.symbol_size() / 2.0;
                let (x0, y0, x1, y1) = ((s.x - half.x) as f32, (s.y - half.y) as f32, (s.x + half.x) as f32, (s.y + half.y) as f32);
                let quad = [
                    Vertex::new(x0, y0, 0.0),
                    Vertex::new(x1, y0, 0.0),
                    Vertex::new(x0, y1, 0.0),
                    Vertex::new(x1, y1, 0.0),
                ];
                let mut gl = dc.gl()?;
                gl.bind_texture(texture);
                gl.set_color(pick_color.unwrap_or(attributes.image_color));
                gl.draw_arrays(DrawMode::TriangleStrip, &quad);
                gl.bind_texture(None);
            }
            None => {
                let mut gl = dc.gl()?;
                gl.set_point_size((attributes.dot_size * attributes.scale) as f32);
                gl.set_color(pick_color.unwrap_or(attributes.image_color));
                gl.draw_arrays(DrawMode::Points, &[Vertex::new(s.x as f32, s.y as f32, 0.0)]);
            }
        }

        if pick_color.is_none()
            && let Some(label) = &placemark.label
        {
            let (font, size) = attributes.label_font();
            let text = dc.text_renderer_cache().borrow_mut().get_or_create(font, size);
            let origin = s + attributes.label_offset;
            text.draw(&mut *dc.gl()?, label, origin.x, origin.y, attributes.label_color);
        }
        Ok(())
    }
}

fn same_renderer(next: &dyn OrderedRenderable, first: &OrderedPlacemark, picking: bool) -> bool {
    next.as_any()
        .downcast_ref::<OrderedPlacemark>()
        .is_some_and(|p| Rc::ptr_eq(&p.renderer, &first.renderer) && (!picking || p.layer == first.layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use globus_math::Rect;
    use globus_render::Command;

    fn count(gl: &[Command], f: impl Fn(&Command) -> bool) -> usize {
        gl.iter().filter(|c| f(c)).count()
    }

    /// A placemark under the eye projects to the viewport center.
    #[test]
    fn test_projects_to_center() {
        let Frame { mut dc, .. } = test_support::frame();
        let renderer = Rc::new(PlacemarkRenderer::new());
        let mut placemark = PointPlacemark::new(Position::from_degrees(0.0, 0.0, 0.0));
        assert!(placemark.render(&mut dc, &renderer).unwrap());
        let queued = dc.poll_ordered_renderable().unwrap();
        let ordered = queued.as_any().downcast_ref::<OrderedPlacemark>().unwrap();
        let s = ordered.screen_point();
        assert!((s.x - 50.0).abs() < 1e-6 && (s.y - 40.0).abs() < 1e-6, "{s:?}");
    }

    /// Placemarks on the far side of the globe are not queued.
    #[test]
    fn test_off_screen_not_queued() {
        let Frame { mut dc, .. } = test_support::frame();
        let renderer = Rc::new(PlacemarkRenderer::new());
        let mut placemark = PointPlacemark::new(Position::from_degrees(0.0, 60.0, 0.0));
        assert!(!placemark.render(&mut dc, &renderer).unwrap());
        assert_eq!(dc.ordered_renderable_count(), 0);
    }

    /// A run of placemarks shares one state setup; labels and ground lines draw.
    #[test]
    fn test_batched_rendering() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let renderer = Rc::new(PlacemarkRenderer::new());
        for (i, lon) in [-0.5, 0.0, 0.5].into_iter().enumerate() {
            let mut placemark = PointPlacemark::new(Position::from_degrees(0.0, lon, 10_000.0));
            placemark.set_altitude_mode(AltitudeMode::Absolute);
            placemark.set_line_enabled(true);
            placemark.set_label(Some(format!("P{i}")));
            placemark.render(&mut dc, &renderer).unwrap();
        }
        gl.borrow_mut().take_commands();
        dc.draw_ordered_renderables();
        let commands = gl.borrow().commands().to_vec();
        assert_eq!(count(&commands, |c| *c == Command::Blending(true)), 1);
        assert_eq!(count(&commands, |c| matches!(c, Command::DrawArrays { mode: DrawMode::Points, .. })), 3);
        assert_eq!(count(&commands, |c| matches!(c, Command::DrawArrays { mode: DrawMode::Lines, .. })), 3);
        assert_eq!(count(&commands, |c| matches!(c, Command::DrawText { .. })), 3);
    }

    /// An image is uploaded once and then served from the GPU resource cache.
    #[test]
    fn test_image_texture_cached() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let renderer = Rc::new(PlacemarkRenderer::new());
        let image = ImageSource::new("pin", 2, 2, Rc::from(vec![255u8; 16])).unwrap();
        let mut placemark = PointPlacemark::new(Position::from_degrees(0.0, 0.0, 0.0));
        placemark.attributes_mut().set_image(Some(image));
        for _ in 0..2 {
            placemark.render(&mut dc, &renderer).unwrap();
            dc.draw_ordered_renderables();
        }
        let commands = gl.borrow().commands().to_vec();
        assert_eq!(count(&commands, |c| matches!(c, Command::CreateTexture { .. })), 1);
        assert_eq!(
            count(&commands, |c| matches!(c, Command::DrawArrays { mode: DrawMode::TriangleStrip, .. })),
            2
        );
        assert!(dc.gpu_resource_cache().borrow().contains("pin"));
    }

    /// Picking resolves the placemark drawn with the color under the pick point.
    #[test]
    fn test_pick_second_placemark() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let renderer = Rc::new(PlacemarkRenderer::new());
        let mut near = PointPlacemark::new(Position::from_degrees(0.0, 0.0, 20_000.0));
        near.set_altitude_mode(AltitudeMode::Absolute);
        let mut far = PointPlacemark::new(Position::from_degrees(0.0, 0.1, 0.0));
        dc.set_picking_mode(true);
        dc.set_pick_point(Some(DVec2::new(50.0, 40.0)));
        near.render(&mut dc, &renderer).unwrap();
        far.render(&mut dc, &renderer).unwrap();
        // The farther placemark is drawn first and takes pick color 1.
        gl.borrow_mut()
            .fill_rect(Rect::new(0, 0, test_support::WIDTH, test_support::HEIGHT), 2);
        dc.draw_ordered_renderables();
        let top = dc.picked_objects().top_picked_object().unwrap();
        assert_eq!(top.object, near.id());
        assert_eq!(top.kind, "PointPlacemark");
        assert_eq!(dc.picked_objects().len(), 1);
    }

    /// Bad attribute values are rejected.
    #[test]
    fn test_attribute_validation() {
        let mut a = PlacemarkAttributes::default();
        assert!(a.set_scale(0.0).is_err());
        assert!(a.set_line_width(-1.0).is_err());
        assert!(a.set_label_font("Mono", 0).is_err());
        assert!(ImageSource::new("x", 2, 2, Rc::from(vec![0u8; 3])).is_err());
    }
}
