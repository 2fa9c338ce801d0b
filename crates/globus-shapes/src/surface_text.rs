//! Text draped on the terrain at a geographic location.
//!
//! The text's height is given in meters, so its font size on screen follows
//! the camera distance. Text smaller than one pixel is not drawn.

use std::any::Any;

use glam::DVec2;
use globus_geometry::{DrawMode, Vertex};
use globus_math::{Angle, Color, LatLon, Sector};
use globus_render::{
    DrawContext, LayerId, ObjectId, OrderedRenderable, PickedObject, RenderError, SurfaceObject,
    SurfaceStateKey,
};

use crate::error::invalid;
use crate::surface::{self, SurfaceItem};
use crate::ShapeError;

pub const DEFAULT_TEXT_HEIGHT: f64 = 1000.0;
pub const DEFAULT_FONT: &str = "Arial";
/// Smallest font size, in pixels, worth drawing.
pub const MIN_FONT_PIXELS: f64 = 1.0;
pub const MAX_FONT_PIXELS: f64 = 256.0;
/// Glyph advance relative to the text height, matching the text renderer's bounds.
const GLYPH_ASPECT: f64 = 0.6;

/// A string drawn flat on the terrain.
#[derive(Debug)]
pub struct SurfaceText {
    id: ObjectId,
    text: String,
    location: LatLon,
    /// Height of a line of text, in meters.
    text_height: f64,
    font: String,
    color: Color,
    visible: bool,
    version: u64,
}

impl SurfaceText {
    pub fn new(text: impl Into<String>, location: LatLon) -> Self {
        Self {
            id: ObjectId::next(),
            text: text.into(),
            location,
            text_height: DEFAULT_TEXT_HEIGHT,
            font: DEFAULT_FONT.to_owned(),
            color: Color::WHITE,
            visible: true,
            version: 0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.version += 1;
    }

    pub fn location(&self) -> LatLon {
        self.location
    }

    pub fn set_location(&mut self, location: LatLon) {
        self.location = location;
        self.version += 1;
    }

    pub fn text_height(&self) -> f64 {
        self.text_height
    }

    pub fn set_text_height(&mut self, meters: f64) -> Result<(), ShapeError> {
        if meters.is_nan() || meters <= 0.0 {
            return Err(invalid(format!("text height must be positive, got {meters}")));
        }
        self.text_height = meters;
        self.version += 1;
        Ok(())
    }

    pub fn font(&self) -> &str {
        &self.font
    }

    pub fn set_font(&mut self, font: impl Into<String>) {
        self.font = font.into();
        self.version += 1;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.version += 1;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Sector covered by the text on a globe of `radius` meters.
    fn sector_on(&self, radius: f64) -> Sector {
        let half_height = self.text_height / 2.0 / radius;
        let width = self.text.chars().count() as f64 * GLYPH_ASPECT * self.text_height;
        let cos_lat = self.location.latitude.cos().abs().max(1e-6);
        let half_width = width / 2.0 / (radius * cos_lat);
        let (lat, lon) = (self.location.latitude.radians(), self.location.longitude.radians());
        Sector::new(
            Angle::from_radians(lat - half_height),
            Angle::from_radians(lat + half_height),
            Angle::from_radians(lon - half_width),
            Angle::from_radians(lon + half_width),
        )
    }

    fn enqueue(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        if !self.visible || self.text.is_empty() {
            return Ok(());
        }
        let view = dc.view()?;
        let globe = dc.globe()?;
        let terrain = dc.terrain().ok();
        let point = surface::draped_point(globe.as_ref(), terrain.as_deref(), dc.vertical_exaggeration(), self.location);
        let Some(screen) = view.project(point) else {
            return Ok(());
        };
        let distance = view.eye_point().distance(point);
        let pixels = self.text_height / view.compute_pixel_size_at_distance(distance);
        if pixels < MIN_FONT_PIXELS {
            tracing::trace!(id = self.id.0, pixels, "surface text too small to draw");
            return Ok(());
        }
        let size = pixels.min(MAX_FONT_PIXELS).round() as u32;
        let renderer = dc.text_renderer_cache().borrow_mut().get_or_create(&self.font, size);
        let (width, height) = renderer.bounds(&self.text);
        let origin = screen.truncate() - DVec2::new(width, height) / 2.0;
        let viewport = view.viewport();
        let on_screen = origin.x + width >= f64::from(viewport.x)
            && origin.x <= f64::from(viewport.max_x())
            && origin.y + height >= f64::from(viewport.y)
            && origin.y <= f64::from(viewport.max_y());
        if !on_screen {
            return Ok(());
        }
        dc.add_ordered_surface_renderable(Box::new(OrderedSurfaceText {
            id: self.id,
            text: self.text.clone(),
            font: self.font.clone(),
            size,
            origin,
            bounds: DVec2::new(width, height),
            color: self.color,
            layer: dc.current_layer(),
            distance,
        }));
        Ok(())
    }
}

impl SurfaceObject for SurfaceText {
    fn pre_render(&mut self, _dc: &mut DrawContext) -> Result<(), RenderError> {
        Ok(())
    }

    fn state_key(&self, dc: &DrawContext) -> SurfaceStateKey {
        SurfaceStateKey {
            object: self.id,
            version: self.version,
            globe: dc.globe_state_key().ok(),
        }
    }

    fn sectors(&self, dc: &DrawContext) -> Vec<Sector> {
        match dc.globe() {
            Ok(globe) => vec![self.sector_on(globe.radius())],
            Err(_) => Vec::new(),
        }
    }

    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.enqueue(dc)
    }

    fn pick(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.enqueue(dc)
    }
}

/// Surface text laid out in window coordinates for the ordered-surface phase.
pub struct OrderedSurfaceText {
    id: ObjectId,
    text: String,
    font: String,
    size: u32,
    /// Bottom-left corner of the text box in window coordinates.
    origin: DVec2,
    bounds: DVec2,
    color: Color,
    layer: Option<LayerId>,
    distance: f64,
}

impl OrderedSurfaceText {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn font_size(&self) -> u32 {
        self.size
    }
}

impl SurfaceItem for OrderedSurfaceText {
    fn draw(&self, dc: &mut DrawContext, pick_color: Option<Color>) -> Result<(), RenderError> {
        dc.begin_screen_space()?;
        {
            let mut gl = dc.gl()?;
            match pick_color {
                Some(color) => {
                    let (x0, y0) = (self.origin.x as f32, self.origin.y as f32);
                    let (x1, y1) = (x0 + self.bounds.x as f32, y0 + self.bounds.y as f32);
                    let quad = [
                        Vertex::new(x0, y0, 0.0),
                        Vertex::new(x1, y0, 0.0),
                        Vertex::new(x0, y1, 0.0),
                        Vertex::new(x1, y1, 0.0),
                    ];
                    gl.set_color(color);
                    gl.draw_arrays(DrawMode::TriangleStrip, &quad);
                }
                None => {
                    let renderer = dc.text_renderer_cache().borrow_mut().get_or_create(&self.font, self.size);
                    renderer.draw(&mut *gl, &self.text, self.origin.x, self.origin.y, self.color);
                }
            }
        }
        dc.end_screen_space()
    }

    fn picked_object(&self, color: Color) -> PickedObject {
        PickedObject::new(color.rgb_code(), self.id, self.kind()).with_layer(self.layer)
    }

    fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    fn kind(&self) -> &'static str {
        "SurfaceText"
    }
}

impl OrderedRenderable for OrderedSurfaceText {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use globus_math::Rect;
    use globus_render::Command;

    fn queued_text(dc: &mut DrawContext) -> Option<(u32, DVec2, DVec2)> {
        let item = dc.poll_ordered_surface_renderable()?;
        let text = item.as_any().downcast_ref::<OrderedSurfaceText>()?;
        Some((text.size, text.origin, text.bounds))
    }

    /// Text a kilometer tall is under a pixel from 1000 km and is skipped.
    #[test]
    fn test_small_text_skipped() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut text = SurfaceText::new("Ridge", LatLon::from_degrees(0.0, 0.0));
        text.render(&mut dc).unwrap();
        assert_eq!(dc.ordered_surface_renderable_count(), 0);
    }

    /// Font size follows meters per pixel and the text is centered on its location.
    #[test]
    fn test_font_size_and_centering() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut text = SurfaceText::new("Ridge", LatLon::from_degrees(0.0, 0.0));
        text.set_text_height(100_000.0).unwrap();
        text.render(&mut dc).unwrap();
        let (size, origin, bounds) = queued_text(&mut dc).unwrap();
        // About 8.3 km per pixel at 1000 km with a 45 degree field of view.
        assert_eq!(size, 12);
        let center = origin + bounds / 2.0;
        assert!((center.x - 50.0).abs() < 1e-6 && (center.y - 40.0).abs() < 1e-6, "{center:?}");

        text.set_text_height(200_000.0).unwrap();
        text.render(&mut dc).unwrap();
        assert_eq!(queued_text(&mut dc).unwrap().0, 24);
    }

    /// The covered sector grows with the text's length and height.
    #[test]
    fn test_sector_follows_extent() {
        let Frame { dc, .. } = test_support::frame();
        let mut text = SurfaceText::new("A", LatLon::from_degrees(10.0, 20.0));
        let short = text.sectors(&dc)[0];
        assert!(short.contains(text.location()));
        text.set_text("A longer label");
        let long = text.sectors(&dc)[0];
        assert!(long.delta_longitude().radians() > short.delta_longitude().radians() * 10.0);
        assert!((long.delta_latitude().radians() - short.delta_latitude().radians()).abs() < 1e-12);
        assert!(text.set_text_height(0.0).is_err());
    }

    /// Rendering draws the string; picking draws its box and resolves it.
    #[test]
    fn test_render_and_pick() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let mut text = SurfaceText::new("Ridge", LatLon::from_degrees(0.0, 0.0));
        text.set_text_height(100_000.0).unwrap();
        text.render(&mut dc).unwrap();
        dc.draw_ordered_surface_renderables();
        assert!(
            gl.borrow()
                .commands()
                .iter()
                .any(|c| matches!(c, Command::DrawText { text, .. } if text == "Ridge"))
        );

        gl.borrow_mut().take_commands();
        dc.set_picking_mode(true);
        dc.set_pick_point(Some(DVec2::new(50.0, 40.0)));
        text.pick(&mut dc).unwrap();
        gl.borrow_mut()
            .fill_rect(Rect::new(0, 0, test_support::WIDTH, test_support::HEIGHT), 1);
        dc.draw_ordered_surface_renderables();
        let commands = gl.borrow().commands().to_vec();
        assert!(commands.iter().any(|c| matches!(c, Command::DrawArrays { mode: DrawMode::TriangleStrip, .. })));
        assert!(!commands.iter().any(|c| matches!(c, Command::DrawText { .. })));
        assert_eq!(dc.picked_objects().top_picked_object().unwrap().object, text.id());
    }
}
