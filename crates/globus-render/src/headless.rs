//! A [`RenderBackend`] with no GPU behind it.
//!
//! Every state change and draw call is recorded as a [`Command`], and pixel
//! readback is served from an in-memory framebuffer that callers can paint
//! directly. The frame driver uses it for offscreen runs; tests use it to
//! assert on draw order and state protocols.

use glam::DMat4;
use globus_geometry::{DrawMode, Vertex};
use globus_math::{Color, Rect};

use crate::backend::{DepthOffset, RenderBackend, TextureId};

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Clear(Color),
    DepthTest(bool),
    DepthMask(bool),
    ColorMask(bool),
    PolygonOffset(Option<DepthOffset>),
    Blending(bool),
    Lighting(bool),
    Color(Color),
    LineWidth(f32),
    PointSize(f32),
    LoadModelview(DMat4),
    LoadProjection(DMat4),
    CreateTexture { id: TextureId, width: u32, height: u32 },
    DeleteTexture(TextureId),
    BindTexture(Option<TextureId>),
    DrawArrays { mode: DrawMode, vertex_count: usize },
    DrawElements { mode: DrawMode, vertex_count: usize, element_count: usize },
    DrawText { text: String, x: f64, y: f64 },
    ReadPixels(Rect),
}

impl Command {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::DrawArrays { .. } | Command::DrawElements { .. } | Command::DrawText { .. }
        )
    }
}

/// Recording backend with a 24-bit framebuffer.
#[derive(Debug)]
pub struct HeadlessBackend {
    viewport: Rect,
    framebuffer: Vec<u32>,
    commands: Vec<Command>,
    next_texture: u64,
    live_textures: usize,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_viewport(Rect::new(0, 0, width as i32, height as i32))
    }

    /// Backend whose framebuffer covers `viewport`, which may be offset from
    /// the window origin.
    pub fn with_viewport(viewport: Rect) -> Self {
        let viewport = Rect::new(viewport.x, viewport.y, viewport.width.max(1), viewport.height.max(1));
        Self {
            viewport,
            framebuffer: vec![0; (viewport.width * viewport.height) as usize],
            commands: Vec::new(),
            next_texture: 1,
            live_textures: 0,
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Number of recorded draw calls.
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    /// Paint one pixel; `y` counts up from the bottom row.
    pub fn set_pixel(&mut self, x: i32, y: i32, rgb_code: u32) {
        if let Some(i) = self.index(x, y) {
            self.framebuffer[i] = rgb_code & 0xFF_FFFF;
        }
    }

    /// Paint a bottom-left-origin rectangle, clipped to the framebuffer.
    pub fn fill_rect(&mut self, rect: Rect, rgb_code: u32) {
        let clipped = rect.intersection(&self.viewport);
        for y in clipped.y..clipped.max_y() {
            for x in clipped.x..clipped.max_x() {
                self.set_pixel(x, y, rgb_code);
            }
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> u32 {
        self.index(x, y).map_or(0, |i| self.framebuffer[i])
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let v = self.viewport;
        if x < v.x || y < v.y || x >= v.max_x() || y >= v.max_y() {
            return None;
        }
        Some(((y - v.y) * v.width + (x - v.x)) as usize)
    }
}

impl RenderBackend for HeadlessBackend {
    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn clear(&mut self, color: Color) {
        self.framebuffer.fill(color.rgb_code());
        self.commands.push(Command::Clear(color));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(Command::DepthTest(enabled));
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.commands.push(Command::DepthMask(enabled));
    }

    fn set_color_mask(&mut self, enabled: bool) {
        self.commands.push(Command::ColorMask(enabled));
    }

    fn set_polygon_offset(&mut self, offset: Option<DepthOffset>) {
        self.commands.push(Command::PolygonOffset(offset));
    }

    fn set_blending(&mut self, enabled: bool) {
        self.commands.push(Command::Blending(enabled));
    }

    fn set_lighting(&mut self, enabled: bool) {
        self.commands.push(Command::Lighting(enabled));
    }

    fn set_color(&mut self, color: Color) {
        self.commands.push(Command::Color(color));
    }

    fn set_line_width(&mut self, width: f32) {
        self.commands.push(Command::LineWidth(width));
    }

    fn set_point_size(&mut self, size: f32) {
        self.commands.push(Command::PointSize(size));
    }

    fn load_modelview(&mut self, matrix: DMat4) {
        self.commands.push(Command::LoadModelview(matrix));
    }

    fn load_projection(&mut self, matrix: DMat4) {
        self.commands.push(Command::LoadProjection(matrix));
    }

    fn create_texture(&mut self, width: u32, height: u32, _rgba: &[u8]) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.live_textures += 1;
        self.commands.push(Command::CreateTexture { id, width, height });
        id
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.live_textures = self.live_textures.saturating_sub(1);
        self.commands.push(Command::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.commands.push(Command::BindTexture(texture));
    }

    fn draw_arrays(&mut self, mode: DrawMode, vertices: &[Vertex]) {
        self.commands.push(Command::DrawArrays {
            mode,
            vertex_count: vertices.len(),
        });
    }

    fn draw_elements(
        &mut self,
        mode: DrawMode,
        vertices: &[Vertex],
        _normals: Option<&[Vertex]>,
        indices: &[u32],
    ) {
        self.commands.push(Command::DrawElements {
            mode,
            vertex_count: vertices.len(),
            element_count: indices.len(),
        });
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, _color: Color) {
        self.commands.push(Command::DrawText {
            text: text.to_owned(),
            x,
            y,
        });
    }

    fn read_pixels(&mut self, rect: Rect) -> Vec<u32> {
        self.commands.push(Command::ReadPixels(rect));
        let mut out = Vec::with_capacity((rect.width.max(0) * rect.height.max(0)) as usize);
        for y in rect.y..rect.max_y() {
            for x in rect.x..rect.max_x() {
                out.push(self.pixel(x, y));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_fills_framebuffer() {
        let mut gl = HeadlessBackend::new(4, 4);
        gl.clear(Color::rgb(0, 0, 9));
        assert_eq!(gl.pixel(3, 3), 9);
        assert_eq!(gl.commands(), &[Command::Clear(Color::rgb(0, 0, 9))]);
    }

    /// Reads outside the framebuffer return zero rather than panicking.
    #[test]
    fn test_read_pixels_clips_to_zero() {
        let mut gl = HeadlessBackend::new(2, 2);
        gl.fill_rect(Rect::new(0, 0, 2, 2), 5);
        let px = gl.read_pixels(Rect::new(1, 1, 2, 1));
        assert_eq!(px, vec![5, 0]);
    }

    #[test]
    fn test_draw_count() {
        let mut gl = HeadlessBackend::new(2, 2);
        gl.set_color(Color::WHITE);
        gl.draw_arrays(DrawMode::Points, &[Vertex::default()]);
        gl.draw_elements(DrawMode::Triangles, &[Vertex::default(); 3], None, &[0, 1, 2]);
        assert_eq!(gl.draw_count(), 2);
        assert_eq!(gl.take_commands().len(), 3);
        assert!(gl.commands().is_empty());
    }
}
