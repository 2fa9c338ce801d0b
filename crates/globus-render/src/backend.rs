//! The immediate-mode graphics seam.
//!
//! Renderers never talk to a native graphics binding directly; they issue state
//! changes and draw calls through [`RenderBackend`]. Pixel readback uses
//! bottom-left-origin coordinates like the underlying framebuffer.

use glam::DMat4;
use globus_geometry::{DrawMode, Vertex};
use globus_math::{Color, Rect};

/// Handle to a texture owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Polygon offset pushed while drawing interiors depth-only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthOffset {
    pub factor: f32,
    pub units: f32,
}

impl Default for DepthOffset {
    fn default() -> Self {
        Self {
            factor: -2.0,
            units: -4.0,
        }
    }
}

/// State and draw calls of an immediate-mode pipeline.
pub trait RenderBackend {
    /// Viewport in framebuffer pixels.
    fn viewport(&self) -> Rect;

    /// Clear color and depth buffers.
    fn clear(&mut self, color: Color);

    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_mask(&mut self, enabled: bool);
    fn set_color_mask(&mut self, enabled: bool);
    fn set_polygon_offset(&mut self, offset: Option<DepthOffset>);
    fn set_blending(&mut self, enabled: bool);
    fn set_lighting(&mut self, enabled: bool);
    fn set_color(&mut self, color: Color);
    fn set_line_width(&mut self, width: f32);
    fn set_point_size(&mut self, size: f32);

    /// Replace the current modelview matrix.
    fn load_modelview(&mut self, matrix: DMat4);

    /// Replace the current projection matrix.
    fn load_projection(&mut self, matrix: DMat4);

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureId;
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, texture: Option<TextureId>);

    /// Draw `vertices` in order.
    fn draw_arrays(&mut self, mode: DrawMode, vertices: &[Vertex]);

    /// Draw `vertices` through an element buffer.
    fn draw_elements(
        &mut self,
        mode: DrawMode,
        vertices: &[Vertex],
        normals: Option<&[Vertex]>,
        indices: &[u32],
    );

    /// Draw a string with its baseline origin at window coordinates `(x, y)`.
    fn draw_text(&mut self, text: &str, x: f64, y: f64, color: Color);

    /// Read the 24-bit RGB codes of `rect`, row-major from the bottom row.
    /// Pixels outside the framebuffer read as zero.
    fn read_pixels(&mut self, rect: Rect) -> Vec<u32>;
}
