//! Capabilities of terrain-draped objects.
//!
//! Surface objects are composited onto terrain rather than depth-sorted. They
//! queue their draw requests through the draw context's ordered-surface FIFO,
//! which preserves submission order so runs of one type share state setup.

use globus_math::{GlobeStateKey, Sector};

use crate::{DrawContext, ObjectId, RenderError};

/// Identifies the visual state of a surface object. When the key changes,
/// anything composited from the object must be redrawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceStateKey {
    pub object: ObjectId,
    pub version: u64,
    pub globe: Option<GlobeStateKey>,
}

/// A shape draped on the terrain.
pub trait SurfaceObject {
    /// Prepare for the frame (regenerate derived data) before any pass runs.
    fn pre_render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError>;

    fn state_key(&self, dc: &DrawContext) -> SurfaceStateKey;

    /// Sectors covered by the object on the current globe.
    fn sectors(&self, dc: &DrawContext) -> Vec<Sector>;

    /// Queue the object for drawing in the ordered-surface phase.
    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError>;

    /// Queue the object for the pick pass.
    fn pick(&mut self, dc: &mut DrawContext) -> Result<(), RenderError>;
}

/// A textured tile that can be drawn onto terrain covering its sector.
pub trait SurfaceTile {
    fn sector(&self) -> Sector;

    /// Bind the tile's texture. Returns `false` when no texture is available
    /// yet and the tile should not be drawn this frame.
    fn bind(&self, dc: &mut DrawContext) -> Result<bool, RenderError>;
}
