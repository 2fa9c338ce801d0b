//! Render-pass errors.

use globus_geometry::GeometryError;

/// Errors surfaced by draw context operations and ordered renderables.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A caller passed an argument outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No graphics backend has been attached for this frame.
    #[error("draw context has no graphics context")]
    MissingGraphicsContext,

    #[error("draw context has no view")]
    MissingView,

    #[error("draw context has no globe")]
    MissingGlobe,

    #[error("draw context has no terrain")]
    MissingTerrain,

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
