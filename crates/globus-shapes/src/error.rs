//! Shape errors.

use globus_geometry::GeometryError;
use globus_render::RenderError;

/// Errors raised by shape configuration and geometry generation.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl From<ShapeError> for RenderError {
    fn from(e: ShapeError) -> Self {
        match e {
            ShapeError::InvalidArgument(msg) => RenderError::InvalidArgument(msg),
            ShapeError::Render(e) => e,
            ShapeError::Geometry(e) => RenderError::Geometry(e),
        }
    }
}

pub(crate) fn invalid(msg: impl Into<String>) -> ShapeError {
    ShapeError::InvalidArgument(msg.into())
}
