//! Application errors.

use globus_config::ConfigError;
use globus_render::RenderError;
use globus_shapes::ShapeError;

use crate::platform::PlatformError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
