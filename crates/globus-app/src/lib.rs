//! Headless globe renderer: builds a scene of shapes and drives the render and
//! pick passes over a recording backend.

pub mod driver;
pub mod error;
pub mod frame_loop;
pub mod platform;
pub mod scene;

pub use driver::{FrameDriver, FrameReport};
pub use error::AppError;
pub use frame_loop::FrameLoop;
pub use platform::PlatformDirs;
pub use scene::Scene;
