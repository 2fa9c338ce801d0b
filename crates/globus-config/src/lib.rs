//! Runtime configuration for the globe renderer.
//!
//! Settings persist to disk as RON and can be overridden from the command
//! line. Every section defaults field by field, so older and newer config
//! files both load.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AirspaceConfig, CacheConfig, Config, DebugConfig, GlobeConfig, PathConfig, RenderConfig,
    default_config_dir,
};
pub use error::ConfigError;
