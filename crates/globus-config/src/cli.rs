//! Command-line arguments of the frame driver.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, ConfigError};

/// Globus frame driver arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "globus", about = "Headless globe renderer frame driver")]
pub struct CliArgs {
    /// Viewport width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Viewport height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Number of frames to run.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Terrain vertical exaggeration.
    #[arg(long)]
    pub vertical_exaggeration: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run a pick pass at window coordinates `x,y` each frame.
    #[arg(long)]
    pub pick: Option<String>,
}

impl CliArgs {
    /// The pick point given with `--pick x,y`, if any.
    pub fn pick_point(&self) -> Result<Option<(f64, f64)>, ConfigError> {
        let Some(raw) = &self.pick else {
            return Ok(None);
        };
        let parse = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|e| ConfigError::InvalidArgument(format!("pick coordinate {s:?}: {e}")))
        };
        match raw.split_once(',') {
            Some((x, y)) => Ok(Some((parse(x)?, parse(y)?))),
            None => Err(ConfigError::InvalidArgument(format!(
                "pick point must be `x,y`, got {raw:?}"
            ))),
        }
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.render.viewport_width = w;
        }
        if let Some(h) = args.height {
            self.render.viewport_height = h;
        }
        if let Some(frames) = args.frames {
            self.debug.frames = frames;
        }
        if let Some(ve) = args.vertical_exaggeration {
            self.render.vertical_exaggeration = ve;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Given values override the config; the rest keep their defaults.
    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1920),
            frames: Some(12),
            vertical_exaggeration: Some(2.5),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.render.viewport_width, 1920);
        assert_eq!(config.debug.frames, 12);
        assert_eq!(config.render.vertical_exaggeration, 2.5);
        assert_eq!(config.render.viewport_height, 720);
    }

    /// No arguments leave the config untouched.
    #[test]
    fn test_cli_no_override() {
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, Config::default());
    }

    /// Arguments parse from a command line.
    #[test]
    fn test_parse_command_line() {
        let args = CliArgs::parse_from(["globus", "--frames", "2", "--pick", "640, 360"]);
        assert_eq!(args.frames, Some(2));
        assert_eq!(args.pick_point().unwrap(), Some((640.0, 360.0)));
    }

    /// A malformed pick point is rejected.
    #[test]
    fn test_bad_pick_point() {
        for raw in ["640", "a,b"] {
            let args = CliArgs {
                pick: Some(raw.to_string()),
                ..CliArgs::default()
            };
            assert!(args.pick_point().is_err(), "{raw}");
        }
    }
}
