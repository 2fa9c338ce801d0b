//! Configuration sections, their defaults, and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";
const APP_NAME: &str = "globus";

/// Platform configuration directory for the renderer, e.g.
/// `~/.config/globus` on Linux.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub cache: CacheConfig,
    pub airspace: AirspaceConfig,
    pub path: PathConfig,
    pub globe: GlobeConfig,
    pub debug: DebugConfig,
}

/// Frame and draw-state settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Clear color as `[r, g, b]`.
    pub clear_color: [u8; 3],
    pub vertical_exaggeration: f64,
    /// Side of the square pick region around the pick point, in pixels.
    pub pick_point_frustum_dimension: i32,
    pub enable_batch_rendering: bool,
    pub enable_batch_picking: bool,
    /// Pull airspace outlines toward the eye so they win the depth test
    /// against their own fill.
    pub enable_depth_offset: bool,
    pub depth_offset_factor: f32,
    pub depth_offset_units: f32,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// Byte capacities of the shared caches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub geometry_cache_capacity: usize,
    pub gpu_resource_cache_capacity: usize,
}

/// Airspace geometry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AirspaceConfig {
    /// Terrain-conforming geometry expires at a random time in
    /// `[min_expiry_ms, max_expiry_ms]` after it is built.
    pub min_expiry_ms: u64,
    pub max_expiry_ms: u64,
    pub enable_legs_joining: bool,
    pub small_angle_threshold_deg: f64,
}

/// Path tessellation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathConfig {
    pub num_subsegments: u32,
    /// Target spacing of terrain-following points, in pixels.
    pub terrain_conformance_px: f64,
    /// Segments shorter than this on screen are not subdivided.
    pub small_segment_px: f64,
}

/// Globe and camera settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobeConfig {
    pub radius_m: f64,
    pub eye_altitude_m: f64,
    pub eye_latitude_deg: f64,
    pub eye_longitude_deg: f64,
    pub field_of_view_deg: f64,
}

/// Development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter (e.g. "debug", "info,globus_render=trace").
    pub log_level: String,
    /// Frames the frame driver runs before exiting.
    pub frames: u32,
    /// Log the per-frame statistics after each frame.
    pub show_statistics: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0, 0, 0],
            vertical_exaggeration: 1.0,
            pick_point_frustum_dimension: 5,
            enable_batch_rendering: true,
            enable_batch_picking: true,
            enable_depth_offset: true,
            depth_offset_factor: -2.0,
            depth_offset_units: -4.0,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            geometry_cache_capacity: 16 << 20,
            gpu_resource_cache_capacity: 256 << 20,
        }
    }
}

impl Default for AirspaceConfig {
    fn default() -> Self {
        Self {
            min_expiry_ms: 2000,
            max_expiry_ms: 6000,
            enable_legs_joining: true,
            small_angle_threshold_deg: 22.5,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            num_subsegments: 10,
            terrain_conformance_px: 10.0,
            small_segment_px: 8.0,
        }
    }
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            radius_m: 6_378_137.0,
            eye_altitude_m: 1_000_000.0,
            eye_latitude_deg: 0.0,
            eye_longitude_deg: 0.0,
            field_of_view_deg: 45.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frames: 3,
            show_statistics: false,
        }
    }
}

// --- Persistence ---

fn pretty() -> ron::ser::PrettyConfig {
    ron::ser::PrettyConfig::new()
        .depth_limit(3)
        .separate_tuple_members(true)
        .enumerate_arrays(false)
}

impl Config {
    /// Location of `config.ron` inside `config_dir`.
    pub fn file_in(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&text).map_err(ConfigError::ParseError)
    }

    /// Read `config.ron` from `config_dir`, writing the defaults there first
    /// when the file is missing.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::file_in(config_dir);
        if !path.exists() {
            let defaults = Self::default();
            defaults.save(config_dir)?;
            log::info!("Wrote default config to {}", path.display());
            return Ok(defaults);
        }
        let config = Self::read(&path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write `config.ron` into `config_dir`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;
        let text = ron::ser::to_string_pretty(self, pretty()).map_err(ConfigError::SerializeError)?;
        std::fs::write(Self::file_in(config_dir), text).map_err(ConfigError::WriteError)
    }

    /// Re-read the file; `Some` only when its contents differ from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = Self::read(&Self::file_in(config_dir))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Config changed on disk");
        Ok(Some(fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Defaults serialize to readable RON.
    #[test]
    fn test_defaults_write_readable_ron() {
        let text = ron::ser::to_string_pretty(&Config::default(), pretty()).unwrap();
        assert!(text.contains("viewport_width: 1280"));
        assert!(text.contains("small_angle_threshold_deg: 22.5"));
    }

    /// A file missing whole sections fills them with defaults.
    #[test]
    fn test_missing_section_uses_default() {
        let config: Config = ron::from_str("(render: (vertical_exaggeration: 3.0), debug: ())").unwrap();
        assert_eq!(config.render.vertical_exaggeration, 3.0);
        assert_eq!(config.render.viewport_height, 720);
        assert_eq!(config.airspace, AirspaceConfig::default());
    }

    /// Unknown settings from newer versions are ignored.
    #[test]
    fn test_unknown_setting_ignored() {
        let config: Config = ron::from_str("(future_setting: true)").unwrap();
        assert_eq!(config, Config::default());
    }

    /// A saved config loads back unchanged.
    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache.geometry_cache_capacity = 1 << 20;
        config.path.num_subsegments = 4;
        config.save(dir.path()).unwrap();
        assert_eq!(Config::load_or_create(dir.path()).unwrap(), config);
    }

    /// Loading from an empty directory writes the defaults.
    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(Config::file_in(dir.path()).exists());
    }

    /// Reload reports a changed file and stays quiet otherwise.
    #[test]
    fn test_reload_reports_only_changes() {
        let dir = tempfile::tempdir().unwrap();
        let current = Config::default();
        current.save(dir.path()).unwrap();
        assert!(current.reload(dir.path()).unwrap().is_none());

        let mut edited = current.clone();
        edited.debug.frames = 10;
        edited.save(dir.path()).unwrap();
        assert_eq!(current.reload(dir.path()).unwrap(), Some(edited));
    }

    /// Malformed RON is a parse error.
    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(Config::file_in(dir.path()), "{{not valid}}").unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
