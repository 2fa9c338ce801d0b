//! Structured logging for the globe renderer.
//!
//! Installs a `tracing` subscriber with a console layer and, in debug builds,
//! a JSON file layer for post-mortem analysis. The filter comes from
//! `RUST_LOG` when set, then from the config's log level.

use std::fs::File;
use std::path::Path;

use globus_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "info";
/// File the JSON layer writes inside the log directory.
pub const LOG_FILE_NAME: &str = "globus.log";

/// Filter directive string from the config, or the default.
fn filter_directives(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Open the JSON log file, creating `log_dir` if needed.
fn open_log_file(log_dir: &Path) -> std::io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    File::create(log_dir.join(LOG_FILE_NAME))
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - whether to add the file layer
/// * `config` - source of the log level when `RUST_LOG` is unset
///
/// Calling this twice panics, as installing a second global subscriber does.
///
/// ```no_run
/// use globus_config::Config;
/// use globus_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build && let Some(log_dir) = log_dir {
        match open_log_file(log_dir) {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(fmt::time::uptime())
                    .json();
                subscriber.with(file_layer).init();
                return;
            }
            Err(e) => eprintln!("file logging disabled, cannot open {}: {e}", log_dir.display()),
        }
    }

    subscriber.init();
}

/// The filter installed when nothing overrides it.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The default filter enables info.
    #[test]
    fn test_default_log_level() {
        assert!(default_env_filter().to_string().contains("info"));
    }

    /// The config's level wins over the default; a blank level does not.
    #[test]
    fn test_config_level_used() {
        let mut config = Config::default();
        config.debug.log_level = "warn,globus_shapes=debug".to_string();
        assert_eq!(filter_directives(Some(&config)), "warn,globus_shapes=debug");
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_directives(Some(&config)), DEFAULT_FILTER);
        assert_eq!(filter_directives(None), DEFAULT_FILTER);
    }

    /// Per-crate directives parse.
    #[test]
    fn test_env_filter_parsing() {
        for directives in ["info", "debug,globus_render=trace", "warn,globus_shapes::path=debug"] {
            assert!(EnvFilter::try_new(directives).is_ok(), "{directives}");
        }
    }

    /// The log directory is created on demand.
    #[test]
    fn test_log_file_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        open_log_file(&nested).unwrap();
        assert!(nested.join(LOG_FILE_NAME).exists());
    }

    /// The JSON layer writes one parseable object per event.
    #[test]
    fn test_json_layer_writes_events() {
        let dir = tempfile::tempdir().unwrap();
        let file = open_log_file(dir.path()).unwrap();
        let subscriber = tracing_subscriber::registry().with(fmt::layer().with_writer(file).with_ansi(false).json());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(frame = 3, "frame complete");
        });
        let contents = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        let line = contents.lines().next().unwrap();
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["fields"]["message"], "frame complete");
        assert_eq!(event["fields"]["frame"], 3);
    }
}
