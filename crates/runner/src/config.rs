//! Runner configuration loaded from environment variables.

use std::path::PathBuf;

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else is text.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Runner configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `WMS_SCENARIO`: scenario file to replay (default: built-in demo)
/// - `WMS_CONFIG`: engine configuration snapshot in JSON (default: engine defaults)
/// - `WMS_LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub scenario_path: Option<PathBuf>,
    pub engine_config_path: Option<PathBuf>,
    pub log_format: LogFormat,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            scenario_path: get("WMS_SCENARIO").map(PathBuf::from),
            engine_config_path: get("WMS_CONFIG").map(PathBuf::from),
            log_format: get("WMS_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            log_level: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scenario_path: None,
            engine_config_path: None,
            log_format: LogFormat::Text,
            log_level: "info".to_string(),
        }
    }
}
