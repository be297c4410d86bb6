//! TOML configuration for buildperf.
//!
//! Layered lookup: an explicit `--config` path, then the `BUILDPERF_CONFIG`
//! environment variable, then `/etc/buildperf/buildperf.toml`, then the
//! compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::ranking::DEFAULT_DISPLAY_COUNT;
use crate::analysis::view::DEFAULT_URL_NAME;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BUILDPERF_CONFIG";

const SYSTEM_CONFIG: &str = "/etc/buildperf/buildperf.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildperfConfig {
    pub history: HistoryConfig,
    pub storage: StorageConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

impl BuildperfConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded buildperf configuration");
        Ok(config)
    }

    /// An explicit path must load. Without one, fall back through the
    /// environment variable and system location to defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::load_or_default()),
        }
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "BUILDPERF_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Directory holding `<project>/builds/<n>/*.json`.
    pub root: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/history"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/buildperf.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Values below 1 fall back to the default of 20.
    pub summaries_to_display: i64,
    pub url_name: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            summaries_to_display: DEFAULT_DISPLAY_COUNT as i64,
            url_name: DEFAULT_URL_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = BuildperfConfig::default();
        assert_eq!(cfg.history.root, PathBuf::from("data/history"));
        assert_eq!(cfg.storage.db_path, "data/buildperf.db");
        assert_eq!(cfg.display.summaries_to_display, 20);
        assert_eq!(cfg.display.url_name, "cucumber-perf-reports");
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[display]
summaries_to_display = 0

[logging]
json = true
"#;
        let cfg: BuildperfConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.display.summaries_to_display, 0);
        assert_eq!(cfg.display.url_name, "cucumber-perf-reports");
        assert!(cfg.logging.json);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.storage, StorageConfig::default());
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: BuildperfConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, BuildperfConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<BuildperfConfig>("[display]\nsummaries = 5\n").is_err());
        assert!(toml::from_str::<BuildperfConfig>("[metrics]\nenabled = true\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[history]\nroot = \"/srv/history\"\n\n[storage]\ndb_path = \"/srv/perf.db\"").unwrap();

        let cfg = BuildperfConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(cfg.history.root, PathBuf::from("/srv/history"));
        assert_eq!(cfg.storage.db_path, "/srv/perf.db");
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(BuildperfConfig::resolve(Some(&missing)).is_err());
    }
}
