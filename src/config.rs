//! Configuration file parser for ~/.config/feedwatch/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each one.
//! The `RSS_INTERVAL` environment variable overrides `poll_interval_secs`.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the poll interval, in seconds.
pub const INTERVAL_ENV: &str = "RSS_INTERVAL";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,

    /// Per-request fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// SQLite file holding subscriptions. Defaults to `feeds.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Persist watermarks so restarts don't re-announce already seen items.
    pub persist_watermarks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 900,
            fetch_timeout_secs: 30,
            database_path: None,
            persist_watermarks: true,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 4] = [
        "poll_interval_secs",
        "fetch_timeout_secs",
        "database_path",
        "persist_watermarks",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            poll_interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply an interval override read from [`INTERVAL_ENV`].
    ///
    /// Non-numeric or zero values are logged and ignored.
    pub fn apply_interval_override(&mut self, raw: Option<&str>) {
        let Some(raw) = raw else {
            return;
        };
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => self.poll_interval_secs = secs,
            _ => tracing::warn!(
                value = %raw,
                env = INTERVAL_ENV,
                "Ignoring invalid poll interval override"
            ),
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        let raw = std::env::var(INTERVAL_ENV).ok();
        self.apply_interval_override(raw.as_deref());
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedwatch_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 900);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert!(config.database_path.is_none());
        assert!(config.persist_watermarks);
        assert_eq!(config.poll_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedwatch_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "poll_interval_secs = 60\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert!(config.persist_watermarks);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
poll_interval_secs = 120
fetch_timeout_secs = 10
database_path = "/var/lib/feedwatch/feeds.db"
persist_watermarks = false
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 120);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/var/lib/feedwatch/feeds.db"))
        );
        assert!(!config.persist_watermarks);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "poll_interval_secs = \"soon\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "poll_interval_secs = 5\ntheme = \"dark\"\n");
        assert_eq!(Config::load(&path).unwrap().poll_interval_secs, 5);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_interval_override() {
        let mut config = Config::default();

        config.apply_interval_override(Some("60"));
        assert_eq!(config.poll_interval_secs, 60);

        config.apply_interval_override(Some("soon"));
        assert_eq!(config.poll_interval_secs, 60);

        config.apply_interval_override(Some("0"));
        assert_eq!(config.poll_interval_secs, 60);

        config.apply_interval_override(None);
        assert_eq!(config.poll_interval_secs, 60);
    }
}
