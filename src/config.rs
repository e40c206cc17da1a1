//! Configuration loading
//!
//! Settings come from an optional TOML file; every field has a default so an
//! empty or missing file yields a working configuration. Command-line flags
//! override file values in `main`.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::cache::CacheManager;
use crate::data::eurostat::{DEFAULT_TIMEOUT_SECS, EUROSTAT_JSON_BASE_URL};
use crate::decode::DecoderConfig;
use crate::export::ExportOptions;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "eurostat.toml";

/// Default freshness window of cached datasets (one hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("CSV delimiter must be a single ASCII character, got '{0}'")]
    InvalidDelimiter(char),

    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-stat base URL; the dataset id is appended
    pub base_url: String,
    /// Upstream request timeout
    pub timeout_secs: u64,
    /// Maximum age of a cached dataset that is still served
    pub cache_ttl_secs: u64,
    /// Cache directory (defaults to the XDG cache dir)
    pub cache_dir: Option<PathBuf>,
    /// Root of per-run output directories
    pub output_dir: PathBuf,
    pub csv_delimiter: char,
    pub decoder: DecoderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: EUROSTAT_JSON_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_dir: None,
            output_dir: PathBuf::from("output"),
            csv_delimiter: ';',
            decoder: DecoderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. ./eurostat.toml (current directory)
    /// 3. $XDG_CONFIG_HOME/eurostat-cli/config.toml
    ///
    /// Falls back to defaults when no file is found.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
            None => Self::find_config_file(),
        };

        match path {
            Some(p) => Self::load_from_path(&p),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        let global = ProjectDirs::from("", "", "eurostat-cli")?
            .config_dir()
            .join("config.toml");
        global.exists().then_some(global)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading config");
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.csv_delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter(self.csv_delimiter));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Cache manager for the configured directory
    ///
    /// Returns `None` when no directory is configured and no XDG cache dir exists.
    pub fn cache_manager(&self) -> Option<CacheManager> {
        match &self.cache_dir {
            Some(dir) => Some(CacheManager::with_dir(dir.clone())),
            None => CacheManager::new(),
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            csv_delimiter: self.csv_delimiter as u8,
            ..ExportOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodeMode;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.csv_delimiter, ';');
        assert_eq!(config.decoder.axes.indicator, "na_item");
        assert_eq!(config.decoder.mode, DecodeMode::Full);
        assert_eq!(config.export_options().csv_delimiter, b';');
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides_from_toml() {
        let config = Config::from_toml_str(
            r#"
            cache_ttl_secs = 60
            csv_delimiter = ","
            output_dir = "/tmp/out"

            [decoder]
            mode = "first_category"

            [decoder.axes]
            indicator = "indic_de"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.csv_delimiter, ',');
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.decoder.mode, DecodeMode::FirstCategory);
        assert_eq!(config.decoder.axes.indicator, "indic_de");
        assert_eq!(config.decoder.axes.time, "time");
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let result = Config::from_toml_str("csv_delimiter = \"§\"");
        assert!(matches!(result, Err(ConfigError::InvalidDelimiter('§'))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_toml_str("timeout_secs = 0");
        assert!(matches!(result, Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = Config::from_toml_str("cache_ttl_secs = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "cache_dir = \"/var/cache/eurostat\"").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/eurostat")));
        let manager = config.cache_manager().unwrap();
        assert_eq!(manager.cache_dir(), Path::new("/var/cache/eurostat"));
    }
}
