//! Configuration for the cache keeper daemon.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CRAWL_INTERVAL_HOURS: f64 = 6.0;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_SESSION_REPLACED_BEFORE_LOGOUT: u32 = 3;
pub const DEFAULT_DEPOT_BATCH_SIZE: usize = 50;

/// How the depot mapping engine should source its scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    Incremental,
    Full,
    Artifact,
}

impl Default for CrawlMode {
    fn default() -> Self {
        CrawlMode::Incremental
    }
}

/// Main daemon configuration, persisted as `config.json` under [`Paths::base_dir`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_crawl_interval_hours")]
    pub crawl_interval_hours: f64,

    #[serde(default)]
    pub crawl_mode: CrawlMode,

    /// Only consulted when `crawl_mode == Artifact`.
    #[serde(default)]
    pub artifact_url: Option<String>,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_max_session_replaced_before_logout")]
    pub max_session_replaced_before_logout: u32,

    #[serde(default = "default_depot_batch_size")]
    pub depot_batch_size: usize,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_log_manager_bin")]
    pub log_manager_bin: PathBuf,

    #[serde(default = "default_corruption_manager_bin")]
    pub corruption_manager_bin: PathBuf,

    #[serde(default = "default_tz")]
    pub tz: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_crawl_interval_hours() -> f64 {
    DEFAULT_CRAWL_INTERVAL_HOURS
}
fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}
fn default_max_session_replaced_before_logout() -> u32 {
    DEFAULT_MAX_SESSION_REPLACED_BEFORE_LOGOUT
}
fn default_depot_batch_size() -> usize {
    DEFAULT_DEPOT_BATCH_SIZE
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("/cache")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("/logs")
}
fn default_log_manager_bin() -> PathBuf {
    PathBuf::from("log_manager")
}
fn default_corruption_manager_bin() -> PathBuf {
    PathBuf::from("corruption_manager")
}
fn default_tz() -> String {
    std::env::var("TZ").unwrap_or_else(|_| "UTC".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            crawl_interval_hours: default_crawl_interval_hours(),
            crawl_mode: CrawlMode::default(),
            artifact_url: None,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_session_replaced_before_logout: default_max_session_replaced_before_logout(),
            depot_batch_size: default_depot_batch_size(),
            cache_dir: default_cache_dir(),
            log_dir: default_log_dir(),
            log_manager_bin: default_log_manager_bin(),
            corruption_manager_bin: default_corruption_manager_bin(),
            tz: default_tz(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(v) = std::env::var("CACHEKEEPER_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("CACHEKEEPER_CRAWL_INTERVAL_HOURS") {
            if let Ok(hours) = v.parse() {
                self.crawl_interval_hours = hours;
            }
        }
        if let Ok(v) = std::env::var("CACHEKEEPER_ARTIFACT_URL") {
            self.artifact_url = Some(v);
        }
        if let Ok(v) = std::env::var("TZ") {
            self.tz = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_has_conservative_constants() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.max_session_replaced_before_logout, 3);
        assert_eq!(config.crawl_mode, CrawlMode::Incremental);
    }

    #[test]
    fn load_from_file_overlays_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"log_level": "debug"}"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.depot_batch_size, DEFAULT_DEPOT_BATCH_SIZE);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.log_level = "trace".to_string();
        config.crawl_mode = CrawlMode::Artifact;
        config.artifact_url = Some("https://example.invalid/artifact.json".to_string());
        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.crawl_mode, CrawlMode::Artifact);
        assert_eq!(
            loaded.artifact_url.as_deref(),
            Some("https://example.invalid/artifact.json")
        );
    }

    #[test]
    fn load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config::load(&paths).unwrap();
        assert_eq!(config.crawl_interval_hours, DEFAULT_CRAWL_INTERVAL_HOURS);
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let mut config = Config::default();
        config.log_level = "info".to_string();
        config.save(&paths).unwrap();

        std::env::set_var("CACHEKEEPER_LOG_LEVEL", "warn");
        let loaded = Config::load(&paths).unwrap();
        std::env::remove_var("CACHEKEEPER_LOG_LEVEL");
        assert_eq!(loaded.log_level, "warn");
    }
}
