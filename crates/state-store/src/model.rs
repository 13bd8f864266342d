use chrono::{DateTime, Utc};
use gamecache_config::CrawlMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogProcessing {
    pub position: u64,
    #[serde(default)]
    pub datasource_positions: HashMap<String, u64>,
    #[serde(default)]
    pub datasource_total_lines: HashMap<String, u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotProcessing {
    pub is_active: bool,
    pub status_text: String,
    pub total_batches: u64,
    pub processed_batches: u64,
    pub progress_percent: f64,
    pub depot_mappings_found: u64,
    pub start_utc: Option<DateTime<Utc>>,
    pub last_change_number: u32,
    pub remaining_apps: Vec<u32>,
}

impl Default for DepotProcessing {
    fn default() -> Self {
        Self {
            is_active: false,
            status_text: String::new(),
            total_batches: 0,
            processed_batches: 0,
            progress_percent: 0.0,
            depot_mappings_found: 0,
            start_utc: None,
            last_change_number: 0,
            remaining_apps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViabilityCache {
    pub requires_full_scan: bool,
    pub last_check_utc: Option<DateTime<Utc>>,
    pub last_check_change_number: u32,
    pub change_gap: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReplacement {
    pub count: u32,
    pub last_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduling {
    pub last_pics_crawl_utc: Option<DateTime<Utc>>,
    pub crawl_interval_hours: f64,
    pub crawl_mode: CrawlMode,
}

impl Default for Scheduling {
    fn default() -> Self {
        Self {
            last_pics_crawl_utc: None,
            crawl_interval_hours: gamecache_config::DEFAULT_CRAWL_INTERVAL_HOURS,
            crawl_mode: CrawlMode::Incremental,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flags {
    pub setup_completed: bool,
    pub has_processed_logs: bool,
    #[serde(default)]
    pub guest_defaults: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub excluded_client_rules: Vec<String>,
    #[serde(default)]
    pub allowed_time_formats: Vec<String>,
}

/// The single durably-written document the State Store owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub log_processing: LogProcessing,
    #[serde(default)]
    pub depot_processing: DepotProcessing,
    #[serde(default)]
    pub viability_cache: ViabilityCache,
    #[serde(default)]
    pub session_replacement: SessionReplacement,
    #[serde(default)]
    pub scheduling: Scheduling,
    #[serde(default)]
    pub flags: Flags,
    /// Present only on documents written before the secret store existed;
    /// migrated out and nilled on first access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_steam_auth: Option<serde_json::Value>,
}
