//! Row types for the cache keeper schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotMapping {
    pub depot_id: u32,
    pub app_id: u32,
    pub app_name: String,
    pub is_owner: bool,
    pub last_seen_change_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    pub id: String,
    pub service: String,
    pub client_ip: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
    pub bytes_hit: i64,
    pub bytes_miss: i64,
    pub is_active: bool,
    pub depot_id: Option<u32>,
    pub game_app_id: Option<u32>,
    pub game_name: Option<String>,
    pub game_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub id: String,
    pub created_utc: DateTime<Utc>,
    pub last_seen_utc: DateTime<Utc>,
}
