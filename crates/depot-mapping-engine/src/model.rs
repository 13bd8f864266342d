//! Scan parameters and the artifact wire format.

use chrono::{DateTime, Utc};
use gamecache_db::DepotMapping;
use serde::{Deserialize, Serialize};

/// How the engine should source a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Incremental,
    Full,
    Artifact,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Incremental => "incremental",
            ScanMode::Full => "full",
            ScanMode::Artifact => "artifact",
        }
    }
}

/// Distinguishes a scheduler-triggered request from an explicit one. Only
/// `Incremental` requests consult the viability check, and only
/// `Automatic` ones are skipped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default)]
    pub total_mappings: u64,
    #[serde(default)]
    pub generated_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_change_number: u32,
}

/// The document fetched from `Config::artifact_url` and cached at
/// `Paths::artifact_file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactDocument {
    #[serde(default)]
    pub depot_mappings: Vec<DepotMapping>,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}
