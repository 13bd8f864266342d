use crate::cancellation::CancellationToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    DepotMapping,
    CacheClear,
    CorruptionDetect,
    CorruptionRemove,
    LogRemove,
    LogCount,
    DatabaseReset,
    DepotJsonImport,
}

impl OperationKind {
    /// At most one record of this kind may be running process-wide,
    /// regardless of scope.
    pub fn is_singleton(self) -> bool {
        matches!(
            self,
            OperationKind::DepotMapping
                | OperationKind::DatabaseReset
                | OperationKind::CorruptionRemove
                | OperationKind::LogRemove
        )
    }

    /// Retention TTL for terminal records of this kind.
    pub fn retention(self) -> chrono::Duration {
        match self {
            OperationKind::CacheClear => chrono::Duration::hours(24),
            _ => chrono::Duration::hours(48),
        }
    }

    /// Cache-clear operations are persisted to their own history file.
    pub fn uses_cache_operations_file(self) -> bool {
        matches!(self, OperationKind::CacheClear)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::DepotMapping => "DepotMapping",
            OperationKind::CacheClear => "CacheClear",
            OperationKind::CorruptionDetect => "CorruptionDetect",
            OperationKind::CorruptionRemove => "CorruptionRemove",
            OperationKind::LogRemove => "LogRemove",
            OperationKind::LogCount => "LogCount",
            OperationKind::DatabaseReset => "DatabaseReset",
            OperationKind::DepotJsonImport => "DepotJsonImport",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }
}

/// The durable, serializable form of an operation record. This is what
/// gets written to `operation_history.json` / `cache_operations.json` and
/// what `OperationRegistry::list` returns; it omits the live cancellation
/// handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    /// Disambiguates concurrent same-kind operations for scoped kinds
    /// (e.g. the cache shard name for `CacheClear`).
    pub scope: Option<String>,
    pub label: String,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: Option<DateTime<Utc>>,
    pub last_message: String,
    pub last_percent: f64,
    pub error: Option<String>,
}

/// An in-memory record paired with its cancellation token. Never
/// serialized directly.
pub(crate) struct LiveRecord {
    pub record: OperationRecord,
    pub cancel: CancellationToken,
}
