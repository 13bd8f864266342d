use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single push-bus message. Every event carries at least `timestamp_utc`;
/// job-lifecycle events additionally carry `operation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub name: String,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub payload: serde_json::Value,
}

impl PushEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            timestamp_utc: Utc::now(),
            operation_id: None,
            payload,
        }
    }

    pub fn with_operation(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }
}

/// Typed builders for the exhaustive event taxonomy this system emits.
/// Each returns a ready-to-publish [`PushEvent`].
pub mod events {
    use super::PushEvent;
    use serde_json::json;

    pub fn depot_mapping_started(operation_id: &str, scan_mode: &str) -> PushEvent {
        PushEvent::new(
            "DepotMappingStarted",
            json!({ "scan_mode": scan_mode, "percent": 0, "is_logged_on": false }),
        )
        .with_operation(operation_id)
    }

    pub fn depot_mapping_progress(
        operation_id: &str,
        scan_mode: &str,
        percent: f64,
        message: &str,
        is_logged_on: bool,
    ) -> PushEvent {
        PushEvent::new(
            "DepotMappingProgress",
            json!({
                "scan_mode": scan_mode,
                "percent": percent,
                "message": message,
                "is_logged_on": is_logged_on,
            }),
        )
        .with_operation(operation_id)
    }

    pub fn depot_mapping_complete(
        operation_id: &str,
        success: bool,
        total_mappings: Option<u64>,
        error: Option<&str>,
    ) -> PushEvent {
        PushEvent::new(
            "DepotMappingComplete",
            json!({
                "success": success,
                "total_mappings": total_mappings,
                "error": error,
            }),
        )
        .with_operation(operation_id)
    }

    pub fn steam_session_error(message: &str) -> PushEvent {
        PushEvent::new("SteamSessionError", json!({ "message": message }))
    }

    pub fn steam_auto_logout() -> PushEvent {
        PushEvent::new("SteamAutoLogout", json!({}))
    }

    pub fn automatic_scan_skipped(reason: &str) -> PushEvent {
        PushEvent::new("AutomaticScanSkipped", json!({ "reason": reason }))
    }

    pub fn job_started(kind: &str, operation_id: &str) -> PushEvent {
        PushEvent::new(format!("{kind}Started"), json!({})).with_operation(operation_id)
    }

    pub fn job_progress(kind: &str, operation_id: &str, percent: f64, message: &str) -> PushEvent {
        PushEvent::new(
            format!("{kind}Progress"),
            json!({ "percent": percent, "message": message }),
        )
        .with_operation(operation_id)
    }

    pub fn job_complete(
        kind: &str,
        operation_id: &str,
        success: bool,
        error: Option<&str>,
    ) -> PushEvent {
        PushEvent::new(
            format!("{kind}Complete"),
            json!({ "success": success, "error": error }),
        )
        .with_operation(operation_id)
    }

    pub fn database_reset_progress(operation_id: &str, percent: f64, table: &str) -> PushEvent {
        PushEvent::new(
            "DatabaseResetProgress",
            json!({ "percent": percent, "table": table }),
        )
        .with_operation(operation_id)
    }

    pub fn user_sessions_cleared(operation_id: &str) -> PushEvent {
        PushEvent::new("UserSessionsCleared", json!({ "clear_cookies": true }))
            .with_operation(operation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::events::*;

    #[test]
    fn every_event_carries_a_timestamp() {
        let e = depot_mapping_started("op-1", "incremental");
        assert_eq!(e.operation_id.as_deref(), Some("op-1"));
    }

    #[test]
    fn user_sessions_cleared_bakes_in_clear_cookies() {
        let e = user_sessions_cleared("op-2");
        assert_eq!(e.payload["clear_cookies"], true);
    }
}
