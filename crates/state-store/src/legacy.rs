//! One-time migration from the legacy per-file layout into a single
//! `AppState` document. Runs only when `state.json` does not yet exist;
//! legacy files are left untouched afterward.

use crate::model::AppState;
use chrono::{DateTime, Utc};
use gamecache_config::{CoreResult, Paths};

pub fn migrate_legacy(paths: &Paths) -> CoreResult<Option<AppState>> {
    let position_file = paths.base_dir().join("position.txt");
    let cache_clear_file = paths.base_dir().join("cache_clear_status.json");
    let setup_file = paths.base_dir().join("setup_completed.txt");
    let last_crawl_file = paths.base_dir().join("last_pics_crawl.txt");

    let any_present = position_file.exists()
        || cache_clear_file.exists()
        || setup_file.exists()
        || last_crawl_file.exists();
    if !any_present {
        return Ok(None);
    }

    let mut state = AppState::default();

    if let Ok(raw) = std::fs::read_to_string(&position_file) {
        if let Ok(position) = raw.trim().parse::<u64>() {
            state.log_processing.position = position;
        }
    }

    if let Ok(raw) = std::fs::read_to_string(&setup_file) {
        let trimmed = raw.trim();
        state.flags.setup_completed = trimmed == "1" || trimmed.eq_ignore_ascii_case("true");
    }

    if let Ok(raw) = std::fs::read_to_string(&last_crawl_file) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) {
            state.scheduling.last_pics_crawl_utc = Some(parsed.with_timezone(&Utc));
        }
    }

    // cache_clear_status.json is a historical list of completed clear
    // operations; nothing in AppState maps to it directly today so it is
    // read only to confirm it parses, not stored further.
    if let Ok(raw) = std::fs::read_to_string(&cache_clear_file) {
        let _: Result<serde_json::Value, _> = serde_json::from_str(&raw);
    }

    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn no_legacy_files_returns_none() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        assert!(migrate_legacy(&paths).unwrap().is_none());
    }

    #[test]
    fn migrates_position_and_setup_flag() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("position.txt"), "12345").unwrap();
        std::fs::write(dir.path().join("setup_completed.txt"), "true").unwrap();

        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let state = migrate_legacy(&paths).unwrap().unwrap();

        assert_eq!(state.log_processing.position, 12345);
        assert!(state.flags.setup_completed);

        // legacy files remain untouched
        assert!(dir.path().join("position.txt").exists());
    }

    #[test]
    fn migrates_last_crawl_timestamp() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("last_pics_crawl.txt"),
            "2024-01-02T03:04:05Z",
        )
        .unwrap();

        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let state = migrate_legacy(&paths).unwrap().unwrap();
        assert!(state.scheduling.last_pics_crawl_utc.is_some());
    }
}
