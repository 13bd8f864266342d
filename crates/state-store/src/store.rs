use crate::model::AppState;
use chrono::{DateTime, Utc};
use gamecache_config::{atomic_write, CoreError, CoreResult, Paths};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Consecutive save failures after which writes are disabled until restart.
const WRITE_FAILURE_THRESHOLD: u32 = 5;

/// Atomic, durably-written JSON document store for all operational state.
///
/// `get()` is a cheap clone under a short-lived lock; `update()` applies a
/// closure to the in-memory snapshot and persists it, keeping the mutated
/// state in memory even if the persist itself fails.
pub struct StateStore {
    paths: Paths,
    inner: Mutex<AppState>,
    write_failures: AtomicU32,
    writes_disabled: AtomicBool,
}

impl StateStore {
    /// Load `state.json`, running legacy migration first if it is absent.
    pub fn open(paths: Paths) -> CoreResult<Self> {
        paths.ensure_dirs()?;

        let state = if paths.state_file().exists() {
            match std::fs::read_to_string(paths.state_file()) {
                Ok(raw) => match serde_json::from_str::<AppState>(&raw) {
                    Ok(state) => state,
                    Err(err) => {
                        tracing::warn!(error = %err, "state.json failed to parse, starting from defaults");
                        AppState::default()
                    }
                },
                Err(err) => {
                    tracing::warn!(error = %err, "state.json unreadable, starting from defaults");
                    AppState::default()
                }
            }
        } else if let Some(migrated) = crate::legacy::migrate_legacy(&paths)? {
            migrated
        } else {
            AppState::default()
        };

        let store = Self {
            paths,
            inner: Mutex::new(state),
            write_failures: AtomicU32::new(0),
            writes_disabled: AtomicBool::new(false),
        };
        store.persist_locked(&store.inner.lock().unwrap())?;
        Ok(store)
    }

    /// Cheap snapshot of the current state.
    pub fn get(&self) -> AppState {
        self.inner.lock().unwrap().clone()
    }

    /// Apply `f` to the in-memory state, then persist. On persist failure
    /// the in-memory mutation is kept (spec: "write errors -> in-memory
    /// truth preserved") and the error is returned to the caller.
    pub fn update<F>(&self, f: F) -> CoreResult<AppState>
    where
        F: FnOnce(&mut AppState),
    {
        let mut guard = self.inner.lock().unwrap();
        f(&mut guard);
        let snapshot = guard.clone();

        if self.writes_disabled.load(Ordering::SeqCst) {
            return Ok(snapshot);
        }

        match self.persist_locked(&guard) {
            Ok(()) => {
                self.write_failures.store(0, Ordering::SeqCst);
                Ok(snapshot)
            }
            Err(err) => {
                let failures = self.write_failures.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(error = %err, failures, "state store write failed");
                if failures >= WRITE_FAILURE_THRESHOLD {
                    self.writes_disabled.store(true, Ordering::SeqCst);
                    tracing::error!("state store writes disabled after repeated failures");
                }
                Err(err)
            }
        }
    }

    pub fn set_log_position(&self, position: u64) -> CoreResult<AppState> {
        self.update(|s| {
            s.log_processing.position = position;
            s.log_processing.last_updated = Some(Utc::now());
        })
    }

    pub fn set_datasource_position(&self, name: &str, position: u64) -> CoreResult<AppState> {
        let name = name.to_string();
        self.update(|s| {
            s.log_processing.datasource_positions.insert(name, position);
            s.log_processing.last_updated = Some(Utc::now());
        })
    }

    pub fn set_last_pics_crawl(&self, at: DateTime<Utc>) -> CoreResult<AppState> {
        self.update(|s| {
            s.scheduling.last_pics_crawl_utc = Some(at);
        })
    }

    pub fn set_depot_processing(&self, f: impl FnOnce(&mut crate::model::DepotProcessing)) -> CoreResult<AppState> {
        self.update(|s| f(&mut s.depot_processing))
    }

    pub fn set_viability_cache(&self, cache: crate::model::ViabilityCache) -> CoreResult<AppState> {
        self.update(|s| s.viability_cache = cache)
    }

    pub fn record_session_replacement(&self, at: DateTime<Utc>) -> CoreResult<AppState> {
        self.update(|s| {
            let reset_after_24h = s
                .session_replacement
                .last_utc
                .map(|last| at - last > chrono::Duration::hours(24))
                .unwrap_or(false);
            if reset_after_24h {
                s.session_replacement.count = 0;
            }
            s.session_replacement.count += 1;
            s.session_replacement.last_utc = Some(at);
        })
    }

    pub fn reset_session_replacement_counter(&self) -> CoreResult<AppState> {
        self.update(|s| {
            s.session_replacement.count = 0;
            s.session_replacement.last_utc = None;
        })
    }

    pub fn writes_disabled(&self) -> bool {
        self.writes_disabled.load(Ordering::SeqCst)
    }

    fn persist_locked(&self, state: &AppState) -> CoreResult<()> {
        let serialized = serde_json::to_string_pretty(state).map_err(CoreError::from)?;
        atomic_write(&self.paths.state_file(), &self.paths.state_tmp_file(), &serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &std::path::Path) -> StateStore {
        StateStore::open(Paths::with_base_dir(dir.to_path_buf())).unwrap()
    }

    #[test]
    fn fresh_store_has_default_state() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        assert_eq!(store.get(), AppState::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempdir().unwrap();
        {
            let store = open(dir.path());
            store.set_log_position(42).unwrap();
        }
        let store = open(dir.path());
        assert_eq!(store.get().log_processing.position, 42);
    }

    #[test]
    fn save_then_load_roundtrips_full_state() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        store
            .update(|s| {
                s.depot_processing.is_active = true;
                s.depot_processing.remaining_apps = vec![1, 2, 3];
                s.scheduling.crawl_interval_hours = 3.5;
            })
            .unwrap();
        let snapshot = store.get();

        drop(store);
        let reopened = open(dir.path());
        assert_eq!(reopened.get(), snapshot);
    }

    #[test]
    fn concurrent_updates_serialize() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempdir().unwrap();
        let store = Arc::new(open(dir.path()));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                store
                    .update(|s| s.log_processing.position += 1)
                    .unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get().log_processing.position, 20);
    }

    #[test]
    fn session_replacement_counter_resets_after_24h() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        let t0 = Utc::now() - chrono::Duration::hours(30);
        store.record_session_replacement(t0).unwrap();
        assert_eq!(store.get().session_replacement.count, 1);

        store.record_session_replacement(Utc::now()).unwrap();
        assert_eq!(store.get().session_replacement.count, 1);
    }

    #[test]
    fn write_failure_disables_writes_after_threshold() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());

        // Replace the base dir with a file so subsequent atomic writes
        // (which rename into it) fail.
        std::fs::remove_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path(), b"not a directory").unwrap();

        for _ in 0..WRITE_FAILURE_THRESHOLD {
            let _ = store.update(|s| s.log_processing.position += 1);
        }
        assert!(store.writes_disabled());
    }
}
