//! Detects and repairs cache corruption by delegating to the external
//! `corruption_manager` tool; caches its summary while the log directory
//! is unchanged.

use crate::subprocess::{poll_for_file, run_tool};
use async_trait::async_trait;
use gamecache_config::{Config, CoreError, CoreResult, Paths};
use operation_registry::{OperationHandle, OperationKind, OperationRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorruptionSummary {
    pub corrupted_files: u64,
    pub scanned_files: u64,
}

/// Isolates the external `corruption_manager` tool.
#[async_trait]
pub trait CorruptionManagerPort: Send + Sync {
    async fn summary(&self, log_dir: &Path, cache_dir: &Path, tz: &str) -> CoreResult<CorruptionSummary>;
    async fn detect(
        &self,
        log_dir: &Path,
        cache_dir: &Path,
        tz: &str,
        progress_file: &Path,
        cancel: &operation_registry::CancellationToken,
    ) -> CoreResult<()>;
    async fn remove(
        &self,
        log_dir: &Path,
        cache_dir: &Path,
        tz: &str,
        progress_file: &Path,
        cancel: &operation_registry::CancellationToken,
    ) -> CoreResult<()>;
}

pub struct SubprocessCorruptionManager {
    bin: PathBuf,
}

impl SubprocessCorruptionManager {
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }

    async fn run_verb(&self, verb: &str, log_dir: &Path, cache_dir: &Path, tz: &str) -> CoreResult<String> {
        let args = vec![
            verb.to_string(),
            log_dir.display().to_string(),
            cache_dir.display().to_string(),
            tz.to_string(),
        ];
        let output = run_tool(&self.bin, &args).await?;
        Ok(output.stdout)
    }
}

#[async_trait]
impl CorruptionManagerPort for SubprocessCorruptionManager {
    async fn summary(&self, log_dir: &Path, cache_dir: &Path, tz: &str) -> CoreResult<CorruptionSummary> {
        let stdout = self.run_verb("summary", log_dir, cache_dir, tz).await?;
        serde_json::from_str(&stdout).map_err(CoreError::from)
    }

    async fn detect(
        &self,
        log_dir: &Path,
        cache_dir: &Path,
        tz: &str,
        progress_file: &Path,
        cancel: &operation_registry::CancellationToken,
    ) -> CoreResult<()> {
        self.run_verb("detect", log_dir, cache_dir, tz).await?;
        poll_for_file(progress_file, cancel, Duration::from_secs(60)).await
    }

    async fn remove(
        &self,
        log_dir: &Path,
        cache_dir: &Path,
        tz: &str,
        progress_file: &Path,
        cancel: &operation_registry::CancellationToken,
    ) -> CoreResult<()> {
        self.run_verb("remove", log_dir, cache_dir, tz).await?;
        poll_for_file(progress_file, cancel, Duration::from_secs(60)).await
    }
}

/// Deterministic double: records calls, never touches a filesystem tool.
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    pub struct StubCorruptionManager {
        pub fixed_summary: CorruptionSummary,
        pub detect_calls: AtomicU32,
        pub remove_calls: AtomicU32,
        pub last_progress_file: Mutex<Option<PathBuf>>,
    }

    impl StubCorruptionManager {
        pub fn new(fixed_summary: CorruptionSummary) -> Self {
            Self {
                fixed_summary,
                detect_calls: AtomicU32::new(0),
                remove_calls: AtomicU32::new(0),
                last_progress_file: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CorruptionManagerPort for StubCorruptionManager {
        async fn summary(&self, _log_dir: &Path, _cache_dir: &Path, _tz: &str) -> CoreResult<CorruptionSummary> {
            Ok(self.fixed_summary.clone())
        }

        async fn detect(
            &self,
            _log_dir: &Path,
            _cache_dir: &Path,
            _tz: &str,
            progress_file: &Path,
            _cancel: &operation_registry::CancellationToken,
        ) -> CoreResult<()> {
            self.detect_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_progress_file.lock().unwrap() = Some(progress_file.to_path_buf());
            std::fs::write(progress_file, r#"{"percent": 100.0, "message": "done"}"#).ok();
            Ok(())
        }

        async fn remove(
            &self,
            _log_dir: &Path,
            _cache_dir: &Path,
            _tz: &str,
            progress_file: &Path,
            _cancel: &operation_registry::CancellationToken,
        ) -> CoreResult<()> {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(progress_file, r#"{"percent": 100.0, "message": "done"}"#).ok();
            Ok(())
        }
    }
}

pub struct CorruptionRunner<P: CorruptionManagerPort> {
    port: Arc<P>,
    registry: OperationRegistry,
    paths: Paths,
    config: Config,
}

impl<P: CorruptionManagerPort + 'static> CorruptionRunner<P> {
    pub fn new(port: P, registry: OperationRegistry, paths: Paths, config: Config) -> Self {
        Self { port: Arc::new(port), registry, paths, config }
    }

    /// Returns the cached summary when it is newer than the log directory,
    /// otherwise invokes the tool and writes a fresh cache file.
    pub async fn summary(&self) -> CoreResult<CorruptionSummary> {
        let cache_file = self.paths.corruption_summary_cache_file();
        if is_cache_fresh(&cache_file, &self.config.log_dir)? {
            if let Some(summary) = read_cached_summary(&cache_file) {
                return Ok(summary);
            }
        }

        let summary = self
            .port
            .summary(&self.config.log_dir, &self.config.cache_dir, &self.config.tz)
            .await?;
        let serialized = serde_json::to_string(&summary).map_err(CoreError::from)?;
        std::fs::write(&cache_file, serialized).map_err(CoreError::from)?;
        Ok(summary)
    }

    pub async fn detect(&self) -> CoreResult<OperationHandle> {
        let scope = format!("{}:{}", self.config.cache_dir.display(), self.config.log_dir.display());
        let handle = self
            .registry
            .register(OperationKind::CorruptionDetect, "corruption detect", Some(scope))
            .await?;
        let progress_file = self.paths.corruption_detect_progress_file();
        self.spawn(handle.clone(), progress_file, true);
        Ok(handle)
    }

    pub async fn remove(&self) -> CoreResult<OperationHandle> {
        let handle = self
            .registry
            .register(OperationKind::CorruptionRemove, "corruption remove", None)
            .await?;
        let progress_file = self.paths.corruption_remove_progress_file();
        self.spawn(handle.clone(), progress_file, false);
        Ok(handle)
    }

    fn spawn(&self, handle: OperationHandle, progress_file: PathBuf, is_detect: bool) {
        let port = Arc::clone(&self.port);
        let log_dir = self.config.log_dir.clone();
        let cache_dir = self.config.cache_dir.clone();
        let tz = self.config.tz.clone();

        tokio::spawn(async move {
            let _ = std::fs::remove_file(&progress_file);
            let cancel = handle.cancel_token();
            let result = if is_detect {
                port.detect(&log_dir, &cache_dir, &tz, &progress_file, &cancel).await
            } else {
                port.remove(&log_dir, &cache_dir, &tz, &progress_file, &cancel).await
            };

            match result {
                Ok(()) => {
                    let message = crate::subprocess::read_progress_file(&progress_file)
                        .map(|(_, message)| message)
                        .unwrap_or_default();
                    let _ = handle.set_progress(100.0, message).await;
                    let _ = handle.complete(true, None).await;
                }
                Err(err) => {
                    let _ = handle.complete(false, Some(err.to_string())).await;
                }
            }
        });
    }
}

fn is_cache_fresh(cache_file: &Path, log_dir: &Path) -> CoreResult<bool> {
    let cache_mtime = match std::fs::metadata(cache_file).and_then(|m| m.modified()) {
        Ok(mtime) => mtime,
        Err(_) => return Ok(false),
    };
    let logs_mtime = match std::fs::metadata(log_dir).and_then(|m| m.modified()) {
        Ok(mtime) => mtime,
        Err(_) => return Ok(true),
    };
    Ok(cache_mtime > logs_mtime)
}

fn read_cached_summary(cache_file: &Path) -> Option<CorruptionSummary> {
    let raw = std::fs::read_to_string(cache_file).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::testing::StubCorruptionManager;
    use super::*;
    use gamecache_config::Config;
    use push_bus::PushBus;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn registry(paths: Paths) -> OperationRegistry {
        OperationRegistry::new(paths, PushBus::new()).await.unwrap()
    }

    fn config_for(log_dir: PathBuf, cache_dir: PathBuf) -> Config {
        Config { log_dir, cache_dir, ..Config::default() }
    }

    #[tokio::test]
    async fn returns_the_cached_summary_when_newer_than_the_log_directory() {
        let base = tempdir().unwrap();
        let log_dir = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());
        let reg = registry(paths.clone()).await;

        let cache_file = paths.corruption_summary_cache_file();
        std::fs::write(&cache_file, r#"{"corrupted_files": 3, "scanned_files": 9}"#).unwrap();
        // The log directory already exists and was created before the cache
        // file, so its mtime predates the cache's.

        let port = StubCorruptionManager::new(CorruptionSummary { corrupted_files: 99, scanned_files: 99 });
        let runner = CorruptionRunner::new(
            port,
            reg,
            paths,
            config_for(log_dir.path().to_path_buf(), cache_dir.path().to_path_buf()),
        );

        let summary = runner.summary().await.unwrap();
        assert_eq!(summary.corrupted_files, 3);
        assert_eq!(summary.scanned_files, 9);
    }

    #[tokio::test]
    async fn re_invokes_the_tool_when_the_log_directory_is_newer_than_the_cache() {
        let base = tempdir().unwrap();
        let log_dir = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());
        let reg = registry(paths.clone()).await;

        let cache_file = paths.corruption_summary_cache_file();
        std::fs::write(&cache_file, r#"{"corrupted_files": 3, "scanned_files": 9}"#).unwrap();
        // Touch the log directory so its mtime is after the cache file's.
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(log_dir.path().join("new.log"), b"x").unwrap();

        let port = StubCorruptionManager::new(CorruptionSummary { corrupted_files: 1, scanned_files: 2 });
        let runner = CorruptionRunner::new(
            port,
            reg,
            paths,
            config_for(log_dir.path().to_path_buf(), cache_dir.path().to_path_buf()),
        );

        let summary = runner.summary().await.unwrap();
        assert_eq!(summary.corrupted_files, 1);
        assert_eq!(summary.scanned_files, 2);
    }

    #[tokio::test]
    async fn detect_conflicts_on_the_same_cache_log_pair_but_remove_is_a_singleton() {
        let base = tempdir().unwrap();
        let log_dir = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());
        let reg = registry(paths.clone()).await;

        let port = StubCorruptionManager::new(CorruptionSummary::default());
        let runner = CorruptionRunner::new(
            port,
            reg,
            paths,
            config_for(log_dir.path().to_path_buf(), cache_dir.path().to_path_buf()),
        );

        let _first = runner.detect().await.unwrap();
        let second = runner.detect().await;
        assert!(matches!(second, Err(CoreError::Conflict(_))));
    }
}
