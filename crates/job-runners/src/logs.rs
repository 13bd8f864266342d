//! Counts and removes per-service log files by delegating to the external
//! `log_manager` tool.

use crate::subprocess::{poll_for_file, run_tool};
use async_trait::async_trait;
use gamecache_config::{Config, CoreError, CoreResult, Paths};
use operation_registry::{OperationHandle, OperationKind, OperationRegistry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogCount {
    pub service: String,
    pub file_count: u64,
    pub byte_size: u64,
}

static IPV4_PATTERN: OnceLock<Regex> = OnceLock::new();

/// A log service name is invalid when it is a raw IPv4 address or one of
/// the reserved synthetic names the log manager uses for non-service
/// traffic.
pub fn is_valid_service_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let pattern = IPV4_PATTERN.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").unwrap());
    if pattern.is_match(name) {
        return false;
    }
    !matches!(name, "localhost" | "ip-address")
}

#[async_trait]
pub trait LogManagerPort: Send + Sync {
    async fn count(&self, log_dir: &Path, service: &str) -> CoreResult<LogCount>;
    async fn remove(
        &self,
        log_dir: &Path,
        service: &str,
        progress_file: &Path,
        cancel: &operation_registry::CancellationToken,
    ) -> CoreResult<()>;
}

pub struct SubprocessLogManager {
    bin: PathBuf,
}

impl SubprocessLogManager {
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }
}

#[async_trait]
impl LogManagerPort for SubprocessLogManager {
    async fn count(&self, log_dir: &Path, service: &str) -> CoreResult<LogCount> {
        let args = vec!["count".to_string(), log_dir.display().to_string(), service.to_string()];
        let output = run_tool(&self.bin, &args).await?;
        serde_json::from_str(&output.stdout).map_err(CoreError::from)
    }

    async fn remove(
        &self,
        log_dir: &Path,
        service: &str,
        progress_file: &Path,
        cancel: &operation_registry::CancellationToken,
    ) -> CoreResult<()> {
        let args = vec!["remove".to_string(), log_dir.display().to_string(), service.to_string()];
        run_tool(&self.bin, &args).await?;
        poll_for_file(progress_file, cancel, Duration::from_secs(15 * 60)).await
    }
}

pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub struct StubLogManager {
        pub fixed_count: LogCount,
        pub remove_calls: AtomicU32,
    }

    impl StubLogManager {
        pub fn new(fixed_count: LogCount) -> Self {
            Self { fixed_count, remove_calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl LogManagerPort for StubLogManager {
        async fn count(&self, _log_dir: &Path, _service: &str) -> CoreResult<LogCount> {
            Ok(self.fixed_count.clone())
        }

        async fn remove(
            &self,
            _log_dir: &Path,
            _service: &str,
            progress_file: &Path,
            _cancel: &operation_registry::CancellationToken,
        ) -> CoreResult<()> {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(progress_file, r#"{"percent": 100.0, "message": "done"}"#).ok();
            Ok(())
        }
    }
}

pub struct LogRunner<P: LogManagerPort> {
    port: Arc<P>,
    registry: OperationRegistry,
    paths: Paths,
    config: Config,
}

impl<P: LogManagerPort + 'static> LogRunner<P> {
    pub fn new(port: P, registry: OperationRegistry, paths: Paths, config: Config) -> Self {
        Self { port: Arc::new(port), registry, paths, config }
    }

    pub async fn count(&self, service: &str) -> CoreResult<OperationHandle> {
        if !is_valid_service_name(service) {
            return Err(CoreError::Invalid(format!("{service} is not a valid service name")));
        }

        let handle = self
            .registry
            .register(OperationKind::LogCount, format!("count logs for {service}"), Some(service.to_string()))
            .await?;

        let port = Arc::clone(&self.port);
        let log_dir = self.config.log_dir.clone();
        let cache_file = self.paths.log_count_progress_file();
        let service = service.to_string();
        let worker = handle.clone();
        tokio::spawn(async move {
            match port.count(&log_dir, &service).await {
                Ok(count) => {
                    if let Ok(serialized) = serde_json::to_string(&count) {
                        let _ = std::fs::write(&cache_file, serialized);
                    }
                    let message = format!("{} files, {} bytes", count.file_count, count.byte_size);
                    let _ = worker.set_progress(100.0, message).await;
                    let _ = worker.complete(true, None).await;
                }
                Err(err) => {
                    let _ = worker.complete(false, Some(err.to_string())).await;
                }
            }
        });

        Ok(handle)
    }

    pub async fn remove(&self, service: &str) -> CoreResult<OperationHandle> {
        if !is_valid_service_name(service) {
            return Err(CoreError::Invalid(format!("{service} is not a valid service name")));
        }

        let handle = self
            .registry
            .register(OperationKind::LogRemove, format!("remove logs for {service}"), None)
            .await?;

        // Invalidate the LogCount cache before the tool runs: a stale count
        // for this service would otherwise outlive the files it describes.
        let _ = std::fs::remove_file(self.paths.log_count_progress_file());

        let port = Arc::clone(&self.port);
        let log_dir = self.config.log_dir.clone();
        let progress_file = self.paths.log_remove_progress_file();
        let service = service.to_string();
        let worker = handle.clone();
        tokio::spawn(async move {
            let _ = std::fs::remove_file(&progress_file);
            let cancel = worker.cancel_token();
            match port.remove(&log_dir, &service, &progress_file, &cancel).await {
                Ok(()) => {
                    let message = crate::subprocess::read_progress_file(&progress_file)
                        .map(|(_, message)| message)
                        .unwrap_or_default();
                    let _ = worker.set_progress(100.0, message).await;
                    let _ = worker.complete(true, None).await;
                }
                Err(err) => {
                    let _ = worker.complete(false, Some(err.to_string())).await;
                }
            }
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_raw_ipv4_addresses() {
        assert!(!is_valid_service_name("10.0.0.1"));
        assert!(!is_valid_service_name("192.168.1.42"));
    }

    #[test]
    fn rejects_reserved_names() {
        assert!(!is_valid_service_name("localhost"));
        assert!(!is_valid_service_name("ip-address"));
    }

    #[test]
    fn accepts_ordinary_service_names() {
        assert!(is_valid_service_name("steam"));
        assert!(is_valid_service_name("battle-net"));
    }

    #[tokio::test]
    async fn remove_rejects_an_invalid_service_name_before_registering() {
        let base = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());
        let registry = OperationRegistry::new(paths.clone(), push_bus::PushBus::new()).await.unwrap();
        let port = testing::StubLogManager::new(LogCount::default());
        let runner = LogRunner::new(port, registry, paths, Config::default());

        let result = runner.remove("localhost").await;
        assert!(matches!(result, Err(CoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn remove_deletes_the_log_count_cache_before_invoking_the_tool() {
        let base = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());
        let registry = OperationRegistry::new(paths.clone(), push_bus::PushBus::new()).await.unwrap();
        std::fs::write(paths.log_count_progress_file(), r#"{"service":"steam","file_count":1,"byte_size":1}"#).unwrap();

        let port = testing::StubLogManager::new(LogCount::default());
        let runner = LogRunner::new(port, registry, paths.clone(), Config::default());
        let handle = runner.remove("steam").await.unwrap();

        assert!(!paths.log_count_progress_file().exists());
        drop(handle);
    }
}
