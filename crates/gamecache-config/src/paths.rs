//! File system paths for the cache keeper daemon.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

const DATA_DIR_ENV: &str = "CACHEKEEPER_DATA_DIR";

/// Resolves every file and directory the daemon touches.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// `~/.cachekeeper`, or `$CACHEKEEPER_DATA_DIR` if set.
    pub fn new() -> CoreResult<Self> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return Ok(Self::with_base_dir(PathBuf::from(dir)));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("could not determine home directory".to_string()))?;
        Ok(Self::with_base_dir(home.join(".cachekeeper")))
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Primary state document (AppState).
    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join("state.json")
    }

    /// Tmp file the state store writes to before the atomic rename.
    pub fn state_tmp_file(&self) -> PathBuf {
        self.base_dir.join("state.json.tmp")
    }

    pub fn operations_dir(&self) -> PathBuf {
        self.base_dir.join("operations")
    }

    pub fn operation_history_file(&self) -> PathBuf {
        self.operations_dir().join("operation_history.json")
    }

    pub fn cache_operations_file(&self) -> PathBuf {
        self.operations_dir().join("cache_operations.json")
    }

    pub fn secret_auth_dir(&self) -> PathBuf {
        self.base_dir.join("steam_auth")
    }

    pub fn secret_auth_file(&self) -> PathBuf {
        self.secret_auth_dir().join("credentials.json")
    }

    pub fn secret_keyseed_file(&self) -> PathBuf {
        self.secret_auth_dir().join(".keyseed")
    }

    pub fn artifact_file(&self) -> PathBuf {
        self.base_dir.join("pics_depot_mappings.json")
    }

    pub fn log_count_progress_file(&self) -> PathBuf {
        self.operations_dir().join("log_count_progress.json")
    }

    pub fn log_remove_progress_file(&self) -> PathBuf {
        self.operations_dir().join("log_remove_progress.json")
    }

    pub fn corruption_detect_progress_file(&self) -> PathBuf {
        self.operations_dir().join("corruption_detect_progress.json")
    }

    pub fn corruption_remove_progress_file(&self) -> PathBuf {
        self.operations_dir().join("corruption_remove_progress.json")
    }

    pub fn corruption_summary_cache_file(&self) -> PathBuf {
        self.operations_dir().join("corruption_summary.json")
    }

    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("cachekeeper.sqlite")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.logs_dir().join("daemon.log")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.base_dir.join("daemon.pid")
    }

    /// Create every directory other accessors assume exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.operations_dir())?;
        std::fs::create_dir_all(self.secret_auth_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().expect("failed to determine home directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn with_base_dir_accessors() {
        let base = PathBuf::from("/tmp/test-cachekeeper");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.state_file(), base.join("state.json"));
        assert_eq!(paths.state_tmp_file(), base.join("state.json.tmp"));
        assert_eq!(paths.secret_auth_file(), base.join("steam_auth/credentials.json"));
        assert_eq!(paths.pid_file(), base.join("daemon.pid"));
    }

    #[test]
    fn operation_files_live_under_operations_dir() {
        let base = PathBuf::from("/tmp/test-cachekeeper2");
        let paths = Paths::with_base_dir(base);

        assert!(paths.operation_history_file().starts_with(paths.operations_dir()));
        assert!(paths.cache_operations_file().starts_with(paths.operations_dir()));
        assert!(paths.log_count_progress_file().starts_with(paths.operations_dir()));
    }

    #[test]
    fn ensure_dirs_creates_everything() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("cachekeeper");
        let paths = Paths::with_base_dir(base.clone());

        assert!(!base.exists());
        paths.ensure_dirs().unwrap();

        assert!(paths.base_dir().is_dir());
        assert!(paths.operations_dir().is_dir());
        assert!(paths.secret_auth_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }

    #[test]
    fn ensure_dirs_idempotent() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.base_dir().exists());
    }

    #[test]
    fn env_override_wins() {
        let dir = tempdir().unwrap();
        std::env::set_var(DATA_DIR_ENV, dir.path());
        let paths = Paths::new().unwrap();
        assert_eq!(paths.base_dir(), &dir.path().to_path_buf());
        std::env::remove_var(DATA_DIR_ENV);
    }
}
