//! Empties a game-cache shard directory in place, keeping the shard
//! directory itself in existence — many cache daemons expect it to always
//! be there, not re-created lazily on first write.

use gamecache_config::{CoreError, CoreResult};
use operation_registry::{OperationHandle, OperationKind, OperationRegistry};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    All,
    Service(String),
}

impl CacheScope {
    fn as_scope_string(&self) -> Option<String> {
        match self {
            CacheScope::All => None,
            CacheScope::Service(name) => Some(name.clone()),
        }
    }
}

pub struct CacheClearRunner {
    registry: OperationRegistry,
    cache_dir: PathBuf,
}

impl CacheClearRunner {
    pub fn new(registry: OperationRegistry, cache_dir: PathBuf) -> Self {
        Self { registry, cache_dir }
    }

    pub async fn run(&self, scope: CacheScope) -> CoreResult<OperationHandle> {
        let label = match &scope {
            CacheScope::All => "clear all cache shards".to_string(),
            CacheScope::Service(name) => format!("clear cache shard {name}"),
        };
        let handle = self
            .registry
            .register(OperationKind::CacheClear, label, scope.as_scope_string())
            .await?;

        let shards = self.shard_dirs(&scope)?;
        let worker = handle.clone();
        let total = shards.len().max(1);
        tokio::spawn(async move {
            let outcome = Self::clear_shards(&shards, &worker, total).await;
            match outcome {
                Ok(()) => {
                    let _ = worker.complete(true, None).await;
                }
                Err(err) => {
                    let _ = worker.complete(false, Some(err.to_string())).await;
                }
            }
        });

        Ok(handle)
    }

    fn shard_dirs(&self, scope: &CacheScope) -> CoreResult<Vec<PathBuf>> {
        match scope {
            CacheScope::Service(name) => Ok(vec![self.cache_dir.join(name)]),
            CacheScope::All => {
                if !self.cache_dir.exists() {
                    return Ok(Vec::new());
                }
                let mut shards = Vec::new();
                for entry in std::fs::read_dir(&self.cache_dir).map_err(CoreError::from)? {
                    let entry = entry.map_err(CoreError::from)?;
                    if entry.file_type().map_err(CoreError::from)?.is_dir() {
                        shards.push(entry.path());
                    }
                }
                Ok(shards)
            }
        }
    }

    async fn clear_shards(shards: &[PathBuf], handle: &OperationHandle, total: usize) -> CoreResult<()> {
        for (index, shard) in shards.iter().enumerate() {
            if handle.cancel_token().is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            clear_shard_contents(shard)?;
            let percent = 100.0 * (index + 1) as f64 / total as f64;
            handle
                .set_progress(percent, format!("cleared {}", shard.display()))
                .await?;
        }
        Ok(())
    }
}

/// Deletes everything under `shard` and recreates the directory itself
/// immediately, so a daemon watching for it never observes it missing.
fn clear_shard_contents(shard: &Path) -> CoreResult<()> {
    if shard.exists() {
        std::fs::remove_dir_all(shard).map_err(CoreError::from)?;
    }
    std::fs::create_dir_all(shard).map_err(CoreError::from)?;
    Ok(())
}
