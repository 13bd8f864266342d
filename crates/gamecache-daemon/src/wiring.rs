//! Constructs every subsystem and owns the daemon's process lifecycle.
//!
//! The actual third-party catalog service is an out-of-scope external
//! collaborator (see `catalog-client`'s `CatalogTransport`): this binary
//! wires `catalog_client::testing::InMemoryTransport` rather than a real
//! network implementation, since none is part of this system. The same
//! applies to the storefront enrichment seam (`NullStorefront`). Every
//! in-scope side effect of those seams — session-replacement bookkeeping,
//! credential clearing, push events — goes through the real `StateStore`,
//! `SecretStore` and `PushBus` via `GameCacheSideEffects`.

use catalog_client::{testing::InMemoryTransport, CatalogClient, CatalogClientConfig};
use depot_mapping_engine::{testing::NullStorefront, DepotMappingEngine};
use gamecache_config::{Config, CoreResult, Paths};
use job_runners::{
    CacheClearRunner, CorruptionRunner, DatabaseResetRunner, LogRunner, SubprocessCorruptionManager,
    SubprocessLogManager,
};
use operation_registry::OperationRegistry;
use push_bus::PushBus;
use scheduler::Scheduler;
use secret_store::SecretStore;
use state_store::StateStore;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// One-time migration of the legacy inline `SteamAuth` block out of
/// `AppState` into the sealed `SecretStore`, run on first access per
/// spec. Nils `AppState.legacy_steam_auth` whether or not the block
/// parsed, so a malformed legacy block is not retried forever.
fn migrate_legacy_credentials(state: &StateStore, secrets: &SecretStore) -> CoreResult<()> {
    let Some(legacy) = state.get().legacy_steam_auth else {
        return Ok(());
    };

    if let Some(auth) = secret_store::migrate_legacy_from_json(&legacy) {
        secrets
            .set(&auth)
            .map_err(|err| gamecache_config::CoreError::Crypto(err.to_string()))?;
        info!("migrated legacy steam auth into the sealed secret store");
    } else {
        warn!("legacy_steam_auth present but did not parse as SteamAuth, discarding");
    }

    state.update(|s| s.legacy_steam_auth = None)?;
    Ok(())
}

/// Every long-running subsystem handle a production deployment needs to
/// reach from outside this module (an in-process HTTP/API layer, wired in
/// later and out of scope here).
#[derive(Clone)]
pub struct DaemonHandles {
    pub state: Arc<StateStore>,
    pub secrets: Arc<SecretStore>,
    pub bus: PushBus,
    pub registry: OperationRegistry,
    pub db: gamecache_db::Database,
    pub catalog: Arc<CatalogClient>,
    pub engine: Arc<DepotMappingEngine>,
    pub cache_clear: Arc<CacheClearRunner>,
    pub corruption: Arc<CorruptionRunner<SubprocessCorruptionManager>>,
    pub logs: Arc<LogRunner<SubprocessLogManager>>,
    pub database_reset: Arc<DatabaseResetRunner>,
}

async fn build_handles(config: &Config, paths: &Paths) -> CoreResult<DaemonHandles> {
    paths.ensure_dirs()?;

    let state = Arc::new(StateStore::open(paths.clone())?);
    let secrets = Arc::new(
        SecretStore::open(&paths.secret_auth_dir(), paths.secret_auth_file(), paths.secret_keyseed_file())
            .map_err(|err| gamecache_config::CoreError::Crypto(err.to_string()))?,
    );
    migrate_legacy_credentials(&state, &secrets)?;

    let bus = PushBus::new();
    let registry = OperationRegistry::new(paths.clone(), bus.clone()).await?;
    let db = gamecache_db::Database::open(&paths.database_file())
        .await
        .map_err(|err| gamecache_config::CoreError::Transient(err.to_string()))?;

    let side_effects = Arc::new(depot_mapping_engine::GameCacheSideEffects::new(
        state.clone(),
        secrets.clone(),
        bus.clone(),
    ));
    let catalog = Arc::new(CatalogClient::new(
        Arc::new(InMemoryTransport::new()),
        side_effects,
        CatalogClientConfig::new(config.max_reconnect_attempts, config.max_session_replaced_before_logout),
    ));

    let engine = Arc::new(DepotMappingEngine::new(
        db.clone(),
        state.clone(),
        secrets.clone(),
        registry.clone(),
        bus.clone(),
        catalog.clone(),
        Arc::new(NullStorefront),
        paths.clone(),
        config.depot_batch_size,
        config.artifact_url.clone(),
    ));

    let cache_clear = Arc::new(CacheClearRunner::new(registry.clone(), config.cache_dir.clone()));
    let corruption = Arc::new(CorruptionRunner::new(
        SubprocessCorruptionManager::new(config.corruption_manager_bin.clone()),
        registry.clone(),
        paths.clone(),
        config.clone(),
    ));
    let logs = Arc::new(LogRunner::new(
        SubprocessLogManager::new(config.log_manager_bin.clone()),
        registry.clone(),
        paths.clone(),
        config.clone(),
    ));
    let database_reset = Arc::new(DatabaseResetRunner::new(registry.clone(), db.clone(), bus.clone(), paths.clone()));

    Ok(DaemonHandles {
        state,
        secrets,
        bus,
        registry,
        db,
        catalog,
        engine,
        cache_clear,
        corruption,
        logs,
        database_reset,
    })
}

/// Watches for `SIGTERM` on a dedicated OS thread (tokio has no portable
/// signal API beyond `ctrl_c`) and resolves the returned receiver once it
/// arrives.
fn watch_sigterm() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        if let Ok(mut signals) = signal_hook::iterator::Signals::new([signal_hook::consts::SIGTERM]) {
            if signals.forever().next().is_some() {
                let _ = tx.send(());
            }
        }
    });
    rx
}

/// Wires every subsystem, writes the PID file, and blocks until a shutdown
/// signal arrives.
pub async fn run_daemon(
    config: Config,
    paths: Paths,
    foreground: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !foreground {
        warn!("background daemonization is not implemented; running in foreground");
    }

    let handles = build_handles(&config, &paths).await?;
    std::fs::write(paths.pid_file(), std::process::id().to_string())?;
    info!(pid = std::process::id(), "cachekeeperd started");

    let (scheduler_shutdown_tx, scheduler_shutdown_rx) = oneshot::channel();
    let scheduler = Scheduler::new(handles.state.clone(), handles.engine.clone());
    let scheduler_task = scheduler.spawn(scheduler_shutdown_rx);

    let ctrl_c = tokio::signal::ctrl_c();
    let sigterm = watch_sigterm();

    tokio::select! {
        _ = ctrl_c => {
            info!("received ctrl-c, shutting down");
        }
        _ = sigterm => {
            info!("received sigterm, shutting down");
        }
    }

    let _ = scheduler_shutdown_tx.send(());
    if let Err(err) = scheduler_task.await {
        warn!(error = %err, "scheduler task panicked during shutdown");
    }

    let _ = std::fs::remove_file(paths.pid_file());
    info!("cachekeeperd stopped");
    Ok(())
}
