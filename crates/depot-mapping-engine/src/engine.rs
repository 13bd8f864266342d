//! Orchestrates a scan end to end: viability gating, artifact import or
//! batched catalog crawl, orphan resolution and the download back-fill.

use crate::apply::apply_to_downloads;
use crate::artifact::fetch_artifact;
use crate::caches::EngineCaches;
use crate::cancel::TokenCancel;
use crate::model::{RequestOrigin, ScanMode};
use crate::storefront::StorefrontClient;
use crate::viability::check_viability;
use catalog_client::{AuthMode, CatalogClient, CatalogError};
use chrono::Utc;
use gamecache_config::{CoreError, CoreResult, Paths};
use gamecache_db::{queries, Database, DepotMapping};
use operation_registry::{OperationHandle, OperationKind, OperationRegistry};
use push_bus::{events, Group, PushBus};
use secret_store::SecretStore;
use state_store::{StateStore, ViabilityCache};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum gap between `DepotMappingProgress` events during the main
/// crawl loop; every batch still updates the State Store, but the push
/// bus is only nudged this often (always at least once per batch).
const PROGRESS_THROTTLE: Duration = Duration::from_millis(250);

fn db_err(err: gamecache_db::DatabaseError) -> CoreError {
    CoreError::Transient(err.to_string())
}

fn catalog_err(err: CatalogError) -> CoreError {
    CoreError::Transient(err.to_string())
}

fn auth_mode_from_secrets(secrets: &SecretStore) -> CoreResult<AuthMode> {
    let stored = secrets.get().map_err(|err| CoreError::Crypto(err.to_string()))?;
    match stored.and_then(|auth| auth.refresh_token) {
        Some(refresh_token) => Ok(AuthMode::Authenticated { refresh_token }),
        None => Ok(AuthMode::Anonymous),
    }
}

async fn wait_until_not_yielding(catalog: &CatalogClient) {
    while catalog.is_yielding() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[derive(Clone)]
pub struct DepotMappingEngine {
    db: Database,
    state: Arc<StateStore>,
    secrets: Arc<SecretStore>,
    registry: OperationRegistry,
    bus: PushBus,
    catalog: Arc<CatalogClient>,
    storefront: Arc<dyn StorefrontClient>,
    http: reqwest::Client,
    paths: Paths,
    caches: Arc<EngineCaches>,
    depot_batch_size: usize,
    artifact_url: Option<String>,
}

impl DepotMappingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        state: Arc<StateStore>,
        secrets: Arc<SecretStore>,
        registry: OperationRegistry,
        bus: PushBus,
        catalog: Arc<CatalogClient>,
        storefront: Arc<dyn StorefrontClient>,
        paths: Paths,
        depot_batch_size: usize,
        artifact_url: Option<String>,
    ) -> Self {
        Self {
            db,
            state,
            secrets,
            registry,
            bus,
            catalog,
            storefront,
            http: reqwest::Client::new(),
            paths,
            caches: Arc::new(EngineCaches::new()),
            depot_batch_size: depot_batch_size.max(1),
            artifact_url,
        }
    }

    /// Registers a `DepotMapping` operation and spawns the scan on a
    /// background task. Returns `Ok(None)` without registering anything
    /// when an automatic incremental request fails its viability check —
    /// that path publishes `AutomaticScanSkipped` instead.
    pub async fn start(&self, mode: ScanMode, origin: RequestOrigin) -> CoreResult<Option<OperationHandle>> {
        if mode == ScanMode::Incremental && origin == RequestOrigin::Automatic {
            let requires_full_scan = check_viability(&self.catalog, &self.state).await?;
            if requires_full_scan {
                self.bus
                    .publish(Group::All, events::automatic_scan_skipped("incremental viability check requires a full scan"))
                    .await;
                return Ok(None);
            }
        }

        let handle = self
            .registry
            .register(OperationKind::DepotMapping, format!("{} scan", mode.as_str()), None)
            .await?;

        let worker_handle = handle.clone();
        let engine = self.clone();
        tokio::spawn(async move {
            let outcome = engine.run(mode, &worker_handle).await;
            match outcome {
                Ok(total) => {
                    let _ = worker_handle
                        .complete_with(true, None, serde_json::json!({ "total_mappings": total }))
                        .await;
                }
                Err(CoreError::Cancelled) => {
                    worker_handle.cancel_token().cancel();
                    let _ = worker_handle.complete(false, None).await;
                }
                Err(err) => {
                    let _ = worker_handle.complete(false, Some(err.to_string())).await;
                }
            }
        });

        Ok(Some(handle))
    }

    async fn run(&self, mode: ScanMode, handle: &OperationHandle) -> CoreResult<usize> {
        match mode {
            ScanMode::Artifact => self.run_artifact(handle).await,
            ScanMode::Incremental | ScanMode::Full => self.run_crawl(mode, handle).await,
        }
    }

    async fn run_artifact(&self, handle: &OperationHandle) -> CoreResult<usize> {
        let url = self
            .artifact_url
            .clone()
            .ok_or_else(|| CoreError::Invalid("artifact mode requires Config::artifact_url".to_string()))?;

        handle.set_progress(5.0, "fetching artifact").await?;
        let document = fetch_artifact(&self.http, &url, &self.paths.artifact_file()).await?;

        handle.set_progress(18.0, "clearing existing mappings").await?;
        self.db.call(|conn| queries::depot_mappings::clear(conn)).await.map_err(db_err)?;
        handle.set_progress(22.0, "importing artifact").await?;

        let total = document.depot_mappings.len();
        for (index, chunk) in document.depot_mappings.chunks(self.depot_batch_size).enumerate() {
            let rows = chunk.to_vec();
            self.db
                .call(move |conn| queries::depot_mappings::bulk_insert(conn, &rows))
                .await
                .map_err(db_err)?;

            let imported = ((index + 1) * self.depot_batch_size).min(total);
            let percent = 22.0 + 68.0 * imported as f64 / total.max(1) as f64;
            handle.set_progress(percent, format!("imported {imported}/{total}")).await?;

            if handle.cancel_token().is_cancelled() {
                return Err(CoreError::Cancelled);
            }
        }

        // The artifact brings the catalog fully current as of its own
        // change number: adopt it as the new watermark and clear the
        // viability cache so the next incremental scan's gap check is not
        // measured against a stale or zero value.
        let last_change_number = document.metadata.last_change_number;
        self.state.set_depot_processing(|p| p.last_change_number = last_change_number)?;
        self.state.set_viability_cache(ViabilityCache {
            requires_full_scan: false,
            last_check_utc: Some(Utc::now()),
            last_check_change_number: last_change_number,
            change_gap: 0,
        })?;

        handle.set_progress(90.0, "applying to downloads").await?;
        apply_to_downloads(&self.db, &self.caches, self.storefront.as_ref(), Some(handle)).await?;
        handle.set_progress(100.0, "done").await?;
        Ok(total)
    }

    async fn run_crawl(&self, mode: ScanMode, handle: &OperationHandle) -> CoreResult<usize> {
        let mode_str = mode.as_str();
        let auth_mode = auth_mode_from_secrets(&self.secrets)?;
        let yielding_hint = self.catalog.is_yielding();

        handle.set_progress(2.0, "connecting").await?;
        self.catalog.connect(auth_mode.clone(), yielding_hint).await.map_err(catalog_err)?;
        self.catalog.set_scan_active(true);

        let last_change_number = self.state.get().depot_processing.last_change_number;
        let since = (mode == ScanMode::Incremental).then_some(last_change_number);
        let app_ids = self.catalog.enumerate_app_ids(since).await.map_err(catalog_err)?;
        let watermark = self.catalog.current_change_number().await.map_err(catalog_err)?;

        self.state.set_depot_processing(|p| {
            p.is_active = true;
            p.status_text = format!("{mode_str} scan running");
            p.total_batches = (app_ids.len() as u64).div_ceil(self.depot_batch_size as u64);
            p.processed_batches = 0;
            p.progress_percent = 5.0;
            p.depot_mappings_found = 0;
            p.start_utc = Some(Utc::now());
            p.remaining_apps = app_ids.clone();
        })?;
        handle.set_progress(5.0, "enumerated candidate apps").await?;

        let batches: Vec<Vec<u32>> = app_ids.chunks(self.depot_batch_size).map(<[u32]>::to_vec).collect();
        let total_batches = batches.len();
        let mut found: u64 = 0;
        let mut last_event = Instant::now() - PROGRESS_THROTTLE;

        for (batch_index, batch) in batches.iter().enumerate() {
            if handle.cancel_token().is_cancelled() {
                self.catalog.set_scan_active(false);
                return Err(CoreError::Cancelled);
            }

            if self.catalog.is_yielding() {
                handle
                    .set_progress_with(
                        self.current_scan_percent(),
                        "paused: yielding to a local daemon session",
                        serde_json::json!({ "scan_mode": mode_str, "is_logged_on": false }),
                    )
                    .await?;
                tokio::select! {
                    _ = handle.cancel_token().cancelled() => {
                        self.catalog.set_scan_active(false);
                        return Err(CoreError::Cancelled);
                    }
                    _ = wait_until_not_yielding(&self.catalog) => {}
                }
                self.catalog.connect(auth_mode.clone(), false).await.map_err(catalog_err)?;
            }

            let info = match self.catalog.get_product_info(batch).await {
                Ok(info) => info,
                Err(CatalogError::AutoLogout) => {
                    self.catalog.set_scan_active(false);
                    return Err(CoreError::Cancelled);
                }
                Err(first_err) => {
                    tracing::warn!(batch = batch_index, error = %first_err, "batch fetch failed, reconnecting");
                    let cancel = TokenCancel(handle.cancel_token());
                    if self.catalog.reconnect(auth_mode.clone(), &cancel).await.is_err() {
                        tracing::warn!(batch = batch_index, "reconnect exhausted, skipping batch");
                        continue;
                    }
                    match self.catalog.get_product_info(batch).await {
                        Ok(info) => info,
                        Err(err) => {
                            tracing::warn!(batch = batch_index, error = %err, "batch skipped after retry");
                            continue;
                        }
                    }
                }
            };

            for app in &info {
                self.caches.record_name(app.app_id, app.name.clone());
                for depot in &app.depots {
                    if depot.is_owner {
                        self.caches.record_owner(depot.depot_id, app.app_id);
                    }
                    let row = DepotMapping {
                        depot_id: depot.depot_id,
                        app_id: app.app_id,
                        app_name: app.name.clone(),
                        is_owner: depot.is_owner,
                        last_seen_change_number: watermark,
                    };
                    self.db
                        .call(move |conn| queries::depot_mappings::upsert(conn, &row))
                        .await
                        .map_err(db_err)?;
                    found += 1;
                }
            }

            let processed = (batch_index + 1) as u64;
            let remaining: Vec<u32> = batches[batch_index + 1..].iter().flatten().copied().collect();
            let percent = 5.0 + 75.0 * processed as f64 / total_batches.max(1) as f64;

            self.state.set_depot_processing(|p| {
                p.processed_batches = processed;
                p.progress_percent = percent;
                p.depot_mappings_found = found;
                p.remaining_apps = remaining;
            })?;

            if batch_index == 0 || last_event.elapsed() >= PROGRESS_THROTTLE {
                handle
                    .set_progress_with(
                        percent,
                        format!("scanned batch {processed}/{total_batches}"),
                        serde_json::json!({ "scan_mode": mode_str, "is_logged_on": true }),
                    )
                    .await?;
                last_event = Instant::now();
            }
        }

        self.resolve_orphans(handle, mode_str, watermark).await?;

        self.state.set_depot_processing(|p| {
            p.is_active = false;
            p.status_text = "idle".to_string();
            p.last_change_number = watermark;
        })?;
        self.state.set_last_pics_crawl(Utc::now())?;
        self.catalog.set_scan_active(false);

        handle.set_progress(90.0, "applying to downloads").await?;
        apply_to_downloads(&self.db, &self.caches, self.storefront.as_ref(), Some(handle)).await?;
        handle.set_progress(100.0, "done").await?;

        Ok(found as usize)
    }

    fn current_scan_percent(&self) -> f64 {
        5.0 + 75.0 * self.state.get().depot_processing.progress_percent / 100.0
    }

    /// Fills in mappings for depots seen in `Downloads` but never resolved
    /// by the main pass — delisted apps that no longer enumerate, tried
    /// against `{depot_id, depot_id-1, depot_id-2}`.
    async fn resolve_orphans(&self, handle: &OperationHandle, mode_str: &str, watermark: u32) -> CoreResult<()> {
        let orphan_depot_ids = self
            .db
            .call(|conn| queries::downloads::distinct_depot_ids_without_mapping(conn))
            .await
            .map_err(db_err)?;

        for depot_id in orphan_depot_ids {
            if self.caches.scanned.contains(&depot_id) {
                continue;
            }
            if handle.cancel_token().is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let candidates: Vec<u32> = [Some(depot_id), depot_id.checked_sub(1), depot_id.checked_sub(2)]
                .into_iter()
                .flatten()
                .filter(|id| !self.caches.scanned.contains(id))
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let info = match self.catalog.get_product_info(&candidates).await {
                Ok(info) => info,
                Err(_) => continue,
            };

            for app in &info {
                self.caches.record_name(app.app_id, app.name.clone());
                for depot in &app.depots {
                    if !candidates.contains(&depot.depot_id) {
                        continue;
                    }
                    if depot.is_owner {
                        self.caches.record_owner(depot.depot_id, app.app_id);
                    }
                    let row = DepotMapping {
                        depot_id: depot.depot_id,
                        app_id: app.app_id,
                        app_name: app.name.clone(),
                        is_owner: depot.is_owner,
                        last_seen_change_number: watermark,
                    };
                    self.db
                        .call(move |conn| queries::depot_mappings::upsert(conn, &row))
                        .await
                        .map_err(db_err)?;
                }
            }
        }

        handle
            .set_progress_with(
                90.0,
                "orphan resolution complete",
                serde_json::json!({ "scan_mode": mode_str, "is_logged_on": true }),
            )
            .await?;
        Ok(())
    }
}
