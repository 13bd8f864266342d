//! Decides whether an incremental scan is still cheap enough to trust, or
//! whether the local watermark has drifted so far from the remote's
//! current change number that a full re-crawl is required instead.

use catalog_client::CatalogClient;
use chrono::Utc;
use gamecache_config::{CoreError, CoreResult};
use state_store::{StateStore, ViabilityCache};

/// Above this many changes since the last successful full/incremental
/// commit, an incremental scan is assumed to miss too much and a full scan
/// is required instead. The remote would declare this budget in a real
/// deployment; fixed here.
pub const INCREMENTAL_CHANGE_BUDGET: u32 = 100_000;

/// Queries the remote's current change number, compares it against the
/// locally stored watermark, and persists the result to the State Store.
/// Returns `true` if the gap exceeds [`INCREMENTAL_CHANGE_BUDGET`] and a
/// full scan should run instead of an incremental one.
pub async fn check_viability(catalog: &CatalogClient, state: &StateStore) -> CoreResult<bool> {
    let last_change_number = state.get().depot_processing.last_change_number;

    let current = catalog
        .current_change_number()
        .await
        .map_err(|err| CoreError::Transient(err.to_string()))?;

    let change_gap = current.saturating_sub(last_change_number);
    let requires_full_scan = change_gap > INCREMENTAL_CHANGE_BUDGET;

    state.set_viability_cache(ViabilityCache {
        requires_full_scan,
        last_check_utc: Some(Utc::now()),
        last_check_change_number: current,
        change_gap,
    })?;

    Ok(requires_full_scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_client::testing::{InMemoryTransport, RecordingSideEffects};
    use catalog_client::{CatalogClient, CatalogClientConfig};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store(dir: &std::path::Path) -> StateStore {
        StateStore::open(gamecache_config::Paths::with_base_dir(dir.to_path_buf())).unwrap()
    }

    #[tokio::test]
    async fn small_gap_allows_incremental() {
        let dir = tempdir().unwrap();
        let state = store(dir.path());
        let transport = InMemoryTransport::new().with_change_number(500);
        let catalog = CatalogClient::new(
            Arc::new(transport),
            Arc::new(RecordingSideEffects::new()),
            CatalogClientConfig::default(),
        );

        let requires_full = check_viability(&catalog, &state).await.unwrap();
        assert!(!requires_full);
        assert_eq!(state.get().viability_cache.change_gap, 500);
    }

    #[tokio::test]
    async fn gap_past_budget_requires_full_scan() {
        let dir = tempdir().unwrap();
        let state = store(dir.path());
        let transport = InMemoryTransport::new().with_change_number(INCREMENTAL_CHANGE_BUDGET + 1);
        let catalog = CatalogClient::new(
            Arc::new(transport),
            Arc::new(RecordingSideEffects::new()),
            CatalogClientConfig::default(),
        );

        let requires_full = check_viability(&catalog, &state).await.unwrap();
        assert!(requires_full);
        assert!(state.get().viability_cache.requires_full_scan);
    }
}
