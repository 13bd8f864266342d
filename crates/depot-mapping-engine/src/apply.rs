//! Back-fills `Downloads` rows lacking game identity, following the exact
//! priority order for `app_id`, `game_name` and `game_image_url`.

use crate::caches::EngineCaches;
use crate::storefront::{GameInfo, StorefrontClient};
use gamecache_config::{CoreError, CoreResult};
use gamecache_db::{queries, Database};
use operation_registry::OperationHandle;

const CDN_HEADER_IMAGE_TEMPLATE: &str = "https://cdn.cloudflare.steamstatic.com/steam/apps";

fn db_err(err: gamecache_db::DatabaseError) -> CoreError {
    CoreError::Transient(err.to_string())
}

/// `depot_id == 0` is never a real Steam depot id; treating it as a
/// synthesized app id would create a nonsensical mapping, so the literal
/// fallback skips straight to `depot_id - 1` in that one case.
fn app_id_from_depot_literal(depot_id: u32) -> Option<u32> {
    if depot_id == 0 {
        None
    } else {
        Some(depot_id)
    }
}

fn app_id_from_depot_minus_one(depot_id: u32) -> Option<u32> {
    depot_id.checked_sub(1).filter(|&v| v != 0)
}

async fn resolve_app_id(db: &Database, caches: &EngineCaches, depot_id: u32) -> CoreResult<Option<u32>> {
    if let Some(app_id) = caches.owner_of(depot_id) {
        return Ok(Some(app_id));
    }
    if let Some(app_id) = db
        .call(move |conn| queries::depot_mappings::get_owner(conn, depot_id))
        .await
        .map_err(db_err)?
    {
        caches.record_owner(depot_id, app_id);
        return Ok(Some(app_id));
    }
    if let Some(app_id) = app_id_from_depot_literal(depot_id) {
        return Ok(Some(app_id));
    }
    Ok(app_id_from_depot_minus_one(depot_id))
}

fn looks_like_placeholder(name: &str) -> bool {
    name.starts_with("Steam App ") || name.starts_with("App ")
}

async fn resolve_game_name(
    db: &Database,
    caches: &EngineCaches,
    depot_id: u32,
    app_id: u32,
    storefront_info: Option<&GameInfo>,
) -> CoreResult<String> {
    if let Some(info) = storefront_info {
        if !looks_like_placeholder(&info.name) {
            return Ok(info.name.clone());
        }
    }
    if let Some(name) = caches.name_of(app_id) {
        if !name.starts_with("App ") {
            return Ok(name);
        }
    }
    if let Some(name) = db
        .call(move |conn| queries::depot_mappings::get_app_name(conn, depot_id))
        .await
        .map_err(db_err)?
    {
        return Ok(name);
    }
    Ok(format!("Steam App {app_id}"))
}

fn resolve_image_url(app_id: u32, storefront_info: Option<&GameInfo>) -> String {
    storefront_info
        .map(|info| info.header_image.clone())
        .unwrap_or_else(|| format!("{CDN_HEADER_IMAGE_TEMPLATE}/{app_id}/header.jpg"))
}

/// Processes every `Downloads` row missing game identity. Emits at least
/// one progress event per row (never throttled, unlike the scan loop's
/// 250ms-gated events) so subscribers stay live even when the back-fill
/// outruns the throttle window.
pub async fn apply_to_downloads(
    db: &Database,
    caches: &EngineCaches,
    storefront: &dyn StorefrontClient,
    handle: Option<&OperationHandle>,
) -> CoreResult<usize> {
    let missing = db
        .call(|conn| queries::downloads::list_missing_game_info(conn))
        .await
        .map_err(db_err)?;
    let total = missing.len();

    for (index, download) in missing.iter().enumerate() {
        let Some(depot_id) = download.depot_id else {
            continue;
        };
        let Some(app_id) = resolve_app_id(db, caches, depot_id).await? else {
            continue;
        };

        let storefront_info = storefront.get_game_info(app_id).await;
        let game_name = resolve_game_name(db, caches, depot_id, app_id, storefront_info.as_ref()).await?;
        let game_image_url = resolve_image_url(app_id, storefront_info.as_ref());

        let id = download.id.clone();
        let name_for_db = game_name.clone();
        let image_for_db = game_image_url.clone();
        db.call(move |conn| queries::downloads::backfill_game_info(conn, &id, app_id, &name_for_db, &image_for_db))
            .await
            .map_err(db_err)?;

        if let Some(handle) = handle {
            let percent = 90.0 + 10.0 * (index + 1) as f64 / total.max(1) as f64;
            handle
                .set_progress(percent, format!("applied identity to {}/{}", index + 1, total))
                .await?;
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefront::testing::StubStorefront;
    use gamecache_db::DepotMapping;

    async fn seeded_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.call(|conn| {
            queries::depot_mappings::bulk_insert(
                conn,
                &[DepotMapping {
                    depot_id: 10,
                    app_id: 100,
                    app_name: "Owned Game".into(),
                    is_owner: true,
                    last_seen_change_number: 1,
                }],
            )
        })
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn app_id_prefers_in_memory_cache_over_db() {
        let db = seeded_db().await;
        let caches = EngineCaches::new();
        caches.record_owner(10, 999);

        let resolved = resolve_app_id(&db, &caches, 10).await.unwrap();
        assert_eq!(resolved, Some(999));
    }

    #[tokio::test]
    async fn app_id_falls_back_to_db_owner_row() {
        let db = seeded_db().await;
        let caches = EngineCaches::new();

        let resolved = resolve_app_id(&db, &caches, 10).await.unwrap();
        assert_eq!(resolved, Some(100));
    }

    #[tokio::test]
    async fn app_id_falls_back_to_depot_id_literal() {
        let db = Database::open_in_memory().await.unwrap();
        let caches = EngineCaches::new();

        let resolved = resolve_app_id(&db, &caches, 555).await.unwrap();
        assert_eq!(resolved, Some(555));
    }

    #[tokio::test]
    async fn app_id_falls_back_to_depot_id_minus_one_for_the_zero_sentinel() {
        let db = Database::open_in_memory().await.unwrap();
        let caches = EngineCaches::new();

        let resolved = resolve_app_id(&db, &caches, 0).await.unwrap();
        assert_eq!(resolved, None);

        let resolved_one = resolve_app_id(&db, &caches, 1).await.unwrap();
        assert_eq!(resolved_one, Some(1));
    }

    #[tokio::test]
    async fn game_name_prefers_storefront_unless_it_is_a_placeholder() {
        let db = Database::open_in_memory().await.unwrap();
        let caches = EngineCaches::new();
        let info = GameInfo {
            name: "Real Name".into(),
            header_image: "https://example.invalid/a.jpg".into(),
        };

        let name = resolve_game_name(&db, &caches, 10, 100, Some(&info)).await.unwrap();
        assert_eq!(name, "Real Name");
    }

    #[tokio::test]
    async fn game_name_skips_storefront_placeholder_and_uses_catalog_cache() {
        let db = Database::open_in_memory().await.unwrap();
        let caches = EngineCaches::new();
        caches.record_name(100, "Catalog Name".into());
        let info = GameInfo {
            name: "Steam App 100".into(),
            header_image: "https://example.invalid/a.jpg".into(),
        };

        let name = resolve_game_name(&db, &caches, 10, 100, Some(&info)).await.unwrap();
        assert_eq!(name, "Catalog Name");
    }

    #[tokio::test]
    async fn game_name_falls_back_to_depot_mapping_app_name() {
        let db = seeded_db().await;
        let caches = EngineCaches::new();

        let name = resolve_game_name(&db, &caches, 10, 100, None).await.unwrap();
        assert_eq!(name, "Owned Game");
    }

    #[tokio::test]
    async fn game_name_falls_back_to_literal_steam_app_label() {
        let db = Database::open_in_memory().await.unwrap();
        let caches = EngineCaches::new();

        let name = resolve_game_name(&db, &caches, 404, 777, None).await.unwrap();
        assert_eq!(name, "Steam App 777");
    }

    #[test]
    fn image_url_prefers_storefront_then_falls_back_to_cdn_template() {
        let info = GameInfo {
            name: "x".into(),
            header_image: "https://example.invalid/custom.jpg".into(),
        };
        assert_eq!(resolve_image_url(5, Some(&info)), "https://example.invalid/custom.jpg");
        assert_eq!(
            resolve_image_url(5, None),
            "https://cdn.cloudflare.steamstatic.com/steam/apps/5/header.jpg"
        );
    }

    #[tokio::test]
    async fn apply_to_downloads_backfills_every_missing_row() {
        let db = seeded_db().await;
        db.call(|conn| {
            conn.execute(
                "INSERT INTO downloads (id, service, client_ip, start_utc, depot_id)
                 VALUES ('d1', 'svc', '127.0.0.1', '2024-01-01T00:00:00Z', 10)",
                [],
            )
            .map_err(gamecache_db::DatabaseError::from)
        })
        .await
        .unwrap();

        let caches = EngineCaches::new();
        let storefront = StubStorefront::new();
        let applied = apply_to_downloads(&db, &caches, &storefront, None).await.unwrap();
        assert_eq!(applied, 1);

        let remaining = db
            .call(|conn| queries::downloads::list_missing_game_info(conn))
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }
}
