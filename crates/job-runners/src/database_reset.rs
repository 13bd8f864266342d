//! Wipes selected tables back to empty, in the dependency order the schema
//! requires, while keeping the single writer connection consistent.

use gamecache_config::{CoreError, CoreResult, Paths};
use gamecache_db::{queries::table_repo, Database};
use operation_registry::{OperationHandle, OperationKind, OperationRegistry};
use push_bus::{events, Group, PushBus};

const BATCH_SIZE: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResetTable {
    UserSessions,
    UserPreferences,
    EventDownloads,
    LogEntries,
    Downloads,
    Events,
    SteamDepotMappings,
    Other(String),
}

impl ResetTable {
    fn table_name(&self) -> &str {
        match self {
            ResetTable::UserSessions => "user_sessions",
            ResetTable::UserPreferences => "user_preferences",
            ResetTable::EventDownloads => "event_downloads",
            ResetTable::LogEntries => "log_entries",
            ResetTable::Downloads => "downloads",
            ResetTable::Events => "events",
            ResetTable::SteamDepotMappings => "depot_mappings",
            ResetTable::Other(name) => name,
        }
    }

    /// Position in the fixed dependency order: tables other tables
    /// reference are cleared first, so a foreign key never dangles even
    /// with enforcement off.
    fn order_rank(&self) -> u8 {
        match self {
            ResetTable::UserSessions => 0,
            ResetTable::UserPreferences => 1,
            ResetTable::EventDownloads => 2,
            ResetTable::LogEntries => 3,
            ResetTable::Downloads => 4,
            ResetTable::Events => 5,
            ResetTable::SteamDepotMappings | ResetTable::Other(_) => 6,
        }
    }
}

/// Re-enables `PRAGMA foreign_keys` on drop regardless of how the reset
/// exits, matching the teacher's guaranteed-cleanup idiom with the
/// language's own mechanism instead of a manual finally block.
struct ForeignKeysGuard<'a> {
    db: &'a Database,
}

impl<'a> ForeignKeysGuard<'a> {
    async fn disable(db: &'a Database) -> CoreResult<Self> {
        db.call_sqlite(|conn| conn.execute_batch("PRAGMA foreign_keys = OFF"))
            .await
            .map_err(|e| CoreError::Fatal(e.to_string()))?;
        Ok(Self { db })
    }
}

impl Drop for ForeignKeysGuard<'_> {
    fn drop(&mut self) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(err) = db.call_sqlite(|conn| conn.execute_batch("PRAGMA foreign_keys = ON")).await {
                tracing::warn!(error = %err, "failed to re-enable foreign_keys after database reset");
            }
        });
    }
}

pub struct DatabaseResetRunner {
    registry: OperationRegistry,
    db: Database,
    bus: PushBus,
    paths: Paths,
}

impl DatabaseResetRunner {
    pub fn new(registry: OperationRegistry, db: Database, bus: PushBus, paths: Paths) -> Self {
        Self { registry, db, bus, paths }
    }

    pub async fn run(&self, mut tables: Vec<ResetTable>) -> CoreResult<OperationHandle> {
        tables.sort_by_key(|t| t.order_rank());
        tables.dedup_by_key(|t| t.table_name().to_string());

        let handle = self
            .registry
            .register(OperationKind::DatabaseReset, "database reset", None)
            .await?;

        let db = self.db.clone();
        let bus = self.bus.clone();
        let artifact_file = self.paths.artifact_file();
        let worker = handle.clone();

        tokio::spawn(async move {
            let outcome = Self::reset_tables(&db, &bus, &artifact_file, &tables, &worker).await;
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

    async fn reset_tables(
        db: &Database,
        bus: &PushBus,
        artifact_file: &std::path::Path,
        tables: &[ResetTable],
        handle: &OperationHandle,
    ) -> CoreResult<()> {
        let _fk_guard = ForeignKeysGuard::disable(db).await?;

        let has_log_entries = tables.contains(&ResetTable::LogEntries);
        if tables.contains(&ResetTable::Downloads) && !has_log_entries {
            db.call(|conn| table_repo::null_foreign_key(conn, "log_entries", "download_id"))
                .await
                .map_err(|e| CoreError::Fatal(e.to_string()))?;
        }

        let total = tables.len().max(1);
        for (index, table) in tables.iter().enumerate() {
            if handle.cancel_token().is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            delete_table(db, table.table_name()).await?;

            if *table == ResetTable::UserSessions {
                bus.publish(Group::All, events::user_sessions_cleared(handle.id())).await;
            }
            if *table == ResetTable::SteamDepotMappings {
                let _ = std::fs::remove_file(artifact_file);
            }

            let percent = 100.0 * (index + 1) as f64 / total as f64;
            let event = events::database_reset_progress(handle.id(), percent, table.table_name());
            bus.publish(Group::All, event).await;
            handle.set_progress(percent, format!("cleared {}", table.table_name())).await?;
        }

        Ok(())
    }
}

async fn delete_table(db: &Database, table: &str) -> CoreResult<()> {
    let table = table.to_string();
    loop {
        let table = table.clone();
        let affected = db
            .call(move |conn| table_repo::delete_batch(conn, &table, "rowid", BATCH_SIZE))
            .await
            .map_err(|e| CoreError::Fatal(e.to_string()))?;
        if affected == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    Ok(())
}
