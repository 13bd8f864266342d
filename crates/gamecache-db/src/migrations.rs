//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_initial_schema(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: depot catalog, downloads, and the tables `DatabaseReset` walks.
fn migrate_v1_initial_schema(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: initial schema");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS depot_mappings (
            depot_id INTEGER NOT NULL,
            app_id INTEGER NOT NULL,
            app_name TEXT NOT NULL,
            is_owner INTEGER NOT NULL,
            last_seen_change_number INTEGER NOT NULL,
            PRIMARY KEY (depot_id, app_id)
        );

        CREATE TABLE IF NOT EXISTS downloads (
            id TEXT PRIMARY KEY,
            service TEXT NOT NULL,
            client_ip TEXT NOT NULL,
            start_utc TEXT NOT NULL,
            end_utc TEXT,
            bytes_hit INTEGER NOT NULL DEFAULT 0,
            bytes_miss INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            depot_id INTEGER,
            game_app_id INTEGER,
            game_name TEXT,
            game_image_url TEXT
        );

        CREATE TABLE IF NOT EXISTS user_sessions (
            id TEXT PRIMARY KEY,
            created_utc TEXT NOT NULL,
            last_seen_utc TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_preferences (
            session_id TEXT PRIMARY KEY,
            preferences_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS event_downloads (
            event_id TEXT NOT NULL,
            download_id TEXT NOT NULL,
            PRIMARY KEY (event_id, download_id)
        );

        CREATE TABLE IF NOT EXISTS log_entries (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            logged_utc TEXT NOT NULL,
            line TEXT NOT NULL,
            download_id TEXT REFERENCES downloads(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            logged_utc TEXT NOT NULL,
            payload_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_downloads_depot_id ON downloads(depot_id);
        CREATE INDEX IF NOT EXISTS idx_downloads_service ON downloads(service);
        ",
    )?;

    record_migration(conn, 1, "initial_schema")?;
    Ok(())
}
