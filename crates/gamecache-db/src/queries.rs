//! Method-per-query repositories. Every function takes a `&Connection` so it
//! works equally inside `AsyncDatabase::call` closures and in sync tests.

use crate::{DatabaseError, DatabaseResult, DepotMapping, Download};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

fn parse_utc(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub mod depot_mappings {
    use super::*;

    pub fn clear(conn: &Connection) -> DatabaseResult<()> {
        conn.execute("DELETE FROM depot_mappings", [])?;
        Ok(())
    }

    pub fn bulk_insert(conn: &Connection, rows: &[DepotMapping]) -> DatabaseResult<usize> {
        let mut stmt = conn.prepare_cached(
            "INSERT OR REPLACE INTO depot_mappings
             (depot_id, app_id, app_name, is_owner, last_seen_change_number)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.depot_id,
                row.app_id,
                row.app_name,
                row.is_owner,
                row.last_seen_change_number
            ])?;
        }
        Ok(rows.len())
    }

    pub fn upsert(conn: &Connection, row: &DepotMapping) -> DatabaseResult<()> {
        bulk_insert(conn, std::slice::from_ref(row)).map(|_| ())
    }

    /// The app that owns `depot_id`, if any row marks it as owner.
    pub fn get_owner(conn: &Connection, depot_id: u32) -> DatabaseResult<Option<u32>> {
        conn.query_row(
            "SELECT app_id FROM depot_mappings WHERE depot_id = ?1 AND is_owner = 1",
            params![depot_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(DatabaseError::from(other)),
        })
    }

    pub fn count(conn: &Connection) -> DatabaseResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM depot_mappings", [], |row| row.get(0))
            .map_err(DatabaseError::from)
    }

    /// The app name recorded against `depot_id`, preferring an owner row
    /// but falling back to any row at all (shared depots repeat the same
    /// name across every app that references them).
    pub fn get_app_name(conn: &Connection, depot_id: u32) -> DatabaseResult<Option<String>> {
        conn.query_row(
            "SELECT app_name FROM depot_mappings WHERE depot_id = ?1 ORDER BY is_owner DESC LIMIT 1",
            params![depot_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(DatabaseError::from(other)),
        })
    }
}

pub mod downloads {
    use super::*;

    /// Rows whose game identity hasn't been resolved yet, the candidate set
    /// for `apply_to_downloads`.
    pub fn list_missing_game_info(conn: &Connection) -> DatabaseResult<Vec<Download>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, service, client_ip, start_utc, end_utc, bytes_hit, bytes_miss,
                    is_active, depot_id, game_app_id, game_name, game_image_url
             FROM downloads WHERE game_app_id IS NULL OR game_name IS NULL",
        )?;
        let rows = stmt
            .query_map([], map_download)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn backfill_game_info(
        conn: &Connection,
        id: &str,
        game_app_id: u32,
        game_name: &str,
        game_image_url: &str,
    ) -> DatabaseResult<()> {
        conn.execute(
            "UPDATE downloads SET game_app_id = ?2, game_name = ?3, game_image_url = ?4
             WHERE id = ?1",
            params![id, game_app_id, game_name, game_image_url],
        )?;
        Ok(())
    }

    /// Depot ids downloaded but never seen in `depot_mappings` — the orphan
    /// resolution candidate set.
    pub fn distinct_depot_ids_without_mapping(conn: &Connection) -> DatabaseResult<Vec<u32>> {
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT d.depot_id FROM downloads d
             WHERE d.depot_id IS NOT NULL
               AND NOT EXISTS (
                   SELECT 1 FROM depot_mappings m WHERE m.depot_id = d.depot_id
               )",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_download(row: &rusqlite::Row) -> rusqlite::Result<Download> {
        Ok(Download {
            id: row.get(0)?,
            service: row.get(1)?,
            client_ip: row.get(2)?,
            start_utc: parse_utc(row.get(3)?),
            end_utc: row.get::<_, Option<String>>(4)?.map(parse_utc),
            bytes_hit: row.get(5)?,
            bytes_miss: row.get(6)?,
            is_active: row.get(7)?,
            depot_id: row.get(8)?,
            game_app_id: row.get(9)?,
            game_name: row.get(10)?,
            game_image_url: row.get(11)?,
        })
    }
}

/// Generic table operations `DatabaseReset` drives across the dependency
/// graph: batched deletes so a huge table never blocks the single writer
/// thread for long, and FK-null clearing for tables that reference a
/// table being cleared without being dropped themselves.
pub mod table_repo {
    use super::*;

    /// Deletes up to `batch_size` rows at a time until the table is empty.
    /// Returns the total number of rows removed.
    pub fn delete_all_batched(
        conn: &Connection,
        table: &str,
        id_column: &str,
        batch_size: usize,
    ) -> DatabaseResult<usize> {
        let mut total = 0;
        loop {
            let affected = conn.execute(
                &format!(
                    "DELETE FROM {table} WHERE {id_column} IN (
                        SELECT {id_column} FROM {table} LIMIT {batch_size}
                    )"
                ),
                [],
            )?;
            total += affected;
            if affected == 0 {
                break;
            }
        }
        Ok(total)
    }

    /// Sets `fk_column` to NULL on every row referencing rows about to be
    /// deleted from a dependent table (e.g. `log_entries.download_id`
    /// before `downloads` is cleared).
    pub fn null_foreign_key(conn: &Connection, table: &str, fk_column: &str) -> DatabaseResult<usize> {
        let affected = conn.execute(&format!("UPDATE {table} SET {fk_column} = NULL"), [])?;
        Ok(affected)
    }

    /// Deletes a single batch of up to `batch_size` rows. Callers driving a
    /// reset loop this over, yielding to the async runtime between calls so
    /// a large table's deletion doesn't starve other operations.
    pub fn delete_batch(conn: &Connection, table: &str, id_column: &str, batch_size: usize) -> DatabaseResult<usize> {
        let affected = conn.execute(
            &format!(
                "DELETE FROM {table} WHERE {id_column} IN (
                    SELECT {id_column} FROM {table} LIMIT {batch_size}
                )"
            ),
            [],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn bulk_insert_then_get_owner() {
        let conn = conn();
        depot_mappings::bulk_insert(
            &conn,
            &[DepotMapping {
                depot_id: 10,
                app_id: 100,
                app_name: "Game".into(),
                is_owner: true,
                last_seen_change_number: 1,
            }],
        )
        .unwrap();

        assert_eq!(depot_mappings::get_owner(&conn, 10).unwrap(), Some(100));
        assert_eq!(depot_mappings::count(&conn).unwrap(), 1);
    }

    #[test]
    fn get_app_name_prefers_owner_row() {
        let conn = conn();
        depot_mappings::bulk_insert(
            &conn,
            &[
                DepotMapping {
                    depot_id: 1,
                    app_id: 2,
                    app_name: "Shared Tools".into(),
                    is_owner: false,
                    last_seen_change_number: 1,
                },
                DepotMapping {
                    depot_id: 1,
                    app_id: 3,
                    app_name: "Owning Game".into(),
                    is_owner: true,
                    last_seen_change_number: 1,
                },
            ],
        )
        .unwrap();

        assert_eq!(
            depot_mappings::get_app_name(&conn, 1).unwrap().as_deref(),
            Some("Owning Game")
        );
        assert_eq!(depot_mappings::get_app_name(&conn, 999).unwrap(), None);
    }

    #[test]
    fn clear_empties_the_table() {
        let conn = conn();
        depot_mappings::bulk_insert(
            &conn,
            &[DepotMapping {
                depot_id: 1,
                app_id: 2,
                app_name: "A".into(),
                is_owner: true,
                last_seen_change_number: 1,
            }],
        )
        .unwrap();
        depot_mappings::clear(&conn).unwrap();
        assert_eq!(depot_mappings::count(&conn).unwrap(), 0);
    }

    #[test]
    fn backfill_only_updates_rows_missing_game_info() {
        let conn = conn();
        conn.execute(
            "INSERT INTO downloads (id, service, client_ip, start_utc, depot_id)
             VALUES ('a', 'svc', '127.0.0.1', '2024-01-01T00:00:00Z', 10)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO downloads (id, service, client_ip, start_utc, depot_id, game_app_id, game_name)
             VALUES ('b', 'svc', '127.0.0.1', '2024-01-01T00:00:00Z', 20, 200, 'Already Known')",
            [],
        )
        .unwrap();

        let missing = downloads::list_missing_game_info(&conn).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "a");

        downloads::backfill_game_info(&conn, "a", 100, "Game", "https://example.com/a.jpg").unwrap();
        assert!(downloads::list_missing_game_info(&conn).unwrap().is_empty());
    }

    #[test]
    fn distinct_depot_ids_without_mapping_excludes_mapped_depots() {
        let conn = conn();
        conn.execute(
            "INSERT INTO downloads (id, service, client_ip, start_utc, depot_id)
             VALUES ('a', 'svc', '127.0.0.1', '2024-01-01T00:00:00Z', 10),
                    ('b', 'svc', '127.0.0.1', '2024-01-01T00:00:00Z', 20)",
            [],
        )
        .unwrap();
        depot_mappings::bulk_insert(
            &conn,
            &[DepotMapping {
                depot_id: 10,
                app_id: 1,
                app_name: "A".into(),
                is_owner: true,
                last_seen_change_number: 1,
            }],
        )
        .unwrap();

        let orphans = downloads::distinct_depot_ids_without_mapping(&conn).unwrap();
        assert_eq!(orphans, vec![20]);
    }

    #[test]
    fn batched_delete_removes_exactly_the_requested_rows() {
        let conn = conn();
        for i in 0..25 {
            conn.execute(
                &format!(
                    "INSERT INTO downloads (id, service, client_ip, start_utc) VALUES ('d{i}', 'svc', '127.0.0.1', '2024-01-01T00:00:00Z')"
                ),
                [],
            )
            .unwrap();
        }

        let removed = table_repo::delete_all_batched(&conn, "downloads", "id", 10).unwrap();
        assert_eq!(removed, 25);
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM downloads", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn null_foreign_key_clears_references_without_deleting_rows() {
        let conn = conn();
        conn.execute(
            "INSERT INTO downloads (id, service, client_ip, start_utc) VALUES ('d1', 'svc', '127.0.0.1', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO log_entries (id, source, logged_utc, line, download_id) VALUES ('l1', 'src', '2024-01-01T00:00:00Z', 'line', 'd1')",
            [],
        )
        .unwrap();

        table_repo::null_foreign_key(&conn, "log_entries", "download_id").unwrap();

        let download_id: Option<String> = conn
            .query_row("SELECT download_id FROM log_entries WHERE id = 'l1'", [], |r| r.get(0))
            .unwrap();
        assert!(download_id.is_none());

        let log_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM log_entries", [], |r| r.get(0))
            .unwrap();
        assert_eq!(log_count, 1);
    }
}
