//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.

use rusqlite::Connection;

use crate::error::EngineError;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration { version: 1, sql: include_str!("001_baseline.sql") }];

fn ensure_schema_version_table(conn: &Connection) -> Result<(), EngineError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    Ok(())
}

fn current_version(conn: &Connection) -> Result<i32, EngineError> {
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?)
}

/// Runs all pending migrations. Returns the number applied.
///
/// Forward-compat guard: if the database's recorded version is newer than
/// the highest migration this build knows, the run refuses to continue.
pub fn run(conn: &Connection) -> Result<usize, EngineError> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    if current > max_known {
        return Err(EngineError::Configuration(format!(
            "store schema version {current} is newer than this build supports ({max_known})"
        )));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    backup_before_migration(conn);

    for migration in &pending {
        conn.execute_batch(migration.sql)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [migration.version])?;
        log::info!("applied migration v{}", migration.version);
    }

    Ok(pending.len())
}

/// Best-effort online backup before applying migrations. Skipped for
/// in-memory or temporary databases; a failure here is logged, not fatal,
/// since the migrations themselves are additive and idempotent.
fn backup_before_migration(conn: &Connection) {
    let db_path: Result<String, _> = conn.query_row("PRAGMA database_list", [], |row| row.get(2));
    let Ok(db_path) = db_path else { return };
    if db_path.is_empty() || db_path == ":memory:" {
        return;
    }

    let backup_path = format!("{db_path}.pre-migration.bak");
    let result = rusqlite::Connection::open(&backup_path).and_then(|mut backup_conn| {
        let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)?;
        backup.step(-1)
    });
    match result {
        Ok(_) => log::info!("pre-migration backup written to {backup_path}"),
        Err(e) => log::warn!("pre-migration backup skipped: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_db_applies_baseline() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = run(&conn).unwrap();
        assert_eq!(applied, 1);
        let version = current_version(&conn).unwrap();
        assert_eq!(version, 1);

        conn.execute("INSERT INTO contacts (id, email) VALUES (1, 'a@example.com')", []).unwrap();
    }

    #[test]
    fn rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        let applied = run(&conn).unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", []).unwrap();
        assert!(run(&conn).is_err());
    }
}
