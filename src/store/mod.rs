//! Persistent store (spec §6). A single explicit handle threaded through
//! the pipeline as a constructor argument — no process-wide mutable
//! connection (§9 "Global mutable state").

pub mod campaigns;
pub mod config;
pub mod contacts;
pub mod migrations;
pub mod schedules;

use std::path::Path;

use rusqlite::Connection;

use crate::error::EngineError;

/// Owns the SQLite connection for one engine run. Every store operation
/// takes `&Store` (or `&mut Store` for migrations) rather than reaching
/// for a global.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Store, EngineError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::run(&conn)?;
        Ok(Store { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Store, EngineError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::run(&conn)?;
        Ok(Store { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside a single transaction, committing on success and
    /// rolling back on error (spec §4.11, §5: persistence writes are
    /// serialized through one transaction; a failed batch rolls back).
    pub fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
