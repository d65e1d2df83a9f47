// src/storage/mod.rs

//! Catalog persistence on SQLite.
//!
//! The import pipeline works against one [`Catalog`] connection. A run
//! opens a single transaction before any importer work starts and either
//! commits it or rolls it back (dry run) at the very end; every query in
//! between goes through the transaction handle, which is passed explicitly
//! and owned by the reconciliation layer alone.

pub mod catalog;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, Transaction};

use crate::error::Result;

/// Handle to the catalog database.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (or create) the catalog database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        schema::initialize_schema(conn)?;
        Ok(())
    }

    /// Begin the run transaction.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Row counts shown by the `info` command.
    pub fn stats(&self) -> Result<CatalogStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        Ok(CatalogStats {
            vendors: count("SELECT COUNT(*) FROM vendors")?,
            categories: count("SELECT COUNT(*) FROM categories")?,
            active_teas: count("SELECT COUNT(*) FROM teas WHERE deleted_at IS NULL")?,
            deleted_teas: count("SELECT COUNT(*) FROM teas WHERE deleted_at IS NOT NULL")?,
        })
    }
}

/// Catalog row counts.
#[derive(Debug, Clone, Copy)]
pub struct CatalogStats {
    pub vendors: i64,
    pub categories: i64,
    pub active_teas: i64,
    pub deleted_teas: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_initializes_schema() {
        let catalog = Catalog::open_in_memory().unwrap();
        let stats = catalog.stats().unwrap();
        assert_eq!(stats.vendors, 0);
        assert_eq!(stats.active_teas, 0);
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let _catalog = Catalog::open(&path).unwrap();
        }
        assert!(path.exists());
    }
}
