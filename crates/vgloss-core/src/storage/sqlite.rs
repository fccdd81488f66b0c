use super::content_store::IndexTransaction;
use rusqlite::{Connection, Result, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, 64MB cache)");
        Ok(())
    }

    /// The index is derived entirely from the gallery on disk, so an older
    /// schema is dropped and rebuilt by the next pass rather than migrated.
    /// An up-to-date schema is left untouched.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        debug!(
            "Schema version {} < {}, dropping all tables and recreating",
            version, SCHEMA_VERSION
        );
        self.conn.execute_batch(
            "DROP TABLE IF EXISTS path_record;
             DROP TABLE IF EXISTS content_record;",
        )?;
        self.conn.execute_batch(include_str!("schema.sql"))?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        Ok(())
    }

    /// How long to wait for another writer before giving up with `SQLITE_BUSY`.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a reconciliation pass. The write lock is taken up front, so a
    /// second pass over the same index waits (up to the busy timeout) instead
    /// of interleaving. Dropping the returned transaction rolls back.
    pub fn begin_pass(&self) -> Result<IndexTransaction<'_>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        Ok(IndexTransaction::new(tx))
    }
}
