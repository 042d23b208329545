use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::schema::SCHEMA;

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// In-memory databases are private to their connection, so their pool is
    /// capped at a single connection that every handle shares. That connection
    /// is never recycled: a replacement would open an empty database.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pool = if Self::is_memory_path(path.as_ref()) {
            let manager = SqliteConnectionManager::memory().with_init(configure_connection);
            Pool::builder()
                .max_size(1)
                .max_lifetime(None)
                .idle_timeout(None)
                .build(manager)
        } else {
            let manager = SqliteConnectionManager::file(path).with_init(configure_file_connection);
            Pool::new(manager)
        }
        .context("Failed to create database connection pool")?;

        Ok(Self { pool })
    }

    fn is_memory_path(path: &Path) -> bool {
        path.to_string_lossy()
            .trim()
            .eq_ignore_ascii_case(MEMORY_DB_PATH)
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Initialize the database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)
}

fn configure_file_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    configure_connection(conn)?;
    // WAL lets the read API run while workers write
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    Ok(())
}
