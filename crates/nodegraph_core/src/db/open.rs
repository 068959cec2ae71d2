//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure pragmas the graph's write discipline depends on.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a bounded busy timeout.
//! - File databases run in WAL mode so readers never wait on the writer.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{Duration, Instant};

/// Upper bound a writer waits for the database write lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening, configuring or migrating a graph database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite could not open the file or the in-memory database.
    Open {
        mode: &'static str,
        source: rusqlite::Error,
    },
    /// A file database stayed out of WAL mode, so readers would block on writers.
    WalUnavailable { journal_mode: String },
    /// A registered migration failed; the schema keeps its previous version.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The file was written by a binary with a newer graph schema.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    Sqlite(rusqlite::Error),
}

impl DbError {
    /// Stable code used in `db_open` log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "db_open_failed",
            Self::WalUnavailable { .. } => "db_wal_unavailable",
            Self::Migration { .. } => "db_migration_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
            Self::Sqlite(_) => "db_sqlite",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { mode, source } => write!(f, "cannot open {mode} graph database: {source}"),
            Self::WalUnavailable { journal_mode } => write!(
                f,
                "graph database must run in WAL mode, got journal_mode={journal_mode}"
            ),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "graph migration {version} ({name}) failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "graph schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Migration { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::WalUnavailable { .. } | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    File,
    Memory,
}

impl OpenMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Switches the file to WAL journal mode.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(OpenMode::File, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(OpenMode::Memory, Connection::open_in_memory)
}

fn open_with(
    mode: OpenMode,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode={}",
        mode.as_str()
    );

    let result = connect()
        .map_err(|source| DbError::Open {
            mode: mode.as_str(),
            source,
        })
        .and_then(|mut conn| bootstrap_connection(&mut conn, mode).map(|()| conn));
    let conn = result.map_err(|err| {
        error!(
            "event=db_open module=db status=error mode={} duration_ms={} error_code={} error={}",
            mode.as_str(),
            started_at.elapsed().as_millis(),
            err.code(),
            err
        );
        err
    })?;

    info!(
        "event=db_open module=db status=ok mode={} duration_ms={}",
        mode.as_str(),
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection, mode: OpenMode) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if mode == OpenMode::File {
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        require_wal(journal_mode)?;
    }
    apply_migrations(conn)?;
    Ok(())
}

fn require_wal(journal_mode: String) -> DbResult<()> {
    if !journal_mode.eq_ignore_ascii_case("wal") {
        return Err(DbError::WalUnavailable { journal_mode });
    }
    info!("event=db_journal_mode module=db status=ok journal_mode={journal_mode}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{require_wal, DbError};

    #[test]
    fn non_wal_journal_mode_is_refused() {
        assert!(require_wal("wal".to_string()).is_ok());
        assert!(require_wal("WAL".to_string()).is_ok());

        let err = require_wal("delete".to_string()).unwrap_err();
        assert_eq!(err.code(), "db_wal_unavailable");
        assert!(matches!(
            err,
            DbError::WalUnavailable { journal_mode } if journal_mode == "delete"
        ));
    }
}
