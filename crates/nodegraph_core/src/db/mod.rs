//! Graph database bootstrap: connection setup, pragmas and schema migrations.
//!
//! Every connection handed to a repository comes from [`open_db`] or
//! [`open_db_in_memory`] and is already migrated to [`migrations::latest_version`].

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, DbError, DbResult, BUSY_TIMEOUT};
