//! SQLite driver for tablekit
//!
//! Wraps rusqlite behind the tablekit `Connection`/`Transaction` traits.
//! The connection handle lives behind a `parking_lot::Mutex`; transactions
//! issue raw BEGIN/COMMIT/ROLLBACK so they can share it.

mod connection;
mod driver;

pub use connection::{SqliteConnection, SqliteTransaction};
pub use driver::SqliteDriver;
