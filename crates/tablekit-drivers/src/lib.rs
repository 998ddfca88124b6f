//! Driver registry for tablekit
//!
//! Re-exports the built-in drivers behind feature gates and provides the
//! registry used to resolve a driver and its dialect by name.

mod registry;

pub use registry::{DriverRegistry, get_dialect_info};

#[cfg(feature = "sqlite")]
pub use tablekit_driver_sqlite as sqlite;
