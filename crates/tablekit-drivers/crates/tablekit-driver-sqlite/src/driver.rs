//! SQLite driver implementation

use crate::connection::SqliteConnection;
use async_trait::async_trait;
use std::sync::Arc;
use tablekit_core::{
    Connection, ConnectionConfig, DatabaseDriver, DialectInfo, Result, TablekitError,
};

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn dialect_info(&self) -> DialectInfo {
        DialectInfo::sqlite()
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let path = config.database.as_deref().ok_or_else(|| {
            TablekitError::Configuration("SQLite connection requires a database path".into())
        })?;
        let connection = SqliteConnection::open(path)?;
        Ok(Arc::new(connection))
    }
}
