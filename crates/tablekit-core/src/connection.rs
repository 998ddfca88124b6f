//! Connection, transaction and introspection traits

use crate::{ColumnMeta, QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// Shared execution surface of [`Connection`] and [`Transaction`].
///
/// Code that must run either inside or outside an explicit transaction
/// (metadata writes, DDL execution) takes `&dyn SqlExecutor` so the caller
/// decides the transaction scope.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement that modifies data or schema (INSERT/UPDATE/DELETE/DDL)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;
}

/// A database connection
#[async_trait]
pub trait Connection: SqlExecutor {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Get the dialect identifier for this connection
    ///
    /// Used to look up dialect-specific DDL behavior. Returns None if the
    /// dialect is unknown.
    fn dialect_id(&self) -> Option<&'static str> {
        None
    }

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Get schema introspection interface if supported
    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        None
    }
}

/// A database transaction
///
/// Dropping a transaction without calling either method must leave the
/// connection usable; drivers roll back abandoned transactions.
#[async_trait]
pub trait Transaction: SqlExecutor {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Basic information about a physical table
#[derive(Debug, Clone)]
pub struct PhysicalTableInfo {
    /// Table name as stored in the backend
    pub name: String,
    /// Row count, if cheap to obtain
    pub row_count: Option<i64>,
}

/// Schema inspection against the live backend.
///
/// The physical schema is never cached; reconciliation and validation
/// re-query through this interface every time.
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// List all user tables
    async fn list_tables(&self) -> Result<Vec<PhysicalTableInfo>>;

    /// Check whether a table exists
    async fn table_exists(&self, name: &str) -> Result<bool> {
        let tables = self.list_tables().await?;
        Ok(tables.iter().any(|t| t.name == name))
    }

    /// List the columns of a table in ordinal order
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnMeta>>;
}
