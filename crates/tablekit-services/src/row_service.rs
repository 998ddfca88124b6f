//! Row CRUD against user tables
//!
//! Rows are addressed externally by the per-table `RowIdentifier`
//! sequence. Incoming values are coerced to each column's logical type
//! before they reach the backend; values are parameterized and
//! identifiers sanitized by the DML layer underneath.

use std::collections::HashMap;

use tablekit_core::{
    Connection, DialectInfo, QueryResult, ROW_IDENTIFIER_COLUMN, TablekitError, Value,
};
use tablekit_drivers::get_dialect_info;
use tablekit_schema::{DataProbe, RowDml, RowFilter};

use crate::error::{ServiceError, ServiceResult};
use crate::metadata::MetadataStore;

/// Service for row-level operations on user tables
pub struct RowService {
    default_limit: usize,
}

impl RowService {
    /// Create a row service
    ///
    /// # Arguments
    ///
    /// * `default_limit` - Row cap applied when listing without an explicit limit
    pub fn new(default_limit: usize) -> Self {
        Self { default_limit }
    }

    fn dialect(conn: &dyn Connection) -> DialectInfo {
        get_dialect_info(conn.driver_name())
    }

    async fn load_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
    ) -> ServiceResult<tablekit_core::LogicalTable> {
        let metadata = MetadataStore::new(Self::dialect(conn));
        metadata.ensure_schema(conn).await?;
        metadata
            .get_table(conn, owner_id, table_name)
            .await?
            .ok_or_else(|| ServiceError::TableNotFound(table_name.to_string()))
    }

    fn map_dml_error(e: TablekitError) -> ServiceError {
        match e {
            TablekitError::Query(message) => ServiceError::InvalidValue(message),
            other => ServiceError::Backend(other),
        }
    }

    /// Insert a row; returns the assigned `RowIdentifier`.
    ///
    /// Values for required columns must be present unless the column has a
    /// default; the backend's NOT NULL constraint is the final arbiter.
    #[tracing::instrument(skip(self, conn, values))]
    pub async fn insert_row(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        values: HashMap<String, Value>,
    ) -> ServiceResult<i64> {
        let table = self.load_table(conn, owner_id, table_name).await?;

        for name in values.keys() {
            if table.column(name).is_none() {
                return Err(ServiceError::ColumnNotFound(name.clone()));
            }
        }

        let dml = RowDml::new(Self::dialect(conn));
        dml.insert_row(conn, &table, &values)
            .await
            .map_err(Self::map_dml_error)
    }

    /// List rows, ordered by `RowIdentifier` when the physical table has
    /// that column, in backend-natural order otherwise
    #[tracing::instrument(skip(self, conn))]
    pub async fn list_rows(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        limit: Option<usize>,
    ) -> ServiceResult<QueryResult> {
        let table = self.load_table(conn, owner_id, table_name).await?;
        let physical = table.physical_name();

        let order_by_row_identifier = match conn.as_schema_introspection() {
            Some(introspection) => introspection
                .list_columns(&physical)
                .await?
                .iter()
                .any(|c| c.name == ROW_IDENTIFIER_COLUMN),
            None => false,
        };

        let dml = RowDml::new(Self::dialect(conn));
        let mut result = dml
            .select_all_rows(conn, &physical, order_by_row_identifier)
            .await
            .map_err(ServiceError::Backend)?;

        let limit = limit.unwrap_or(self.default_limit);
        if result.rows.len() > limit {
            result.rows.truncate(limit);
        }
        Ok(result)
    }

    /// Update columns of the rows matching a filter; returns rows changed
    #[tracing::instrument(skip(self, conn, updates))]
    pub async fn update_rows(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        updates: HashMap<String, Value>,
        filter: RowFilter,
    ) -> ServiceResult<u64> {
        let table = self.load_table(conn, owner_id, table_name).await?;

        for name in updates.keys() {
            if table.column(name).is_none() {
                return Err(ServiceError::ColumnNotFound(name.clone()));
            }
        }

        let dml = RowDml::new(Self::dialect(conn));
        dml.update_rows_where(conn, &table, &updates, &filter)
            .await
            .map_err(Self::map_dml_error)
    }

    /// Update one row addressed by its `RowIdentifier`
    pub async fn update_row(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        row_identifier: i64,
        updates: HashMap<String, Value>,
    ) -> ServiceResult<u64> {
        self.update_rows(
            conn,
            owner_id,
            table_name,
            updates,
            RowFilter::by_row_identifier(row_identifier),
        )
        .await
    }

    /// Delete the rows matching a filter; returns rows removed
    #[tracing::instrument(skip(self, conn))]
    pub async fn delete_rows(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        filter: RowFilter,
    ) -> ServiceResult<u64> {
        let table = self.load_table(conn, owner_id, table_name).await?;
        let dml = RowDml::new(Self::dialect(conn));
        dml.delete_rows_where(conn, &table.physical_name(), &filter)
            .await
            .map_err(ServiceError::Backend)
    }

    /// Delete one row addressed by its `RowIdentifier`
    pub async fn delete_row(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        row_identifier: i64,
    ) -> ServiceResult<u64> {
        self.delete_rows(
            conn,
            owner_id,
            table_name,
            RowFilter::by_row_identifier(row_identifier),
        )
        .await
    }

    /// Number of rows currently in the table
    pub async fn row_count(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
    ) -> ServiceResult<u64> {
        let table = self.load_table(conn, owner_id, table_name).await?;
        let probe = DataProbe::new(conn, Self::dialect(conn));
        probe
            .row_count(&table.physical_name())
            .await
            .map_err(ServiceError::Backend)
    }
}
