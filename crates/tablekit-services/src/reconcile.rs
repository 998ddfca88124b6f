//! Metadata vs. physical-schema reconciliation
//!
//! The physical table is the operational source of truth; metadata is a
//! derived record that can drift when a transaction boundary is crossed by
//! an outage or someone touches the backend directly. This service detects
//! drift by probing physical existence and recomputing expected names, and
//! repairs it in either direction: recreate the physical table from
//! metadata, or drop a physical table nothing refers to.

use serde::{Deserialize, Serialize};
use tablekit_core::{Connection, DialectInfo, PhysicalTableInfo, SqlExecutor, TablekitError};
use tablekit_drivers::get_dialect_info;
use tablekit_schema::{DataProbe, DdlExecutor, DdlOperationResult};

use crate::error::{ServiceError, ServiceResult};
use crate::metadata::MetadataStore;

/// Prefix shared by every physical table the engine derives
const PHYSICAL_PREFIX: &str = "Table_";

/// Consistency report for one logical table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConsistencyReport {
    /// Owner the check ran for
    pub owner_id: i64,
    /// Logical table name
    pub table_name: String,
    /// The physical name the naming scheme derives today
    pub expected_physical_name: String,
    /// Whether a metadata record exists
    pub metadata_exists: bool,
    /// Whether the physical table exists
    pub physical_exists: bool,
    /// Columns recorded in metadata but missing physically
    pub missing_physical_columns: Vec<String>,
    /// Physical columns no metadata record describes
    pub unexpected_physical_columns: Vec<String>,
    /// Whether the two sides agree
    pub in_sync: bool,
}

/// Service for consistency checks and repairs
pub struct ReconciliationService;

impl ReconciliationService {
    /// Create a reconciliation service
    pub fn new() -> Self {
        Self
    }

    fn dialect(conn: &dyn Connection) -> DialectInfo {
        get_dialect_info(conn.driver_name())
    }

    /// Compare one table's metadata against the physical schema
    #[tracing::instrument(skip(self, conn))]
    pub async fn check_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
    ) -> ServiceResult<TableConsistencyReport> {
        let metadata = MetadataStore::new(Self::dialect(conn));
        metadata.ensure_schema(conn).await?;
        let record = metadata.get_table(conn, owner_id, table_name).await?;

        let expected_physical_name = tablekit_core::ident::derive_physical_name(owner_id, table_name);

        let introspection = conn.as_schema_introspection().ok_or_else(|| {
            ServiceError::Backend(TablekitError::Schema(
                "Backend does not support schema introspection".into(),
            ))
        })?;
        let physical_exists = introspection.table_exists(&expected_physical_name).await?;

        let mut missing_physical_columns = Vec::new();
        let mut unexpected_physical_columns = Vec::new();

        if let (Some(table), true) = (&record, physical_exists) {
            let physical_columns = introspection.list_columns(&expected_physical_name).await?;
            for column in &table.columns {
                if !physical_columns.iter().any(|p| p.name == column.name) {
                    missing_physical_columns.push(column.name.clone());
                }
            }
            for physical in &physical_columns {
                let is_system = physical.name == tablekit_core::SURROGATE_KEY_COLUMN
                    || physical.name == tablekit_core::ROW_IDENTIFIER_COLUMN;
                if !is_system && table.column(&physical.name).is_none() {
                    unexpected_physical_columns.push(physical.name.clone());
                }
            }
        }

        let metadata_exists = record.is_some();
        let in_sync = metadata_exists
            && physical_exists
            && missing_physical_columns.is_empty()
            && unexpected_physical_columns.is_empty();

        if !in_sync {
            tracing::warn!(
                owner_id,
                table = %table_name,
                metadata_exists,
                physical_exists,
                "table out of sync"
            );
        }

        Ok(TableConsistencyReport {
            owner_id,
            table_name: table_name.to_string(),
            expected_physical_name,
            metadata_exists,
            physical_exists,
            missing_physical_columns,
            unexpected_physical_columns,
            in_sync,
        })
    }

    /// Check every table an owner has metadata for
    pub async fn check_owner(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
    ) -> ServiceResult<Vec<TableConsistencyReport>> {
        let metadata = MetadataStore::new(Self::dialect(conn));
        metadata.ensure_schema(conn).await?;
        let tables = metadata.list_tables(conn, owner_id).await?;

        let mut reports = Vec::with_capacity(tables.len());
        for table in tables {
            reports.push(self.check_table(conn, owner_id, &table.name).await?);
        }
        Ok(reports)
    }

    /// Debug listing of every engine-derived physical table, with row counts
    #[tracing::instrument(skip(self, conn))]
    pub async fn list_physical_tables(
        &self,
        conn: &dyn Connection,
    ) -> ServiceResult<Vec<PhysicalTableInfo>> {
        let introspection = conn.as_schema_introspection().ok_or_else(|| {
            ServiceError::Backend(TablekitError::Schema(
                "Backend does not support schema introspection".into(),
            ))
        })?;
        let probe = DataProbe::new(conn, Self::dialect(conn));

        let mut tables = Vec::new();
        for mut info in introspection.list_tables().await? {
            if !info.name.starts_with(PHYSICAL_PREFIX) {
                continue;
            }
            info.row_count = probe.row_count(&info.name).await.ok().map(|n| n as i64);
            tables.push(info);
        }
        Ok(tables)
    }

    /// Physical tables with the engine prefix that no metadata describes
    pub async fn find_orphans(&self, conn: &dyn Connection) -> ServiceResult<Vec<String>> {
        let metadata = MetadataStore::new(Self::dialect(conn));
        metadata.ensure_schema(conn).await?;

        let mut orphans = Vec::new();
        for info in self.list_physical_tables(conn).await? {
            if !metadata.physical_name_in_use(conn, &info.name).await? {
                orphans.push(info.name);
            }
        }
        Ok(orphans)
    }

    /// Repair: recreate the physical table from its metadata record.
    ///
    /// Drops whatever exists under the derived name first — the repair is
    /// for tables whose physical half is lost or mangled, and the caller
    /// has chosen metadata as the side to keep.
    #[tracing::instrument(skip(self, conn))]
    pub async fn recreate_physical_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
    ) -> ServiceResult<DdlOperationResult> {
        let metadata = MetadataStore::new(Self::dialect(conn));
        metadata.ensure_schema(conn).await?;
        let table = metadata
            .get_table(conn, owner_id, table_name)
            .await?
            .ok_or_else(|| ServiceError::TableNotFound(table_name.to_string()))?;

        let executor = DdlExecutor::new(Self::dialect(conn));
        let tx = conn.begin_transaction().await?;

        let dropped = executor
            .drop_physical_table(tx.as_ref(), owner_id, table_name)
            .await;
        if !dropped.success {
            tx.rollback().await?;
            return Ok(dropped);
        }
        let created = executor.create_physical_table(tx.as_ref(), &table).await;
        if !created.success {
            tx.rollback().await?;
            return Ok(created);
        }
        tx.commit().await?;

        tracing::info!(owner_id, table = %table_name, "physical table recreated from metadata");
        Ok(DdlOperationResult {
            success: true,
            message: format!("Table '{}' recreated", table.physical_name()),
            executed_statements: dropped
                .executed_statements
                .into_iter()
                .chain(created.executed_statements)
                .collect(),
            affected_rows: 0,
        })
    }

    /// Repair: drop a physical table no metadata refers to.
    ///
    /// Refuses tables outside the engine's naming scheme and tables that
    /// are still referenced.
    #[tracing::instrument(skip(self, conn))]
    pub async fn drop_orphaned_physical(
        &self,
        conn: &dyn Connection,
        physical_name: &str,
    ) -> ServiceResult<DdlOperationResult> {
        if !physical_name.starts_with(PHYSICAL_PREFIX) {
            return Err(ServiceError::InvalidIdentifier(physical_name.to_string()));
        }

        let metadata = MetadataStore::new(Self::dialect(conn));
        metadata.ensure_schema(conn).await?;
        if metadata.physical_name_in_use(conn, physical_name).await? {
            return Err(ServiceError::TableOperationFailed(format!(
                "Table '{}' is still referenced by metadata",
                physical_name
            )));
        }

        let executor = DdlExecutor::new(Self::dialect(conn));
        let builder = executor.builder();
        let sql = builder.drop_table_sql(physical_name);
        match conn.execute(&sql, &[]).await {
            Ok(_) => {
                tracing::info!(table = %physical_name, "orphaned physical table dropped");
                Ok(DdlOperationResult {
                    success: true,
                    message: format!("Orphaned table '{}' dropped", physical_name),
                    executed_statements: vec![sql],
                    affected_rows: 0,
                })
            }
            Err(e) => Ok(DdlOperationResult {
                success: false,
                message: e.to_string(),
                executed_statements: Vec::new(),
                affected_rows: 0,
            }),
        }
    }
}

impl Default for ReconciliationService {
    fn default() -> Self {
        Self::new()
    }
}
