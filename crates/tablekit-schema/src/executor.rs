//! DDL execution
//!
//! Runs the statements produced by [`DdlBuilder`](crate::ddl::DdlBuilder)
//! against a connection or transaction. Every backend failure is caught
//! here and translated into a `DdlOperationResult` — DDL errors never
//! propagate as `Err` past this component. Multi-statement plans are
//! expected to run on a transaction supplied by the caller, which owns
//! commit/rollback.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tablekit_core::{
    Connection, DataType, DialectInfo, LogicalColumn, LogicalTable, SqlExecutor,
    ident::derive_physical_name,
};

use crate::ddl::DdlBuilder;

/// Outcome of a DDL operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdlOperationResult {
    /// Whether every statement executed
    pub success: bool,
    /// Outcome description; the backend's message on failure
    pub message: String,
    /// Statements that actually ran, in order
    pub executed_statements: Vec<String>,
    /// Total rows affected across the statements
    pub affected_rows: u64,
}

impl DdlOperationResult {
    fn ok(message: impl Into<String>, executed: Vec<String>, affected_rows: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            executed_statements: executed,
            affected_rows,
        }
    }

    fn failed(message: impl Into<String>, executed: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            executed_statements: executed,
            affected_rows: 0,
        }
    }
}

/// Executes DDL plans for one dialect
pub struct DdlExecutor {
    builder: DdlBuilder,
}

impl DdlExecutor {
    /// Create an executor for a dialect
    pub fn new(dialect: DialectInfo) -> Self {
        Self {
            builder: DdlBuilder::new(dialect),
        }
    }

    /// The statement builder this executor uses
    pub fn builder(&self) -> &DdlBuilder {
        &self.builder
    }

    /// Run statements in order, stopping at the first failure.
    ///
    /// The caller owns the transaction scope; a failed result signals it
    /// to roll back.
    async fn run_statements(
        &self,
        run: &dyn SqlExecutor,
        statements: Vec<String>,
        success_message: &str,
    ) -> DdlOperationResult {
        let mut executed = Vec::new();
        let mut affected_rows = 0;

        for sql in statements {
            match run.execute(&sql, &[]).await {
                Ok(result) => {
                    affected_rows += result.affected_rows;
                    executed.push(sql);
                }
                Err(e) => {
                    tracing::warn!(error = %e, statement = %sql, "DDL statement failed");
                    return DdlOperationResult::failed(e.to_string(), executed);
                }
            }
        }

        DdlOperationResult::ok(success_message, executed, affected_rows)
    }

    /// CREATE the physical table for a logical definition.
    ///
    /// Not idempotent: callers that want create-if-absent semantics check
    /// existence first.
    pub async fn create_physical_table(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
    ) -> DdlOperationResult {
        let physical = table.physical_name();
        tracing::info!(table = %physical, columns = table.columns.len(), "creating physical table");
        let sql = self.builder.create_table_sql(&physical, &table.columns);
        self.run_statements(run, vec![sql], &format!("Table '{}' created", physical))
            .await
    }

    /// DROP the physical table; succeeds even when it is already absent
    pub async fn drop_physical_table(
        &self,
        run: &dyn SqlExecutor,
        owner_id: i64,
        logical_name: &str,
    ) -> DdlOperationResult {
        let physical = derive_physical_name(owner_id, logical_name);
        tracing::info!(table = %physical, "dropping physical table");
        let sql = self.builder.drop_table_sql(&physical);
        self.run_statements(run, vec![sql], &format!("Table '{}' dropped", physical))
            .await
    }

    /// Checked rename: refuses (without error) when the source is absent
    /// or the destination already exists, so callers decide the messaging.
    pub async fn rename_physical_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        old_logical_name: &str,
        new_logical_name: &str,
    ) -> DdlOperationResult {
        let old_physical = derive_physical_name(owner_id, old_logical_name);
        let new_physical = derive_physical_name(owner_id, new_logical_name);

        let Some(introspection) = conn.as_schema_introspection() else {
            return DdlOperationResult::failed(
                "Backend does not support schema introspection",
                Vec::new(),
            );
        };

        match introspection.table_exists(&old_physical).await {
            Ok(true) => {}
            Ok(false) => {
                return DdlOperationResult::failed(
                    format!("Source table '{}' does not exist", old_physical),
                    Vec::new(),
                );
            }
            Err(e) => return DdlOperationResult::failed(e.to_string(), Vec::new()),
        }
        match introspection.table_exists(&new_physical).await {
            Ok(false) => {}
            Ok(true) => {
                return DdlOperationResult::failed(
                    format!("Destination table '{}' already exists", new_physical),
                    Vec::new(),
                );
            }
            Err(e) => return DdlOperationResult::failed(e.to_string(), Vec::new()),
        }

        let sql = self.builder.rename_table_sql(&old_physical, &new_physical);
        self.run_statements(
            conn,
            vec![sql],
            &format!("Table renamed to '{}'", new_physical),
        )
        .await
    }

    /// Unchecked rename, for callers that verified source and destination
    /// themselves and need the statement inside their own transaction
    /// (introspection is a connection-level capability).
    pub async fn rename_physical_table_unchecked(
        &self,
        run: &dyn SqlExecutor,
        owner_id: i64,
        old_logical_name: &str,
        new_logical_name: &str,
    ) -> DdlOperationResult {
        let old_physical = derive_physical_name(owner_id, old_logical_name);
        let new_physical = derive_physical_name(owner_id, new_logical_name);
        let sql = self.builder.rename_table_sql(&old_physical, &new_physical);
        self.run_statements(
            run,
            vec![sql],
            &format!("Table renamed to '{}'", new_physical),
        )
        .await
    }

    /// ADD COLUMN (or rebuild, when forced required additions demand it)
    pub async fn add_column(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        new_column: &LogicalColumn,
    ) -> DdlOperationResult {
        let physical = table.physical_name();
        let plan = self
            .builder
            .add_column_plan(&physical, &table.columns, new_column);
        self.run_statements(
            run,
            plan,
            &format!("Column '{}' added to '{}'", new_column.name, physical),
        )
        .await
    }

    /// DROP COLUMN
    pub async fn drop_column(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        column_name: &str,
    ) -> DdlOperationResult {
        let physical = table.physical_name();
        let plan = self
            .builder
            .drop_column_plan(&physical, &table.columns, column_name);
        self.run_statements(
            run,
            plan,
            &format!("Column '{}' dropped from '{}'", column_name, physical),
        )
        .await
    }

    /// RENAME COLUMN
    pub async fn rename_column(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        old_name: &str,
        new_name: &str,
    ) -> DdlOperationResult {
        let physical = table.physical_name();
        let sql = self.builder.rename_column_sql(&physical, old_name, new_name);
        self.run_statements(
            run,
            vec![sql],
            &format!("Column '{}' renamed to '{}'", old_name, new_name),
        )
        .await
    }

    /// Change a column's type
    pub async fn alter_column_type(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        column_name: &str,
        new_type: DataType,
    ) -> DdlOperationResult {
        let physical = table.physical_name();
        let plan = match self
            .builder
            .alter_column_type_plan(&physical, &table.columns, column_name, new_type)
        {
            Ok(plan) => plan,
            Err(e) => return DdlOperationResult::failed(e.to_string(), Vec::new()),
        };
        self.run_statements(
            run,
            plan,
            &format!("Column '{}' changed to {}", column_name, new_type),
        )
        .await
    }

    /// Change a column's requiredness
    pub async fn set_column_required(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        column_name: &str,
        required: bool,
    ) -> DdlOperationResult {
        let physical = table.physical_name();
        let plan = match self
            .builder
            .set_required_plan(&physical, &table.columns, column_name, required)
        {
            Ok(plan) => plan,
            Err(e) => return DdlOperationResult::failed(e.to_string(), Vec::new()),
        };
        let change = if required { "required" } else { "optional" };
        self.run_statements(
            run,
            plan,
            &format!("Column '{}' is now {}", column_name, change),
        )
        .await
    }

    /// Copy all rows into a timestamp-suffixed shadow table.
    ///
    /// Returns the backup table name in the message on success.
    pub async fn create_backup_table(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
    ) -> DdlOperationResult {
        let physical = table.physical_name();
        let backup_name = format!(
            "{}_backup_{}",
            physical,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        tracing::info!(table = %physical, backup = %backup_name, "creating backup table");
        let sql = self.builder.backup_table_sql(&physical, &backup_name);
        self.run_statements(run, vec![sql], &backup_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekit_core::{Connection, Value};
    use tablekit_driver_sqlite::SqliteConnection;

    fn orders_table() -> LogicalTable {
        LogicalTable::new(1, "Orders")
            .with_column(LogicalColumn::named("Item", DataType::Text))
            .with_column(LogicalColumn::named("Price", DataType::Decimal))
    }

    async fn setup() -> (SqliteConnection, DdlExecutor, LogicalTable) {
        let conn = SqliteConnection::open(":memory:").unwrap();
        let executor = DdlExecutor::new(DialectInfo::sqlite());
        let table = orders_table();
        let result = executor.create_physical_table(&conn, &table).await;
        assert!(result.success, "{}", result.message);
        (conn, executor, table)
    }

    async fn insert(conn: &SqliteConnection, table: &LogicalTable, row_id: i64, item: &str, price: f64) {
        conn.execute(
            &format!(
                "INSERT INTO \"{}\" (\"RowIdentifier\", \"Item\", \"Price\") VALUES (?, ?, ?)",
                table.physical_name()
            ),
            &[
                Value::Int64(row_id),
                Value::String(item.into()),
                Value::Float64(price),
            ],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn create_then_read_back_preserves_order_and_types() {
        let (conn, _executor, table) = setup().await;

        let introspection = conn.as_schema_introspection().unwrap();
        let columns = introspection
            .list_columns(&table.physical_name())
            .await
            .unwrap();

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "RowIdentifier", "Item", "Price"]);
        assert_eq!(columns[2].data_type, "VARCHAR(255)");
        assert_eq!(columns[3].data_type, "DECIMAL(18,2)");
    }

    #[tokio::test]
    async fn create_is_not_idempotent() {
        let (conn, executor, table) = setup().await;
        let result = executor.create_physical_table(&conn, &table).await;
        assert!(!result.success);
        assert!(result.message.contains("already exists"));
    }

    #[tokio::test]
    async fn drop_twice_succeeds() {
        let (conn, executor, _table) = setup().await;

        let first = executor.drop_physical_table(&conn, 1, "Orders").await;
        assert!(first.success);
        let second = executor.drop_physical_table(&conn, 1, "Orders").await;
        assert!(second.success, "{}", second.message);
    }

    #[tokio::test]
    async fn rename_is_checked_both_ways() {
        let (conn, executor, _table) = setup().await;

        let missing = executor
            .rename_physical_table(&conn, 1, "Ghost", "Whatever")
            .await;
        assert!(!missing.success);
        assert!(missing.message.contains("does not exist"));
        assert!(missing.executed_statements.is_empty());

        // occupy the destination, then try to rename onto it
        let other = LogicalTable::new(1, "Target")
            .with_column(LogicalColumn::named("X", DataType::Text));
        assert!(executor.create_physical_table(&conn, &other).await.success);
        let occupied = executor
            .rename_physical_table(&conn, 1, "Orders", "Target")
            .await;
        assert!(!occupied.success);
        assert!(occupied.message.contains("already exists"));

        let ok = executor
            .rename_physical_table(&conn, 1, "Orders", "Archive")
            .await;
        assert!(ok.success, "{}", ok.message);
        let introspection = conn.as_schema_introspection().unwrap();
        assert!(introspection.table_exists("Table_1_Archive").await.unwrap());
        assert!(!introspection.table_exists("Table_1_Orders").await.unwrap());
    }

    #[tokio::test]
    async fn retype_preserves_rows_and_converts_values() {
        let (conn, executor, table) = setup().await;
        insert(&conn, &table, 1, "a", 1.9).await;
        insert(&conn, &table, 2, "b", 2.2).await;

        let tx = conn.begin_transaction().await.unwrap();
        let result = executor
            .alter_column_type(tx.as_ref(), &table, "Price", DataType::Integer)
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.executed_statements.len(), 4);
        tx.commit().await.unwrap();

        let rows = conn
            .query(
                &format!(
                    "SELECT \"RowIdentifier\", \"Price\" FROM \"{}\" ORDER BY \"RowIdentifier\"",
                    table.physical_name()
                ),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.rows[0].get(1).and_then(|v| v.as_i64()), Some(1));
        assert_eq!(rows.rows[1].get(1).and_then(|v| v.as_i64()), Some(2));
    }

    #[tokio::test]
    async fn failed_plan_reports_failure_and_rolls_back_cleanly() {
        let (conn, executor, table) = setup().await;
        insert(&conn, &table, 1, "a", 1.0).await;

        let tx = conn.begin_transaction().await.unwrap();
        // the plan targets a column that does not exist physically
        let mut broken = table.clone();
        broken.columns.push(LogicalColumn::named("Ghost", DataType::Text).order(2));
        let result = executor
            .alter_column_type(tx.as_ref(), &broken, "Ghost", DataType::Integer)
            .await;
        assert!(!result.success);
        tx.rollback().await.unwrap();

        // original table untouched
        let rows = conn
            .query(
                &format!("SELECT COUNT(*) FROM \"{}\"", table.physical_name()),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(rows.scalar().and_then(|v| v.as_i64()), Some(1));
    }

    #[tokio::test]
    async fn forced_required_addition_succeeds_at_ddl_level() {
        let (conn, executor, table) = setup().await;
        insert(&conn, &table, 1, "a", 1.0).await;
        insert(&conn, &table, 2, "b", 2.0).await;
        insert(&conn, &table, 3, "c", 3.0).await;

        let new_column = LogicalColumn::named("Code", DataType::Integer).required().order(2);
        let result = executor.add_column(&conn, &table, &new_column).await;
        assert!(result.success, "{}", result.message);

        // existing rows received the type's zero value
        let rows = conn
            .query(
                &format!(
                    "SELECT COUNT(*) FROM \"{}\" WHERE \"Code\" = 0",
                    table.physical_name()
                ),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(rows.scalar().and_then(|v| v.as_i64()), Some(3));
    }

    #[tokio::test]
    async fn drop_and_rename_column() {
        let (conn, executor, table) = setup().await;
        insert(&conn, &table, 1, "a", 1.0).await;

        let renamed = executor.rename_column(&conn, &table, "Item", "Product").await;
        assert!(renamed.success, "{}", renamed.message);

        let dropped = executor.drop_column(&conn, &table, "Price").await;
        assert!(dropped.success, "{}", dropped.message);

        let introspection = conn.as_schema_introspection().unwrap();
        let columns = introspection
            .list_columns(&table.physical_name())
            .await
            .unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "RowIdentifier", "Product"]);
    }

    #[tokio::test]
    async fn backup_copies_all_rows() {
        let (conn, executor, table) = setup().await;
        insert(&conn, &table, 1, "a", 1.0).await;
        insert(&conn, &table, 2, "b", 2.0).await;

        let result = executor.create_backup_table(&conn, &table).await;
        assert!(result.success, "{}", result.message);
        let backup_name = result.message.clone();
        assert!(backup_name.starts_with("Table_1_Orders_backup_"));

        let rows = conn
            .query(&format!("SELECT COUNT(*) FROM \"{}\"", backup_name), &[])
            .await
            .unwrap();
        assert_eq!(rows.scalar().and_then(|v| v.as_i64()), Some(2));
    }
}
