//! Logical schema metadata store
//!
//! Persists `LogicalTable`/`LogicalColumn` records in two reserved system
//! tables of the same backend that holds the physical tables. Every method
//! takes a `&dyn SqlExecutor`, so service flows run metadata writes inside
//! the same transaction as the physical DDL — the two are never committed
//! independently.
//!
//! The physical table remains the operational source of truth; when the
//! two diverge, reconciliation repairs the metadata side.

use chrono::{DateTime, Utc};
use tablekit_core::{
    DataType, DialectInfo, LogicalColumn, LogicalTable, Result, SqlExecutor, TablekitError, Value,
};

/// System table holding table records
pub const TABLES_TABLE: &str = "tablekit_tables";

/// System table holding column records
pub const COLUMNS_TABLE: &str = "tablekit_columns";

/// Metadata persistence over reserved system tables
pub struct MetadataStore {
    dialect: DialectInfo,
}

impl MetadataStore {
    /// Create a store for a dialect
    pub fn new(dialect: DialectInfo) -> Self {
        Self { dialect }
    }

    /// Create the system tables when absent
    pub async fn ensure_schema(&self, run: &dyn SqlExecutor) -> Result<()> {
        run.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (\n  \
                 Id {},\n  \
                 OwnerId INTEGER NOT NULL,\n  \
                 Name VARCHAR(255) NOT NULL,\n  \
                 Description VARCHAR(255),\n  \
                 IsDeleted INTEGER NOT NULL DEFAULT 0,\n  \
                 CreatedAt VARCHAR(40) NOT NULL,\n  \
                 UpdatedAt VARCHAR(40) NOT NULL\n)",
                TABLES_TABLE, self.dialect.integer_primary_key
            ),
            &[],
        )
        .await?;

        run.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (\n  \
                 Id {},\n  \
                 TableId INTEGER NOT NULL,\n  \
                 Name VARCHAR(255) NOT NULL,\n  \
                 DataType VARCHAR(32) NOT NULL,\n  \
                 IsRequired INTEGER NOT NULL DEFAULT 0,\n  \
                 DisplayOrder INTEGER NOT NULL,\n  \
                 DefaultValue VARCHAR(255)\n)",
                COLUMNS_TABLE, self.dialect.integer_primary_key
            ),
            &[],
        )
        .await?;

        Ok(())
    }

    /// Persist a new table definition; returns it with ids assigned
    pub async fn insert_table(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
    ) -> Result<LogicalTable> {
        run.execute(
            &format!(
                "INSERT INTO {} (OwnerId, Name, Description, IsDeleted, CreatedAt, UpdatedAt) \
                 VALUES (?, ?, ?, 0, ?, ?)",
                TABLES_TABLE
            ),
            &[
                Value::Int64(table.owner_id),
                Value::String(table.name.clone()),
                table
                    .description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                Value::String(table.created_at.to_rfc3339()),
                Value::String(table.updated_at.to_rfc3339()),
            ],
        )
        .await?;

        let table_id = self
            .scalar_i64(
                run,
                &format!(
                    "SELECT MAX(Id) FROM {} WHERE OwnerId = ? AND Name = ?",
                    TABLES_TABLE
                ),
                &[
                    Value::Int64(table.owner_id),
                    Value::String(table.name.clone()),
                ],
            )
            .await?;

        let mut persisted = table.clone();
        persisted.id = table_id;
        self.insert_columns(run, table_id, &mut persisted.columns)
            .await?;

        tracing::debug!(table = %table.name, table_id, "table metadata persisted");
        Ok(persisted)
    }

    async fn insert_columns(
        &self,
        run: &dyn SqlExecutor,
        table_id: i64,
        columns: &mut [LogicalColumn],
    ) -> Result<()> {
        for column in columns.iter_mut() {
            run.execute(
                &format!(
                    "INSERT INTO {} (TableId, Name, DataType, IsRequired, DisplayOrder, DefaultValue) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                    COLUMNS_TABLE
                ),
                &[
                    Value::Int64(table_id),
                    Value::String(column.name.clone()),
                    Value::String(column.data_type.as_str().to_string()),
                    Value::Bool(column.required),
                    Value::Int64(column.display_order as i64),
                    column
                        .default_value
                        .clone()
                        .map(Value::String)
                        .unwrap_or(Value::Null),
                ],
            )
            .await?;
            column.table_id = table_id;
        }
        Ok(())
    }

    /// Load a non-deleted table by owner and name
    pub async fn get_table(
        &self,
        run: &dyn SqlExecutor,
        owner_id: i64,
        name: &str,
    ) -> Result<Option<LogicalTable>> {
        let result = run
            .query(
                &format!(
                    "SELECT Id, OwnerId, Name, Description, CreatedAt, UpdatedAt FROM {} \
                     WHERE OwnerId = ? AND Name = ? AND IsDeleted = 0",
                    TABLES_TABLE
                ),
                &[Value::Int64(owner_id), Value::String(name.to_string())],
            )
            .await?;

        let Some(row) = result.rows.first() else {
            return Ok(None);
        };

        let mut table = self.table_from_row(row)?;
        table.columns = self.load_columns(run, table.id).await?;
        Ok(Some(table))
    }

    /// List all non-deleted tables for an owner
    pub async fn list_tables(
        &self,
        run: &dyn SqlExecutor,
        owner_id: i64,
    ) -> Result<Vec<LogicalTable>> {
        let result = run
            .query(
                &format!(
                    "SELECT Id, OwnerId, Name, Description, CreatedAt, UpdatedAt FROM {} \
                     WHERE OwnerId = ? AND IsDeleted = 0 ORDER BY Name",
                    TABLES_TABLE
                ),
                &[Value::Int64(owner_id)],
            )
            .await?;

        let mut tables = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            let mut table = self.table_from_row(row)?;
            table.columns = self.load_columns(run, table.id).await?;
            tables.push(table);
        }
        Ok(tables)
    }

    /// Update name/description and bump the update timestamp
    pub async fn update_table_meta(
        &self,
        run: &dyn SqlExecutor,
        table_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<()> {
        run.execute(
            &format!(
                "UPDATE {} SET Name = ?, Description = ?, UpdatedAt = ? WHERE Id = ?",
                TABLES_TABLE
            ),
            &[
                Value::String(name.to_string()),
                description
                    .map(|d| Value::String(d.to_string()))
                    .unwrap_or(Value::Null),
                Value::String(Utc::now().to_rfc3339()),
                Value::Int64(table_id),
            ],
        )
        .await?;
        Ok(())
    }

    /// Replace the full column set for a table.
    ///
    /// Runs inside the caller's transaction together with the physical
    /// ALTERs it mirrors.
    pub async fn replace_columns(
        &self,
        run: &dyn SqlExecutor,
        table_id: i64,
        columns: &[LogicalColumn],
    ) -> Result<()> {
        run.execute(
            &format!("DELETE FROM {} WHERE TableId = ?", COLUMNS_TABLE),
            &[Value::Int64(table_id)],
        )
        .await?;
        let mut columns = columns.to_vec();
        self.insert_columns(run, table_id, &mut columns).await?;
        Ok(())
    }

    /// Soft-delete a table record; the physical drop is separate
    pub async fn soft_delete_table(&self, run: &dyn SqlExecutor, table_id: i64) -> Result<()> {
        run.execute(
            &format!(
                "UPDATE {} SET IsDeleted = 1, UpdatedAt = ? WHERE Id = ?",
                TABLES_TABLE
            ),
            &[
                Value::String(Utc::now().to_rfc3339()),
                Value::Int64(table_id),
            ],
        )
        .await?;
        Ok(())
    }

    /// Whether any non-deleted metadata record maps to a physical name
    pub async fn physical_name_in_use(
        &self,
        run: &dyn SqlExecutor,
        physical_name: &str,
    ) -> Result<bool> {
        let tables = self.all_tables(run).await?;
        Ok(tables.iter().any(|t| t.physical_name() == physical_name))
    }

    /// All non-deleted tables, across owners (reconciliation support)
    pub async fn all_tables(&self, run: &dyn SqlExecutor) -> Result<Vec<LogicalTable>> {
        let result = run
            .query(
                &format!(
                    "SELECT Id, OwnerId, Name, Description, CreatedAt, UpdatedAt FROM {} \
                     WHERE IsDeleted = 0 ORDER BY OwnerId, Name",
                    TABLES_TABLE
                ),
                &[],
            )
            .await?;

        let mut tables = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            let mut table = self.table_from_row(row)?;
            table.columns = self.load_columns(run, table.id).await?;
            tables.push(table);
        }
        Ok(tables)
    }

    async fn load_columns(&self, run: &dyn SqlExecutor, table_id: i64) -> Result<Vec<LogicalColumn>> {
        let result = run
            .query(
                &format!(
                    "SELECT Id, TableId, Name, DataType, IsRequired, DisplayOrder, DefaultValue \
                     FROM {} WHERE TableId = ? ORDER BY DisplayOrder",
                    COLUMNS_TABLE
                ),
                &[Value::Int64(table_id)],
            )
            .await?;

        let mut columns = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            let data_type_name = row
                .get_by_name("DataType")
                .and_then(|v| v.as_str())
                .ok_or_else(|| TablekitError::Schema("column record missing DataType".into()))?;
            columns.push(LogicalColumn {
                id: row.get_by_name("Id").and_then(|v| v.as_i64()).unwrap_or(0),
                table_id: row
                    .get_by_name("TableId")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0),
                name: row
                    .get_by_name("Name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                data_type: DataType::parse(data_type_name)?,
                required: row
                    .get_by_name("IsRequired")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0)
                    != 0,
                display_order: row
                    .get_by_name("DisplayOrder")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0) as usize,
                default_value: row
                    .get_by_name("DefaultValue")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
            });
        }
        Ok(columns)
    }

    fn table_from_row(&self, row: &tablekit_core::Row) -> Result<LogicalTable> {
        let created_at = self.parse_timestamp(row.get_by_name("CreatedAt"))?;
        let updated_at = self.parse_timestamp(row.get_by_name("UpdatedAt"))?;

        Ok(LogicalTable {
            id: row.get_by_name("Id").and_then(|v| v.as_i64()).unwrap_or(0),
            owner_id: row
                .get_by_name("OwnerId")
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            name: row
                .get_by_name("Name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            description: row
                .get_by_name("Description")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            is_deleted: false,
            created_at,
            updated_at,
            columns: Vec::new(),
        })
    }

    fn parse_timestamp(&self, value: Option<&Value>) -> Result<DateTime<Utc>> {
        let raw = value
            .and_then(|v| v.as_str())
            .ok_or_else(|| TablekitError::Schema("table record missing timestamp".into()))?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TablekitError::Schema(format!("bad timestamp '{}': {}", raw, e)))
    }

    async fn scalar_i64(
        &self,
        run: &dyn SqlExecutor,
        sql: &str,
        params: &[Value],
    ) -> Result<i64> {
        let result = run.query(sql, params).await?;
        result
            .scalar()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| TablekitError::Query("scalar query returned no result".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekit_driver_sqlite::SqliteConnection;

    async fn store() -> (SqliteConnection, MetadataStore) {
        let conn = SqliteConnection::open(":memory:").unwrap();
        let store = MetadataStore::new(DialectInfo::sqlite());
        store.ensure_schema(&conn).await.unwrap();
        (conn, store)
    }

    fn orders_table() -> LogicalTable {
        LogicalTable::new(1, "Orders")
            .with_description("customer orders")
            .with_column(LogicalColumn::named("Item", DataType::Text).required())
            .with_column(
                LogicalColumn::named("Price", DataType::Decimal).with_default("0.00"),
            )
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let (conn, store) = store().await;
        store.ensure_schema(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn insert_and_load_round_trip() {
        let (conn, store) = store().await;

        let persisted = store.insert_table(&conn, &orders_table()).await.unwrap();
        assert!(persisted.id > 0);
        assert_eq!(persisted.columns[0].table_id, persisted.id);

        let loaded = store.get_table(&conn, 1, "Orders").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Orders");
        assert_eq!(loaded.description.as_deref(), Some("customer orders"));
        assert_eq!(loaded.columns.len(), 2);
        assert_eq!(loaded.columns[0].name, "Item");
        assert_eq!(loaded.columns[0].data_type, DataType::Text);
        assert!(loaded.columns[0].required);
        assert_eq!(loaded.columns[1].default_value.as_deref(), Some("0.00"));
    }

    #[tokio::test]
    async fn get_table_scopes_by_owner() {
        let (conn, store) = store().await;
        store.insert_table(&conn, &orders_table()).await.unwrap();

        assert!(store.get_table(&conn, 1, "Orders").await.unwrap().is_some());
        assert!(store.get_table(&conn, 2, "Orders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn soft_delete_hides_table() {
        let (conn, store) = store().await;
        let persisted = store.insert_table(&conn, &orders_table()).await.unwrap();

        store.soft_delete_table(&conn, persisted.id).await.unwrap();
        assert!(store.get_table(&conn, 1, "Orders").await.unwrap().is_none());
        assert!(store.list_tables(&conn, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_columns_swaps_the_set() {
        let (conn, store) = store().await;
        let persisted = store.insert_table(&conn, &orders_table()).await.unwrap();

        let new_columns = vec![LogicalColumn::named("OnlyOne", DataType::Integer).order(0)];
        store
            .replace_columns(&conn, persisted.id, &new_columns)
            .await
            .unwrap();

        let loaded = store.get_table(&conn, 1, "Orders").await.unwrap().unwrap();
        assert_eq!(loaded.columns.len(), 1);
        assert_eq!(loaded.columns[0].name, "OnlyOne");
    }

    #[tokio::test]
    async fn columns_load_in_display_order() {
        let (conn, store) = store().await;
        let table = LogicalTable::new(1, "T")
            .with_column(LogicalColumn::named("A", DataType::Text))
            .with_column(LogicalColumn::named("B", DataType::Text))
            .with_column(LogicalColumn::named("C", DataType::Text));
        store.insert_table(&conn, &table).await.unwrap();

        let loaded = store.get_table(&conn, 1, "T").await.unwrap().unwrap();
        let names: Vec<&str> = loaded.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn unknown_data_type_fails_loudly() {
        let (conn, store) = store().await;
        let persisted = store.insert_table(&conn, &orders_table()).await.unwrap();

        conn.execute(
            &format!(
                "UPDATE {} SET DataType = 'Blob' WHERE TableId = ?",
                COLUMNS_TABLE
            ),
            &[Value::Int64(persisted.id)],
        )
        .await
        .unwrap();

        let err = store.get_table(&conn, 1, "Orders").await.unwrap_err();
        assert!(matches!(err, TablekitError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn physical_name_lookup() {
        let (conn, store) = store().await;
        store.insert_table(&conn, &orders_table()).await.unwrap();

        assert!(
            store
                .physical_name_in_use(&conn, "Table_1_Orders")
                .await
                .unwrap()
        );
        assert!(
            !store
                .physical_name_in_use(&conn, "Table_1_Ghost")
                .await
                .unwrap()
        );
    }
}
