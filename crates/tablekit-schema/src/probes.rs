//! Data presence probes
//!
//! The validation engine never trusts cached state; every judgment
//! re-queries the physical table through these probes.

use tablekit_core::{
    DataType, DialectInfo, LogicalColumn, Result, SqlExecutor, TablekitError,
    ident::sanitize_identifier,
};

/// Fixed per-row overhead assumed by the size estimate
const ROW_OVERHEAD_BYTES: u64 = 16;

/// Assumed storage width of a column, for backup size estimates
fn column_width_bytes(data_type: DataType) -> u64 {
    match data_type {
        DataType::Text => 255,
        DataType::Integer => 8,
        DataType::Decimal => 16,
        DataType::Timestamp => 24,
    }
}

/// Probes against one physical table
pub struct DataProbe<'a> {
    run: &'a dyn SqlExecutor,
    dialect: DialectInfo,
}

impl<'a> DataProbe<'a> {
    /// Create a probe over an executor
    pub fn new(run: &'a dyn SqlExecutor, dialect: DialectInfo) -> Self {
        Self { run, dialect }
    }

    fn quote(&self, raw: &str) -> String {
        self.dialect.quote_ident(&sanitize_identifier(raw))
    }

    async fn count_query(&self, sql: &str) -> Result<u64> {
        let result = self.run.query(sql, &[]).await?;
        result
            .scalar()
            .and_then(|v| v.as_i64())
            .map(|n| n.max(0) as u64)
            .ok_or_else(|| TablekitError::Query("COUNT query returned no result".into()))
    }

    /// Number of rows in the table
    pub async fn row_count(&self, physical_name: &str) -> Result<u64> {
        self.count_query(&format!("SELECT COUNT(*) FROM {}", self.quote(physical_name)))
            .await
    }

    /// Number of rows where the column is NULL
    pub async fn null_count(&self, physical_name: &str, column: &str) -> Result<u64> {
        self.count_query(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            self.quote(physical_name),
            self.quote(column)
        ))
        .await
    }

    /// Whether the column holds any non-NULL value
    pub async fn column_has_data(&self, physical_name: &str, column: &str) -> Result<bool> {
        // COUNT(col) skips NULLs
        let count = self
            .count_query(&format!(
                "SELECT COUNT({}) FROM {}",
                self.quote(column),
                self.quote(physical_name)
            ))
            .await?;
        Ok(count > 0)
    }

    /// Estimated on-disk size of the table's rows.
    ///
    /// Row count times a per-type width heuristic; used for the backup
    /// size reported by table validation, not for anything load-bearing.
    pub async fn estimated_size_bytes(
        &self,
        physical_name: &str,
        columns: &[LogicalColumn],
    ) -> Result<u64> {
        let rows = self.row_count(physical_name).await?;
        let row_width: u64 = ROW_OVERHEAD_BYTES
            + columns
                .iter()
                .map(|c| column_width_bytes(c.data_type))
                .sum::<u64>();
        Ok(rows * row_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekit_core::Value;
    use tablekit_driver_sqlite::SqliteConnection;

    async fn seeded_connection() -> SqliteConnection {
        let conn = SqliteConnection::open(":memory:").unwrap();
        conn.execute(
            "CREATE TABLE T (Id INTEGER PRIMARY KEY, Name VARCHAR(255), Amount DECIMAL(18,2))",
            &[],
        )
        .await
        .unwrap();
        for (name, amount) in [
            (Value::String("a".into()), Value::Float64(1.5)),
            (Value::String("b".into()), Value::Null),
            (Value::Null, Value::Null),
        ] {
            conn.execute(
                "INSERT INTO T (Name, Amount) VALUES (?, ?)",
                &[name, amount],
            )
            .await
            .unwrap();
        }
        conn
    }

    #[tokio::test]
    async fn row_and_null_counts() {
        let conn = seeded_connection().await;
        let probe = DataProbe::new(&conn, DialectInfo::sqlite());

        assert_eq!(probe.row_count("T").await.unwrap(), 3);
        assert_eq!(probe.null_count("T", "Amount").await.unwrap(), 2);
        assert_eq!(probe.null_count("T", "Name").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn column_has_data_skips_nulls() {
        let conn = seeded_connection().await;
        let probe = DataProbe::new(&conn, DialectInfo::sqlite());

        assert!(probe.column_has_data("T", "Name").await.unwrap());
        assert!(probe.column_has_data("T", "Amount").await.unwrap());

        conn.execute("UPDATE T SET Amount = NULL", &[]).await.unwrap();
        assert!(!probe.column_has_data("T", "Amount").await.unwrap());
    }

    #[tokio::test]
    async fn size_estimate_scales_with_rows() {
        let conn = seeded_connection().await;
        let probe = DataProbe::new(&conn, DialectInfo::sqlite());
        let columns = vec![
            LogicalColumn::named("Name", DataType::Text),
            LogicalColumn::named("Amount", DataType::Decimal),
        ];

        let estimate = probe.estimated_size_bytes("T", &columns).await.unwrap();
        assert_eq!(estimate, 3 * (16 + 255 + 16));
    }

    #[tokio::test]
    async fn missing_table_is_an_error() {
        let conn = SqliteConnection::open(":memory:").unwrap();
        let probe = DataProbe::new(&conn, DialectInfo::sqlite());
        assert!(probe.row_count("Missing").await.is_err());
    }
}
