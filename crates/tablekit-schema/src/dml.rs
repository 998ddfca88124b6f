//! Row-level DML against physical tables
//!
//! Values are always parameterized; table and column identifiers cannot be,
//! so they pass through the sanitizer before interpolation. Row identity
//! uses the per-table `RowIdentifier` sequence: new rows take
//! `max(existing) + 1`, computed inside the INSERT itself so concurrent
//! writers serialize on the backend.

use std::collections::HashMap;

use tablekit_core::{
    DataType, DialectInfo, LogicalTable, QueryResult, ROW_IDENTIFIER_COLUMN, Result,
    SqlExecutor, TablekitError, Value, ident::sanitize_identifier,
};

/// Equality filter on one column
#[derive(Debug, Clone)]
pub struct RowFilter {
    /// Column to match
    pub column: String,
    /// Value to match; `Value::Null` matches `IS NULL`
    pub value: Value,
}

impl RowFilter {
    /// Filter on a column/value pair
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }

    /// Filter on a row's identifier
    pub fn by_row_identifier(row_identifier: i64) -> Self {
        Self::new(ROW_IDENTIFIER_COLUMN, Value::Int64(row_identifier))
    }
}

/// Row DML operations for one dialect
pub struct RowDml {
    dialect: DialectInfo,
}

impl RowDml {
    /// Create row DML helpers for a dialect
    pub fn new(dialect: DialectInfo) -> Self {
        Self { dialect }
    }

    fn quote(&self, raw: &str) -> String {
        self.dialect.quote_ident(&sanitize_identifier(raw))
    }

    /// Coerce an incoming value to a column's logical type.
    ///
    /// Strings arrive from the API layer; numeric and timestamp columns
    /// parse them so the backend stores the right representation. A value
    /// that cannot be coerced is a query error, not a silent NULL.
    pub fn coerce_value(&self, value: &Value, data_type: DataType) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match data_type {
            DataType::Text => Ok(Value::String(value.to_string())),
            DataType::Integer => value
                .as_i64()
                .map(Value::Int64)
                .ok_or_else(|| TablekitError::Query(format!("'{}' is not an integer", value))),
            DataType::Decimal => value
                .as_f64()
                .map(Value::Float64)
                .ok_or_else(|| TablekitError::Query(format!("'{}' is not a number", value))),
            DataType::Timestamp => match value {
                Value::Timestamp(_) => Ok(value.clone()),
                Value::String(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .map(Value::Timestamp)
                    .or_else(|_| {
                        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .map_err(|_| {
                                TablekitError::Query(format!("'{}' is not a timestamp", s))
                            })
                            .and_then(|d| {
                                d.and_hms_opt(0, 0, 0).map(Value::Timestamp).ok_or_else(|| {
                                    TablekitError::Query(format!("'{}' is not a timestamp", s))
                                })
                            })
                    }),
                other => Err(TablekitError::Query(format!(
                    "'{}' is not a timestamp",
                    other
                ))),
            },
        }
    }

    /// Insert one row, assigning the next `RowIdentifier`.
    ///
    /// The sequence value is `COALESCE(MAX(RowIdentifier), 0) + 1` computed
    /// in the INSERT statement itself. Returns the assigned identifier.
    pub async fn insert_row(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        values: &HashMap<String, Value>,
    ) -> Result<i64> {
        let physical = self.quote(&table.physical_name());

        let mut column_list = vec![self.quote(ROW_IDENTIFIER_COLUMN)];
        let mut params = Vec::new();
        for column in table.ordered_columns() {
            let value = values.get(&column.name).cloned().unwrap_or(Value::Null);
            params.push(self.coerce_value(&value, column.data_type)?);
            column_list.push(self.quote(&column.name));
        }

        let placeholders: Vec<&str> = params.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO {table} ({columns}) SELECT COALESCE(MAX({row_id}), 0) + 1{sep}{placeholders} FROM {table}",
            table = physical,
            columns = column_list.join(", "),
            row_id = self.quote(ROW_IDENTIFIER_COLUMN),
            sep = if placeholders.is_empty() { "" } else { ", " },
            placeholders = placeholders.join(", "),
        );

        let result = run.execute(&sql, &params).await?;
        if result.affected_rows != 1 {
            return Err(TablekitError::Query(format!(
                "Insert affected {} rows",
                result.affected_rows
            )));
        }

        let max = self.max_row_identifier(run, table).await?;
        tracing::debug!(table = %table.name, row_identifier = max, "row inserted");
        Ok(max)
    }

    /// Current maximum `RowIdentifier`, 0 for an empty table
    pub async fn max_row_identifier(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
    ) -> Result<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX({}), 0) FROM {}",
            self.quote(ROW_IDENTIFIER_COLUMN),
            self.quote(&table.physical_name())
        );
        let result = run.query(&sql, &[]).await?;
        result
            .scalar()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| TablekitError::Query("MAX query returned no result".into()))
    }

    /// Select all rows, ordered by `RowIdentifier` when the table has one,
    /// otherwise in backend-natural order
    pub async fn select_all_rows(
        &self,
        run: &dyn SqlExecutor,
        physical_name: &str,
        order_by_row_identifier: bool,
    ) -> Result<QueryResult> {
        let table = self.quote(physical_name);
        let sql = if order_by_row_identifier {
            format!(
                "SELECT * FROM {} ORDER BY {}",
                table,
                self.quote(ROW_IDENTIFIER_COLUMN)
            )
        } else {
            format!("SELECT * FROM {}", table)
        };
        run.query(&sql, &[]).await
    }

    /// Update matching rows; returns the number of rows changed
    pub async fn update_rows_where(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        updates: &HashMap<String, Value>,
        filter: &RowFilter,
    ) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for column in table.ordered_columns() {
            if let Some(value) = updates.get(&column.name) {
                assignments.push(format!("{} = ?", self.quote(&column.name)));
                params.push(self.coerce_value(value, column.data_type)?);
            }
        }
        if assignments.is_empty() {
            return Err(TablekitError::Query(
                "No updated column matches the table definition".into(),
            ));
        }

        let (where_clause, filter_param) = self.filter_clause(filter);
        if let Some(param) = filter_param {
            params.push(param);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.quote(&table.physical_name()),
            assignments.join(", "),
            where_clause
        );

        let result = run.execute(&sql, &params).await?;
        tracing::debug!(table = %table.name, affected_rows = result.affected_rows, "rows updated");
        Ok(result.affected_rows)
    }

    /// Delete matching rows; returns the number of rows removed
    pub async fn delete_rows_where(
        &self,
        run: &dyn SqlExecutor,
        physical_name: &str,
        filter: &RowFilter,
    ) -> Result<u64> {
        let (where_clause, filter_param) = self.filter_clause(filter);
        let params: Vec<Value> = filter_param.into_iter().collect();

        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.quote(physical_name),
            where_clause
        );

        let result = run.execute(&sql, &params).await?;
        tracing::debug!(table = %physical_name, affected_rows = result.affected_rows, "rows deleted");
        Ok(result.affected_rows)
    }

    /// WHERE fragment for a filter; the value stays parameterized
    fn filter_clause(&self, filter: &RowFilter) -> (String, Option<Value>) {
        let column = self.quote(&filter.column);
        if filter.value.is_null() {
            (format!("{} IS NULL", column), None)
        } else {
            (format!("{} = ?", column), Some(filter.value.clone()))
        }
    }
}
