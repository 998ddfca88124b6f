//! DDL statement generation
//!
//! Builds CREATE/ALTER/DROP/RENAME statements from logical definitions.
//! Dialect-specific behaviour (identifier quoting, ALTER COLUMN support)
//! comes from `DialectInfo` supplied by the driver, never hardcoded here.
//!
//! Dialects without native `ALTER COLUMN` get a rebuild plan instead:
//! create a shadow table with the target schema, copy rows across with the
//! necessary casts, drop the original, rename the shadow into place. The
//! caller runs the whole plan inside one transaction.

use anyhow::{Context, anyhow};
use tablekit_core::{
    DataType, DialectInfo, LogicalColumn, ROW_IDENTIFIER_COLUMN, SURROGATE_KEY_COLUMN,
    ident::sanitize_identifier,
    typemap::{format_default_literal, physical_type},
};

/// Suffix for the shadow table used by rebuild plans
const REBUILD_SUFFIX: &str = "__rebuild";

/// Stateless DDL statement builder for one dialect
pub struct DdlBuilder {
    dialect: DialectInfo,
}

impl DdlBuilder {
    /// Create a builder for a dialect
    pub fn new(dialect: DialectInfo) -> Self {
        Self { dialect }
    }

    /// The dialect this builder targets
    pub fn dialect(&self) -> &DialectInfo {
        &self.dialect
    }

    /// Sanitize and quote an identifier for interpolation.
    ///
    /// Identifiers cannot be parameterized, so every name passes through
    /// the sanitizer before it reaches statement text.
    fn quote(&self, raw: &str) -> String {
        self.dialect.quote_ident(&sanitize_identifier(raw))
    }

    /// Column definition fragment used by CREATE TABLE and ADD COLUMN
    pub fn column_definition(&self, column: &LogicalColumn) -> String {
        let mut def = format!(
            "  {} {}",
            self.quote(&column.name),
            physical_type(column.data_type)
        );

        if column.required {
            def.push_str(" NOT NULL");
        }

        if let Some(ref raw) = column.default_value {
            def.push_str(&format!(
                " DEFAULT {}",
                format_default_literal(raw, column.data_type)
            ));
        }

        def
    }

    /// CREATE TABLE statement with the surrogate key and row sequence
    /// columns, then one column per logical column in display order
    pub fn create_table_sql(&self, physical_name: &str, columns: &[LogicalColumn]) -> String {
        let mut sql = format!("CREATE TABLE {} (\n", self.quote(physical_name));

        let mut defs = vec![
            format!(
                "  {} {}",
                self.quote(SURROGATE_KEY_COLUMN),
                self.dialect.integer_primary_key
            ),
            format!("  {} INTEGER NOT NULL", self.quote(ROW_IDENTIFIER_COLUMN)),
        ];

        let mut ordered: Vec<&LogicalColumn> = columns.iter().collect();
        ordered.sort_by_key(|c| c.display_order);
        defs.extend(ordered.iter().map(|col| self.column_definition(col)));

        sql.push_str(&defs.join(",\n"));
        sql.push_str("\n);");
        sql
    }

    /// DROP TABLE statement; idempotent by design
    pub fn drop_table_sql(&self, physical_name: &str) -> String {
        format!("DROP TABLE IF EXISTS {};", self.quote(physical_name))
    }

    /// RENAME TABLE statement
    pub fn rename_table_sql(&self, old_physical: &str, new_physical: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {};",
            self.quote(old_physical),
            self.quote(new_physical)
        )
    }

    /// RENAME COLUMN statement
    pub fn rename_column_sql(&self, physical_name: &str, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {};",
            self.quote(physical_name),
            self.quote(old_name),
            self.quote(new_name)
        )
    }

    /// Statement(s) adding a column.
    ///
    /// A required column with no default cannot be added with a plain
    /// ALTER on dialects that reject NOT NULL additions (SQLite); those
    /// take the rebuild path, which fills existing rows with the type's
    /// zero value. Validation has already flagged that backfill as a risk
    /// requiring explicit confirmation.
    pub fn add_column_plan(
        &self,
        physical_name: &str,
        current_columns: &[LogicalColumn],
        new_column: &LogicalColumn,
    ) -> Vec<String> {
        let needs_rebuild =
            new_column.required && new_column.default_value.is_none() && !self.dialect.supports_alter_column;

        if !needs_rebuild {
            return vec![format!(
                "ALTER TABLE {} ADD COLUMN {};",
                self.quote(physical_name),
                self.column_definition(new_column).trim()
            )];
        }

        let mut target: Vec<LogicalColumn> = current_columns.to_vec();
        let mut added = new_column.clone();
        added.display_order = target.len();
        target.push(added);

        let mut exprs = self.passthrough_exprs(current_columns);
        exprs.push(zero_literal(new_column.data_type));
        self.rebuild_plan(physical_name, &target, exprs)
    }

    /// Statement(s) dropping a column
    pub fn drop_column_plan(
        &self,
        physical_name: &str,
        current_columns: &[LogicalColumn],
        column_name: &str,
    ) -> Vec<String> {
        if self.dialect.supports_drop_column {
            return vec![format!(
                "ALTER TABLE {} DROP COLUMN {};",
                self.quote(physical_name),
                self.quote(column_name)
            )];
        }

        let target: Vec<LogicalColumn> = current_columns
            .iter()
            .filter(|c| c.name != column_name)
            .cloned()
            .collect();
        let exprs = self.passthrough_exprs(&target);
        self.rebuild_plan(physical_name, &target, exprs)
    }

    /// Statement(s) changing a column's type.
    ///
    /// Callers check the conversion matrix first; this only builds the
    /// physical plan.
    pub fn alter_column_type_plan(
        &self,
        physical_name: &str,
        current_columns: &[LogicalColumn],
        column_name: &str,
        new_type: DataType,
    ) -> anyhow::Result<Vec<String>> {
        let column = current_columns
            .iter()
            .find(|c| c.name == column_name)
            .ok_or_else(|| anyhow!("column '{}' not found", column_name))
            .context("cannot build type change plan")?;

        if self.dialect.supports_alter_column {
            return Ok(vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                self.quote(physical_name),
                self.quote(column_name),
                physical_type(new_type)
            )]);
        }

        let target: Vec<LogicalColumn> = current_columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == column_name {
                    c.data_type = new_type;
                }
                c
            })
            .collect();

        let exprs = target
            .iter()
            .map(|c| {
                let quoted = self.quote(&c.name);
                if c.name == column_name {
                    cast_expr(&quoted, new_type, column.data_type)
                } else {
                    quoted
                }
            })
            .collect();

        Ok(self.rebuild_plan(physical_name, &target, exprs))
    }

    /// Statement(s) changing a column's requiredness
    pub fn set_required_plan(
        &self,
        physical_name: &str,
        current_columns: &[LogicalColumn],
        column_name: &str,
        required: bool,
    ) -> anyhow::Result<Vec<String>> {
        if !current_columns.iter().any(|c| c.name == column_name) {
            return Err(anyhow!("column '{}' not found", column_name))
                .context("cannot build requiredness plan");
        }

        if self.dialect.supports_alter_column {
            let clause = if required {
                "SET NOT NULL"
            } else {
                "DROP NOT NULL"
            };
            return Ok(vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} {};",
                self.quote(physical_name),
                self.quote(column_name),
                clause
            )]);
        }

        let target: Vec<LogicalColumn> = current_columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == column_name {
                    c.required = required;
                }
                c
            })
            .collect();
        let exprs = self.passthrough_exprs(&target);
        Ok(self.rebuild_plan(physical_name, &target, exprs))
    }

    /// CREATE TABLE AS SELECT copying all rows into a backup table
    pub fn backup_table_sql(&self, physical_name: &str, backup_name: &str) -> String {
        format!(
            "CREATE TABLE {} AS SELECT * FROM {};",
            self.quote(backup_name),
            self.quote(physical_name)
        )
    }

    /// Quoted column expressions copying values unchanged
    fn passthrough_exprs(&self, columns: &[LogicalColumn]) -> Vec<String> {
        columns.iter().map(|c| self.quote(&c.name)).collect()
    }

    /// Full rebuild plan: shadow table, copy, drop, rename.
    ///
    /// `select_exprs` supplies one expression per target column, in the
    /// same order as `target_columns`; the surrogate key and row sequence
    /// are always copied unchanged.
    fn rebuild_plan(
        &self,
        physical_name: &str,
        target_columns: &[LogicalColumn],
        select_exprs: Vec<String>,
    ) -> Vec<String> {
        let shadow_name = format!("{}{}", sanitize_identifier(physical_name), REBUILD_SUFFIX);

        let mut insert_columns = vec![
            self.quote(SURROGATE_KEY_COLUMN),
            self.quote(ROW_IDENTIFIER_COLUMN),
        ];
        insert_columns.extend(target_columns.iter().map(|c| self.quote(&c.name)));

        let mut select_list = vec![
            self.quote(SURROGATE_KEY_COLUMN),
            self.quote(ROW_IDENTIFIER_COLUMN),
        ];
        select_list.extend(select_exprs);

        vec![
            self.create_table_sql(&shadow_name, target_columns),
            format!(
                "INSERT INTO {} ({}) SELECT {} FROM {};",
                self.quote(&shadow_name),
                insert_columns.join(", "),
                select_list.join(", "),
                self.quote(physical_name)
            ),
            format!("DROP TABLE {};", self.quote(physical_name)),
            self.rename_table_sql(&shadow_name, physical_name),
        ]
    }
}

/// The literal used to backfill a forced required column
fn zero_literal(data_type: DataType) -> String {
    format_default_literal("", data_type)
}

/// Cast expression for a retyped column.
///
/// Timestamp targets copy the raw value: SQLite keeps datetimes as text
/// and a CAST through its numeric affinity would mangle them.
fn cast_expr(quoted_column: &str, target: DataType, _source: DataType) -> String {
    match target {
        DataType::Text => format!("CAST({} AS TEXT)", quoted_column),
        DataType::Integer => format!("CAST({} AS INTEGER)", quoted_column),
        DataType::Decimal => format!("CAST({} AS NUMERIC)", quoted_column),
        DataType::Timestamp => quoted_column.to_string(),
    }
}
