//! Schema-evolution validation
//!
//! One call, one judgment. The validator inspects the live table data and
//! decides whether a proposed change is safe, needs explicit confirmation,
//! or is impossible. It never executes DDL, and it never raises: backend
//! probe failures fold into an invalid result at this boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tablekit_core::{
    DataType, DialectInfo, LogicalColumn, LogicalTable, SqlExecutor, convert,
    ident::sanitize_identifier, typemap::default_value_warning,
};

use crate::probes::DataProbe;

/// Verdict on a single proposed column change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the change can be applied at all
    pub is_valid: bool,
    /// Whether existing data is at risk
    pub has_data_compatibility_issues: bool,
    /// Whether the caller must re-request with explicit confirmation
    pub requires_force_update: bool,
    /// Human-readable problems and warnings
    pub issues: Vec<String>,
    /// Rows that the change would touch
    pub affected_row_count: u64,
}

impl ValidationResult {
    /// A change with nothing to object to
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            has_data_compatibility_issues: false,
            requires_force_update: false,
            issues: Vec::new(),
            affected_row_count: 0,
        }
    }

    /// An impossible change; force cannot override
    pub fn invalid(issue: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            has_data_compatibility_issues: false,
            requires_force_update: false,
            issues: vec![issue.into()],
            affected_row_count: 0,
        }
    }

    /// A possible but risky change that needs explicit confirmation
    pub fn needs_force(issue: impl Into<String>, affected_rows: u64) -> Self {
        Self {
            is_valid: true,
            has_data_compatibility_issues: true,
            requires_force_update: true,
            issues: vec![issue.into()],
            affected_row_count: affected_rows,
        }
    }
}

/// Verdict on a whole-table update (rename + column set changes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableValidationResult {
    /// Whether the update can be applied at all
    pub is_valid: bool,
    /// Whether the update changes physical structure
    pub has_structural_changes: bool,
    /// Whether the caller must re-request with explicit confirmation
    pub requires_force_update: bool,
    /// Problems that are not tied to a single column
    pub table_issues: Vec<String>,
    /// Problems and warnings per column name
    pub column_issues: HashMap<String, Vec<String>>,
    /// Rows in the table at validation time
    pub affected_row_count: u64,
    /// Estimated size of the backup a structural change would take
    pub estimated_backup_size_bytes: u64,
}

impl TableValidationResult {
    fn push_column_issue(&mut self, column: &str, issue: impl Into<String>) {
        self.column_issues
            .entry(column.to_string())
            .or_default()
            .push(issue.into());
    }
}

/// Stateless validation engine
pub struct SchemaValidator {
    dialect: DialectInfo,
}

impl SchemaValidator {
    /// Create a validator for a dialect
    pub fn new(dialect: DialectInfo) -> Self {
        Self { dialect }
    }

    /// Judge a column type change against the current data.
    ///
    /// Impossible conversions are invalid outright. Lossy conversions on a
    /// table that holds rows require forced confirmation.
    pub async fn validate_column_type_change(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        column_name: &str,
        new_type: DataType,
    ) -> ValidationResult {
        let Some(column) = table.column(column_name) else {
            return ValidationResult::invalid(format!(
                "Column '{}' does not exist on table '{}'",
                column_name, table.name
            ));
        };

        if column.data_type == new_type {
            return ValidationResult::valid();
        }

        if !convert::can_convert(column.data_type, new_type) {
            return ValidationResult::invalid(format!(
                "Cannot convert column '{}' from {} to {}",
                column_name, column.data_type, new_type
            ));
        }

        let probe = DataProbe::new(run, self.dialect.clone());
        let rows = match probe.row_count(&table.physical_name()).await {
            Ok(rows) => rows,
            Err(e) => {
                return ValidationResult::invalid(format!(
                    "Could not inspect data for column '{}': {}",
                    column_name, e
                ));
            }
        };

        if rows > 0 && convert::is_lossy(column.data_type, new_type) {
            return ValidationResult::needs_force(
                format!(
                    "Converting column '{}' from {} to {} may lose data in {} existing row(s)",
                    column_name, column.data_type, new_type, rows
                ),
                rows,
            );
        }

        ValidationResult {
            affected_row_count: rows,
            ..ValidationResult::valid()
        }
    }

    /// Judge an optional↔required transition against existing NULLs
    pub async fn validate_requiredness_change(
        &self,
        run: &dyn SqlExecutor,
        table: &LogicalTable,
        column_name: &str,
        making_required: bool,
    ) -> ValidationResult {
        let Some(_) = table.column(column_name) else {
            return ValidationResult::invalid(format!(
                "Column '{}' does not exist on table '{}'",
                column_name, table.name
            ));
        };

        if !making_required {
            // relaxing a constraint can never conflict with data
            return ValidationResult::valid();
        }

        let probe = DataProbe::new(run, self.dialect.clone());
        let nulls = match probe.null_count(&table.physical_name(), column_name).await {
            Ok(nulls) => nulls,
            Err(e) => {
                return ValidationResult::invalid(format!(
                    "Could not inspect data for column '{}': {}",
                    column_name, e
                ));
            }
        };

        if nulls > 0 {
            return ValidationResult::needs_force(
                format!(
                    "Column '{}' has {} row(s) without a value and cannot become required without confirmation",
                    column_name, nulls
                ),
                nulls,
            );
        }

        ValidationResult::valid()
    }

    /// Judge a whole-table update: rename plus the full proposed column set.
    ///
    /// Tie-break rule: if any column-level check is outright invalid, the
    /// whole result is invalid — force only overrides lossy-but-possible
    /// changes, never impossible ones.
    pub async fn validate_table_update(
        &self,
        run: &dyn SqlExecutor,
        current: &LogicalTable,
        proposed_name: &str,
        proposed_columns: &[LogicalColumn],
    ) -> TableValidationResult {
        let mut result = TableValidationResult {
            is_valid: true,
            has_structural_changes: false,
            requires_force_update: false,
            table_issues: Vec::new(),
            column_issues: HashMap::new(),
            affected_row_count: 0,
            estimated_backup_size_bytes: 0,
        };

        if sanitize_identifier(proposed_name) != proposed_name {
            result.is_valid = false;
            result.table_issues.push(format!(
                "Table name '{}' contains characters that are not allowed",
                proposed_name
            ));
        }

        let probe = DataProbe::new(run, self.dialect.clone());
        let physical = current.physical_name();
        let rows = match probe.row_count(&physical).await {
            Ok(rows) => rows,
            Err(e) => {
                result.is_valid = false;
                result
                    .table_issues
                    .push(format!("Could not inspect table data: {}", e));
                return result;
            }
        };
        result.affected_row_count = rows;

        let name_changed = current.name != proposed_name;
        let mut columns_changed = current.columns.len() != proposed_columns.len();

        // deletions: present now, absent in the proposal
        for column in &current.columns {
            if proposed_columns.iter().any(|c| c.name == column.name) {
                continue;
            }
            columns_changed = true;
            let has_data = probe
                .column_has_data(&physical, &column.name)
                .await
                .unwrap_or(false);
            if has_data {
                result.requires_force_update = true;
                result.push_column_issue(
                    &column.name,
                    format!(
                        "Deleting column '{}' discards existing data and requires confirmation",
                        column.name
                    ),
                );
            }
        }

        for proposed in proposed_columns {
            if sanitize_identifier(&proposed.name) != proposed.name {
                result.is_valid = false;
                result.push_column_issue(
                    &proposed.name,
                    format!(
                        "Column name '{}' contains characters that are not allowed",
                        proposed.name
                    ),
                );
                continue;
            }

            if let Some(ref raw) = proposed.default_value {
                if let Some(warning) = default_value_warning(raw, proposed.data_type) {
                    result.push_column_issue(&proposed.name, warning);
                }
            }

            match current.column(&proposed.name) {
                None => {
                    // addition
                    columns_changed = true;
                    if proposed.required && proposed.default_value.is_none() && rows > 0 {
                        result.requires_force_update = true;
                        result.push_column_issue(
                            &proposed.name,
                            format!(
                                "Required column '{}' has no default value and the table already holds {} row(s); \
                                 existing rows would receive the type's zero value",
                                proposed.name, rows
                            ),
                        );
                    }
                }
                Some(existing) => {
                    if existing.data_type != proposed.data_type {
                        columns_changed = true;
                        let verdict = self
                            .validate_column_type_change(
                                run,
                                current,
                                &existing.name,
                                proposed.data_type,
                            )
                            .await;
                        self.merge_column_verdict(&mut result, &existing.name, verdict);
                    }
                    if existing.required != proposed.required {
                        columns_changed = true;
                        let verdict = self
                            .validate_requiredness_change(
                                run,
                                current,
                                &existing.name,
                                proposed.required,
                            )
                            .await;
                        self.merge_column_verdict(&mut result, &existing.name, verdict);
                    }
                    if existing.display_order != proposed.display_order
                        || existing.default_value != proposed.default_value
                    {
                        columns_changed = true;
                    }
                }
            }
        }

        result.has_structural_changes = name_changed || columns_changed;

        if result.has_structural_changes {
            result.estimated_backup_size_bytes = probe
                .estimated_size_bytes(&physical, &current.columns)
                .await
                .unwrap_or(0);
        }

        if !result.is_valid {
            // force can never override an impossible change
            tracing::debug!(
                table = %current.name,
                issues = result.table_issues.len() + result.column_issues.len(),
                "table update rejected by validation"
            );
        }

        result
    }

    fn merge_column_verdict(
        &self,
        result: &mut TableValidationResult,
        column: &str,
        verdict: ValidationResult,
    ) {
        if !verdict.is_valid {
            result.is_valid = false;
        }
        if verdict.requires_force_update {
            result.requires_force_update = true;
        }
        for issue in verdict.issues {
            result.push_column_issue(column, issue);
        }
    }
}
