//! Table lifecycle orchestration
//!
//! The flow for every structural change is the same: validate against live
//! data, honor the force-update handshake, take a backup when structure is
//! at stake, then run the physical DDL and the metadata write inside one
//! transaction — the two never commit independently. Failures roll that
//! transaction back and come back as result objects, not errors.

use serde::{Deserialize, Serialize};
use tablekit_core::{
    Connection, DataType, DialectInfo, LogicalColumn, LogicalTable, Transaction,
    ident::{derive_physical_name, sanitizes_cleanly},
    typemap::default_value_warning,
};
use tablekit_drivers::get_dialect_info;
use tablekit_schema::{
    DdlExecutor, DdlOperationResult, SchemaValidator, TableValidationResult, ValidationResult,
    probes::DataProbe,
};

use crate::config::EngineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::metadata::MetadataStore;

/// How a validated change was (or was not) applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyDisposition {
    /// Validation was clean and the change is committed
    Applied,
    /// The change was risky; the caller confirmed and it is committed
    AppliedWithForce,
    /// Nothing was changed
    Rejected,
}

/// Outcome of creating a table
#[derive(Debug, Clone)]
pub struct TableCreateOutcome {
    /// The definition, with metadata ids when creation succeeded
    pub table: LogicalTable,
    /// Physical DDL result
    pub ddl: DdlOperationResult,
    /// Default-value substitutions and other non-blocking notes
    pub warnings: Vec<String>,
}

/// A proposed whole-table update
#[derive(Debug, Clone)]
pub struct TableUpdateRequest {
    /// New table name; `None` keeps the current one
    pub new_name: Option<String>,
    /// New description; `None` keeps the current one
    pub description: Option<String>,
    /// The complete proposed column set
    pub columns: Vec<LogicalColumn>,
    /// Explicit confirmation for changes that put data at risk
    pub force: bool,
}

/// Outcome of a whole-table update
#[derive(Debug, Clone)]
pub struct TableUpdateOutcome {
    /// What happened
    pub disposition: ApplyDisposition,
    /// Human-readable summary
    pub message: String,
    /// The validation verdict the decision was based on
    pub validation: TableValidationResult,
    /// Physical DDL result, when execution was attempted
    pub ddl: Option<DdlOperationResult>,
    /// Whether a backup was attempted
    pub backup_attempted: bool,
    /// Whether the backup succeeded
    pub backup_created: bool,
    /// Name of the backup table, when one was created
    pub backup_table: Option<String>,
}

impl TableUpdateOutcome {
    fn rejected(message: impl Into<String>, validation: TableValidationResult) -> Self {
        Self {
            disposition: ApplyDisposition::Rejected,
            message: message.into(),
            validation,
            ddl: None,
            backup_attempted: false,
            backup_created: false,
            backup_table: None,
        }
    }
}

/// Outcome of a single-column change
#[derive(Debug, Clone)]
pub struct ColumnChangeOutcome {
    /// What happened
    pub disposition: ApplyDisposition,
    /// Human-readable summary
    pub message: String,
    /// The validation verdict the decision was based on
    pub validation: ValidationResult,
    /// Physical DDL result, when execution was attempted
    pub ddl: Option<DdlOperationResult>,
    /// Whether the backup succeeded, when one was attempted
    pub backup_created: Option<bool>,
    /// Name of the backup table, when one was created
    pub backup_table: Option<String>,
}

impl ColumnChangeOutcome {
    fn rejected(message: impl Into<String>, validation: ValidationResult) -> Self {
        Self {
            disposition: ApplyDisposition::Rejected,
            message: message.into(),
            validation,
            ddl: None,
            backup_created: None,
            backup_table: None,
        }
    }
}

/// One physical column operation, applied inside a transaction
enum ColumnOp {
    Add(LogicalColumn),
    Drop(String),
    Rename(String, String),
    Retype(String, DataType),
    SetRequired(String, bool),
}

impl ColumnOp {
    async fn execute(
        &self,
        executor: &DdlExecutor,
        tx: &dyn Transaction,
        table: &LogicalTable,
    ) -> DdlOperationResult {
        match self {
            ColumnOp::Add(column) => executor.add_column(tx, table, column).await,
            ColumnOp::Drop(name) => executor.drop_column(tx, table, name).await,
            ColumnOp::Rename(old, new) => executor.rename_column(tx, table, old, new).await,
            ColumnOp::Retype(name, new_type) => {
                executor.alter_column_type(tx, table, name, *new_type).await
            }
            ColumnOp::SetRequired(name, required) => {
                executor.set_column_required(tx, table, name, *required).await
            }
        }
    }
}

/// Service for table-level structural operations
pub struct TableService {
    config: EngineConfig,
}

impl TableService {
    /// Create a table service
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn dialect(conn: &dyn Connection) -> DialectInfo {
        get_dialect_info(conn.driver_name())
    }

    fn metadata(conn: &dyn Connection) -> MetadataStore {
        MetadataStore::new(Self::dialect(conn))
    }

    fn executor(conn: &dyn Connection) -> DdlExecutor {
        DdlExecutor::new(Self::dialect(conn))
    }

    fn validator(conn: &dyn Connection) -> SchemaValidator {
        SchemaValidator::new(Self::dialect(conn))
    }

    /// Reject identifiers the sanitizer would alter.
    ///
    /// Exactness matters here: a degraded name would silently target a
    /// different physical object, so mismatches are treated as attempted
    /// injection and refused.
    fn require_clean_identifier(name: &str) -> ServiceResult<()> {
        if name.trim().is_empty() || !sanitizes_cleanly(name) {
            return Err(ServiceError::InvalidIdentifier(name.to_string()));
        }
        Ok(())
    }

    fn normalize_columns(mut columns: Vec<LogicalColumn>) -> ServiceResult<Vec<LogicalColumn>> {
        columns.sort_by_key(|c| c.display_order);
        for (idx, column) in columns.iter_mut().enumerate() {
            column.display_order = idx;
        }
        for column in &columns {
            Self::require_clean_identifier(&column.name)?;
            if columns.iter().filter(|c| c.name == column.name).count() > 1 {
                return Err(ServiceError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(columns)
    }

    async fn load_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        name: &str,
    ) -> ServiceResult<LogicalTable> {
        let metadata = Self::metadata(conn);
        metadata.ensure_schema(conn).await?;
        metadata
            .get_table(conn, owner_id, name)
            .await?
            .ok_or_else(|| ServiceError::TableNotFound(name.to_string()))
    }

    /// Fetch one table definition
    pub async fn get_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        name: &str,
    ) -> ServiceResult<LogicalTable> {
        self.load_table(conn, owner_id, name).await
    }

    /// List an owner's table definitions
    pub async fn list_tables(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
    ) -> ServiceResult<Vec<LogicalTable>> {
        let metadata = Self::metadata(conn);
        metadata.ensure_schema(conn).await?;
        Ok(metadata.list_tables(conn, owner_id).await?)
    }

    /// Create a logical table and materialize its physical table.
    ///
    /// Metadata insert and CREATE TABLE run in one transaction; a DDL
    /// failure rolls both back and is reported in the outcome.
    #[tracing::instrument(skip(self, conn, columns))]
    pub async fn create_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        name: &str,
        description: Option<String>,
        columns: Vec<LogicalColumn>,
    ) -> ServiceResult<TableCreateOutcome> {
        Self::require_clean_identifier(name)?;
        let columns = Self::normalize_columns(columns)?;

        let metadata = Self::metadata(conn);
        metadata.ensure_schema(conn).await?;

        if metadata.get_table(conn, owner_id, name).await?.is_some() {
            return Err(ServiceError::DuplicateTable(name.to_string()));
        }

        let mut table = LogicalTable::new(owner_id, name);
        table.description = description;
        table.columns = columns;

        let physical = table.physical_name();
        if let Some(introspection) = conn.as_schema_introspection() {
            if introspection.table_exists(&physical).await? {
                return Err(ServiceError::TableOperationFailed(format!(
                    "Physical table '{}' already exists; run reconciliation",
                    physical
                )));
            }
        }

        let warnings: Vec<String> = table
            .columns
            .iter()
            .filter_map(|c| {
                c.default_value
                    .as_deref()
                    .and_then(|raw| default_value_warning(raw, c.data_type))
            })
            .collect();

        let executor = Self::executor(conn);
        let tx = conn.begin_transaction().await?;

        let persisted = match metadata.insert_table(tx.as_ref(), &table).await {
            Ok(persisted) => persisted,
            Err(e) => {
                tx.rollback().await?;
                return Err(ServiceError::Backend(e));
            }
        };

        let ddl = executor.create_physical_table(tx.as_ref(), &persisted).await;
        if !ddl.success {
            tx.rollback().await?;
            return Ok(TableCreateOutcome {
                table,
                ddl,
                warnings,
            });
        }
        tx.commit().await?;

        tracing::info!(owner_id, table = %persisted.name, "table created");
        Ok(TableCreateOutcome {
            table: persisted,
            ddl,
            warnings,
        })
    }

    /// Apply a whole-table update: rename plus the full proposed column set.
    ///
    /// Risky changes need `force`; impossible ones are rejected regardless.
    #[tracing::instrument(skip(self, conn, request))]
    pub async fn update_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        name: &str,
        request: TableUpdateRequest,
    ) -> ServiceResult<TableUpdateOutcome> {
        let current = self.load_table(conn, owner_id, name).await?;
        let proposed_name = request.new_name.clone().unwrap_or_else(|| current.name.clone());
        let proposed_columns = Self::normalize_columns(request.columns.clone())?;

        let validator = Self::validator(conn);
        let validation = validator
            .validate_table_update(conn, &current, &proposed_name, &proposed_columns)
            .await;

        if !validation.is_valid {
            return Ok(TableUpdateOutcome::rejected(
                "Validation failed; the update cannot be applied",
                validation,
            ));
        }
        if validation.requires_force_update && !request.force {
            return Ok(TableUpdateOutcome::rejected(
                "The update puts existing data at risk; re-request with force to confirm",
                validation,
            ));
        }

        // rename destination checks happen before anything runs
        if proposed_name != current.name {
            let metadata = Self::metadata(conn);
            if metadata
                .get_table(conn, owner_id, &proposed_name)
                .await?
                .is_some()
            {
                return Err(ServiceError::DuplicateTable(proposed_name));
            }
            if let Some(introspection) = conn.as_schema_introspection() {
                let new_physical = derive_physical_name(owner_id, &proposed_name);
                if introspection.table_exists(&new_physical).await? {
                    return Ok(TableUpdateOutcome::rejected(
                        format!("Physical table '{}' already exists", new_physical),
                        validation,
                    ));
                }
            }
        }

        let executor = Self::executor(conn);

        // Backup before the update transaction so it survives a rollback.
        // Forced updates refuse to proceed without one (configurable);
        // plain structural changes keep it best-effort.
        let mut backup_attempted = false;
        let mut backup_created = false;
        let mut backup_table = None;
        if validation.has_structural_changes
            && (self.config.backup_on_structural_changes || validation.requires_force_update)
        {
            backup_attempted = true;
            let backup = executor.create_backup_table(conn, &current).await;
            backup_created = backup.success;
            if backup.success {
                backup_table = Some(backup.message.clone());
            } else if validation.requires_force_update
                && self.config.require_backup_for_forced_updates
            {
                return Ok(TableUpdateOutcome {
                    message: format!(
                        "Backup failed and the update requires forced confirmation: {}",
                        backup.message
                    ),
                    backup_attempted: true,
                    ..TableUpdateOutcome::rejected("", validation)
                });
            } else {
                tracing::warn!(table = %current.name, error = %backup.message, "best-effort backup failed, proceeding");
            }
        }

        let tx = conn.begin_transaction().await?;
        match self
            .apply_update(tx.as_ref(), &executor, &current, &proposed_name, &proposed_columns, &request)
            .await
        {
            Ok(ddl) if ddl.success => {
                if let Err(e) = tx.commit().await {
                    return Err(ServiceError::Backend(e));
                }
                let disposition = if validation.requires_force_update {
                    ApplyDisposition::AppliedWithForce
                } else {
                    ApplyDisposition::Applied
                };
                tracing::info!(owner_id, table = %proposed_name, ?disposition, "table update applied");
                Ok(TableUpdateOutcome {
                    disposition,
                    message: ddl.message.clone(),
                    validation,
                    ddl: Some(ddl),
                    backup_attempted,
                    backup_created,
                    backup_table,
                })
            }
            Ok(ddl) => {
                tx.rollback().await?;
                Ok(TableUpdateOutcome {
                    message: format!("Update failed and was rolled back: {}", ddl.message),
                    ddl: Some(ddl),
                    backup_attempted,
                    backup_created,
                    backup_table,
                    ..TableUpdateOutcome::rejected("", validation)
                })
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Run the physical diff and the metadata sync on one executor.
    ///
    /// `working` tracks the table state between steps so rebuild plans see
    /// the structure the previous statement left behind.
    async fn apply_update(
        &self,
        tx: &dyn Transaction,
        executor: &DdlExecutor,
        current: &LogicalTable,
        proposed_name: &str,
        proposed_columns: &[LogicalColumn],
        request: &TableUpdateRequest,
    ) -> ServiceResult<DdlOperationResult> {
        let mut working = current.clone();
        let mut executed = Vec::new();
        let mut affected_rows = 0;

        let mut steps: Vec<DdlOperationResult> = Vec::new();

        // drops before adds, so no statement references a removed column
        let dropped: Vec<String> = working
            .columns
            .iter()
            .filter(|c| !proposed_columns.iter().any(|p| p.name == c.name))
            .map(|c| c.name.clone())
            .collect();
        for column_name in dropped {
            let result = executor.drop_column(tx, &working, &column_name).await;
            let ok = result.success;
            steps.push(result);
            if !ok {
                break;
            }
            working.columns.retain(|c| c.name != column_name);
        }

        if steps.iter().all(|s| s.success) {
            let added: Vec<LogicalColumn> = proposed_columns
                .iter()
                .filter(|p| !working.columns.iter().any(|c| c.name == p.name))
                .cloned()
                .collect();
            for column in added {
                let result = executor.add_column(tx, &working, &column).await;
                let ok = result.success;
                steps.push(result);
                if !ok {
                    break;
                }
                working.columns.push(column);
            }
        }

        if steps.iter().all(|s| s.success) {
            for proposed in proposed_columns {
                let Some(existing) = working.column(&proposed.name).cloned() else {
                    continue;
                };
                if existing.data_type != proposed.data_type {
                    let result = executor
                        .alter_column_type(tx, &working, &proposed.name, proposed.data_type)
                        .await;
                    let ok = result.success;
                    steps.push(result);
                    if !ok {
                        break;
                    }
                    if let Some(c) = working.columns.iter_mut().find(|c| c.name == proposed.name) {
                        c.data_type = proposed.data_type;
                    }
                }
                if existing.required != proposed.required {
                    let result = executor
                        .set_column_required(tx, &working, &proposed.name, proposed.required)
                        .await;
                    let ok = result.success;
                    steps.push(result);
                    if !ok {
                        break;
                    }
                    if let Some(c) = working.columns.iter_mut().find(|c| c.name == proposed.name) {
                        c.required = proposed.required;
                    }
                }
            }
        }

        if steps.iter().all(|s| s.success) && proposed_name != current.name {
            let result = executor
                .rename_physical_table_unchecked(tx, current.owner_id, &current.name, proposed_name)
                .await;
            steps.push(result);
        }

        for step in &steps {
            executed.extend(step.executed_statements.iter().cloned());
            affected_rows += step.affected_rows;
        }
        if let Some(failed) = steps.iter().find(|s| !s.success) {
            return Ok(DdlOperationResult {
                success: false,
                message: failed.message.clone(),
                executed_statements: executed,
                affected_rows,
            });
        }

        // metadata mirrors the physical change in the same transaction
        let metadata = MetadataStore::new(executor.builder().dialect().clone());
        let description = request
            .description
            .clone()
            .or_else(|| current.description.clone());
        metadata
            .update_table_meta(tx, current.id, proposed_name, description.as_deref())
            .await?;
        metadata
            .replace_columns(tx, current.id, proposed_columns)
            .await?;

        Ok(DdlOperationResult {
            success: true,
            message: format!("Table '{}' updated", proposed_name),
            executed_statements: executed,
            affected_rows,
        })
    }

    /// Soft-delete the logical table and drop its physical table.
    ///
    /// The drop is idempotent; deleting a table whose physical half is
    /// already gone still cleans up the metadata.
    #[tracing::instrument(skip(self, conn))]
    pub async fn delete_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        name: &str,
    ) -> ServiceResult<DdlOperationResult> {
        let current = self.load_table(conn, owner_id, name).await?;
        let metadata = Self::metadata(conn);
        let executor = Self::executor(conn);

        let tx = conn.begin_transaction().await?;
        if let Err(e) = metadata.soft_delete_table(tx.as_ref(), current.id).await {
            tx.rollback().await?;
            return Err(ServiceError::Backend(e));
        }
        let ddl = executor
            .drop_physical_table(tx.as_ref(), owner_id, name)
            .await;
        if !ddl.success {
            tx.rollback().await?;
            return Ok(ddl);
        }
        tx.commit().await?;

        tracing::info!(owner_id, table = %name, "table deleted");
        Ok(ddl)
    }

    /// Rename a table: checked physical rename plus metadata, atomically
    #[tracing::instrument(skip(self, conn))]
    pub async fn rename_table(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        name: &str,
        new_name: &str,
    ) -> ServiceResult<DdlOperationResult> {
        Self::require_clean_identifier(new_name)?;
        let current = self.load_table(conn, owner_id, name).await?;
        let metadata = Self::metadata(conn);

        if metadata.get_table(conn, owner_id, new_name).await?.is_some() {
            return Err(ServiceError::DuplicateTable(new_name.to_string()));
        }

        // same checks the standalone checked rename performs
        if let Some(introspection) = conn.as_schema_introspection() {
            let old_physical = derive_physical_name(owner_id, name);
            let new_physical = derive_physical_name(owner_id, new_name);
            if !introspection.table_exists(&old_physical).await? {
                return Ok(DdlOperationResult {
                    success: false,
                    message: format!("Source table '{}' does not exist", old_physical),
                    executed_statements: Vec::new(),
                    affected_rows: 0,
                });
            }
            if introspection.table_exists(&new_physical).await? {
                return Ok(DdlOperationResult {
                    success: false,
                    message: format!("Destination table '{}' already exists", new_physical),
                    executed_statements: Vec::new(),
                    affected_rows: 0,
                });
            }
        }

        let executor = Self::executor(conn);
        let tx = conn.begin_transaction().await?;
        let ddl = executor
            .rename_physical_table_unchecked(tx.as_ref(), owner_id, name, new_name)
            .await;
        if !ddl.success {
            tx.rollback().await?;
            return Ok(ddl);
        }
        if let Err(e) = metadata
            .update_table_meta(tx.as_ref(), current.id, new_name, current.description.as_deref())
            .await
        {
            tx.rollback().await?;
            return Err(ServiceError::Backend(e));
        }
        tx.commit().await?;

        tracing::info!(owner_id, from = %name, to = %new_name, "table renamed");
        Ok(ddl)
    }

    /// Add a column to an existing table
    #[tracing::instrument(skip(self, conn, column))]
    pub async fn add_column(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        column: LogicalColumn,
        force: bool,
    ) -> ServiceResult<ColumnChangeOutcome> {
        Self::require_clean_identifier(&column.name)?;
        let current = self.load_table(conn, owner_id, table_name).await?;
        if current.column(&column.name).is_some() {
            return Err(ServiceError::DuplicateColumn(column.name));
        }

        let mut validation = ValidationResult::valid();
        let probe = DataProbe::new(conn, Self::dialect(conn));
        let rows = probe.row_count(&current.physical_name()).await?;
        if column.required && column.default_value.is_none() && rows > 0 {
            validation = ValidationResult::needs_force(
                format!(
                    "Required column '{}' has no default value and the table already holds {} row(s); \
                     existing rows would receive the type's zero value",
                    column.name, rows
                ),
                rows,
            );
        }
        if let Some(raw) = column.default_value.as_deref() {
            if let Some(warning) = default_value_warning(raw, column.data_type) {
                validation.issues.push(warning);
            }
        }

        if validation.requires_force_update && !force {
            return Ok(ColumnChangeOutcome::rejected(
                "Adding this column puts existing rows at risk; re-request with force to confirm",
                validation,
            ));
        }

        let mut new_column = column.clone();
        new_column.display_order = current.columns.len();
        let mut final_columns = current.columns.clone();
        final_columns.push(new_column.clone());

        self.apply_column_change(
            conn,
            &current,
            validation,
            force,
            ColumnOp::Add(new_column),
            final_columns,
        )
        .await
    }

    /// Drop a column; deleting one that holds data needs confirmation
    #[tracing::instrument(skip(self, conn))]
    pub async fn drop_column(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        column_name: &str,
        force: bool,
    ) -> ServiceResult<ColumnChangeOutcome> {
        let current = self.load_table(conn, owner_id, table_name).await?;
        if current.column(column_name).is_none() {
            return Err(ServiceError::ColumnNotFound(column_name.to_string()));
        }

        let probe = DataProbe::new(conn, Self::dialect(conn));
        let has_data = probe
            .column_has_data(&current.physical_name(), column_name)
            .await?;
        let validation = if has_data {
            let rows = probe.row_count(&current.physical_name()).await?;
            ValidationResult::needs_force(
                format!(
                    "Deleting column '{}' discards existing data and requires confirmation",
                    column_name
                ),
                rows,
            )
        } else {
            ValidationResult::valid()
        };

        if validation.requires_force_update && !force {
            return Ok(ColumnChangeOutcome::rejected(
                "Deleting a column with data is never done silently; re-request with force",
                validation,
            ));
        }

        let final_columns: Vec<LogicalColumn> = current
            .columns
            .iter()
            .filter(|c| c.name != column_name)
            .cloned()
            .collect();

        self.apply_column_change(
            conn,
            &current,
            validation,
            force,
            ColumnOp::Drop(column_name.to_string()),
            final_columns,
        )
        .await
    }

    /// Rename a column; both names must survive sanitization intact
    #[tracing::instrument(skip(self, conn))]
    pub async fn rename_column(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> ServiceResult<ColumnChangeOutcome> {
        Self::require_clean_identifier(new_name)?;
        let current = self.load_table(conn, owner_id, table_name).await?;
        if current.column(old_name).is_none() {
            return Err(ServiceError::ColumnNotFound(old_name.to_string()));
        }
        if current.column(new_name).is_some() {
            return Err(ServiceError::DuplicateColumn(new_name.to_string()));
        }

        let final_columns: Vec<LogicalColumn> = current
            .columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == old_name {
                    c.name = new_name.to_string();
                }
                c
            })
            .collect();
        self.apply_column_change(
            conn,
            &current,
            ValidationResult::valid(),
            false,
            ColumnOp::Rename(old_name.to_string(), new_name.to_string()),
            final_columns,
        )
        .await
    }

    /// Change a column's type; lossy conversions on live data need force
    #[tracing::instrument(skip(self, conn))]
    pub async fn change_column_type(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        column_name: &str,
        new_type: DataType,
        force: bool,
    ) -> ServiceResult<ColumnChangeOutcome> {
        let current = self.load_table(conn, owner_id, table_name).await?;
        let validator = Self::validator(conn);
        let validation = validator
            .validate_column_type_change(conn, &current, column_name, new_type)
            .await;

        if !validation.is_valid {
            return Ok(ColumnChangeOutcome::rejected(
                "The conversion is not possible; force cannot override it",
                validation,
            ));
        }
        if validation.requires_force_update && !force {
            return Ok(ColumnChangeOutcome::rejected(
                "The conversion may lose data; re-request with force to confirm",
                validation,
            ));
        }

        let final_columns: Vec<LogicalColumn> = current
            .columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == column_name {
                    c.data_type = new_type;
                }
                c
            })
            .collect();

        self.apply_column_change(
            conn,
            &current,
            validation,
            force,
            ColumnOp::Retype(column_name.to_string(), new_type),
            final_columns,
        )
        .await
    }

    /// Change a column's requiredness; NULL-holding columns need force
    #[tracing::instrument(skip(self, conn))]
    pub async fn set_column_required(
        &self,
        conn: &dyn Connection,
        owner_id: i64,
        table_name: &str,
        column_name: &str,
        required: bool,
        force: bool,
    ) -> ServiceResult<ColumnChangeOutcome> {
        let current = self.load_table(conn, owner_id, table_name).await?;
        let validator = Self::validator(conn);
        let validation = validator
            .validate_requiredness_change(conn, &current, column_name, required)
            .await;

        if !validation.is_valid {
            return Ok(ColumnChangeOutcome::rejected(
                "Validation failed",
                validation,
            ));
        }
        if validation.requires_force_update && !force {
            return Ok(ColumnChangeOutcome::rejected(
                "Existing rows have no value for this column; re-request with force to confirm",
                validation,
            ));
        }

        let final_columns: Vec<LogicalColumn> = current
            .columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == column_name {
                    c.required = required;
                }
                c
            })
            .collect();

        self.apply_column_change(
            conn,
            &current,
            validation,
            force,
            ColumnOp::SetRequired(column_name.to_string(), required),
            final_columns,
        )
        .await
    }

    /// Shared tail of every single-column change: backup when forced, one
    /// transaction for DDL + metadata, result-object reporting.
    async fn apply_column_change(
        &self,
        conn: &dyn Connection,
        current: &LogicalTable,
        validation: ValidationResult,
        force: bool,
        op: ColumnOp,
        final_columns: Vec<LogicalColumn>,
    ) -> ServiceResult<ColumnChangeOutcome> {
        let executor = Self::executor(conn);
        let metadata = Self::metadata(conn);

        // a forced change must have its safety net before it proceeds
        let mut backup_created = None;
        let mut backup_table = None;
        if validation.requires_force_update {
            let backup = executor.create_backup_table(conn, current).await;
            backup_created = Some(backup.success);
            if backup.success {
                backup_table = Some(backup.message.clone());
            } else if self.config.require_backup_for_forced_updates {
                return Ok(ColumnChangeOutcome {
                    message: format!(
                        "Backup failed and the change requires forced confirmation: {}",
                        backup.message
                    ),
                    backup_created,
                    ..ColumnChangeOutcome::rejected("", validation)
                });
            }
        }

        let tx = conn.begin_transaction().await?;
        let ddl = op.execute(&executor, tx.as_ref(), current).await;
        if !ddl.success {
            tx.rollback().await?;
            return Ok(ColumnChangeOutcome {
                message: format!("Change failed and was rolled back: {}", ddl.message),
                ddl: Some(ddl),
                backup_created,
                backup_table,
                ..ColumnChangeOutcome::rejected("", validation)
            });
        }
        if let Err(e) = metadata
            .replace_columns(tx.as_ref(), current.id, &final_columns)
            .await
        {
            tx.rollback().await?;
            return Err(ServiceError::Backend(e));
        }
        tx.commit().await?;

        let disposition = if validation.requires_force_update && force {
            ApplyDisposition::AppliedWithForce
        } else {
            ApplyDisposition::Applied
        };
        Ok(ColumnChangeOutcome {
            disposition,
            message: ddl.message.clone(),
            validation,
            ddl: Some(ddl),
            backup_created,
            backup_table,
        })
    }
}
