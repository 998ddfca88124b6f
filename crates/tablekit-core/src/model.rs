//! Logical schema model
//!
//! Users define tables as a name plus typed columns; the engine materializes
//! them as physical tables. These types are the metadata-side description.
//! The physical side is never persisted — its name is re-derived from
//! (owner, logical name) on every use.

use crate::error::{Result, TablekitError};
use crate::ident::derive_physical_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate key column present in every physical table
pub const SURROGATE_KEY_COLUMN: &str = "Id";

/// Per-table monotone row sequence column; the stable external row reference
pub const ROW_IDENTIFIER_COLUMN: &str = "RowIdentifier";

/// Logical column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Variable-length text
    Text,
    /// 32-bit integer
    Integer,
    /// Fixed-point decimal, scale 2 / precision 18
    Decimal,
    /// Date and time
    Timestamp,
}

impl DataType {
    /// Canonical name used when persisting metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "Text",
            DataType::Integer => "Integer",
            DataType::Decimal => "Decimal",
            DataType::Timestamp => "Timestamp",
        }
    }

    /// Parse a persisted type name.
    ///
    /// This is the boundary where an unknown type name fails loudly —
    /// anything past this point works with the closed enum.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "Text" => Ok(DataType::Text),
            "Integer" => Ok(DataType::Integer),
            "Decimal" => Ok(DataType::Decimal),
            "Timestamp" => Ok(DataType::Timestamp),
            other => Err(TablekitError::UnsupportedType(other.to_string())),
        }
    }

    /// All logical types
    pub fn all() -> [DataType; 4] {
        [
            DataType::Text,
            DataType::Integer,
            DataType::Decimal,
            DataType::Timestamp,
        ]
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalColumn {
    /// Metadata row id (0 until persisted)
    pub id: i64,
    /// Owning table's metadata id (0 until persisted)
    pub table_id: i64,
    /// Column name, unique within the table
    pub name: String,
    /// Logical data type
    pub data_type: DataType,
    /// Whether NULL values are rejected
    pub required: bool,
    /// Position within the table, unique per table
    pub display_order: usize,
    /// Optional default value as supplied by the user
    pub default_value: Option<String>,
}

impl LogicalColumn {
    /// Create a column with a name and type
    pub fn named(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: 0,
            table_id: 0,
            name: name.into(),
            data_type,
            required: false,
            display_order: 0,
            default_value: None,
        }
    }

    /// Builder: mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: set default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Builder: set display order
    pub fn order(mut self, order: usize) -> Self {
        self.display_order = order;
        self
    }
}

/// A user-defined table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalTable {
    /// Metadata row id (0 until persisted)
    pub id: i64,
    /// Owning user id
    pub owner_id: i64,
    /// Table name, unique per owner among non-deleted tables
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Soft-delete flag, independent of the physical table lifecycle
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Columns in display order
    pub columns: Vec<LogicalColumn>,
}

impl LogicalTable {
    /// Create a new table definition
    pub fn new(owner_id: i64, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            owner_id,
            name: name.into(),
            description: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            columns: Vec::new(),
        }
    }

    /// Builder: append a column, assigning the next display order
    pub fn with_column(mut self, mut column: LogicalColumn) -> Self {
        column.display_order = self.columns.len();
        self.columns.push(column);
        self
    }

    /// Builder: set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&LogicalColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns sorted by display order
    pub fn ordered_columns(&self) -> Vec<&LogicalColumn> {
        let mut cols: Vec<&LogicalColumn> = self.columns.iter().collect();
        cols.sort_by_key(|c| c.display_order);
        cols
    }

    /// Derive the physical table name for this definition.
    ///
    /// Pure function of (owner, name); part of the external contract.
    pub fn physical_name(&self) -> String {
        derive_physical_name(self.owner_id, &self.name)
    }
}
