//! SQL dialect metadata
//!
//! Drivers provide a `DialectInfo` describing the syntax quirks the DDL
//! builder has to honor. The rest of the codebase consumes this metadata
//! instead of hardcoding per-driver logic.

/// Dialect metadata consumed by the DDL builder
#[derive(Debug, Clone)]
pub struct DialectInfo {
    /// Dialect identifier (e.g., "sqlite", "postgres")
    pub id: &'static str,
    /// Character used to quote identifiers
    pub identifier_quote: char,
    /// Whether the dialect supports `ALTER TABLE .. ALTER COLUMN` for type
    /// and nullability changes. Dialects without it (SQLite) require a
    /// table rebuild instead.
    pub supports_alter_column: bool,
    /// Whether `ALTER TABLE .. DROP COLUMN` is available
    pub supports_drop_column: bool,
    /// Column clause for an auto-incrementing integer surrogate key
    pub integer_primary_key: &'static str,
    /// Expression yielding the current date and time
    pub current_timestamp: &'static str,
}

impl DialectInfo {
    /// SQLite dialect
    pub fn sqlite() -> Self {
        Self {
            id: "sqlite",
            identifier_quote: '"',
            supports_alter_column: false,
            supports_drop_column: true,
            integer_primary_key: "INTEGER PRIMARY KEY AUTOINCREMENT",
            current_timestamp: "CURRENT_TIMESTAMP",
        }
    }

    /// PostgreSQL dialect
    pub fn postgres() -> Self {
        Self {
            id: "postgres",
            identifier_quote: '"',
            supports_alter_column: true,
            supports_drop_column: true,
            integer_primary_key: "INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY",
            current_timestamp: "CURRENT_TIMESTAMP",
        }
    }

    /// Wrap an identifier with this dialect's quote character
    pub fn quote_ident(&self, name: &str) -> String {
        format!(
            "{}{}{}",
            self.identifier_quote, name, self.identifier_quote
        )
    }
}

impl Default for DialectInfo {
    fn default() -> Self {
        Self::sqlite()
    }
}
