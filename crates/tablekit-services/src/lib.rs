//! Tablekit service layer
//!
//! Orchestrates the schema engine for API-level consumers.
//!
//! # Architecture
//!
//! ```text
//! API layer (HTTP controllers, auth - external)
//!     ↓
//! Service layer (tablekit-services) ← this crate
//!     ↓
//! Domain layer (tablekit-schema, tablekit-connection)
//!     ↓
//! Infrastructure layer (tablekit-core, tablekit-drivers)
//! ```
//!
//! # Services
//!
//! - [`TableService`] - table lifecycle and column evolution
//! - [`RowService`] - row CRUD keyed by `RowIdentifier`
//! - [`ReconciliationService`] - metadata vs. physical consistency
//!
//! # Design principles
//!
//! 1. Callers acquire one pooled connection per request and pass it in
//! 2. Validation and DDL failures return result objects, never errors
//! 3. Physical DDL and metadata writes share one transaction
//! 4. No schema state is cached between calls

mod config;
mod error;
mod metadata;
mod reconcile;
mod row_service;
mod table_service;

pub use config::EngineConfig;
pub use error::{ServiceError, ServiceResult};
pub use metadata::{COLUMNS_TABLE, MetadataStore, TABLES_TABLE};
pub use reconcile::{ReconciliationService, TableConsistencyReport};
pub use row_service::RowService;
pub use table_service::{
    ApplyDisposition, ColumnChangeOutcome, TableCreateOutcome, TableService, TableUpdateOutcome,
    TableUpdateRequest,
};

// Re-export the building blocks consumers interact with through outcomes
pub use tablekit_schema::{DdlOperationResult, RowFilter, TableValidationResult, ValidationResult};
