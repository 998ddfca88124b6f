//! Schema engine for tablekit
//!
//! The pieces between a logical table definition and the physical schema:
//!
//! - [`validation`] - judges proposed changes against live data
//! - [`ddl`] - builds dialect-correct DDL statements
//! - [`executor`] - runs DDL plans, translating failures into results
//! - [`dml`] - row-level CRUD keyed by the `RowIdentifier` sequence
//! - [`probes`] - row/null/size probes the validator relies on
//!
//! Validation failures and DDL failures surface as result objects, never
//! as errors, so callers always get a message and a force-update flag they
//! can relay to the user.

pub mod ddl;
pub mod dml;
pub mod executor;
pub mod probes;
pub mod validation;

pub use ddl::DdlBuilder;
pub use dml::{RowDml, RowFilter};
pub use executor::{DdlExecutor, DdlOperationResult};
pub use probes::DataProbe;
pub use validation::{SchemaValidator, TableValidationResult, ValidationResult};
