//! SQL-text construction
//!
//! Identifier sanitization, column-definition compilation, DDL assembly,
//! and the filter/order compiler. Everything here is pure string work; no
//! module in this tree touches a connection.

pub mod columns;
pub mod ddl;
pub mod filter;
pub mod sanitize;

pub use columns::{compile_unique_constraints, CompiledColumn, CompiledTable, TableCompiler};
pub use filter::{compile_query, BoundValue, CatalogColumn, CompiledQuery};
pub use sanitize::{ensure_safe, is_safe};
