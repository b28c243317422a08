//! # dyntable
//!
//! A multi-tenant table-as-a-service layer over PostgreSQL.
//!
//! This crate lets callers define tables, views and enumerated types at
//! runtime through JSON specifications. Definitions are recorded in
//! metadata catalogs, the backing SQL objects are created in a per-tenant
//! schema, and generic data endpoints (filter, order, paginated reads,
//! single and bulk writes) operate against any managed table without
//! table-specific code.
//!
//! ## Features
//!
//! - **Dynamic Table Management**: Create, alter, and delete tables at runtime
//! - **Per-Tenant Schemas**: Every tenant gets its own PostgreSQL schema; all
//!   managed objects live inside it
//! - **Compiled Validators**: Each table's column specification is compiled
//!   into create/update payload validators enforced before any SQL is built
//! - **Generic Query Engine**: `column.operator=value` filters, ordering,
//!   LIMIT/OFFSET, validated against the live column catalog
//! - **Views**: Plain, raw-SQL and materialized views with per-view role
//!   requirements
//! - **Enumerated Types**: Tenant-scoped enums with idempotent creation
//! - **SQL Injection Prevention**: Identifiers pass a sanitizer before they
//!   reach statement text; values are always bound parameters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dyntable::{CreateTableRequest, ServiceConfig, TableService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder("postgres://localhost/mydb").build();
//!     let service = TableService::new(config).await?;
//!
//!     // Each tenant gets its own schema
//!     service.create_tenant_schema("acme").await?;
//!
//!     // Define a table from a JSON column specification
//!     let columns = json!({
//!         "sku": {"data_type": "varchar", "char_len": 32, "primary_key": true},
//!         "label": {"data_type": "text", "null": false},
//!         "in_stock": {"data_type": "boolean", "default": true},
//!         "added": {"data_type": "timestamp", "default": "CREATETIME"}
//!     });
//!     let definition = service
//!         .create_table(
//!             "acme",
//!             CreateTableRequest::new("products", columns.as_object().unwrap().clone()),
//!         )
//!         .await?;
//!
//!     // Insert rows through the generic data executor
//!     let rows = json!([{"sku": "WIDGET-001", "label": "Blue Widget"}]);
//!     let created = service
//!         .create_many(
//!             &definition,
//!             &[rows[0].as_object().unwrap().clone()],
//!         )
//!         .await?;
//!
//!     // Filter and order without table-specific code
//!     let params = vec![
//!         ("in_stock.eq".to_string(), "true".to_string()),
//!         ("order".to_string(), "label,ASC".to_string()),
//!     ];
//!     let in_stock = service.get_many(&definition, &params).await?;
//!
//!     println!("{} created, {} in stock", created.len(), in_stock.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The service is configured using `ServiceConfig`:
//!
//! ```rust
//! use dyntable::ServiceConfig;
//!
//! let config = ServiceConfig::builder("postgres://localhost/mydb")
//!     .tables_metadata_table("manage_tables") // Table-definition catalog
//!     .views_metadata_table("manage_views")   // View-definition catalog
//!     .role_prefix("DYNTABLE")                // Capability role prefix
//!     .serial_start(1)                        // Identity columns added via alter
//!     .serial_increment(1)
//!     .build();
//! ```
//!
//! ## Multi-Tenancy
//!
//! Tenants share one database and one pair of metadata catalogs; isolation
//! comes from the per-tenant PostgreSQL schema plus a `tenant_id` column on
//! every catalog row. Callers resolve the tenant before invoking the
//! service; nothing in this crate inspects connection credentials.

pub mod alter;
pub mod config;
pub mod data;
pub mod error;
pub mod response;
pub mod roles;
pub mod schema;
pub mod sql;
pub mod store;
pub mod types;
pub mod validate;
pub mod view;

// Re-export main types for convenience
pub use alter::{AlterOp, AlterTableRequest};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use data::PKID_FIELD;
pub use error::{Result, TableServiceError};
pub use response::ResponseEnvelope;
pub use roles::{require, Capability};
pub use schema::{CreateTableRequest, TableDefinition};
pub use store::TableService;
pub use types::{
    ColumnSpec, ColumnType, Constraints, Endpoint, ForeignKeySpec, SpecialRules,
};
pub use view::{CreateViewRequest, ViewBody, ViewDefinition, ViewForm};

// Re-export SQL utilities for advanced users
pub use sql::filter::{compile_query, CatalogColumn, CompiledQuery};
pub use sql::sanitize::{ensure_safe, is_safe};
