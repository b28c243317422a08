//! Configuration for TableService
//!
//! Provides a builder pattern for configuring the table service.

/// Configuration for the table service
///
/// Pagination note: a query without an explicit `limit` gets no LIMIT
/// clause at all; `limit=-1` requests the same thing explicitly. There is
/// no implicit default page size.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// PostgreSQL database URL
    pub database_url: String,
    /// Name of the table-definition catalog table (default: "manage_tables")
    pub tables_metadata_table: String,
    /// Name of the view-definition catalog table (default: "manage_views")
    pub views_metadata_table: String,
    /// Prefix for service role names (default: "DYNTABLE")
    pub role_prefix: String,
    /// START WITH value for identity columns added via alter (default: 1)
    pub serial_start: i64,
    /// INCREMENT BY value for identity columns added via alter (default: 1)
    pub serial_increment: i64,
}

impl ServiceConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> ServiceConfigBuilder {
        ServiceConfigBuilder::new(database_url)
    }
}

/// Builder for ServiceConfig
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    database_url: String,
    tables_metadata_table: String,
    views_metadata_table: String,
    role_prefix: String,
    serial_start: i64,
    serial_increment: i64,
}

impl ServiceConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            tables_metadata_table: "manage_tables".to_string(),
            views_metadata_table: "manage_views".to_string(),
            role_prefix: "DYNTABLE".to_string(),
            serial_start: 1,
            serial_increment: 1,
        }
    }

    /// Set the table-definition catalog table name (default: "manage_tables")
    pub fn tables_metadata_table(mut self, name: impl Into<String>) -> Self {
        self.tables_metadata_table = name.into();
        self
    }

    /// Set the view-definition catalog table name (default: "manage_views")
    pub fn views_metadata_table(mut self, name: impl Into<String>) -> Self {
        self.views_metadata_table = name.into();
        self
    }

    /// Set the service role-name prefix (default: "DYNTABLE")
    pub fn role_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.role_prefix = prefix.into();
        self
    }

    /// Set the START WITH value used when rewriting serial columns added
    /// via alter into identity columns (default: 1)
    pub fn serial_start(mut self, start: i64) -> Self {
        self.serial_start = start;
        self
    }

    /// Set the INCREMENT BY value for identity columns (default: 1)
    pub fn serial_increment(mut self, increment: i64) -> Self {
        self.serial_increment = increment;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServiceConfig {
        ServiceConfig {
            database_url: self.database_url,
            tables_metadata_table: self.tables_metadata_table,
            views_metadata_table: self.views_metadata_table,
            role_prefix: self.role_prefix,
            serial_start: self.serial_start,
            serial_increment: self.serial_increment,
        }
    }
}
