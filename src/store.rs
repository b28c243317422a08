//! TableService - Main entry point for multi-tenant dynamic table management
//!
//! This module provides the `TableService` struct that manages tenant
//! schemas, enum types, table definitions and view definitions in a
//! PostgreSQL database. Row-level operations live in `data`, alter
//! orchestration in `alter`.

use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::error::{Result, TableServiceError};
use crate::schema::{CreateTableRequest, TableDefinition};
use crate::sql::columns::TableCompiler;
use crate::sql::ddl;
use crate::sql::filter::CatalogColumn;
use crate::sql::sanitize::ensure_safe;
use crate::validate::compile_validators;
use crate::view::{CreateViewRequest, ViewDefinition, ViewForm};

/// Multi-tenant dynamic table service
///
/// Each tenant owns a PostgreSQL schema of the same name. Table metadata is
/// stored in a configurable catalog table (default: `manage_tables`), view
/// metadata in a second one (default: `manage_views`). Tenant data lives in
/// dynamically created tables inside the tenant's schema.
pub struct TableService {
    /// Database connection pool
    pool: PgPool,
    /// Service configuration
    config: ServiceConfig,
}

/// Reject a token the sanitizer dislikes, as a validation error
fn safe(token: &str) -> Result<()> {
    ensure_safe(token).map_err(TableServiceError::validation)
}

/// Parse a raw enum map into (name, labels) pairs.
///
/// Enum names and labels are lowercased before sanitizing; PostgreSQL folds
/// the type name anyway and lowercased labels keep lookups predictable.
pub(crate) fn parse_enums(
    enums: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<(String, Vec<String>)>> {
    let mut parsed = Vec::with_capacity(enums.len());
    for (name, raw_labels) in enums {
        let name = name.to_lowercase();
        safe(&name)?;

        let labels = raw_labels.as_array().ok_or_else(|| {
            TableServiceError::validation(format!(
                "the labels of enum '{}' must be an array of strings",
                name
            ))
        })?;
        if labels.is_empty() {
            return Err(TableServiceError::validation(format!(
                "enum '{}' needs at least one label",
                name
            )));
        }

        let mut out = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label
                .as_str()
                .ok_or_else(|| {
                    TableServiceError::validation(format!(
                        "the labels of enum '{}' must be strings",
                        name
                    ))
                })?
                .to_lowercase();
            safe(&label)?;
            out.push(label);
        }
        parsed.push((name, out));
    }
    Ok(parsed)
}

impl TableService {
    /// Create a new TableService from configuration
    ///
    /// This will:
    /// 1. Connect to the database
    /// 2. Create the metadata catalog tables if they don't exist
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let pool = PgPool::connect(&config.database_url)
            .await
            .map_err(|e| TableServiceError::database(format!("Database connection failed: {}", e)))?;

        let service = Self { pool, config };
        service.ensure_metadata_tables().await?;

        Ok(service)
    }

    /// Create a new TableService from an existing pool
    ///
    /// Use this when you already have a connection pool and want to share
    /// it with the table service.
    pub async fn from_pool(pool: PgPool, config: ServiceConfig) -> Result<Self> {
        let service = Self { pool, config };
        service.ensure_metadata_tables().await?;
        Ok(service)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Ensures both metadata catalog tables exist
    async fn ensure_metadata_tables(&self) -> Result<()> {
        safe(&self.config.tables_metadata_table)?;
        safe(&self.config.views_metadata_table)?;

        let create_tables_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                tenant_id VARCHAR(255) NOT NULL,
                table_name VARCHAR(255) NOT NULL,
                root_url VARCHAR(255) NOT NULL,
                primary_key VARCHAR(255) NOT NULL,
                column_definition JSONB NOT NULL,
                validate_create JSONB NOT NULL,
                validate_update JSONB NOT NULL,
                endpoints JSONB NOT NULL,
                special_rules JSONB NOT NULL,
                constraints JSONB NOT NULL,
                comments TEXT,
                UNIQUE (tenant_id, table_name),
                UNIQUE (tenant_id, root_url)
            )
            "#,
            self.config.tables_metadata_table
        );
        sqlx::query(&create_tables_sql).execute(&self.pool).await?;

        let create_views_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                tenant_id VARCHAR(255) NOT NULL,
                view_name VARCHAR(255) NOT NULL,
                root_url VARCHAR(255) NOT NULL,
                endpoints JSONB NOT NULL,
                permission_rules JSONB NOT NULL,
                view_definition JSONB NOT NULL,
                comments TEXT,
                UNIQUE (tenant_id, view_name),
                UNIQUE (tenant_id, root_url)
            )
            "#,
            self.config.views_metadata_table
        );
        sqlx::query(&create_views_sql).execute(&self.pool).await?;

        Ok(())
    }

    // =========================================================================
    // Tenant Schema Operations
    // =========================================================================

    /// Create the tenant's schema if it doesn't exist
    pub async fn create_tenant_schema(&self, tenant: &str) -> Result<()> {
        safe(tenant)?;
        sqlx::query(&ddl::create_schema(tenant))
            .execute(&self.pool)
            .await?;
        info!(tenant, "tenant schema ensured");
        Ok(())
    }

    /// Drop the tenant's schema with everything in it, plus all of the
    /// tenant's catalog records
    pub async fn drop_tenant_schema(&self, tenant: &str) -> Result<()> {
        safe(tenant)?;
        sqlx::query(&ddl::drop_schema(tenant))
            .execute(&self.pool)
            .await?;

        let delete_tables = format!(
            "DELETE FROM {} WHERE tenant_id = $1",
            self.config.tables_metadata_table
        );
        sqlx::query(&delete_tables)
            .bind(tenant)
            .execute(&self.pool)
            .await?;

        let delete_views = format!(
            "DELETE FROM {} WHERE tenant_id = $1",
            self.config.views_metadata_table
        );
        sqlx::query(&delete_views)
            .bind(tenant)
            .execute(&self.pool)
            .await?;

        info!(tenant, "tenant schema dropped");
        Ok(())
    }

    // =========================================================================
    // Enum Operations
    // =========================================================================

    /// Create the given enum types in the tenant's schema.
    ///
    /// Types that already exist are skipped, so re-sending the same enums
    /// with a later request is harmless.
    pub async fn create_enums(
        &self,
        tenant: &str,
        enums: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        safe(tenant)?;
        for (name, labels) in parse_enums(enums)? {
            if self.enum_exists(tenant, &name).await? {
                continue;
            }
            sqlx::query(&ddl::create_enum(tenant, &name, &labels))
                .execute(&self.pool)
                .await?;
            info!(tenant, enum_name = %name, "enum type created");
        }
        Ok(())
    }

    /// Whether an enum type of this name exists in the tenant's schema
    async fn enum_exists(&self, tenant: &str, name: &str) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM pg_type t
                JOIN pg_namespace n ON n.oid = t.typnamespace
                WHERE n.nspname = $1 AND t.typname = $2 AND t.typtype = 'e'
            )
            "#,
        )
        .bind(tenant)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Unqualified names of the enum types defined in the tenant's schema
    pub async fn existing_enums(&self, tenant: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT t.typname FROM pg_type t
            JOIN pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = $1 AND t.typtype = 'e'
            ORDER BY t.typname
            "#,
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("typname").map_err(Into::into))
            .collect()
    }

    /// Enum types of the tenant with their labels, in declared label order
    pub async fn get_enums(
        &self,
        tenant: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let rows = sqlx::query(
            r#"
            SELECT t.typname, e.enumlabel FROM pg_type t
            JOIN pg_enum e ON e.enumtypid = t.oid
            JOIN pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = $1
            ORDER BY t.typname, e.enumsortorder
            "#,
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await?;

        let mut out = serde_json::Map::new();
        for row in rows {
            let name: String = row.try_get("typname")?;
            let label: String = row.try_get("enumlabel")?;
            match out.get_mut(&name) {
                Some(serde_json::Value::Array(labels)) => labels.push(label.into()),
                _ => {
                    out.insert(name, serde_json::Value::Array(vec![label.into()]));
                }
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Table Definition Operations
    // =========================================================================

    /// Create a managed table
    ///
    /// This will:
    /// 1. Create any enum types named in the request (existing ones skipped)
    /// 2. Compile the column specification into CREATE TABLE DDL
    /// 3. Insert the catalog record
    /// 4. Execute the DDL, removing the catalog record again if it fails
    pub async fn create_table(
        &self,
        tenant: &str,
        request: CreateTableRequest,
    ) -> Result<TableDefinition> {
        safe(tenant)?;
        safe(&request.table_name)?;
        // root_url is routing metadata, only ever bound as a parameter, so
        // hyphens and other URL characters are allowed.
        let root_url = request.effective_root_url().to_string();

        if self.object_name_in_use(tenant, &request.table_name).await? {
            return Err(TableServiceError::conflict(format!(
                "Table or view '{}' already exists",
                request.table_name
            )));
        }
        if self.root_url_in_use(tenant, &root_url).await? {
            return Err(TableServiceError::conflict(format!(
                "Root URL '{}' is already registered",
                root_url
            )));
        }

        if let Some(enums) = &request.enums {
            self.create_enums(tenant, enums).await?;
        }
        let existing_enums = self.existing_enums(tenant).await?;

        let compiler = TableCompiler::new(&self.config);
        let constraints = request.constraints.clone().unwrap_or_default();
        let compiled = compiler
            .compile_create_table(
                tenant,
                &request.table_name,
                &request.columns,
                &constraints,
                &existing_enums,
            )
            .map_err(TableServiceError::schema_compile)?;

        let (validate_create, validate_update) = compile_validators(&compiled.columns);
        let endpoints = request
            .resolve_endpoints()
            .map_err(TableServiceError::validation)?;

        let insert_sql = format!(
            r#"
            INSERT INTO {} (tenant_id, table_name, root_url, primary_key,
                            column_definition, validate_create, validate_update,
                            endpoints, special_rules, constraints, comments)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
            self.config.tables_metadata_table
        );
        let row = sqlx::query(&insert_sql)
            .bind(tenant)
            .bind(&request.table_name)
            .bind(&root_url)
            .bind(&compiled.primary_key)
            .bind(serde_json::Value::Object(request.columns.clone()))
            .bind(serde_json::to_value(&validate_create)?)
            .bind(serde_json::to_value(&validate_update)?)
            .bind(serde_json::to_value(&endpoints)?)
            .bind(serde_json::to_value(&compiled.special_rules)?)
            .bind(serde_json::to_value(&constraints)?)
            .bind(&request.comments)
            .fetch_one(&self.pool)
            .await?;
        let id: i32 = row.try_get("id")?;

        if let Err(ddl_err) = sqlx::query(&compiled.create_ddl).execute(&self.pool).await {
            warn!(
                tenant,
                table_name = %request.table_name,
                error = %ddl_err,
                "table DDL failed, removing catalog record"
            );
            self.delete_table_metadata(id).await?;
            return Err(TableServiceError::database(format!(
                "Could not create table '{}': {}",
                request.table_name, ddl_err
            )));
        }
        info!(tenant, table_name = %request.table_name, id, "table created");

        Ok(TableDefinition {
            id,
            table_name: request.table_name,
            root_url,
            tenant_id: tenant.to_string(),
            primary_key: compiled.primary_key,
            column_definition: request.columns,
            validate_create,
            validate_update,
            endpoints,
            special_rules: compiled.special_rules,
            constraints,
            comments: request.comments,
        })
    }

    /// Get a table definition by tenant and root URL
    pub async fn get_table(&self, tenant: &str, root_url: &str) -> Result<Option<TableDefinition>> {
        let select_sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 AND root_url = $2",
            self.config.tables_metadata_table
        );
        let result = sqlx::query(&select_sql)
            .bind(tenant)
            .bind(root_url)
            .fetch_optional(&self.pool)
            .await?;

        match result {
            Some(row) => Ok(Some(row_to_table_definition(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a table definition by catalog id
    pub async fn get_table_by_id(&self, id: i32) -> Result<Option<TableDefinition>> {
        let select_sql = format!(
            "SELECT * FROM {} WHERE id = $1",
            self.config.tables_metadata_table
        );
        let result = sqlx::query(&select_sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match result {
            Some(row) => Ok(Some(row_to_table_definition(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a table definition by tenant and SQL table name
    pub async fn get_table_by_name(
        &self,
        tenant: &str,
        table_name: &str,
    ) -> Result<Option<TableDefinition>> {
        let select_sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 AND table_name = $2",
            self.config.tables_metadata_table
        );
        let result = sqlx::query(&select_sql)
            .bind(tenant)
            .bind(table_name)
            .fetch_optional(&self.pool)
            .await?;

        match result {
            Some(row) => Ok(Some(row_to_table_definition(&row)?)),
            None => Ok(None),
        }
    }

    /// List all table definitions of a tenant
    pub async fn list_tables(&self, tenant: &str) -> Result<Vec<TableDefinition>> {
        let select_sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 ORDER BY id",
            self.config.tables_metadata_table
        );
        let rows = sqlx::query(&select_sql)
            .bind(tenant)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_table_definition).collect()
    }

    /// Delete a managed table: the SQL table with everything depending on
    /// it, then the catalog record
    pub async fn delete_table(&self, tenant: &str, table_name: &str) -> Result<()> {
        safe(tenant)?;
        safe(table_name)?;
        let definition = self
            .get_table_by_name(tenant, table_name)
            .await?
            .ok_or_else(|| {
                TableServiceError::not_found(format!("Table '{}' does not exist", table_name))
            })?;

        sqlx::query(&ddl::drop_table(tenant, table_name))
            .execute(&self.pool)
            .await?;
        self.delete_table_metadata(definition.id).await?;

        info!(tenant, table_name, "table dropped");
        Ok(())
    }

    /// Persist the mutable parts of a table definition back to the catalog
    pub(crate) async fn update_table_metadata(&self, definition: &TableDefinition) -> Result<()> {
        let update_sql = format!(
            r#"
            UPDATE {}
            SET table_name = $2, root_url = $3, primary_key = $4,
                column_definition = $5, validate_create = $6, validate_update = $7,
                endpoints = $8, special_rules = $9, constraints = $10, comments = $11
            WHERE id = $1
            "#,
            self.config.tables_metadata_table
        );
        sqlx::query(&update_sql)
            .bind(definition.id)
            .bind(&definition.table_name)
            .bind(&definition.root_url)
            .bind(&definition.primary_key)
            .bind(serde_json::Value::Object(definition.column_definition.clone()))
            .bind(serde_json::to_value(&definition.validate_create)?)
            .bind(serde_json::to_value(&definition.validate_update)?)
            .bind(serde_json::to_value(&definition.endpoints)?)
            .bind(serde_json::to_value(&definition.special_rules)?)
            .bind(serde_json::to_value(&definition.constraints)?)
            .bind(&definition.comments)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_table_metadata(&self, id: i32) -> Result<()> {
        let delete_sql = format!(
            "DELETE FROM {} WHERE id = $1",
            self.config.tables_metadata_table
        );
        sqlx::query(&delete_sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Live column catalog of a table or view in the tenant's schema.
    ///
    /// Types come back formatted the way PostgreSQL spells them, e.g.
    /// "integer" or "character varying(255)", usable directly in casts.
    pub async fn object_catalog(&self, tenant: &str, object: &str) -> Result<Vec<CatalogColumn>> {
        safe(tenant)?;
        safe(object)?;
        let rows = sqlx::query(
            r#"
            SELECT attname, format_type(atttypid, atttypmod) AS sql_type
            FROM pg_attribute
            WHERE attrelid = ($1)::regclass AND NOT attisdropped AND attnum > 0
            ORDER BY attnum
            "#,
        )
        .bind(format!("{}.{}", tenant, object))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogColumn {
                    name: row.try_get("attname")?,
                    sql_type: row.try_get("sql_type")?,
                })
            })
            .collect()
    }

    /// Whether a table or view of this name is already registered for the
    /// tenant, in either catalog
    pub(crate) async fn object_name_in_use(&self, tenant: &str, name: &str) -> Result<bool> {
        let check_sql = format!(
            r#"
            SELECT EXISTS (SELECT 1 FROM {} WHERE tenant_id = $1 AND table_name = $2)
                OR EXISTS (SELECT 1 FROM {} WHERE tenant_id = $1 AND view_name = $2)
            "#,
            self.config.tables_metadata_table, self.config.views_metadata_table
        );
        let (in_use,): (bool,) = sqlx::query_as(&check_sql)
            .bind(tenant)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(in_use)
    }

    /// Whether a root URL is already taken for the tenant, in either catalog
    pub(crate) async fn root_url_in_use(&self, tenant: &str, root_url: &str) -> Result<bool> {
        let check_sql = format!(
            r#"
            SELECT EXISTS (SELECT 1 FROM {} WHERE tenant_id = $1 AND root_url = $2)
                OR EXISTS (SELECT 1 FROM {} WHERE tenant_id = $1 AND root_url = $2)
            "#,
            self.config.tables_metadata_table, self.config.views_metadata_table
        );
        let (in_use,): (bool,) = sqlx::query_as(&check_sql)
            .bind(tenant)
            .bind(root_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(in_use)
    }

    // =========================================================================
    // View Definition Operations
    // =========================================================================

    /// Create a managed view
    ///
    /// The SELECT/FROM/WHERE form may only reference a managed table of the
    /// same tenant. The raw-SQL forms (plain and materialized) are reserved
    /// for admin callers.
    pub async fn create_view(
        &self,
        tenant: &str,
        request: CreateViewRequest,
        admin: bool,
    ) -> Result<ViewDefinition> {
        safe(tenant)?;
        safe(&request.view_name)?;
        let root_url = request.effective_root_url().to_string();

        let form = request
            .view_definition
            .resolve()
            .map_err(TableServiceError::validation)?;
        if request.view_definition.is_raw() && !admin {
            return Err(TableServiceError::permission(
                "raw SQL view definitions require admin access",
            ));
        }

        if self.object_name_in_use(tenant, &request.view_name).await? {
            return Err(TableServiceError::conflict(format!(
                "Table or view '{}' already exists",
                request.view_name
            )));
        }
        if self.root_url_in_use(tenant, &root_url).await? {
            return Err(TableServiceError::conflict(format!(
                "Root URL '{}' is already registered",
                root_url
            )));
        }

        let create_ddl = match &form {
            ViewForm::Select {
                select_query,
                from_table,
                where_query,
            } => {
                safe(from_table)?;
                if self.get_table_by_name(tenant, from_table).await?.is_none() {
                    return Err(TableServiceError::not_found(format!(
                        "Table '{}' does not exist",
                        from_table
                    )));
                }
                ddl::create_view(
                    tenant,
                    &request.view_name,
                    select_query,
                    from_table,
                    where_query.as_deref(),
                )
            }
            ViewForm::Raw(sql) => ddl::create_view_raw(tenant, &request.view_name, sql),
            ViewForm::MaterializedRaw(sql) => {
                ddl::create_materialized_view_raw(tenant, &request.view_name, sql)
            }
        };

        let endpoints = request
            .resolve_endpoints()
            .map_err(TableServiceError::validation)?;
        let permission_rules = request.permission_rules.clone().unwrap_or_default();

        let insert_sql = format!(
            r#"
            INSERT INTO {} (tenant_id, view_name, root_url, endpoints,
                            permission_rules, view_definition, comments)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
            self.config.views_metadata_table
        );
        let row = sqlx::query(&insert_sql)
            .bind(tenant)
            .bind(&request.view_name)
            .bind(&root_url)
            .bind(serde_json::to_value(&endpoints)?)
            .bind(serde_json::to_value(&permission_rules)?)
            .bind(serde_json::to_value(&request.view_definition)?)
            .bind(&request.comments)
            .fetch_one(&self.pool)
            .await?;
        let id: i32 = row.try_get("id")?;

        if let Err(ddl_err) = sqlx::query(&create_ddl).execute(&self.pool).await {
            warn!(
                tenant,
                view_name = %request.view_name,
                error = %ddl_err,
                "view DDL failed, removing catalog record"
            );
            self.delete_view_metadata(id).await?;
            return Err(TableServiceError::database(format!(
                "Could not create view '{}': {}",
                request.view_name, ddl_err
            )));
        }
        info!(tenant, view_name = %request.view_name, id, "view created");

        Ok(ViewDefinition {
            id,
            view_name: request.view_name,
            root_url,
            tenant_id: tenant.to_string(),
            endpoints,
            comments: request.comments,
            permission_rules,
            view_definition: request.view_definition,
        })
    }

    /// Get a view definition by tenant and root URL
    pub async fn get_view(&self, tenant: &str, root_url: &str) -> Result<Option<ViewDefinition>> {
        let select_sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 AND root_url = $2",
            self.config.views_metadata_table
        );
        let result = sqlx::query(&select_sql)
            .bind(tenant)
            .bind(root_url)
            .fetch_optional(&self.pool)
            .await?;

        match result {
            Some(row) => Ok(Some(row_to_view_definition(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a view definition by tenant and SQL view name
    pub async fn get_view_by_name(
        &self,
        tenant: &str,
        view_name: &str,
    ) -> Result<Option<ViewDefinition>> {
        let select_sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 AND view_name = $2",
            self.config.views_metadata_table
        );
        let result = sqlx::query(&select_sql)
            .bind(tenant)
            .bind(view_name)
            .fetch_optional(&self.pool)
            .await?;

        match result {
            Some(row) => Ok(Some(row_to_view_definition(&row)?)),
            None => Ok(None),
        }
    }

    /// List all view definitions of a tenant
    pub async fn list_views(&self, tenant: &str) -> Result<Vec<ViewDefinition>> {
        let select_sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 ORDER BY id",
            self.config.views_metadata_table
        );
        let rows = sqlx::query(&select_sql)
            .bind(tenant)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_view_definition).collect()
    }

    /// Delete a managed view: the SQL view, then the catalog record
    pub async fn delete_view(&self, tenant: &str, view_name: &str) -> Result<()> {
        safe(tenant)?;
        safe(view_name)?;
        let definition = self
            .get_view_by_name(tenant, view_name)
            .await?
            .ok_or_else(|| {
                TableServiceError::not_found(format!("View '{}' does not exist", view_name))
            })?;

        let drop_ddl =
            ddl::drop_view(tenant, view_name, definition.view_definition.is_materialized());
        sqlx::query(&drop_ddl).execute(&self.pool).await?;
        self.delete_view_metadata(definition.id).await?;

        info!(tenant, view_name, "view dropped");
        Ok(())
    }

    /// Refresh a materialized view
    pub async fn refresh_view(&self, tenant: &str, view_name: &str) -> Result<()> {
        safe(tenant)?;
        safe(view_name)?;
        let definition = self
            .get_view_by_name(tenant, view_name)
            .await?
            .ok_or_else(|| {
                TableServiceError::not_found(format!("View '{}' does not exist", view_name))
            })?;
        if !definition.view_definition.is_materialized() {
            return Err(TableServiceError::validation(format!(
                "View '{}' is not materialized",
                view_name
            )));
        }

        sqlx::query(&ddl::refresh_materialized_view(tenant, view_name))
            .execute(&self.pool)
            .await?;
        info!(tenant, view_name, "materialized view refreshed");
        Ok(())
    }

    async fn delete_view_metadata(&self, id: i32) -> Result<()> {
        let delete_sql = format!(
            "DELETE FROM {} WHERE id = $1",
            self.config.views_metadata_table
        );
        sqlx::query(&delete_sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Row Conversion
// =============================================================================

fn row_to_table_definition(row: &sqlx::postgres::PgRow) -> Result<TableDefinition> {
    let column_definition: serde_json::Value = row.try_get("column_definition")?;
    let column_definition = match column_definition {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    Ok(TableDefinition {
        id: row.try_get("id")?,
        table_name: row.try_get("table_name")?,
        root_url: row.try_get("root_url")?,
        tenant_id: row.try_get("tenant_id")?,
        primary_key: row.try_get("primary_key")?,
        column_definition,
        validate_create: serde_json::from_value(row.try_get("validate_create")?)?,
        validate_update: serde_json::from_value(row.try_get("validate_update")?)?,
        endpoints: serde_json::from_value(row.try_get("endpoints")?)?,
        special_rules: serde_json::from_value(row.try_get("special_rules")?)?,
        constraints: serde_json::from_value(row.try_get("constraints")?)?,
        comments: row.try_get("comments")?,
    })
}

fn row_to_view_definition(row: &sqlx::postgres::PgRow) -> Result<ViewDefinition> {
    Ok(ViewDefinition {
        id: row.try_get("id")?,
        view_name: row.try_get("view_name")?,
        root_url: row.try_get("root_url")?,
        tenant_id: row.try_get("tenant_id")?,
        endpoints: serde_json::from_value(row.try_get("endpoints")?)?,
        comments: row.try_get("comments")?,
        permission_rules: serde_json::from_value(row.try_get("permission_rules")?)?,
        view_definition: serde_json::from_value(row.try_get("view_definition")?)?,
    })
}
