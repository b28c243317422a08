//! Row-level operations on managed tables and views
//!
//! All statements address rows through the live column catalog: values are
//! bound as text and cast to the column's reported SQL type inside the
//! statement, so the same code path serves every column type the service
//! can create. Result rows come back as JSON objects with a `_pkid` field
//! duplicating the primary-key value.

use sqlx::Row;
use tracing::info;

use crate::error::{Result, TableServiceError};
use crate::schema::TableDefinition;
use crate::sql::filter::{compile_query, BoundValue, CatalogColumn, CompiledQuery};
use crate::sql::sanitize::ensure_safe;
use crate::store::TableService;
use crate::types::Endpoint;
use crate::validate::validate_payload;
use crate::view::ViewDefinition;

/// Key added to every returned row, duplicating the primary-key value
pub const PKID_FIELD: &str = "_pkid";

fn require_endpoint(endpoints: &[Endpoint], endpoint: Endpoint) -> Result<()> {
    if endpoints.contains(&endpoint) {
        Ok(())
    } else {
        Err(TableServiceError::validation(format!(
            "endpoint {} is not enabled",
            endpoint.name()
        )))
    }
}

/// User-supplied primary-key values (varchar natural keys) go through the
/// identifier sanitizer; generated and numeric keys are unaffected.
fn check_primary_key_value(
    row: &serde_json::Map<String, serde_json::Value>,
    primary_key: &str,
) -> Result<()> {
    if let Some(serde_json::Value::String(pk)) = row.get(primary_key) {
        ensure_safe(pk).map_err(TableServiceError::validation)?;
    }
    Ok(())
}

fn find_column<'a>(catalog: &'a [CatalogColumn], name: &str) -> Result<&'a CatalogColumn> {
    catalog.iter().find(|c| c.name == name).ok_or_else(|| {
        TableServiceError::database(format!("column '{}' is missing from the live table", name))
    })
}

/// Render a validated payload scalar as bind text
fn to_text(field: &str, value: &serde_json::Value) -> Result<Option<String>> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.clone())),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(TableServiceError::validation(format!(
            "'{}' must be a scalar value",
            field
        ))),
    }
}

/// Build a single multi-row INSERT over the union of the columns present
/// in the batch.
///
/// A row that omits one of the union columns gets the DEFAULT keyword at
/// that position, so column defaults and time rules still apply per row.
fn build_insert(
    tenant: &str,
    table_name: &str,
    rows: &[serde_json::Map<String, serde_json::Value>],
    catalog: &[CatalogColumn],
) -> Result<(String, Vec<Option<String>>)> {
    let mut union_columns: Vec<&CatalogColumn> = Vec::new();
    for row in rows {
        for field in row.keys() {
            if !union_columns.iter().any(|c| c.name == *field) {
                union_columns.push(find_column(catalog, field)?);
            }
        }
    }
    if union_columns.is_empty() {
        return Err(TableServiceError::validation(
            "at least one column value is required",
        ));
    }

    let mut params: Vec<Option<String>> = Vec::new();
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut slots = Vec::with_capacity(union_columns.len());
        for col in &union_columns {
            match row.get(&col.name) {
                Some(value) => {
                    params.push(to_text(&col.name, value)?);
                    slots.push(format!("${}::{}", params.len(), col.sql_type));
                }
                None => slots.push("DEFAULT".to_string()),
            }
        }
        tuples.push(format!("({})", slots.join(", ")));
    }

    let column_list: Vec<&str> = union_columns.iter().map(|c| c.name.as_str()).collect();
    let sql = format!(
        "INSERT INTO {}.{} ({}) VALUES {} RETURNING *",
        tenant,
        table_name,
        column_list.join(", "),
        tuples.join(", ")
    );
    Ok((sql, params))
}

/// Build the SET clause of an UPDATE from a validated payload.
///
/// UPDATETIME columns absent from the payload are refreshed with NOW().
/// Placeholders start right after `param_offset`.
fn build_set_clause(
    data: &serde_json::Map<String, serde_json::Value>,
    updatetime_columns: &[String],
    catalog: &[CatalogColumn],
    param_offset: usize,
) -> Result<(String, Vec<Option<String>>)> {
    let mut clauses = Vec::new();
    let mut params: Vec<Option<String>> = Vec::new();

    for (field, value) in data {
        let col = find_column(catalog, field)?;
        params.push(to_text(field, value)?);
        clauses.push(format!(
            "{} = ${}::{}",
            col.name,
            param_offset + params.len(),
            col.sql_type
        ));
    }
    for col in updatetime_columns {
        if !data.contains_key(col) {
            clauses.push(format!("{} = NOW()", col));
        }
    }

    if clauses.is_empty() {
        return Err(TableServiceError::validation(
            "at least one column value is required",
        ));
    }
    Ok((clauses.join(", "), params))
}

/// Translate the `where` body of a bulk update into query-parameter pairs.
///
/// Each entry is `column: {"operator": op, "value": v}`; the pairs feed the
/// same filter compiler as URL query parameters.
fn where_body_to_params(
    where_body: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<(String, String)>> {
    let mut params = Vec::with_capacity(where_body.len());
    for (column, raw) in where_body {
        let spec = raw.as_object().ok_or_else(|| {
            TableServiceError::validation(format!(
                "the where entry for '{}' must be an object with operator and value",
                column
            ))
        })?;
        let operator = spec.get("operator").and_then(|v| v.as_str()).ok_or_else(|| {
            TableServiceError::validation(format!(
                "the where entry for '{}' needs an operator",
                column
            ))
        })?;
        let value = spec.get("value").ok_or_else(|| {
            TableServiceError::validation(format!(
                "the where entry for '{}' needs a value",
                column
            ))
        })?;
        let value_text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => {
                return Err(TableServiceError::validation(format!(
                    "the where value for '{}' must be a scalar",
                    column
                )));
            }
        };
        params.push((format!("{}.{}", column, operator), value_text));
    }
    Ok(params)
}

fn bind_compiled<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: &'q [BoundValue],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            BoundValue::Single(value) => query.bind(value),
            BoundValue::List(values) => query.bind(values),
        };
    }
    query
}

/// Decode one column of a result row into JSON, by the catalog's type text
fn decode_column(row: &sqlx::postgres::PgRow, col: &CatalogColumn) -> serde_json::Value {
    let name = col.name.as_str();
    let base_type = col.sql_type.split('(').next().unwrap_or("").trim();
    let decoded = match base_type {
        "integer" | "smallint" => row
            .try_get::<Option<i32>, _>(name)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::Number(v.into())),
        "bigint" => row
            .try_get::<Option<i64>, _>(name)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::Number(v.into())),
        "boolean" => row
            .try_get::<Option<bool>, _>(name)
            .ok()
            .flatten()
            .map(serde_json::Value::Bool),
        "text" | "character varying" | "character" => row
            .try_get::<Option<String>, _>(name)
            .ok()
            .flatten()
            .map(serde_json::Value::String),
        "date" => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::String(v.format("%Y-%m-%d").to_string())),
        "timestamp without time zone" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(name)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "timestamp with time zone" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::String(v.to_rfc3339())),
        // Tenant enum types and anything else decode as their label text
        _ => row
            .try_get_unchecked::<Option<String>, _>(name)
            .ok()
            .flatten()
            .map(serde_json::Value::String),
    };
    decoded.unwrap_or(serde_json::Value::Null)
}

/// Convert a result row into a JSON object, appending `_pkid` when a
/// primary-key column is given
fn row_to_json(
    row: &sqlx::postgres::PgRow,
    catalog: &[CatalogColumn],
    primary_key: Option<&str>,
) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    for col in catalog {
        out.insert(col.name.clone(), decode_column(row, col));
    }
    if let Some(pk) = primary_key {
        let pk_value = out.get(pk).cloned().unwrap_or(serde_json::Value::Null);
        out.insert(PKID_FIELD.to_string(), pk_value);
    }
    serde_json::Value::Object(out)
}

impl TableService {
    // =========================================================================
    // Table Row Operations
    // =========================================================================

    /// Get a single row by primary-key value
    pub async fn get_one(
        &self,
        definition: &TableDefinition,
        pk_value: &str,
    ) -> Result<serde_json::Value> {
        require_endpoint(&definition.endpoints, Endpoint::GetOne)?;
        let catalog = self
            .object_catalog(&definition.tenant_id, &definition.table_name)
            .await?;
        let pk = find_column(&catalog, &definition.primary_key)?;

        let select_sql = format!(
            "SELECT * FROM {}.{} WHERE {} = $1::{}",
            definition.tenant_id, definition.table_name, pk.name, pk.sql_type
        );
        let row = sqlx::query(&select_sql)
            .bind(pk_value)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| {
                TableServiceError::not_found(format!(
                    "No row with {} '{}' in table '{}'",
                    definition.primary_key, pk_value, definition.table_name
                ))
            })?;

        Ok(row_to_json(&row, &catalog, Some(&definition.primary_key)))
    }

    /// Query rows with `column.operator=value` filters plus order, limit
    /// and offset
    pub async fn get_many(
        &self,
        definition: &TableDefinition,
        query_params: &[(String, String)],
    ) -> Result<Vec<serde_json::Value>> {
        require_endpoint(&definition.endpoints, Endpoint::GetAll)?;
        let catalog = self
            .object_catalog(&definition.tenant_id, &definition.table_name)
            .await?;
        let compiled = compile_query(query_params, &catalog, 0)
            .map_err(TableServiceError::validation)?;

        let select_sql = format!(
            "SELECT * FROM {}.{}{}",
            definition.tenant_id,
            definition.table_name,
            compiled.render_suffix()
        );
        let rows = bind_compiled(sqlx::query(&select_sql), &compiled.params)
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .iter()
            .map(|row| row_to_json(row, &catalog, Some(&definition.primary_key)))
            .collect())
    }

    /// Insert one or more rows in a single statement.
    ///
    /// Every row is validated first; one bad row rejects the whole batch
    /// before any SQL runs. Rows that omit a column another row supplies
    /// fall back to the column default.
    pub async fn create_many(
        &self,
        definition: &TableDefinition,
        rows: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<Vec<serde_json::Value>> {
        require_endpoint(&definition.endpoints, Endpoint::Create)?;
        if rows.is_empty() {
            return Err(TableServiceError::validation("at least one row is required"));
        }
        for row in rows {
            validate_payload(row, &definition.validate_create)
                .map_err(TableServiceError::validation)?;
            check_primary_key_value(row, &definition.primary_key)?;
        }

        let catalog = self
            .object_catalog(&definition.tenant_id, &definition.table_name)
            .await?;
        let (insert_sql, params) = build_insert(
            &definition.tenant_id,
            &definition.table_name,
            rows,
            &catalog,
        )?;

        let mut query = sqlx::query(&insert_sql);
        for param in &params {
            query = query.bind(param);
        }
        let inserted = query.fetch_all(self.pool()).await?;
        info!(
            tenant = %definition.tenant_id,
            table_name = %definition.table_name,
            rows = inserted.len(),
            "rows inserted"
        );

        Ok(inserted
            .iter()
            .map(|row| row_to_json(row, &catalog, Some(&definition.primary_key)))
            .collect())
    }

    /// Update a single row by primary-key value
    pub async fn update_one(
        &self,
        definition: &TableDefinition,
        pk_value: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        require_endpoint(&definition.endpoints, Endpoint::Update)?;
        validate_payload(data, &definition.validate_update)
            .map_err(TableServiceError::validation)?;

        let catalog = self
            .object_catalog(&definition.tenant_id, &definition.table_name)
            .await?;
        let (set_clause, params) = build_set_clause(
            data,
            &definition.special_rules.updatetime,
            &catalog,
            0,
        )?;
        let pk = find_column(&catalog, &definition.primary_key)?;

        let update_sql = format!(
            "UPDATE {}.{} SET {} WHERE {} = ${}::{} RETURNING *",
            definition.tenant_id,
            definition.table_name,
            set_clause,
            pk.name,
            params.len() + 1,
            pk.sql_type
        );
        let mut query = sqlx::query(&update_sql);
        for param in &params {
            query = query.bind(param);
        }
        let row = query
            .bind(pk_value)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| {
                TableServiceError::not_found(format!(
                    "No row with {} '{}' in table '{}'",
                    definition.primary_key, pk_value, definition.table_name
                ))
            })?;

        Ok(row_to_json(&row, &catalog, Some(&definition.primary_key)))
    }

    /// Update every row matching the filters; returns the number of rows
    /// touched (zero matches is not an error). With no filters the whole
    /// table is updated.
    pub async fn update_many(
        &self,
        definition: &TableDefinition,
        query_params: &[(String, String)],
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<u64> {
        require_endpoint(&definition.endpoints, Endpoint::Update)?;
        validate_payload(data, &definition.validate_update)
            .map_err(TableServiceError::validation)?;

        let catalog = self
            .object_catalog(&definition.tenant_id, &definition.table_name)
            .await?;
        let (set_clause, set_params) = build_set_clause(
            data,
            &definition.special_rules.updatetime,
            &catalog,
            0,
        )?;
        let compiled = compile_query(query_params, &catalog, set_params.len())
            .map_err(TableServiceError::validation)?;
        reject_row_set_modifiers(&compiled)?;

        let mut update_sql = format!(
            "UPDATE {}.{} SET {}",
            definition.tenant_id, definition.table_name, set_clause
        );
        if let Some(where_clause) = &compiled.where_clause {
            update_sql.push_str(" WHERE ");
            update_sql.push_str(where_clause);
        }

        let mut query = sqlx::query(&update_sql);
        for param in &set_params {
            query = query.bind(param);
        }
        let result = bind_compiled(query, &compiled.params)
            .execute(self.pool())
            .await?;
        info!(
            tenant = %definition.tenant_id,
            table_name = %definition.table_name,
            rows = result.rows_affected(),
            "rows updated"
        );
        Ok(result.rows_affected())
    }

    /// Bulk update addressed by a `where` body instead of query parameters
    pub async fn update_where(
        &self,
        definition: &TableDefinition,
        where_body: &serde_json::Map<String, serde_json::Value>,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<u64> {
        let query_params = where_body_to_params(where_body)?;
        self.update_many(definition, &query_params, data).await
    }

    /// Delete a single row by primary-key value
    pub async fn delete_one(&self, definition: &TableDefinition, pk_value: &str) -> Result<()> {
        require_endpoint(&definition.endpoints, Endpoint::Delete)?;
        let catalog = self
            .object_catalog(&definition.tenant_id, &definition.table_name)
            .await?;
        let pk = find_column(&catalog, &definition.primary_key)?;

        let delete_sql = format!(
            "DELETE FROM {}.{} WHERE {} = $1::{}",
            definition.tenant_id, definition.table_name, pk.name, pk.sql_type
        );
        let result = sqlx::query(&delete_sql)
            .bind(pk_value)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(TableServiceError::not_found(format!(
                "No row with {} '{}' in table '{}'",
                definition.primary_key, pk_value, definition.table_name
            )));
        }
        info!(
            tenant = %definition.tenant_id,
            table_name = %definition.table_name,
            "row deleted"
        );
        Ok(())
    }

    // =========================================================================
    // View Row Operations
    // =========================================================================

    /// Query rows of a managed view, enforcing its permission rules
    pub async fn query_view(
        &self,
        definition: &ViewDefinition,
        query_params: &[(String, String)],
        roles: &[String],
    ) -> Result<Vec<serde_json::Value>> {
        require_endpoint(&definition.endpoints, Endpoint::GetAll)?;
        if !definition.readable_by(roles) {
            return Err(TableServiceError::permission(format!(
                "view '{}' requires roles this caller does not hold",
                definition.view_name
            )));
        }

        let catalog = self
            .object_catalog(&definition.tenant_id, &definition.view_name)
            .await?;
        let compiled = compile_query(query_params, &catalog, 0)
            .map_err(TableServiceError::validation)?;

        let select_sql = format!(
            "SELECT * FROM {}.{}{}",
            definition.tenant_id,
            definition.view_name,
            compiled.render_suffix()
        );
        let rows = bind_compiled(sqlx::query(&select_sql), &compiled.params)
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .iter()
            .map(|row| row_to_json(row, &catalog, None))
            .collect())
    }
}

/// Order, limit and offset make no sense on an UPDATE row set
fn reject_row_set_modifiers(compiled: &CompiledQuery) -> Result<()> {
    if compiled.order_by.is_some() || compiled.limit.is_some() || compiled.offset.is_some() {
        return Err(TableServiceError::validation(
            "order, limit and offset cannot be used with a bulk update",
        ));
    }
    Ok(())
}
