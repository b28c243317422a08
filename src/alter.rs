//! Alter orchestration for managed tables
//!
//! An alter request names exactly one change. The new state is persisted to
//! the catalog first; if the accompanying DDL then fails, the previous
//! catalog record is restored before the error surfaces, so catalog and
//! live table never disagree.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Result, TableServiceError};
use crate::schema::TableDefinition;
use crate::sql::columns::{format_default, TableCompiler};
use crate::sql::ddl;
use crate::sql::sanitize::ensure_safe;
use crate::store::TableService;
use crate::types::{expand_endpoints, ColumnSpec, ColumnType};
use crate::validate::compile_validators;

/// Request body for altering a managed table; exactly one field may be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlterTableRequest {
    /// New root URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    /// New SQL table name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    /// Replacement endpoint list; accepts the ALL/NONE sentinels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
    /// `"column, new_type"`; the target may be any creatable type except
    /// serial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    /// Single-entry map of column name to specification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_column: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_column: Option<String>,
    /// `"column, value"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_default: Option<String>,
}

/// The single change an alter request resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum AlterOp {
    RootUrl(String),
    Rename(String),
    Comments(String),
    Endpoints(Vec<String>),
    ColumnType { column: String, target: String },
    AddColumn(serde_json::Map<String, Value>),
    DropColumn(String),
    SetDefault { column: String, value: String },
    DropDefault(String),
}

impl AlterTableRequest {
    /// Resolve the single operation, or None for an empty request.
    ///
    /// A request naming two or more changes is ambiguous about ordering
    /// and rollback, so it is rejected.
    pub fn operation(&self) -> Result<Option<AlterOp>> {
        let mut ops = Vec::new();
        if let Some(v) = &self.root_url {
            ops.push(AlterOp::RootUrl(v.clone()));
        }
        if let Some(v) = &self.table_name {
            ops.push(AlterOp::Rename(v.clone()));
        }
        if let Some(v) = &self.comments {
            ops.push(AlterOp::Comments(v.clone()));
        }
        if let Some(v) = &self.endpoints {
            ops.push(AlterOp::Endpoints(v.clone()));
        }
        if let Some(v) = &self.column_type {
            let (column, target) = split_comma_pair(v, "column_type")?;
            ops.push(AlterOp::ColumnType { column, target });
        }
        if let Some(v) = &self.add_column {
            ops.push(AlterOp::AddColumn(v.clone()));
        }
        if let Some(v) = &self.drop_column {
            ops.push(AlterOp::DropColumn(v.clone()));
        }
        if let Some(v) = &self.set_default {
            let (column, value) = split_comma_pair(v, "set_default")?;
            ops.push(AlterOp::SetDefault { column, value });
        }
        if let Some(v) = &self.drop_default {
            ops.push(AlterOp::DropDefault(v.clone()));
        }

        match ops.len() {
            0 => Ok(None),
            1 => Ok(ops.pop()),
            n => Err(TableServiceError::validation(format!(
                "an alter request may name exactly one change, this one names {}",
                n
            ))),
        }
    }
}

fn split_comma_pair(value: &str, field: &str) -> Result<(String, String)> {
    let (left, right) = value.split_once(',').ok_or_else(|| {
        TableServiceError::validation(format!(
            "{} must be of the form 'column, value', got '{}'",
            field, value
        ))
    })?;
    let left = left.trim();
    let right = right.trim();
    if left.is_empty() || right.is_empty() {
        return Err(TableServiceError::validation(format!(
            "{} must be of the form 'column, value', got '{}'",
            field, value
        )));
    }
    Ok((left.to_string(), right.to_string()))
}

/// Resolve a column_type target, e.g. "integer" or "varchar(64)".
///
/// Serial is rejected: PostgreSQL cannot convert an existing column into
/// one.
fn parse_target_type(
    target: &str,
    tenant: &str,
    existing_enums: &[String],
) -> Result<ColumnType> {
    let target = target.to_lowercase();
    if target == "serial" {
        return Err(TableServiceError::validation(
            "a column cannot be converted to serial",
        ));
    }
    let (data_type, char_len) = match target.strip_suffix(')').and_then(|t| t.split_once('(')) {
        Some((name, len)) => {
            let len: u32 = len.trim().parse().map_err(|_| {
                TableServiceError::validation(format!(
                    "'{}' is not a valid length in type '{}'",
                    len, target
                ))
            })?;
            (name.trim().to_string(), Some(len))
        }
        None => (target.clone(), None),
    };
    ColumnType::from_data_type(&data_type, char_len, tenant, existing_enums)
        .map_err(TableServiceError::validation)
}

/// Parse a set_default value by the column's structural type
fn default_value_for(spec: &ColumnSpec, value: &str) -> Result<Value> {
    match spec.column_type.validator_type() {
        "integer" => value.parse::<i64>().map(Value::from).map_err(|_| {
            TableServiceError::validation(format!(
                "default '{}' for column '{}' is not an integer",
                value, spec.name
            ))
        }),
        "boolean" => match value.to_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(TableServiceError::validation(format!(
                "default '{}' for column '{}' is not a boolean",
                value, spec.name
            ))),
        },
        _ => Ok(Value::String(value.to_string())),
    }
}

impl TableService {
    /// Apply one alter operation to a managed table.
    ///
    /// An empty request succeeds without touching anything and returns the
    /// current definition.
    pub async fn alter_table(
        &self,
        tenant: &str,
        table_name: &str,
        request: AlterTableRequest,
    ) -> Result<TableDefinition> {
        ensure_safe(tenant).map_err(TableServiceError::validation)?;
        ensure_safe(table_name).map_err(TableServiceError::validation)?;
        let mut definition = self
            .get_table_by_name(tenant, table_name)
            .await?
            .ok_or_else(|| {
                TableServiceError::not_found(format!("Table '{}' does not exist", table_name))
            })?;
        let Some(op) = request.operation()? else {
            return Ok(definition);
        };
        let snapshot = definition.clone();

        match op {
            AlterOp::RootUrl(root_url) => {
                if self.root_url_in_use(tenant, &root_url).await? {
                    return Err(TableServiceError::conflict(format!(
                        "Root URL '{}' is already registered",
                        root_url
                    )));
                }
                definition.root_url = root_url;
                self.update_table_metadata(&definition).await?;
            }
            AlterOp::Comments(comments) => {
                definition.comments = Some(comments);
                self.update_table_metadata(&definition).await?;
            }
            AlterOp::Endpoints(names) => {
                definition.endpoints =
                    expand_endpoints(&names).map_err(TableServiceError::validation)?;
                self.update_table_metadata(&definition).await?;
            }
            AlterOp::Rename(new_name) => {
                ensure_safe(&new_name).map_err(TableServiceError::validation)?;
                if self.object_name_in_use(tenant, &new_name).await? {
                    return Err(TableServiceError::conflict(format!(
                        "Table or view '{}' already exists",
                        new_name
                    )));
                }
                definition.table_name = new_name.clone();
                self.update_table_metadata(&definition).await?;
                self.run_alter_ddl(&ddl::rename_table(tenant, table_name, &new_name), &snapshot)
                    .await?;
            }
            AlterOp::AddColumn(column_map) => {
                if column_map.len() != 1 {
                    return Err(TableServiceError::validation(
                        "add_column takes exactly one column",
                    ));
                }
                let (column, raw_spec) = column_map.iter().next().ok_or_else(|| {
                    TableServiceError::validation("add_column takes exactly one column")
                })?;
                if definition.column_definition.contains_key(column) {
                    return Err(TableServiceError::conflict(format!(
                        "Column '{}' already exists",
                        column
                    )));
                }
                let spec_map = raw_spec.as_object().ok_or_else(|| {
                    TableServiceError::validation(format!(
                        "the definition of column '{}' must be an object",
                        column
                    ))
                })?;

                let existing_enums = self.existing_enums(tenant).await?;
                let compiler = TableCompiler::new(self.config());
                let compiled = compiler
                    .compile_add_column(tenant, table_name, column, spec_map, &existing_enums)
                    .map_err(TableServiceError::schema_compile)?;

                definition
                    .column_definition
                    .insert(column.clone(), raw_spec.clone());
                self.recompile_definition(&mut definition, &existing_enums)?;
                self.update_table_metadata(&definition).await?;
                self.run_alter_ddl(&compiled.ddl, &snapshot).await?;
            }
            AlterOp::DropColumn(column) => {
                ensure_safe(&column).map_err(TableServiceError::validation)?;
                if column == definition.primary_key {
                    return Err(TableServiceError::validation(format!(
                        "Column '{}' is the primary key and cannot be dropped",
                        column
                    )));
                }
                if definition.column_definition.shift_remove(&column).is_none() {
                    return Err(TableServiceError::not_found(format!(
                        "Column '{}' does not exist",
                        column
                    )));
                }
                let existing_enums = self.existing_enums(tenant).await?;
                self.recompile_definition(&mut definition, &existing_enums)?;
                self.update_table_metadata(&definition).await?;
                self.run_alter_ddl(&ddl::drop_column(tenant, table_name, &column), &snapshot)
                    .await?;
            }
            AlterOp::ColumnType { column, target } => {
                ensure_safe(&column).map_err(TableServiceError::validation)?;
                let existing_enums = self.existing_enums(tenant).await?;
                let target_type = parse_target_type(&target, tenant, &existing_enums)?;

                let spec_value = definition.column_definition.get_mut(&column).ok_or_else(|| {
                    TableServiceError::not_found(format!("Column '{}' does not exist", column))
                })?;
                let spec_map = spec_value.as_object_mut().ok_or_else(|| {
                    TableServiceError::validation(format!(
                        "the definition of column '{}' must be an object",
                        column
                    ))
                })?;
                let data_type = match &target_type {
                    ColumnType::Enum { type_name } => type_name.clone(),
                    ColumnType::Varchar { .. } => "varchar".to_string(),
                    ColumnType::Char { .. } => "char".to_string(),
                    other => other.to_sql_type().to_lowercase(),
                };
                spec_map.insert("data_type".to_string(), Value::String(data_type));
                match target_type.max_length() {
                    Some(len) => {
                        spec_map.insert("char_len".to_string(), Value::from(len));
                    }
                    None => {
                        spec_map.shift_remove("char_len");
                    }
                }

                self.recompile_definition(&mut definition, &existing_enums)?;
                self.update_table_metadata(&definition).await?;
                self.run_alter_ddl(
                    &ddl::alter_column_type(
                        tenant,
                        table_name,
                        &column,
                        &target_type.to_sql_type(),
                    ),
                    &snapshot,
                )
                .await?;
            }
            AlterOp::SetDefault { column, value } => {
                ensure_safe(&column).map_err(TableServiceError::validation)?;
                let existing_enums = self.existing_enums(tenant).await?;
                let spec_map = definition
                    .column_definition
                    .get(&column)
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| {
                        TableServiceError::not_found(format!(
                            "Column '{}' does not exist",
                            column
                        ))
                    })?;
                let spec = ColumnSpec::parse(&column, &spec_map, tenant, &existing_enums)
                    .map_err(TableServiceError::schema_compile)?;
                let default = default_value_for(&spec, &value)?;

                // Render with the default applied so time rules resolve
                let mut with_default = spec.clone();
                with_default.default = Some(default.clone());
                let default_expr = format_default(&with_default, &default)
                    .map_err(TableServiceError::validation)?;

                if let Some(Value::Object(map)) = definition.column_definition.get_mut(&column) {
                    map.insert("default".to_string(), default);
                }
                self.recompile_definition(&mut definition, &existing_enums)?;
                self.update_table_metadata(&definition).await?;
                self.run_alter_ddl(
                    &ddl::set_column_default(tenant, table_name, &column, &default_expr),
                    &snapshot,
                )
                .await?;
            }
            AlterOp::DropDefault(column) => {
                ensure_safe(&column).map_err(TableServiceError::validation)?;
                let removed = match definition.column_definition.get_mut(&column) {
                    Some(Value::Object(map)) => map.shift_remove("default").is_some(),
                    _ => {
                        return Err(TableServiceError::not_found(format!(
                            "Column '{}' does not exist",
                            column
                        )));
                    }
                };
                if !removed {
                    return Err(TableServiceError::validation(format!(
                        "Column '{}' has no default to drop",
                        column
                    )));
                }
                let existing_enums = self.existing_enums(tenant).await?;
                self.recompile_definition(&mut definition, &existing_enums)?;
                self.update_table_metadata(&definition).await?;
                self.run_alter_ddl(
                    &ddl::drop_column_default(tenant, table_name, &column),
                    &snapshot,
                )
                .await?;
            }
        }

        info!(tenant, table_name, "table altered");
        Ok(definition)
    }

    /// Recompute validators and special rules from the current column
    /// definition map. The primary key never changes through an alter.
    fn recompile_definition(
        &self,
        definition: &mut TableDefinition,
        existing_enums: &[String],
    ) -> Result<()> {
        let compiler = TableCompiler::new(self.config());
        let compiled = compiler
            .compile_create_table(
                &definition.tenant_id,
                &definition.table_name,
                &definition.column_definition,
                &definition.constraints,
                existing_enums,
            )
            .map_err(TableServiceError::schema_compile)?;
        let (validate_create, validate_update) = compile_validators(&compiled.columns);
        definition.validate_create = validate_create;
        definition.validate_update = validate_update;
        definition.special_rules = compiled.special_rules;
        Ok(())
    }

    /// Execute alter DDL, restoring the catalog snapshot if it fails
    async fn run_alter_ddl(&self, ddl_sql: &str, snapshot: &TableDefinition) -> Result<()> {
        if let Err(ddl_err) = sqlx::query(ddl_sql).execute(self.pool()).await {
            warn!(
                tenant = %snapshot.tenant_id,
                table_name = %snapshot.table_name,
                error = %ddl_err,
                "alter DDL failed, restoring catalog record"
            );
            self.update_table_metadata(snapshot).await?;
            return Err(TableServiceError::database(format!(
                "Could not alter table '{}': {}",
                snapshot.table_name, ddl_err
            )));
        }
        Ok(())
    }
}
