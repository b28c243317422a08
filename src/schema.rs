//! Table-definition types
//!
//! Includes TableDefinition (one catalog record per managed table) and
//! CreateTableRequest.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{expand_endpoints, Constraints, Endpoint, SpecialRules};
use crate::validate::ValidatorSchema;

/// Catalog record for one managed table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Catalog row id, assigned at creation
    pub id: i32,
    /// SQL table name, unique within the tenant
    pub table_name: String,
    /// Path segment addressing the table's dynamic endpoints, unique
    /// within the tenant
    pub root_url: String,
    pub tenant_id: String,
    /// Column acting as primary key (supplied or synthesized)
    pub primary_key: String,
    /// The column specification as supplied at creation, column name ->
    /// attribute map, in input order
    pub column_definition: serde_json::Map<String, Value>,
    /// Structural validator for creates (honors nullability)
    pub validate_create: ValidatorSchema,
    /// Structural validator for updates (nothing required)
    pub validate_update: ValidatorSchema,
    /// Enabled dynamic endpoints; empty disables all access
    pub endpoints: Vec<Endpoint>,
    /// CREATETIME/UPDATETIME column buckets
    pub special_rules: SpecialRules,
    /// Multi-column UNIQUE constraints
    pub constraints: Constraints,
    pub comments: Option<String>,
}

impl TableDefinition {
    /// Wire projection of this definition.
    ///
    /// The brief form omits the column definition and validators; pass
    /// `details = true` to include them.
    pub fn describe(&self, details: bool) -> Value {
        let mut out = serde_json::json!({
            "table_name": self.table_name,
            "table_id": self.id,
            "root_url": self.root_url,
            "tenant": self.tenant_id,
            "primary_key": self.primary_key,
            "endpoints": self.endpoints,
            "constraints": self.constraints,
            "comments": self.comments,
        });
        if details && let Some(obj) = out.as_object_mut() {
            obj.insert("columns".to_string(), Value::Object(self.column_definition.clone()));
            obj.insert(
                "validate_json_create".to_string(),
                serde_json::to_value(&self.validate_create).unwrap_or(Value::Null),
            );
            obj.insert(
                "validate_json_update".to_string(),
                serde_json::to_value(&self.validate_update).unwrap_or(Value::Null),
            );
        }
        out
    }
}

/// Request body for creating a managed table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub table_name: String,
    /// Column name -> attribute map, in input order
    pub columns: serde_json::Map<String, Value>,
    /// Defaults to `table_name` when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    /// Explicit endpoint list; accepts the ALL/NONE sentinels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
    /// Shorthand flags; a false flag removes the matching endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_all: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_one: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    /// Enum types to create before the table, name -> label list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enums: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

impl CreateTableRequest {
    pub fn new(table_name: impl Into<String>, columns: serde_json::Map<String, Value>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
            ..Default::default()
        }
    }

    /// Root URL to register, defaulting to the table name
    pub fn effective_root_url(&self) -> &str {
        self.root_url.as_deref().unwrap_or(&self.table_name)
    }

    /// Resolve the enabled endpoint set from the explicit list (or the
    /// full set) minus any shorthand flags set to false.
    pub fn resolve_endpoints(&self) -> Result<Vec<Endpoint>, String> {
        let mut endpoints = match &self.endpoints {
            Some(names) => expand_endpoints(names)?,
            None => Endpoint::all(),
        };
        let flags = [
            (self.list_all, Endpoint::GetAll),
            (self.list_one, Endpoint::GetOne),
            (self.create, Endpoint::Create),
            (self.update, Endpoint::Update),
            (self.delete, Endpoint::Delete),
        ];
        for (flag, endpoint) in flags {
            if flag == Some(false) {
                endpoints.retain(|e| *e != endpoint);
            }
        }
        Ok(endpoints)
    }
}
