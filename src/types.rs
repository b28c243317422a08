//! Core type definitions for the table service
//!
//! Includes the column-type model, parsed column specifications, endpoint
//! sets, special rules, and multi-column constraints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sql::sanitize::ensure_safe;

/// Timestamp/date default tokens resolved to the database clock at write time
pub const CREATETIME: &str = "CREATETIME";
pub const UPDATETIME: &str = "UPDATETIME";

// ============================================================================
// Column Types
// ============================================================================

/// Resolved data type for a managed column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// Bounded text (maps to VARCHAR(n))
    Varchar { char_len: u32 },
    /// Fixed-width text (maps to CHAR(n))
    Char { char_len: u32 },
    /// Unbounded text (maps to TEXT)
    Text,
    /// 32-bit integer (maps to INTEGER)
    Integer,
    /// Auto-incrementing integer (maps to SERIAL)
    Serial,
    /// Boolean (maps to BOOLEAN)
    Boolean,
    /// Calendar date (maps to DATE)
    Date,
    /// Date and time (maps to TIMESTAMP)
    Timestamp,
    /// Tenant-scoped enumerated type; `type_name` is schema-qualified
    Enum { type_name: String },
}

impl ColumnType {
    /// Resolve a user-supplied `data_type` string into a column type.
    ///
    /// `existing_enums` holds the unqualified enum type names already defined
    /// in the tenant's schema; a bare enum name is rewritten to
    /// `tenant.name` when found there.
    pub fn from_data_type(
        data_type: &str,
        char_len: Option<u32>,
        tenant: &str,
        existing_enums: &[String],
    ) -> Result<Self, String> {
        let dt = data_type.to_lowercase();
        match dt.as_str() {
            "varchar" | "char" => {
                let len = char_len.ok_or_else(|| {
                    format!("char_len is required for data type '{}'", dt)
                })?;
                if dt == "varchar" {
                    Ok(ColumnType::Varchar { char_len: len })
                } else {
                    Ok(ColumnType::Char { char_len: len })
                }
            }
            "text" => Ok(ColumnType::Text),
            "integer" => Ok(ColumnType::Integer),
            "serial" => Ok(ColumnType::Serial),
            "boolean" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "timestamp" => Ok(ColumnType::Timestamp),
            other => {
                // Enum references: either a bare name defined for the
                // tenant, or an already-qualified tenant.name
                if existing_enums.iter().any(|e| e == other) {
                    return Ok(ColumnType::Enum {
                        type_name: format!("{}.{}", tenant, other),
                    });
                }
                if let Some((schema, name)) = other.split_once('.') {
                    if schema == tenant && existing_enums.iter().any(|e| e == name) {
                        return Ok(ColumnType::Enum {
                            type_name: other.to_string(),
                        });
                    }
                }
                Err(format!("'{}' is not a valid data type", data_type))
            }
        }
    }

    /// SQL type text for DDL
    pub fn to_sql_type(&self) -> String {
        match self {
            ColumnType::Varchar { char_len } => format!("VARCHAR({})", char_len),
            ColumnType::Char { char_len } => format!("CHAR({})", char_len),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Enum { type_name } => type_name.clone(),
        }
    }

    /// Structural type name used by the payload validators
    pub fn validator_type(&self) -> &'static str {
        match self {
            ColumnType::Varchar { .. }
            | ColumnType::Char { .. }
            | ColumnType::Text
            | ColumnType::Date
            | ColumnType::Timestamp
            | ColumnType::Enum { .. } => "string",
            ColumnType::Integer | ColumnType::Serial => "integer",
            ColumnType::Boolean => "boolean",
        }
    }

    /// Maximum payload string length, where the type bounds one
    pub fn max_length(&self) -> Option<u32> {
        match self {
            ColumnType::Varchar { char_len } | ColumnType::Char { char_len } => Some(*char_len),
            _ => None,
        }
    }

    /// Whether CREATETIME/UPDATETIME defaults apply to this type
    pub fn supports_time_rules(&self) -> bool {
        matches!(self, ColumnType::Timestamp | ColumnType::Date)
    }

    /// Whether this type may carry a PRIMARY KEY marker
    pub fn supports_primary_key(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Serial | ColumnType::Varchar { .. }
        )
    }
}

// ============================================================================
// Parsed Column Specifications
// ============================================================================

/// Foreign-key clause for a column
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeySpec {
    pub reference_table: String,
    pub reference_column: String,
    /// "ON DELETE" or "ON UPDATE"
    pub on_event: String,
    /// "SET NULL", "SET DEFAULT", "RESTRICT", "NO ACTION" or "CASCADE"
    pub event_action: String,
}

const FK_EVENTS: &[&str] = &["ON DELETE", "ON UPDATE"];
const FK_ACTIONS: &[&str] = &["SET NULL", "SET DEFAULT", "RESTRICT", "NO ACTION", "CASCADE"];

/// One column of a table specification, parsed from its raw JSON map
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    /// None means unspecified (treated as nullable)
    pub nullable: Option<bool>,
    pub unique: bool,
    pub default: Option<Value>,
    pub primary_key: bool,
    pub foreign_key: Option<ForeignKeySpec>,
    pub serial_start: Option<i64>,
    pub serial_increment: Option<i64>,
    pub comments: Option<String>,
}

impl ColumnSpec {
    /// Parse one column's raw specification map.
    ///
    /// Unknown keys, missing FK parts, bad FK tokens, contradictory
    /// SET NULL + null:false, and primary keys with defaults or explicit
    /// null:true are all rejected here, before any DDL text exists.
    pub fn parse(
        name: &str,
        spec: &serde_json::Map<String, Value>,
        tenant: &str,
        existing_enums: &[String],
    ) -> Result<Self, String> {
        ensure_safe(name)?;

        for key in spec.keys() {
            match key.as_str() {
                "data_type" | "char_len" | "null" | "unique" | "default" | "foreign_key"
                | "reference_table" | "reference_column" | "on_event" | "event_action"
                | "primary_key" | "serial_start" | "serial_increment" | "comments" => {}
                other => {
                    return Err(format!(
                        "'{}' is an invalid argument for column '{}'",
                        other, name
                    ));
                }
            }
        }

        let data_type = spec
            .get("data_type")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("data_type is required for column '{}'", name))?;

        let char_len = match spec.get("char_len") {
            Some(v) => Some(
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        format!("char_len for column '{}' must be a positive integer", name)
                    })?,
            ),
            None => None,
        };

        let column_type = ColumnType::from_data_type(data_type, char_len, tenant, existing_enums)?;

        let nullable = match spec.get("null") {
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => return Err(format!("null for column '{}' must be a boolean", name)),
            None => None,
        };

        let unique = match spec.get("unique") {
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(format!("unique for column '{}' must be a boolean", name)),
            None => false,
        };

        let primary_key = match spec.get("primary_key") {
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(format!("primary_key for column '{}' must be a boolean", name));
            }
            None => false,
        };

        let default = spec.get("default").cloned();

        let foreign_key = match spec.get("foreign_key") {
            Some(Value::Bool(true)) => Some(Self::parse_foreign_key(name, spec, nullable)?),
            Some(Value::Bool(false)) | None => {
                for fk_key in ["reference_table", "reference_column", "on_event", "event_action"] {
                    if spec.contains_key(fk_key) {
                        return Err(format!(
                            "'{}' on column '{}' requires foreign_key to be true",
                            fk_key, name
                        ));
                    }
                }
                None
            }
            Some(_) => {
                return Err(format!("foreign_key for column '{}' must be a boolean", name));
            }
        };

        if primary_key {
            if !column_type.supports_primary_key() {
                return Err(format!(
                    "column '{}' cannot be a primary key: only integer, serial and varchar columns can",
                    name
                ));
            }
            if nullable == Some(true) {
                return Err(format!(
                    "primary key column '{}' cannot allow null values",
                    name
                ));
            }
            if default.is_some() {
                return Err(format!(
                    "primary key column '{}' cannot have a default value",
                    name
                ));
            }
        }

        let serial_start = match spec.get("serial_start") {
            Some(v) => Some(v.as_i64().ok_or_else(|| {
                format!("serial_start for column '{}' must be an integer", name)
            })?),
            None => None,
        };
        let serial_increment = match spec.get("serial_increment") {
            Some(v) => Some(v.as_i64().ok_or_else(|| {
                format!("serial_increment for column '{}' must be an integer", name)
            })?),
            None => None,
        };

        let comments = match spec.get("comments") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(format!("comments for column '{}' must be a string", name)),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            column_type,
            nullable,
            unique,
            default,
            primary_key,
            foreign_key,
            serial_start,
            serial_increment,
            comments,
        })
    }

    fn parse_foreign_key(
        name: &str,
        spec: &serde_json::Map<String, Value>,
        nullable: Option<bool>,
    ) -> Result<ForeignKeySpec, String> {
        let get = |key: &str| -> Result<String, String> {
            spec.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    format!("'{}' is required for foreign key column '{}'", key, name)
                })
        };
        let reference_table = get("reference_table")?;
        let reference_column = get("reference_column")?;
        ensure_safe(&reference_table)?;
        ensure_safe(&reference_column)?;

        let on_event = get("on_event")?.to_uppercase();
        if !FK_EVENTS.contains(&on_event.as_str()) {
            return Err(format!(
                "on_event for column '{}' must be one of {:?}",
                name, FK_EVENTS
            ));
        }
        let event_action = get("event_action")?.to_uppercase();
        if !FK_ACTIONS.contains(&event_action.as_str()) {
            return Err(format!(
                "event_action for column '{}' must be one of {:?}",
                name, FK_ACTIONS
            ));
        }
        if event_action == "SET NULL" && nullable == Some(false) {
            return Err(format!(
                "column '{}' forbids null values, so the foreign key cannot use SET NULL",
                name
            ));
        }

        Ok(ForeignKeySpec {
            reference_table,
            reference_column,
            on_event,
            event_action,
        })
    }

    /// Whether this column's default is a CREATETIME/UPDATETIME token
    /// applicable to its type
    pub fn time_rule(&self) -> Option<&'static str> {
        if !self.column_type.supports_time_rules() {
            return None;
        }
        match self.default.as_ref().and_then(Value::as_str) {
            Some(CREATETIME) => Some(CREATETIME),
            Some(UPDATETIME) => Some(UPDATETIME),
            _ => None,
        }
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// Dynamic-access endpoints that can be enabled per table or view
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    #[serde(rename = "GET_ONE")]
    GetOne,
    #[serde(rename = "GET_ALL")]
    GetAll,
    #[serde(rename = "CREATE")]
    Create,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

impl Endpoint {
    /// The full endpoint universe
    pub fn all() -> Vec<Endpoint> {
        vec![
            Endpoint::GetOne,
            Endpoint::GetAll,
            Endpoint::Create,
            Endpoint::Update,
            Endpoint::Delete,
        ]
    }

    pub fn from_name(name: &str) -> Result<Self, String> {
        match name {
            "GET_ONE" => Ok(Endpoint::GetOne),
            "GET_ALL" => Ok(Endpoint::GetAll),
            "CREATE" => Ok(Endpoint::Create),
            "UPDATE" => Ok(Endpoint::Update),
            "DELETE" => Ok(Endpoint::Delete),
            other => Err(format!("'{}' is not a valid endpoint", other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::GetOne => "GET_ONE",
            Endpoint::GetAll => "GET_ALL",
            Endpoint::Create => "CREATE",
            Endpoint::Update => "UPDATE",
            Endpoint::Delete => "DELETE",
        }
    }
}

/// Expand an endpoint list that may carry the ALL/NONE sentinels.
///
/// ALL and NONE must appear alone; combining either with anything else in
/// the same list is rejected.
pub fn expand_endpoints(names: &[String]) -> Result<Vec<Endpoint>, String> {
    let has_all = names.iter().any(|n| n == "ALL");
    let has_none = names.iter().any(|n| n == "NONE");
    if (has_all || has_none) && names.len() > 1 {
        return Err("ALL and NONE cannot be combined with other endpoint entries".to_string());
    }
    if has_all {
        return Ok(Endpoint::all());
    }
    if has_none {
        return Ok(Vec::new());
    }
    let mut endpoints = Vec::new();
    for name in names {
        let ep = Endpoint::from_name(name)?;
        if !endpoints.contains(&ep) {
            endpoints.push(ep);
        }
    }
    Ok(endpoints)
}

// ============================================================================
// Special Rules & Constraints
// ============================================================================

/// Columns whose value is computed from the database clock at write time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecialRules {
    /// Filled with NOW() when the row is created
    #[serde(rename = "CREATETIME", default)]
    pub createtime: Vec<String>,
    /// Filled with NOW() when the row is created or updated
    #[serde(rename = "UPDATETIME", default)]
    pub updatetime: Vec<String>,
}

impl SpecialRules {
    pub fn is_empty(&self) -> bool {
        self.createtime.is_empty() && self.updatetime.is_empty()
    }
}

/// Table-level constraints beyond single-column modifiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Multi-column UNIQUE constraints, name -> column list
    #[serde(default)]
    pub unique: BTreeMap<String, Vec<String>>,
}
