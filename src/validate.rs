//! Payload validator compilation and enforcement
//!
//! Every managed table carries two structural validators derived from its
//! column definition: the create validator honors nullability, the update
//! validator never requires a field. Both are recompiled on every column
//! mutation so they can never drift from the live column set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ColumnSpec;

/// Structural rule for one field of a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// "string", "integer" or "boolean"
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxlength: Option<u32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// Field name -> rule
pub type ValidatorSchema = BTreeMap<String, FieldRule>;

/// Compile the create and update validators from parsed column specs.
///
/// The update validator is the create validator with `required` forced off
/// everywhere: a partial update must never fail because the table requires
/// a field at creation.
pub fn compile_validators(columns: &[ColumnSpec]) -> (ValidatorSchema, ValidatorSchema) {
    let mut create = ValidatorSchema::new();
    for col in columns {
        let non_nullable = col.nullable == Some(false);
        create.insert(
            col.name.clone(),
            FieldRule {
                field_type: col.column_type.validator_type().to_string(),
                maxlength: col.column_type.max_length(),
                required: non_nullable,
                nullable: !non_nullable,
            },
        );
    }

    let mut update = create.clone();
    for rule in update.values_mut() {
        rule.required = false;
    }
    (create, update)
}

/// Check a payload object against a validator schema.
///
/// Rejects unknown fields, missing required fields, nulls in non-nullable
/// fields, type mismatches, and over-length strings.
pub fn validate_payload(
    data: &serde_json::Map<String, Value>,
    schema: &ValidatorSchema,
) -> Result<(), String> {
    for field in data.keys() {
        if !schema.contains_key(field) {
            return Err(format!("'{}' is not a known field", field));
        }
    }

    for (field, rule) in schema {
        match data.get(field) {
            None => {
                if rule.required {
                    return Err(format!("'{}' is a required field", field));
                }
            }
            Some(Value::Null) => {
                if !rule.nullable {
                    return Err(format!("'{}' may not be null", field));
                }
            }
            Some(value) => {
                check_type(field, value, rule)?;
            }
        }
    }
    Ok(())
}

fn check_type(field: &str, value: &Value, rule: &FieldRule) -> Result<(), String> {
    match rule.field_type.as_str() {
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("'{}' must be a string", field))?;
            if let Some(max) = rule.maxlength {
                if s.chars().count() > max as usize {
                    return Err(format!(
                        "'{}' is longer than the maximum length of {}",
                        field, max
                    ));
                }
            }
            Ok(())
        }
        "integer" => {
            if value.as_i64().is_some() {
                Ok(())
            } else {
                Err(format!("'{}' must be an integer", field))
            }
        }
        "boolean" => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(format!("'{}' must be a boolean", field))
            }
        }
        other => Err(format!(
            "field '{}' has an unknown validator type '{}'",
            field, other
        )),
    }
}
