//! View-definition types
//!
//! A managed view is defined either from SELECT/FROM/WHERE parts over a
//! managed table, or from raw SQL (plain or materialized), the latter two
//! reserved for admins.

use serde::{Deserialize, Serialize};

use crate::types::{expand_endpoints, Endpoint};

/// The defining query of a view; exactly one form may be used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materialized_view_raw_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_query: Option<String>,
}

/// Validated shape of a view body
#[derive(Debug, Clone, PartialEq)]
pub enum ViewForm {
    /// SELECT/FROM with an optional WHERE
    Select {
        select_query: String,
        from_table: String,
        where_query: Option<String>,
    },
    /// Raw SQL view (admin only)
    Raw(String),
    /// Raw SQL materialized view (admin only)
    MaterializedRaw(String),
}

impl ViewBody {
    /// Check the one-form invariant and return the validated shape.
    ///
    /// `raw_sql` and `materialized_view_raw_sql` exclude every other key;
    /// otherwise both `from_table` and `select_query` are required.
    pub fn resolve(&self) -> Result<ViewForm, String> {
        let has_select_parts = self.select_query.is_some()
            || self.from_table.is_some()
            || self.where_query.is_some();

        match (&self.raw_sql, &self.materialized_view_raw_sql) {
            (Some(_), Some(_)) => {
                Err("raw_sql and materialized_view_raw_sql cannot both be given".to_string())
            }
            (Some(sql), None) => {
                if has_select_parts {
                    return Err(
                        "raw_sql cannot be combined with select_query, from_table or where_query"
                            .to_string(),
                    );
                }
                Ok(ViewForm::Raw(sql.clone()))
            }
            (None, Some(sql)) => {
                if has_select_parts {
                    return Err(
                        "materialized_view_raw_sql cannot be combined with select_query, from_table or where_query"
                            .to_string(),
                    );
                }
                Ok(ViewForm::MaterializedRaw(sql.clone()))
            }
            (None, None) => {
                let select_query = self
                    .select_query
                    .clone()
                    .ok_or_else(|| "select_query is required".to_string())?;
                let from_table = self
                    .from_table
                    .clone()
                    .ok_or_else(|| "from_table is required".to_string())?;
                Ok(ViewForm::Select {
                    select_query,
                    from_table,
                    where_query: self.where_query.clone(),
                })
            }
        }
    }

    /// Whether this body defines a materialized view
    pub fn is_materialized(&self) -> bool {
        self.materialized_view_raw_sql.is_some()
    }

    /// Whether this body uses a raw-SQL form (admin-gated)
    pub fn is_raw(&self) -> bool {
        self.raw_sql.is_some() || self.materialized_view_raw_sql.is_some()
    }
}

/// Catalog record for one managed view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub id: i32,
    /// SQL view name, unique within the tenant
    pub view_name: String,
    pub root_url: String,
    pub tenant_id: String,
    pub endpoints: Vec<Endpoint>,
    pub comments: Option<String>,
    /// Role names required to read through the view; empty means open
    pub permission_rules: Vec<String>,
    pub view_definition: ViewBody,
}

impl ViewDefinition {
    /// Whether a caller holding `roles` may read this view
    pub fn readable_by(&self, roles: &[String]) -> bool {
        self.permission_rules
            .iter()
            .all(|required| roles.iter().any(|r| r == required))
    }

    /// Wire projection; `details = true` adds the defining query
    pub fn describe(&self, details: bool) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert("view_name".to_string(), self.view_name.clone().into());
        out.insert("view_id".to_string(), self.id.into());
        out.insert("root_url".to_string(), self.root_url.clone().into());
        out.insert("tenant".to_string(), self.tenant_id.clone().into());
        out.insert(
            "endpoints".to_string(),
            serde_json::to_value(&self.endpoints).unwrap_or(serde_json::Value::Null),
        );
        out.insert(
            "permission_rules".to_string(),
            self.permission_rules.clone().into(),
        );
        out.insert(
            "comments".to_string(),
            self.comments.clone().map_or(serde_json::Value::Null, Into::into),
        );
        if details {
            out.insert(
                "view_definition".to_string(),
                serde_json::to_value(&self.view_definition).unwrap_or(serde_json::Value::Null),
            );
        }
        serde_json::Value::Object(out)
    }
}

/// Request body for creating a managed view
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateViewRequest {
    pub view_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_rules: Option<Vec<String>>,
    #[serde(flatten)]
    pub view_definition: ViewBody,
}

impl CreateViewRequest {
    pub fn effective_root_url(&self) -> &str {
        self.root_url.as_deref().unwrap_or(&self.view_name)
    }

    /// Views only serve reads; writes cannot be enabled on them.
    pub fn resolve_endpoints(&self) -> Result<Vec<Endpoint>, String> {
        let endpoints = match &self.endpoints {
            Some(names) => expand_endpoints(names)?,
            None => vec![Endpoint::GetOne, Endpoint::GetAll],
        };
        for ep in &endpoints {
            if !matches!(ep, Endpoint::GetOne | Endpoint::GetAll) {
                return Err(format!("endpoint {} cannot be enabled on a view", ep.name()));
            }
        }
        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_select_form() {
        let body = ViewBody {
            select_query: Some("col_one, col_two".to_string()),
            from_table: Some("widgets".to_string()),
            where_query: Some("col_two > 5".to_string()),
            ..Default::default()
        };
        assert_eq!(
            body.resolve().unwrap(),
            ViewForm::Select {
                select_query: "col_one, col_two".to_string(),
                from_table: "widgets".to_string(),
                where_query: Some("col_two > 5".to_string()),
            }
        );
        assert!(!body.is_raw());
        assert!(!body.is_materialized());
    }

    #[test]
    fn test_resolve_select_form_requires_both_parts() {
        let body = ViewBody {
            select_query: Some("*".to_string()),
            ..Default::default()
        };
        assert!(body.resolve().is_err());

        let body = ViewBody {
            from_table: Some("widgets".to_string()),
            ..Default::default()
        };
        assert!(body.resolve().is_err());
    }

    #[test]
    fn test_resolve_raw_forms() {
        let body = ViewBody {
            raw_sql: Some("SELECT 1".to_string()),
            ..Default::default()
        };
        assert_eq!(body.resolve().unwrap(), ViewForm::Raw("SELECT 1".to_string()));
        assert!(body.is_raw());

        let body = ViewBody {
            materialized_view_raw_sql: Some("SELECT 1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            body.resolve().unwrap(),
            ViewForm::MaterializedRaw("SELECT 1".to_string())
        );
        assert!(body.is_materialized());
    }

    #[test]
    fn test_resolve_rejects_mixed_forms() {
        let body = ViewBody {
            raw_sql: Some("SELECT 1".to_string()),
            from_table: Some("widgets".to_string()),
            ..Default::default()
        };
        assert!(body.resolve().is_err());

        let body = ViewBody {
            raw_sql: Some("SELECT 1".to_string()),
            materialized_view_raw_sql: Some("SELECT 2".to_string()),
            ..Default::default()
        };
        assert!(body.resolve().is_err());
    }

    #[test]
    fn test_readable_by() {
        let def = ViewDefinition {
            id: 1,
            view_name: "v".to_string(),
            root_url: "v".to_string(),
            tenant_id: "dev".to_string(),
            endpoints: vec![Endpoint::GetAll],
            comments: None,
            permission_rules: vec!["finance".to_string(), "audit".to_string()],
            view_definition: ViewBody::default(),
        };
        let held = vec!["finance".to_string(), "audit".to_string(), "x".to_string()];
        assert!(def.readable_by(&held));
        assert!(!def.readable_by(&["finance".to_string()]));

        let open = ViewDefinition {
            permission_rules: vec![],
            ..def
        };
        assert!(open.readable_by(&[]));
    }

    #[test]
    fn test_create_view_request_flattens_body() {
        let req: CreateViewRequest = serde_json::from_value(json!({
            "view_name": "active_widgets",
            "select_query": "*",
            "from_table": "widgets"
        }))
        .unwrap();
        assert!(matches!(
            req.view_definition.resolve().unwrap(),
            ViewForm::Select { .. }
        ));
        assert_eq!(req.effective_root_url(), "active_widgets");
    }

    #[test]
    fn test_view_endpoints_reads_only() {
        let req: CreateViewRequest = serde_json::from_value(json!({
            "view_name": "v",
            "raw_sql": "SELECT 1"
        }))
        .unwrap();
        assert_eq!(
            req.resolve_endpoints().unwrap(),
            vec![Endpoint::GetOne, Endpoint::GetAll]
        );

        let req: CreateViewRequest = serde_json::from_value(json!({
            "view_name": "v",
            "raw_sql": "SELECT 1",
            "endpoints": ["CREATE"]
        }))
        .unwrap();
        assert!(req.resolve_endpoints().is_err());
    }
}
