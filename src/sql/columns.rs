//! Column-definition compilation
//!
//! Turns a user-supplied column specification map into CREATE TABLE DDL, a
//! primary-key decision, special time rules, and the per-column specs the
//! validator compiler works from. All rejection happens here, before any
//! SQL is executed.

use serde_json::Value;

use crate::config::ServiceConfig;
use crate::sql::sanitize::ensure_safe;
use crate::types::{ColumnSpec, ColumnType, Constraints, SpecialRules, CREATETIME, UPDATETIME};

/// Result of compiling a full table specification
#[derive(Debug, Clone)]
pub struct CompiledTable {
    /// Complete CREATE TABLE statement
    pub create_ddl: String,
    /// Name of the primary-key column (supplied or synthesized)
    pub primary_key: String,
    /// CREATETIME/UPDATETIME column buckets
    pub special_rules: SpecialRules,
    /// Parsed column specs, in input order, synthesized PK excluded
    pub columns: Vec<ColumnSpec>,
}

/// Result of compiling a single added column
#[derive(Debug, Clone)]
pub struct CompiledColumn {
    /// ALTER TABLE .. ADD COLUMN statement
    pub ddl: String,
    pub spec: ColumnSpec,
}

/// Compiler from column specification maps to DDL
pub struct TableCompiler<'a> {
    config: &'a ServiceConfig,
}

impl<'a> TableCompiler<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    /// Compile a full table specification into CREATE TABLE DDL.
    ///
    /// `existing_enums` holds the unqualified enum type names already
    /// defined for the tenant. Exactly one column may carry
    /// `primary_key: true`; when none does, `{table_name}_id SERIAL
    /// PRIMARY KEY` is synthesized as an implicit first column.
    pub fn compile_create_table(
        &self,
        tenant: &str,
        table_name: &str,
        column_specs: &serde_json::Map<String, Value>,
        constraints: &Constraints,
        existing_enums: &[String],
    ) -> Result<CompiledTable, String> {
        ensure_safe(tenant)?;
        ensure_safe(table_name)?;
        if column_specs.is_empty() {
            return Err("at least one column is required".to_string());
        }

        let mut columns = Vec::with_capacity(column_specs.len());
        let mut primary_key: Option<String> = None;
        let mut special_rules = SpecialRules::default();
        let mut clauses = Vec::new();

        for (name, raw) in column_specs {
            let spec_map = raw.as_object().ok_or_else(|| {
                format!("the definition of column '{}' must be an object", name)
            })?;
            let col = ColumnSpec::parse(name, spec_map, tenant, existing_enums)?;

            if col.primary_key {
                if let Some(existing) = &primary_key {
                    return Err(format!(
                        "only one primary key column is allowed, found '{}' and '{}'",
                        existing, col.name
                    ));
                }
                primary_key = Some(col.name.clone());
            }

            match col.time_rule() {
                Some(CREATETIME) => special_rules.createtime.push(col.name.clone()),
                Some(UPDATETIME) => special_rules.updatetime.push(col.name.clone()),
                _ => {}
            }

            clauses.push(self.format_column_clause(tenant, &col)?);
            columns.push(col);
        }

        let primary_key = match primary_key {
            Some(pk) => pk,
            None => {
                let pk = format!("{}_id", table_name);
                clauses.insert(0, format!("{} SERIAL PRIMARY KEY", pk));
                pk
            }
        };

        for clause in compile_unique_constraints(constraints)? {
            clauses.push(clause);
        }

        let create_ddl = format!(
            "CREATE TABLE {}.{} ({})",
            tenant,
            table_name,
            clauses.join(", ")
        );

        Ok(CompiledTable {
            create_ddl,
            primary_key,
            special_rules,
            columns,
        })
    }

    /// Compile a single column for ALTER TABLE .. ADD COLUMN.
    ///
    /// SERIAL cannot be added to an existing table directly, so it is
    /// rewritten to an integer identity column using the configured (or
    /// per-column) start and increment.
    pub fn compile_add_column(
        &self,
        tenant: &str,
        table_name: &str,
        column_name: &str,
        spec_map: &serde_json::Map<String, Value>,
        existing_enums: &[String],
    ) -> Result<CompiledColumn, String> {
        ensure_safe(tenant)?;
        ensure_safe(table_name)?;
        let spec = ColumnSpec::parse(column_name, spec_map, tenant, existing_enums)?;
        if spec.primary_key {
            return Err(format!(
                "column '{}' cannot be added as a primary key to an existing table",
                column_name
            ));
        }

        let clause = if spec.column_type == ColumnType::Serial {
            let start = spec.serial_start.unwrap_or(self.config.serial_start);
            let increment = spec.serial_increment.unwrap_or(self.config.serial_increment);
            let mut parts = vec![format!(
                "{} INTEGER GENERATED BY DEFAULT AS IDENTITY (START WITH {} INCREMENT BY {})",
                spec.name, start, increment
            )];
            self.push_modifiers(&mut parts, tenant, &spec)?;
            parts.join(" ")
        } else {
            self.format_column_clause(tenant, &spec)?
        };

        let ddl = format!("ALTER TABLE {}.{} ADD COLUMN {}", tenant, table_name, clause);
        Ok(CompiledColumn { ddl, spec })
    }

    /// Format one column clause for CREATE TABLE
    fn format_column_clause(&self, tenant: &str, col: &ColumnSpec) -> Result<String, String> {
        let mut parts = vec![format!("{} {}", col.name, col.column_type.to_sql_type())];
        self.push_modifiers(&mut parts, tenant, col)?;
        Ok(parts.join(" "))
    }

    fn push_modifiers(
        &self,
        parts: &mut Vec<String>,
        tenant: &str,
        col: &ColumnSpec,
    ) -> Result<(), String> {
        if let Some(fk) = &col.foreign_key {
            parts.push(format!(
                "REFERENCES {}.{}({}) {} {}",
                tenant, fk.reference_table, fk.reference_column, fk.on_event, fk.event_action
            ));
        }
        if col.nullable == Some(false) {
            parts.push("NOT NULL".to_string());
        }
        if col.unique {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default) = &col.default {
            parts.push(format!("DEFAULT {}", format_default(col, default)?));
        }
        if col.primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        Ok(())
    }
}

/// Render a column's DEFAULT expression.
///
/// CREATETIME/UPDATETIME tokens on temporal columns become NOW(); numeric
/// and boolean values pass through bare; strings are quoted as literals.
pub(crate) fn format_default(col: &ColumnSpec, default: &Value) -> Result<String, String> {
    if col.time_rule().is_some() {
        return Ok("NOW()".to_string());
    }
    match default {
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string().to_uppercase()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        other => Err(format!(
            "default value {} for column '{}' must be a string, number or boolean",
            other, col.name
        )),
    }
}

/// Compile the multi-column UNIQUE constraint map into DDL clauses.
///
/// Each entry needs a safe name and at least two safe string column names.
pub fn compile_unique_constraints(constraints: &Constraints) -> Result<Vec<String>, String> {
    let mut clauses = Vec::new();
    for (name, cols) in &constraints.unique {
        ensure_safe(name)?;
        if cols.len() < 2 {
            return Err(format!(
                "unique constraint '{}' must span at least two columns",
                name
            ));
        }
        for col in cols {
            ensure_safe(col)?;
        }
        clauses.push(format!("CONSTRAINT {} UNIQUE ({})", name, cols.join(", ")));
    }
    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ServiceConfig {
        ServiceConfig::builder("postgres://localhost/test").build()
    }

    fn cols(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    // ==================== CREATE TABLE Compilation ====================

    #[test]
    fn test_compile_synthesizes_primary_key() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "col_one": {"data_type": "varchar", "char_len": 255, "null": true},
            "col_three": {"data_type": "integer", "null": true}
        }));

        let compiled = compiler
            .compile_create_table("dev", "widgets", &columns, &Constraints::default(), &[])
            .unwrap();

        assert_eq!(compiled.primary_key, "widgets_id");
        assert!(
            compiled
                .create_ddl
                .starts_with("CREATE TABLE dev.widgets (widgets_id SERIAL PRIMARY KEY, ")
        );
        assert!(compiled.create_ddl.contains("col_one VARCHAR(255)"));
        assert!(compiled.create_ddl.contains("col_three INTEGER"));
        assert_eq!(compiled.columns.len(), 2);
    }

    #[test]
    fn test_compile_user_primary_key() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "sku": {"data_type": "varchar", "char_len": 32, "primary_key": true},
            "label": {"data_type": "text"}
        }));

        let compiled = compiler
            .compile_create_table("dev", "items", &columns, &Constraints::default(), &[])
            .unwrap();

        assert_eq!(compiled.primary_key, "sku");
        assert!(compiled.create_ddl.contains("sku VARCHAR(32) PRIMARY KEY"));
        assert!(!compiled.create_ddl.contains("items_id"));
    }

    #[test]
    fn test_compile_two_primary_keys_rejected() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "one": {"data_type": "integer", "primary_key": true},
            "two": {"data_type": "integer", "primary_key": true}
        }));

        let result =
            compiler.compile_create_table("dev", "items", &columns, &Constraints::default(), &[]);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("only one primary key"));
    }

    #[test]
    fn test_compile_modifiers() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "email": {"data_type": "varchar", "char_len": 128, "null": false, "unique": true},
            "status": {"data_type": "text", "default": "pending"},
            "attempts": {"data_type": "integer", "default": 0},
            "active": {"data_type": "boolean", "default": true}
        }));

        let compiled = compiler
            .compile_create_table("dev", "accounts", &columns, &Constraints::default(), &[])
            .unwrap();

        assert!(
            compiled
                .create_ddl
                .contains("email VARCHAR(128) NOT NULL UNIQUE")
        );
        assert!(compiled.create_ddl.contains("status TEXT DEFAULT 'pending'"));
        assert!(compiled.create_ddl.contains("attempts INTEGER DEFAULT 0"));
        assert!(compiled.create_ddl.contains("active BOOLEAN DEFAULT TRUE"));
    }

    #[test]
    fn test_compile_string_default_escapes_quotes() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "label": {"data_type": "text", "default": "it's"}
        }));

        let compiled = compiler
            .compile_create_table("dev", "notes", &columns, &Constraints::default(), &[])
            .unwrap();
        assert!(compiled.create_ddl.contains("DEFAULT 'it''s'"));
    }

    #[test]
    fn test_compile_time_rules() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "created": {"data_type": "timestamp", "default": "CREATETIME"},
            "touched": {"data_type": "timestamp", "default": "UPDATETIME"},
            "note": {"data_type": "text", "default": "CREATETIME"}
        }));

        let compiled = compiler
            .compile_create_table("dev", "events", &columns, &Constraints::default(), &[])
            .unwrap();

        assert_eq!(compiled.special_rules.createtime, vec!["created"]);
        assert_eq!(compiled.special_rules.updatetime, vec!["touched"]);
        assert!(compiled.create_ddl.contains("created TIMESTAMP DEFAULT NOW()"));
        assert!(compiled.create_ddl.contains("touched TIMESTAMP DEFAULT NOW()"));
        // Non-temporal columns keep the literal
        assert!(compiled.create_ddl.contains("note TEXT DEFAULT 'CREATETIME'"));
    }

    #[test]
    fn test_compile_foreign_key_clause() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "owner": {
                "data_type": "integer",
                "foreign_key": true,
                "reference_table": "owners",
                "reference_column": "owners_id",
                "on_event": "ON DELETE",
                "event_action": "CASCADE"
            }
        }));

        let compiled = compiler
            .compile_create_table("dev", "pets", &columns, &Constraints::default(), &[])
            .unwrap();
        assert!(
            compiled
                .create_ddl
                .contains("owner INTEGER REFERENCES dev.owners(owners_id) ON DELETE CASCADE")
        );
    }

    #[test]
    fn test_compile_enum_column() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "col_two": {"data_type": "animals"}
        }));
        let enums = vec!["animals".to_string()];

        let compiled = compiler
            .compile_create_table("dev", "pets", &columns, &Constraints::default(), &enums)
            .unwrap();
        assert!(compiled.create_ddl.contains("col_two dev.animals"));
    }

    #[test]
    fn test_compile_empty_columns_rejected() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = serde_json::Map::new();
        assert!(
            compiler
                .compile_create_table("dev", "empty", &columns, &Constraints::default(), &[])
                .is_err()
        );
    }

    #[test]
    fn test_compile_unsafe_table_name_rejected() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({"a": {"data_type": "text"}}));
        assert!(
            compiler
                .compile_create_table("dev", "bad;name", &columns, &Constraints::default(), &[])
                .is_err()
        );
    }

    #[test]
    fn test_compile_preserves_input_order() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "zeta": {"data_type": "text"},
            "alpha": {"data_type": "text"},
            "mid": {"data_type": "text"}
        }));

        let compiled = compiler
            .compile_create_table("dev", "ordered", &columns, &Constraints::default(), &[])
            .unwrap();
        let zeta = compiled.create_ddl.find("zeta").unwrap();
        let alpha = compiled.create_ddl.find("alpha").unwrap();
        let mid = compiled.create_ddl.find("mid ").unwrap();
        assert!(zeta < alpha && alpha < mid);
    }

    // ==================== UNIQUE Constraints ====================

    #[test]
    fn test_unique_constraints_compiled() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let columns = cols(json!({
            "col_one": {"data_type": "text"},
            "col_two": {"data_type": "text"}
        }));
        let constraints: Constraints = serde_json::from_value(json!({
            "unique": {"unique_pair": ["col_one", "col_two"]}
        }))
        .unwrap();

        let compiled = compiler
            .compile_create_table("dev", "widgets", &columns, &constraints, &[])
            .unwrap();
        assert!(
            compiled
                .create_ddl
                .contains("CONSTRAINT unique_pair UNIQUE (col_one, col_two)")
        );
    }

    #[test]
    fn test_unique_constraint_needs_two_columns() {
        let constraints: Constraints = serde_json::from_value(json!({
            "unique": {"solo": ["col_one"]}
        }))
        .unwrap();
        let result = compile_unique_constraints(&constraints);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("at least two"));
    }

    #[test]
    fn test_unique_constraint_unsafe_name() {
        let constraints: Constraints = serde_json::from_value(json!({
            "unique": {"bad name": ["a", "b"]}
        }))
        .unwrap();
        assert!(compile_unique_constraints(&constraints).is_err());
    }

    // ==================== ADD COLUMN Compilation ====================

    #[test]
    fn test_add_column_basic() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let spec = cols(json!({"data_type": "varchar", "char_len": 64, "null": false}));

        let compiled = compiler
            .compile_add_column("dev", "widgets", "nickname", &spec, &[])
            .unwrap();
        assert_eq!(
            compiled.ddl,
            "ALTER TABLE dev.widgets ADD COLUMN nickname VARCHAR(64) NOT NULL"
        );
    }

    #[test]
    fn test_add_column_serial_becomes_identity() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let spec = cols(json!({"data_type": "serial"}));

        let compiled = compiler
            .compile_add_column("dev", "widgets", "seq", &spec, &[])
            .unwrap();
        assert!(compiled.ddl.contains(
            "seq INTEGER GENERATED BY DEFAULT AS IDENTITY (START WITH 1 INCREMENT BY 1)"
        ));
    }

    #[test]
    fn test_add_column_serial_tuning() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let spec = cols(json!({
            "data_type": "serial",
            "serial_start": 100,
            "serial_increment": 5
        }));

        let compiled = compiler
            .compile_add_column("dev", "widgets", "seq", &spec, &[])
            .unwrap();
        assert!(compiled.ddl.contains("START WITH 100 INCREMENT BY 5"));
    }

    #[test]
    fn test_add_column_primary_key_rejected() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let spec = cols(json!({"data_type": "integer", "primary_key": true}));
        assert!(
            compiler
                .compile_add_column("dev", "widgets", "num", &spec, &[])
                .is_err()
        );
    }

    #[test]
    fn test_add_column_time_rule() {
        let config = config();
        let compiler = TableCompiler::new(&config);
        let spec = cols(json!({"data_type": "timestamp", "default": "UPDATETIME"}));

        let compiled = compiler
            .compile_add_column("dev", "widgets", "touched", &spec, &[])
            .unwrap();
        assert!(compiled.ddl.contains("DEFAULT NOW()"));
        assert_eq!(compiled.spec.time_rule(), Some(UPDATETIME));
    }
}
