//! DDL statement builders for schema, table, enum and view management
//!
//! Every identifier passed in here must already have cleared the sanitizer;
//! these functions only assemble statement text.

/// CREATE SCHEMA IF NOT EXISTS for a tenant namespace
pub fn create_schema(tenant: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", tenant)
}

/// DROP SCHEMA with everything in it
pub fn drop_schema(tenant: &str) -> String {
    format!("DROP SCHEMA IF EXISTS {} CASCADE", tenant)
}

/// DROP TABLE for a managed table
pub fn drop_table(tenant: &str, table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}.{} CASCADE", tenant, table_name)
}

/// Rename a managed table
pub fn rename_table(tenant: &str, old_name: &str, new_name: &str) -> String {
    format!("ALTER TABLE {}.{} RENAME TO {}", tenant, old_name, new_name)
}

/// Drop one column
pub fn drop_column(tenant: &str, table_name: &str, column: &str) -> String {
    format!("ALTER TABLE {}.{} DROP COLUMN {}", tenant, table_name, column)
}

/// Change a column's data type
pub fn alter_column_type(tenant: &str, table_name: &str, column: &str, sql_type: &str) -> String {
    format!(
        "ALTER TABLE {}.{} ALTER COLUMN {} TYPE {}",
        tenant, table_name, column, sql_type
    )
}

/// Set a column default; `default_expr` is already rendered SQL
pub fn set_column_default(
    tenant: &str,
    table_name: &str,
    column: &str,
    default_expr: &str,
) -> String {
    format!(
        "ALTER TABLE {}.{} ALTER COLUMN {} SET DEFAULT {}",
        tenant, table_name, column, default_expr
    )
}

/// Drop a column default
pub fn drop_column_default(tenant: &str, table_name: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {}.{} ALTER COLUMN {} DROP DEFAULT",
        tenant, table_name, column
    )
}

/// CREATE TYPE .. AS ENUM with quoted labels
pub fn create_enum(tenant: &str, enum_name: &str, labels: &[String]) -> String {
    let quoted: Vec<String> = labels.iter().map(|l| format!("'{}'", l)).collect();
    format!(
        "CREATE TYPE {}.{} AS ENUM ({})",
        tenant,
        enum_name,
        quoted.join(", ")
    )
}

/// CREATE OR REPLACE VIEW from SELECT/FROM/WHERE parts
pub fn create_view(
    tenant: &str,
    view_name: &str,
    select_query: &str,
    from_table: &str,
    where_query: Option<&str>,
) -> String {
    let mut sql = format!(
        "CREATE OR REPLACE VIEW {}.{} AS SELECT {} FROM {}.{}",
        tenant, view_name, select_query, tenant, from_table
    );
    if let Some(where_query) = where_query {
        sql.push_str(&format!(" WHERE {}", where_query));
    }
    sql
}

/// CREATE VIEW from raw SQL (admin-gated by the caller)
pub fn create_view_raw(tenant: &str, view_name: &str, raw_sql: &str) -> String {
    format!("CREATE OR REPLACE VIEW {}.{} AS {}", tenant, view_name, raw_sql)
}

/// CREATE MATERIALIZED VIEW from raw SQL (admin-gated by the caller)
pub fn create_materialized_view_raw(tenant: &str, view_name: &str, raw_sql: &str) -> String {
    format!(
        "CREATE MATERIALIZED VIEW {}.{} AS {}",
        tenant, view_name, raw_sql
    )
}

/// DROP a view or materialized view
pub fn drop_view(tenant: &str, view_name: &str, materialized: bool) -> String {
    let kind = if materialized { "MATERIALIZED VIEW" } else { "VIEW" };
    format!("DROP {} IF EXISTS {}.{} CASCADE", kind, tenant, view_name)
}

/// REFRESH a materialized view
pub fn refresh_materialized_view(tenant: &str, view_name: &str) -> String {
    format!("REFRESH MATERIALIZED VIEW {}.{}", tenant, view_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements() {
        assert_eq!(create_schema("dev"), "CREATE SCHEMA IF NOT EXISTS dev");
        assert_eq!(drop_schema("dev"), "DROP SCHEMA IF EXISTS dev CASCADE");
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(
            drop_table("dev", "widgets"),
            "DROP TABLE IF EXISTS dev.widgets CASCADE"
        );
    }

    #[test]
    fn test_rename_table() {
        assert_eq!(
            rename_table("dev", "widgets", "gadgets"),
            "ALTER TABLE dev.widgets RENAME TO gadgets"
        );
    }

    #[test]
    fn test_column_alters() {
        assert_eq!(
            drop_column("dev", "widgets", "old"),
            "ALTER TABLE dev.widgets DROP COLUMN old"
        );
        assert_eq!(
            alter_column_type("dev", "widgets", "label", "VARCHAR(64)"),
            "ALTER TABLE dev.widgets ALTER COLUMN label TYPE VARCHAR(64)"
        );
        assert_eq!(
            set_column_default("dev", "widgets", "status", "'pending'"),
            "ALTER TABLE dev.widgets ALTER COLUMN status SET DEFAULT 'pending'"
        );
        assert_eq!(
            drop_column_default("dev", "widgets", "status"),
            "ALTER TABLE dev.widgets ALTER COLUMN status DROP DEFAULT"
        );
    }

    #[test]
    fn test_create_enum() {
        let labels = vec!["cat".to_string(), "dog".to_string()];
        assert_eq!(
            create_enum("dev", "animals", &labels),
            "CREATE TYPE dev.animals AS ENUM ('cat', 'dog')"
        );
    }

    #[test]
    fn test_create_view_with_where() {
        let sql = create_view("dev", "active_widgets", "*", "widgets", Some("active = true"));
        assert_eq!(
            sql,
            "CREATE OR REPLACE VIEW dev.active_widgets AS SELECT * FROM dev.widgets WHERE active = true"
        );
    }

    #[test]
    fn test_create_view_without_where() {
        let sql = create_view("dev", "all_widgets", "col_one, col_two", "widgets", None);
        assert_eq!(
            sql,
            "CREATE OR REPLACE VIEW dev.all_widgets AS SELECT col_one, col_two FROM dev.widgets"
        );
    }

    #[test]
    fn test_raw_view_forms() {
        assert_eq!(
            create_view_raw("dev", "v", "SELECT 1"),
            "CREATE OR REPLACE VIEW dev.v AS SELECT 1"
        );
        assert_eq!(
            create_materialized_view_raw("dev", "v", "SELECT 1"),
            "CREATE MATERIALIZED VIEW dev.v AS SELECT 1"
        );
    }

    #[test]
    fn test_drop_and_refresh_view() {
        assert_eq!(
            drop_view("dev", "v", false),
            "DROP VIEW IF EXISTS dev.v CASCADE"
        );
        assert_eq!(
            drop_view("dev", "v", true),
            "DROP MATERIALIZED VIEW IF EXISTS dev.v CASCADE"
        );
        assert_eq!(
            refresh_materialized_view("dev", "v"),
            "REFRESH MATERIALIZED VIEW dev.v"
        );
    }
}
