//! Error types for table service operations

use thiserror::Error;

/// Errors that can occur while managing or querying dynamic tables
#[derive(Debug, Error)]
pub enum TableServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schema compile error: {0}")]
    SchemaCompile(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TableServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn schema_compile(msg: impl Into<String>) -> Self {
        Self::SchemaCompile(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// HTTP status code for this error.
    ///
    /// Validation, compile, conflict and caller-caused database errors map
    /// to 400, missing records to 404, missing roles to 403, and
    /// infrastructure failures to 500.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::SchemaCompile(_) | Self::Conflict(_) => 400,
            Self::NotFound(_) => 404,
            Self::Permission(_) => 403,
            Self::Database(_) => 400,
            Self::Sql(sqlx::Error::RowNotFound) => 404,
            Self::Sql(sqlx::Error::Database(_)) => 400,
            Self::Sql(_) | Self::Json(_) => 500,
        }
    }

    /// Message suitable for a client response.
    ///
    /// Raw driver errors are replaced with a generic message; the original
    /// text stays available through `Display` for logging.
    pub fn client_message(&self) -> String {
        match self {
            Self::Sql(sqlx::Error::RowNotFound) => "record not found".to_string(),
            Self::Sql(sqlx::Error::Database(e)) => {
                format!("database rejected the operation: {}", e.constraint().unwrap_or("constraint or type violation"))
            }
            Self::Sql(_) => "internal database error".to_string(),
            Self::Json(_) => "internal serialization error".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TableServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(TableServiceError::validation("bad").http_status(), 400);
        assert_eq!(TableServiceError::schema_compile("bad").http_status(), 400);
        assert_eq!(TableServiceError::not_found("gone").http_status(), 404);
        assert_eq!(TableServiceError::conflict("dup").http_status(), 400);
        assert_eq!(TableServiceError::permission("nope").http_status(), 403);
        assert_eq!(
            TableServiceError::Sql(sqlx::Error::RowNotFound).http_status(),
            404
        );
        assert_eq!(
            TableServiceError::Sql(sqlx::Error::PoolTimedOut).http_status(),
            500
        );
    }

    #[test]
    fn test_client_message_redacts_driver_errors() {
        let err = TableServiceError::Sql(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(), "internal database error");

        let err = TableServiceError::validation("column name rejected");
        assert_eq!(err.client_message(), "Validation error: column name rejected");
    }
}
