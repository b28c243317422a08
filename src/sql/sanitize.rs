//! SQL identifier and value sanitization
//!
//! Every user-supplied token that ends up interpolated into SQL text (table,
//! column, constraint and enum names, enum labels) must pass through this
//! gate first. Values bound as parameters do not need it.

use regex::Regex;

/// Characters that disqualify a token from ever appearing in SQL text.
///
/// Covers quoting and escape characters, statement punctuation, comment
/// markers, and pattern metacharacters.
const SAFE_PATTERN: &str = r#"^[^<>\\/{}\[\]~` $'".:;=?#@!&()*+,\-]*$"#;

/// Check whether a token is free of SQL metacharacters
///
/// # Example
/// ```
/// use dyntable::sql::is_safe;
///
/// assert!(is_safe("col_one"));
/// assert!(!is_safe("col;drop table x"));
/// assert!(!is_safe("na'me"));
/// ```
pub fn is_safe(token: &str) -> bool {
    let re = Regex::new(SAFE_PATTERN).unwrap();
    !token.is_empty() && re.is_match(token)
}

/// Validate a token for interpolation into SQL text
///
/// # Returns
/// Ok(()) if the token is safe, Err with a message naming the token otherwise
pub fn ensure_safe(token: &str) -> Result<(), String> {
    if token.is_empty() {
        return Err("Identifier cannot be empty.".to_string());
    }
    if !is_safe(token) {
        return Err(format!(
            "The identifier or value '{}' contains forbidden characters and cannot be used.",
            token
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // is_safe Tests
    // =========================================================================

    #[test]
    fn test_is_safe_simple() {
        assert!(is_safe("products"));
        assert!(is_safe("col_one"));
        assert!(is_safe("my_table_123"));
        assert!(is_safe("a"));
    }

    #[test]
    fn test_is_safe_uppercase_allowed() {
        // Case is a style question, not a safety one
        assert!(is_safe("Products"));
        assert!(is_safe("CREATETIME"));
    }

    #[test]
    fn test_is_safe_rejects_quotes() {
        assert!(!is_safe("col'one"));
        assert!(!is_safe("col\"one"));
        assert!(!is_safe("col`one"));
    }

    #[test]
    fn test_is_safe_rejects_statement_punctuation() {
        assert!(!is_safe("col;drop table x"));
        assert!(!is_safe("col,two"));
        assert!(!is_safe("col.two"));
        assert!(!is_safe("a=b"));
        assert!(!is_safe("fn(x)"));
    }

    #[test]
    fn test_is_safe_rejects_comment_markers() {
        assert!(!is_safe("col--x"));
        assert!(!is_safe("col#x"));
        assert!(!is_safe("col/*x"));
    }

    #[test]
    fn test_is_safe_rejects_escapes_and_wildcards() {
        assert!(!is_safe("col\\one"));
        assert!(!is_safe("col~one"));
        assert!(!is_safe("col*"));
        assert!(!is_safe("col?"));
        assert!(!is_safe("col@host"));
        assert!(!is_safe("col!"));
        assert!(!is_safe("col$1"));
        assert!(!is_safe("col&two"));
        assert!(!is_safe("col+two"));
    }

    #[test]
    fn test_is_safe_rejects_brackets_and_space() {
        assert!(!is_safe("col[0]"));
        assert!(!is_safe("col{0}"));
        assert!(!is_safe("col<two>"));
        assert!(!is_safe("col two"));
    }

    #[test]
    fn test_is_safe_empty() {
        assert!(!is_safe(""));
    }

    // =========================================================================
    // ensure_safe Tests
    // =========================================================================

    #[test]
    fn test_ensure_safe_ok() {
        assert!(ensure_safe("col_one").is_ok());
        assert!(ensure_safe("animals").is_ok());
    }

    #[test]
    fn test_ensure_safe_empty() {
        let result = ensure_safe("");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("empty"));
    }

    #[test]
    fn test_ensure_safe_names_offending_token() {
        let result = ensure_safe("bad;name");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("bad;name"));
    }
}
