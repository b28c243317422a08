//! Capability model and role provisioning
//!
//! Callers carry a list of role strings. Each capability maps to one role
//! name derived from the configured service prefix, and higher capabilities
//! satisfy lower ones: admin implies write, write implies read.

use tracing::{debug, info};

use crate::error::{Result, TableServiceError};
use crate::sql::sanitize::ensure_safe;
use crate::store::TableService;

/// What a caller is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    Read,
    Write,
    Admin,
}

impl Capability {
    /// All capabilities, weakest first
    pub fn all() -> [Capability; 3] {
        [Capability::Read, Capability::Write, Capability::Admin]
    }

    fn suffix(&self) -> &'static str {
        match self {
            Capability::Read => "READ",
            Capability::Write => "WRITE",
            Capability::Admin => "ADMIN",
        }
    }

    /// The role string granting this capability under `prefix`
    pub fn role_name(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.suffix())
    }
}

/// Check that `roles` grants `capability`.
///
/// A role for a stronger capability also passes; an empty role list never
/// does.
pub fn require(roles: &[String], capability: Capability, prefix: &str) -> Result<()> {
    let granted = Capability::all()
        .into_iter()
        .filter(|c| c >= &capability)
        .any(|c| {
            let name = c.role_name(prefix);
            roles.iter().any(|r| r == &name)
        });
    if granted {
        return Ok(());
    }
    debug!(?capability, "capability check failed");
    Err(TableServiceError::permission(format!(
        "{} access required",
        capability.suffix().to_lowercase()
    )))
}

impl TableService {
    /// Check a caller's roles against a capability using the configured
    /// role prefix
    pub fn require_capability(&self, roles: &[String], capability: Capability) -> Result<()> {
        require(roles, capability, &self.config().role_prefix)
    }

    /// Create the three capability roles if they do not exist.
    ///
    /// CREATE ROLE has no IF NOT EXISTS, so pg_roles is consulted first.
    /// Safe to run repeatedly; meant to be invoked by the operator, not at
    /// service construction.
    pub async fn provision_roles(&self) -> Result<()> {
        let prefix = self.config().role_prefix.clone();
        ensure_safe(&prefix).map_err(TableServiceError::validation)?;

        for capability in Capability::all() {
            let role = capability.role_name(&prefix);
            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = $1)")
                    .bind(&role)
                    .fetch_one(self.pool())
                    .await?;
            if exists {
                continue;
            }
            sqlx::query(&format!("CREATE ROLE {} NOLOGIN", role))
                .execute(self.pool())
                .await?;
            info!(role, "provisioned capability role");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Capability::Read.role_name("DYNTABLE"), "DYNTABLE_READ");
        assert_eq!(Capability::Write.role_name("DYNTABLE"), "DYNTABLE_WRITE");
        assert_eq!(Capability::Admin.role_name("DYNTABLE"), "DYNTABLE_ADMIN");
    }

    #[test]
    fn test_exact_role_grants() {
        assert!(require(&roles(&["DYNTABLE_READ"]), Capability::Read, "DYNTABLE").is_ok());
        assert!(require(&roles(&["DYNTABLE_WRITE"]), Capability::Write, "DYNTABLE").is_ok());
        assert!(require(&roles(&["DYNTABLE_ADMIN"]), Capability::Admin, "DYNTABLE").is_ok());
    }

    #[test]
    fn test_stronger_role_satisfies_weaker_capability() {
        assert!(require(&roles(&["DYNTABLE_ADMIN"]), Capability::Read, "DYNTABLE").is_ok());
        assert!(require(&roles(&["DYNTABLE_ADMIN"]), Capability::Write, "DYNTABLE").is_ok());
        assert!(require(&roles(&["DYNTABLE_WRITE"]), Capability::Read, "DYNTABLE").is_ok());
    }

    #[test]
    fn test_weaker_role_rejected() {
        let err = require(&roles(&["DYNTABLE_READ"]), Capability::Write, "DYNTABLE").unwrap_err();
        assert_eq!(err.http_status(), 403);
        assert!(require(&roles(&["DYNTABLE_WRITE"]), Capability::Admin, "DYNTABLE").is_err());
    }

    #[test]
    fn test_empty_and_foreign_roles_rejected() {
        assert!(require(&[], Capability::Read, "DYNTABLE").is_err());
        assert!(require(&roles(&["OTHER_ADMIN"]), Capability::Read, "DYNTABLE").is_err());
    }

    #[test]
    fn test_prefix_scopes_roles() {
        assert!(require(&roles(&["SVC_READ"]), Capability::Read, "SVC").is_ok());
        assert!(require(&roles(&["SVC_READ"]), Capability::Read, "DYNTABLE").is_err());
    }
}
