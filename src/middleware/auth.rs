// Authenticated user injected into request extensions by the auth middleware

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user information extracted from the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
    /// Permission names resolved at login
    pub permissions: Vec<String>,
    pub token_id: String,
    pub exp: u64,
}

impl AuthenticatedUser {
    /// Admins implicitly hold every permission
    pub fn has_permission(&self, name: &str) -> bool {
        self.is_admin || self.permissions.iter().any(|p| p == name)
    }

    pub fn require_permission(
        &self,
        name: &str,
    ) -> Result<(), crate::utils::service_error::ServiceError> {
        if self.has_permission(name) {
            Ok(())
        } else {
            Err(crate::utils::service_error::ServiceError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_admin: bool, permissions: Vec<&str>) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "tester".to_string(),
            is_admin,
            permissions: permissions.into_iter().map(String::from).collect(),
            token_id: "jti".to_string(),
            exp: 0,
        }
    }

    #[test]
    fn test_admin_has_all_permissions() {
        let admin = user(true, vec![]);
        assert!(admin.has_permission("users.delete"));
        assert!(admin.require_permission("anything.at.all").is_ok());
    }

    #[test]
    fn test_scoped_permissions() {
        let employee = user(false, vec!["urls.create", "urls.view_own"]);
        assert!(employee.has_permission("urls.create"));
        assert!(!employee.has_permission("users.view"));
        assert!(employee.require_permission("users.view").is_err());
    }
}
