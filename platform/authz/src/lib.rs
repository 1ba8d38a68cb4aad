//! Authorization primitives for the CRM modules.
//!
//! The policy functions in [`policy`] are pure over the principal handed to
//! them. [`PolicyEngine`] resolves that principal from a [`PrincipalSource`]
//! (normally the session manager) on every call.

pub mod catalog;
pub mod policy;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use entity::{Action, PermissionId, RoleId, User};
use thiserror::Error;
use tracing::debug;

pub use catalog::{DepartmentCatalog, PermissionCatalog, RoleCatalog};
pub use policy::refresh_permissions_from_role;

/// Permission required for user administration.
pub const SYSTEM_ADMIN: &str = "system_admin";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("login required")]
    Unauthenticated,
    #[error("insufficient permissions: {action} on {permission} required")]
    InsufficientPermissions {
        permission: PermissionId,
        action: Action,
    },
    #[error("role {0} is not defined")]
    UnknownRole(RoleId),
}

/// Supplies the current principal, if any.
pub trait PrincipalSource: Send + Sync {
    fn principal(&self) -> Option<User>;
}

/// A principal that never changes. Handy for batch jobs and tests.
#[derive(Clone, Debug, Default)]
pub struct FixedPrincipal(pub Option<User>);

impl PrincipalSource for FixedPrincipal {
    fn principal(&self) -> Option<User> {
        self.0.clone()
    }
}

#[derive(Clone)]
pub struct PolicyEngine {
    principals: Arc<dyn PrincipalSource>,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine").finish_non_exhaustive()
    }
}

impl PolicyEngine {
    pub fn new(principals: Arc<dyn PrincipalSource>) -> Self {
        Self { principals }
    }

    pub fn fixed(user: Option<User>) -> Self {
        Self::new(Arc::new(FixedPrincipal(user)))
    }

    pub fn principal(&self) -> Option<User> {
        self.principals.principal()
    }

    pub fn has_permission(&self, permission: &str, action: Action) -> bool {
        policy::has_permission(self.principal().as_ref(), permission, action)
    }

    pub fn can_access_data(&self, owner_id: &str, department_id: &str) -> bool {
        policy::can_access_data(self.principal().as_ref(), owner_id, department_id)
    }

    pub fn can_approve(&self, amount: Option<u64>) -> bool {
        policy::can_approve(self.principal().as_ref(), amount)
    }

    pub fn within_access_window(&self, at: DateTime<Utc>) -> bool {
        policy::within_access_window(self.principal().as_ref(), at)
    }

    /// Returns the principal when it holds `action` on `permission`.
    pub fn require(&self, permission: &str, action: Action) -> Result<User, AuthzError> {
        let user = self.principal().ok_or(AuthzError::Unauthenticated)?;
        if policy::has_permission(Some(&user), permission, action) {
            Ok(user)
        } else {
            debug!(user = %user.id, permission, %action, "permission denied");
            Err(AuthzError::InsufficientPermissions {
                permission: PermissionId::new(permission),
                action,
            })
        }
    }
}
