use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DepartmentId, Permission, Role, UserId};

/// A user account.
///
/// `permissions` is a snapshot of `role.permissions` taken when the role was
/// assigned. It is not kept in sync with later edits to the role definition;
/// `platform_authz::refresh_permissions_from_role` re-materializes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub department_id: DepartmentId,
    pub role: Role,
    pub permissions: Vec<Permission>,
    /// Ids of users reporting to this one. Not owned.
    #[serde(default)]
    pub direct_reports: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<UserId>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_report(&self, id: &UserId) -> bool {
        self.direct_reports.contains(id)
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}
