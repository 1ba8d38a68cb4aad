//! Access decisions over an explicit principal. `None` means nobody is
//! signed in, and every check denies.

use chrono::{DateTime, Utc};
use entity::{Action, DataAccess, User};

use crate::{AuthzError, RoleCatalog};

/// True iff the user's permission snapshot holds `permission` with `action`.
pub fn has_permission(user: Option<&User>, permission: &str, action: Action) -> bool {
    let Some(user) = user else {
        return false;
    };
    user.permissions
        .iter()
        .any(|held| held.id == permission && held.allows(action))
}

/// Decide record visibility from the role's `data_access` scope.
///
/// `Department` scope compares departments only and ignores the owner.
/// A role without a scope sees nothing.
pub fn can_access_data(user: Option<&User>, owner_id: &str, department_id: &str) -> bool {
    let Some(user) = user else {
        return false;
    };
    match user.role.data_access() {
        Some(DataAccess::All) => true,
        Some(DataAccess::Department) => user.department_id == department_id,
        Some(DataAccess::Team) => {
            user.id == owner_id || user.direct_reports.iter().any(|id| id == owner_id)
        }
        Some(DataAccess::Own) => user.id == owner_id,
        None => false,
    }
}

/// Roles that require approval only pass when an amount is given and fits
/// under the financial limit. A role requiring approval without a limit
/// never approves on its own.
pub fn can_approve(user: Option<&User>, amount: Option<u64>) -> bool {
    let Some(user) = user else {
        return false;
    };
    let Some(restrictions) = user.role.restrictions.as_ref() else {
        return true;
    };
    if !restrictions.approval_required {
        return true;
    }
    match (amount, restrictions.financial_limit) {
        (Some(amount), Some(limit)) => amount <= limit,
        _ => false,
    }
}

/// True when the role has no time restriction or `at` falls inside it.
pub fn within_access_window(user: Option<&User>, at: DateTime<Utc>) -> bool {
    let Some(user) = user else {
        return false;
    };
    user.role
        .restrictions
        .as_ref()
        .and_then(|r| r.time_restrictions.as_ref())
        .is_none_or(|window| window.contains(at))
}

/// Re-materialize the user's role and permission snapshot from the current
/// role definition. Returns whether anything changed.
pub fn refresh_permissions_from_role(
    user: &mut User,
    roles: &RoleCatalog,
) -> Result<bool, AuthzError> {
    let current = roles
        .get(user.role.id.as_str())
        .ok_or_else(|| AuthzError::UnknownRole(user.role.id.clone()))?;
    let changed = user.role != *current || user.permissions != current.permissions;
    if changed {
        user.role = current.clone();
        user.permissions = current.permissions.clone();
    }
    Ok(changed)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use entity::{Restrictions, Role, UserId};

    pub(crate) fn user_with_role(role: Role) -> User {
        User {
            id: UserId::new("usr-1"),
            name: "Test User".into(),
            email: "test@example.com".into(),
            department_id: role.department_id.clone(),
            permissions: role.permissions.clone(),
            role,
            direct_reports: vec![UserId::new("usr-2"), UserId::new("usr-3")],
            manager_id: None,
            is_active: true,
            last_login: None,
        }
    }

    fn role_with(restrictions: Option<Restrictions>) -> Role {
        let mut role = RoleCatalog::standard().get("sales_agent").unwrap().clone();
        role.restrictions = restrictions;
        role
    }

    fn scoped(scope: DataAccess) -> User {
        user_with_role(role_with(Some(Restrictions {
            data_access: Some(scope),
            ..Restrictions::default()
        })))
    }

    #[test]
    fn no_principal_denies_everything() {
        for action in Action::ALL {
            assert!(!has_permission(None, "system_admin", action));
        }
        assert!(!can_access_data(None, "usr-1", "sales"));
        assert!(!can_approve(None, Some(1)));
        assert!(!within_access_window(None, Utc::now()));
    }

    #[test]
    fn has_permission_checks_id_and_action() {
        let user = user_with_role(RoleCatalog::standard().get("sales_agent").unwrap().clone());
        assert!(has_permission(Some(&user), "lead_management", Action::Update));
        assert!(!has_permission(Some(&user), "lead_management", Action::Delete));
        assert!(!has_permission(Some(&user), "hr_management", Action::Read));
    }

    #[test]
    fn own_scope_matches_only_self() {
        let user = scoped(DataAccess::Own);
        assert!(can_access_data(Some(&user), "usr-1", "anything"));
        assert!(!can_access_data(Some(&user), "usr-2", "sales"));
    }

    #[test]
    fn team_scope_includes_direct_reports() {
        let user = scoped(DataAccess::Team);
        assert!(can_access_data(Some(&user), "usr-1", "x"));
        assert!(can_access_data(Some(&user), "usr-3", "x"));
        assert!(!can_access_data(Some(&user), "usr-9", "sales"));
    }

    #[test]
    fn department_scope_ignores_owner() {
        let user = scoped(DataAccess::Department);
        assert!(can_access_data(Some(&user), "someone-else", "sales"));
        assert!(!can_access_data(Some(&user), "usr-1", "marketing"));
    }

    #[test]
    fn missing_scope_denies() {
        let user = user_with_role(role_with(Some(Restrictions::default())));
        assert!(!can_access_data(Some(&user), "usr-1", "sales"));
        let bare = user_with_role(role_with(None));
        assert!(!can_access_data(Some(&bare), "usr-1", "sales"));
    }

    #[test]
    fn approval_limit_is_inclusive() {
        let user = user_with_role(role_with(Some(Restrictions {
            approval_required: true,
            financial_limit: Some(50_000),
            ..Restrictions::default()
        })));
        assert!(can_approve(Some(&user), Some(50_000)));
        assert!(!can_approve(Some(&user), Some(50_001)));
        assert!(!can_approve(Some(&user), None));
    }

    #[test]
    fn approval_without_limit_never_passes() {
        let user = user_with_role(role_with(Some(Restrictions {
            approval_required: true,
            ..Restrictions::default()
        })));
        assert!(!can_approve(Some(&user), Some(1)));
    }

    #[test]
    fn roles_without_approval_flag_approve_anything() {
        let unrestricted = user_with_role(role_with(None));
        assert!(can_approve(Some(&unrestricted), None));
        let limited = user_with_role(role_with(Some(Restrictions {
            financial_limit: Some(10),
            ..Restrictions::default()
        })));
        assert!(can_approve(Some(&limited), Some(1_000_000)));
    }

    #[test]
    fn support_hours_follow_the_window() {
        let user = user_with_role(RoleCatalog::standard().get("support_agent").unwrap().clone());
        let monday_noon = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let saturday_noon = Utc.with_ymd_and_hms(2026, 10, 24, 12, 0, 0).unwrap();
        assert!(within_access_window(Some(&user), monday_noon));
        assert!(!within_access_window(Some(&user), saturday_noon));
        let ceo = user_with_role(RoleCatalog::standard().get("ceo").unwrap().clone());
        assert!(within_access_window(Some(&ceo), saturday_noon));
    }

    #[test]
    fn refresh_picks_up_edited_role() {
        let mut roles = RoleCatalog::standard();
        let mut user = user_with_role(roles.get("sales_agent").unwrap().clone());
        assert!(!refresh_permissions_from_role(&mut user, &roles).unwrap());

        let mut edited = roles.get("sales_agent").unwrap().clone();
        edited.permissions.retain(|p| p.id != "lead_management");
        roles.insert(edited);
        assert!(has_permission(Some(&user), "lead_management", Action::Read));

        assert!(refresh_permissions_from_role(&mut user, &roles).unwrap());
        assert!(!has_permission(Some(&user), "lead_management", Action::Read));
    }

    #[test]
    fn refresh_fails_for_removed_role() {
        let mut user = user_with_role(role_with(None));
        user.role.id = "retired_role".into();
        let err = refresh_permissions_from_role(&mut user, &RoleCatalog::standard()).unwrap_err();
        assert_eq!(err, AuthzError::UnknownRole("retired_role".into()));
    }
}
