//! Demo accounts written on first use of an empty store. One account per
//! seniority level, all active.

use entity::{User, UserId};
use platform_authz::RoleCatalog;
use tracing::warn;

#[derive(Clone, Copy, Debug)]
pub struct DemoCredential {
    pub user_id: &'static str,
    pub email: &'static str,
    pub password: &'static str,
}

pub const DEMO_CREDENTIALS: [DemoCredential; 4] = [
    DemoCredential {
        user_id: "usr-ceo",
        email: "ceo@premiumestates.com",
        password: "ceo123",
    },
    DemoCredential {
        user_id: "usr-sales-manager",
        email: "manager@premiumestates.com",
        password: "manager123",
    },
    DemoCredential {
        user_id: "usr-sales-agent",
        email: "agent@premiumestates.com",
        password: "agent123",
    },
    DemoCredential {
        user_id: "usr-support",
        email: "support@premiumestates.com",
        password: "support123",
    },
];

struct DemoAccount {
    credential: DemoCredential,
    name: &'static str,
    role: &'static str,
    manager: Option<&'static str>,
    reports: &'static [&'static str],
}

const DEMO_ACCOUNTS: [DemoAccount; 4] = [
    DemoAccount {
        credential: DEMO_CREDENTIALS[0],
        name: "Alexandra Reyes",
        role: "ceo",
        manager: None,
        reports: &["usr-sales-manager"],
    },
    DemoAccount {
        credential: DEMO_CREDENTIALS[1],
        name: "Marcus Chen",
        role: "sales_manager",
        manager: Some("usr-ceo"),
        reports: &["usr-sales-agent"],
    },
    DemoAccount {
        credential: DEMO_CREDENTIALS[2],
        name: "Sofia Patel",
        role: "sales_agent",
        manager: Some("usr-sales-manager"),
        reports: &[],
    },
    DemoAccount {
        credential: DEMO_CREDENTIALS[3],
        name: "Daniel Okafor",
        role: "support_agent",
        manager: None,
        reports: &[],
    },
];

/// Build the demo users from `roles`. An account whose role is missing from
/// a customised catalog is skipped.
pub(crate) fn demo_users(roles: &RoleCatalog) -> Vec<(User, &'static str)> {
    DEMO_ACCOUNTS
        .iter()
        .filter_map(|account| {
            let Some(role) = roles.get(account.role) else {
                warn!(role = account.role, "demo role missing from catalog, skipping account");
                return None;
            };
            let user = User {
                id: UserId::new(account.credential.user_id),
                name: account.name.into(),
                email: account.credential.email.into(),
                department_id: role.department_id.clone(),
                permissions: role.permissions.clone(),
                role: role.clone(),
                direct_reports: account.reports.iter().map(|id| UserId::new(*id)).collect(),
                manager_id: account.manager.map(UserId::new),
                is_active: true,
                last_login: None,
            };
            Some((user, account.credential.password))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::Level;

    #[test]
    fn one_demo_account_per_level() {
        let users = demo_users(&RoleCatalog::standard());
        let mut levels: Vec<Level> = users.iter().map(|(u, _)| u.role.level).collect();
        levels.sort();
        assert_eq!(
            levels,
            vec![Level::Support, Level::Operations, Level::Management, Level::Executive]
        );
        assert!(users.iter().all(|(u, _)| u.is_active));
    }
}
