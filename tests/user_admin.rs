use std::collections::BTreeSet;

use entity::{Action, Permission, Role};
use platform_authz::PolicyEngine;
use platform_directory::{NewUser, USERS_KEY, UserPayload, UserUpdate};
use platform_obs::Recovered;
use suite_tests::Harness;

fn new_hire(email: &str) -> NewUser {
    NewUser {
        name: "Lena Vogel".into(),
        email: email.into(),
        department_id: "sales".into(),
        role_id: "sales_agent".into(),
        manager_id: Some("usr-sales-manager".into()),
        password: Some("welcome-2026".into()),
    }
}

#[test]
fn empty_store_seeds_the_four_demo_accounts_once() {
    let h = Harness::new();
    let users = h.directory.get_users().unwrap();
    let emails: BTreeSet<_> = users.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(
        emails,
        BTreeSet::from([
            "agent@premiumestates.com",
            "ceo@premiumestates.com",
            "manager@premiumestates.com",
            "support@premiumestates.com",
        ])
    );
    assert!(users.iter().all(|u| u.is_active));
    assert!(users.iter().all(|u| u.permissions == u.role.permissions));

    let again = h.directory.get_users().unwrap();
    assert_eq!(again.len(), 4);
    assert_eq!(again, users);
}

#[tokio::test]
async fn create_is_denied_without_system_admin() {
    let h = Harness::new();
    let before = h.directory.get_users().unwrap().len();

    let anonymous = h.directory.create_user(&h.policy, new_hire("lena@premiumestates.com"));
    assert!(!anonymous.success);
    assert_eq!(h.directory.get_users().unwrap().len(), before);

    assert!(h.sessions.login("manager@premiumestates.com", "manager123").await.success);
    let manager = h.directory.create_user(&h.policy, new_hire("lena@premiumestates.com"));
    assert!(!manager.success);
    assert!(manager.message.contains("system_admin"), "{}", manager.message);
    assert_eq!(h.directory.get_users().unwrap().len(), before);
}

#[tokio::test]
async fn created_user_can_log_in_and_joins_the_team() {
    let h = Harness::new();
    assert!(h.sessions.login("ceo@premiumestates.com", "ceo123").await.success);
    let created = h.directory.create_user(&h.policy, new_hire(" Lena@PremiumEstates.com "));
    assert!(created.success, "{}", created.message);
    let lena = created.user.unwrap();
    assert_eq!(lena.email, "lena@premiumestates.com");

    let manager = h.directory.get_user("usr-sales-manager").unwrap().unwrap();
    assert!(manager.is_report(&lena.id));

    h.sessions.logout().unwrap();
    assert!(h.sessions.login("lena@premiumestates.com", "welcome-2026").await.success);
    assert_eq!(h.sessions.current_user().unwrap().id, lena.id);
    assert!(h.policy.can_access_data(lena.id.as_str(), "sales"));

    h.sessions.logout().unwrap();
    assert!(h.sessions.login("manager@premiumestates.com", "manager123").await.success);
    assert!(h.policy.can_access_data(lena.id.as_str(), "sales"));
}

#[tokio::test]
async fn role_change_stays_stale_until_refreshed() {
    let h = Harness::new();
    assert!(h.sessions.login("ceo@premiumestates.com", "ceo123").await.success);
    let updated = h.directory.update_user(
        &h.policy,
        &"usr-support".into(),
        UserUpdate {
            role_id: Some("marketing_manager".into()),
            department_id: Some("marketing".into()),
            ..UserUpdate::default()
        },
    );
    assert!(updated.success, "{}", updated.message);
    let stale = updated.user.unwrap();
    assert_eq!(stale.role.id, "marketing_manager");
    assert!(!stale.permissions.iter().any(|p| p.id == "marketing"));

    let refreshed = h.directory.refresh_permissions(&h.policy, &"usr-support".into());
    assert!(refreshed.success);
    let fresh = refreshed.user.unwrap();
    assert!(fresh.permissions.iter().any(|p| p.id == "marketing"));
    assert_eq!(fresh.permissions, fresh.role.permissions);
}

#[tokio::test]
async fn redefined_role_reaches_users_on_refresh() {
    let h = Harness::new();
    assert!(h.sessions.login("ceo@premiumestates.com", "ceo123").await.success);

    let mut agent_role: Role = h.directory.roles().get("sales_agent").cloned().unwrap();
    agent_role.permissions.push(Permission::new(
        "marketing",
        "Marketing Campaigns",
        "Plan campaigns and social posts",
        "marketing",
        &[Action::Read],
    ));
    h.directory.define_role(&h.policy, agent_role).unwrap();

    let before = h.directory.get_user("usr-sales-agent").unwrap().unwrap();
    assert!(!before.permissions.iter().any(|p| p.id == "marketing"));
    let refreshed = h.directory.refresh_permissions(&h.policy, &before.id);
    assert!(refreshed.success);

    h.sessions.logout().unwrap();
    assert!(h.sessions.login("agent@premiumestates.com", "agent123").await.success);
    assert!(h.policy.has_permission("marketing", Action::Read));
    assert!(!h.policy.has_permission("marketing", Action::Create));
}

#[test]
fn corrupt_user_list_is_reseeded_with_signal() {
    let h = Harness::new();
    h.store.set(USERS_KEY, "[{\"id\":").unwrap();
    let users = h.directory.get_users().unwrap();
    assert_eq!(users.len(), 4);
    assert!(matches!(
        h.observer.events().as_slice(),
        [Recovered::UserListReseeded { .. }]
    ));
}

fn assert_masked(payload: &UserPayload) {
    assert!(!payload.success);
    assert_eq!(payload.message, "Unexpected error, please try again");
    assert!(payload.user.is_none());
}

#[test]
fn storage_failures_are_masked_and_change_nothing() {
    let (h, store) = Harness::flaky();
    let admin = PolicyEngine::fixed(h.directory.get_user("usr-ceo").unwrap());
    let before = h.directory.get_users().unwrap();
    store.fail_sets(USERS_KEY);

    assert_masked(&h.directory.create_user(&admin, new_hire("lena@premiumestates.com")));
    assert_masked(&h.directory.update_user(
        &admin,
        &"usr-support".into(),
        UserUpdate {
            is_active: Some(false),
            ..UserUpdate::default()
        },
    ));
    assert_masked(&h.directory.refresh_permissions(&admin, &"usr-sales-agent".into()));

    store.heal();
    let after = h.directory.get_users().unwrap();
    assert_eq!(after.len(), before.len());
    assert_eq!(after, before);
}
