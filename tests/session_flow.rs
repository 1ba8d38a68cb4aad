use std::sync::{Arc, Mutex};

use chrono::TimeDelta;
use entity::Action;
use platform_authn::{AuthnError, SESSION_KEY};
use platform_directory::{USERS_KEY, UserUpdate};
use platform_obs::Recovered;
use suite_tests::Harness;

#[tokio::test]
async fn login_makes_the_user_current() {
    let h = Harness::new();
    for (email, password, id) in [
        ("ceo@premiumestates.com", "ceo123", "usr-ceo"),
        ("manager@premiumestates.com", "manager123", "usr-sales-manager"),
        ("agent@premiumestates.com", "agent123", "usr-sales-agent"),
        ("support@premiumestates.com", "support123", "usr-support"),
    ] {
        let payload = h.sessions.login(email, password).await;
        assert!(payload.success, "{email}: {}", payload.message);
        assert_eq!(payload.user.as_ref().map(|u| u.id.as_str()), Some(id));
        assert_eq!(h.sessions.current_user().unwrap().id, id);
        assert!(h.sessions.is_authenticated());
    }
}

#[tokio::test]
async fn inactive_user_cannot_log_in_with_correct_password() {
    let h = Harness::new();
    let admin = platform_authz::PolicyEngine::fixed(h.directory.get_user("usr-ceo").unwrap());
    for id in ["usr-sales-manager", "usr-support"] {
        let payload = h.directory.update_user(
            &admin,
            &id.into(),
            UserUpdate {
                is_active: Some(false),
                ..UserUpdate::default()
            },
        );
        assert!(payload.success);
    }

    let manager = h.sessions.login("manager@premiumestates.com", "manager123").await;
    let support = h.sessions.login("support@premiumestates.com", "support123").await;
    assert!(!manager.success);
    assert!(!support.success);
    assert_eq!(manager.message, "Invalid email or password");
    assert!(h.sessions.current_user().is_none());
}

#[tokio::test]
async fn session_expires_after_twenty_four_hours() {
    let h = Harness::new();
    assert!(h.sessions.login("agent@premiumestates.com", "agent123").await.success);
    let expires_at = h.sessions.current_session().unwrap().expires_at;
    assert_eq!(expires_at, h.now() + TimeDelta::hours(24));

    h.clock.advance(TimeDelta::hours(23) + TimeDelta::minutes(59));
    assert!(h.sessions.is_authenticated());

    h.clock.advance(TimeDelta::minutes(2));
    assert!(!h.sessions.is_authenticated());
    assert!(h.sessions.current_user().is_none());
    assert!(h.store.get(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn expired_session_denies_every_check() {
    let h = Harness::new();
    assert!(h.sessions.login("ceo@premiumestates.com", "ceo123").await.success);
    assert!(h.policy.has_permission("system_admin", Action::Delete));

    h.clock.advance(TimeDelta::hours(24));
    assert!(!h.policy.has_permission("system_admin", Action::Delete));
    assert!(!h.policy.can_access_data("usr-ceo", "executive"));
    assert!(!h.policy.can_approve(Some(1)));
    assert!(h.sessions.current_session().is_none());
}

#[tokio::test]
async fn session_round_trips_through_storage() {
    let h = Harness::new();
    assert!(h.sessions.login("manager@premiumestates.com", "manager123").await.success);
    let before = h.sessions.current_session().unwrap();

    h.clock.advance(TimeDelta::hours(3));
    let later = h.reopen();
    let after = later.sessions.current_session().unwrap();
    assert_eq!(after.user.id, before.user.id);
    assert_eq!(after.token, before.token);
    assert_eq!(after.expires_at, before.expires_at);
    assert!(later.policy.has_permission("deal_management", Action::Approve));
}

#[tokio::test]
async fn tokens_verify_until_expiry_and_reject_tampering() {
    let h = Harness::new();
    assert!(h.sessions.login("support@premiumestates.com", "support123").await.success);
    let token = h.sessions.current_session().unwrap().token;

    let claims = h.sessions.verify_token(&token).unwrap();
    assert_eq!(claims.sub, "usr-support");

    let mut tampered = token.clone();
    tampered.push('x');
    assert!(matches!(
        h.sessions.verify_token(&tampered),
        Err(AuthnError::TokenInvalid(_))
    ));

    h.clock.advance(TimeDelta::hours(25));
    assert!(matches!(
        h.sessions.verify_token(&token),
        Err(AuthnError::TokenExpired)
    ));
}

#[tokio::test]
async fn logout_is_idempotent_and_always_notifies() {
    let h = Harness::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let id = h.sessions.subscribe(move |session| {
        sink.lock()
            .unwrap()
            .push(session.map(|s| s.user.email.clone()));
    });

    h.sessions.logout().unwrap();
    assert!(h.sessions.login("ceo@premiumestates.com", "ceo123").await.success);
    h.sessions.logout().unwrap();
    h.sessions.logout().unwrap();
    assert!(h.sessions.unsubscribe(id));
    assert!(h.sessions.login("ceo@premiumestates.com", "ceo123").await.success);
    h.sessions.logout().unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            None,
            Some("ceo@premiumestates.com".to_string()),
            None,
            None
        ]
    );
}

#[tokio::test]
async fn corrupt_session_record_is_discarded_with_signal() {
    let h = Harness::new();
    h.store.set(SESSION_KEY, "not json at all").unwrap();

    let later = h.reopen();
    assert!(later.sessions.current_session().is_none());
    assert!(later.store.get(SESSION_KEY).unwrap().is_none());
    let events = later.observer.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Recovered::SessionDiscarded { .. }));

    assert!(later.sessions.login("agent@premiumestates.com", "agent123").await.success);
}

#[tokio::test]
async fn logout_reports_a_stored_session_it_could_not_remove() {
    let (h, store) = Harness::flaky();
    assert!(h.sessions.login("ceo@premiumestates.com", "ceo123").await.success);
    let notified = Arc::new(Mutex::new(0));
    let sink = notified.clone();
    h.sessions.subscribe(move |session| {
        assert!(session.is_none());
        *sink.lock().unwrap() += 1;
    });

    store.fail_removes(SESSION_KEY);
    assert!(matches!(h.sessions.logout(), Err(AuthnError::Store(_))));
    assert!(!h.sessions.is_authenticated());
    assert_eq!(*notified.lock().unwrap(), 1);
    let restored = h.reopen().sessions.current_user().map(|u| u.id);
    assert_eq!(restored, Some("usr-ceo".into()));

    store.heal();
    h.sessions.logout().unwrap();
    assert!(h.reopen().sessions.current_session().is_none());
}

#[tokio::test]
async fn failed_session_write_is_masked_and_not_recorded() {
    let (h, store) = Harness::flaky();
    store.fail_sets(SESSION_KEY);

    let payload = h.sessions.login("ceo@premiumestates.com", "ceo123").await;
    assert!(!payload.success);
    assert_eq!(payload.message, "Login failed due to an unexpected error");
    assert!(payload.user.is_none());
    assert!(h.sessions.current_user().is_none());
    let ceo = h.directory.get_user("usr-ceo").unwrap().unwrap();
    assert_eq!(ceo.last_login, None);
}

#[tokio::test]
async fn failed_login_stamp_discards_the_stored_session() {
    let (h, store) = Harness::flaky();
    assert_eq!(h.directory.get_users().unwrap().len(), 4);
    store.fail_sets(USERS_KEY);

    let payload = h.sessions.login("agent@premiumestates.com", "agent123").await;
    assert!(!payload.success);
    assert_eq!(payload.message, "Login failed due to an unexpected error");
    assert!(h.sessions.current_session().is_none());
    assert!(h.store.get(SESSION_KEY).unwrap().is_none());
}
