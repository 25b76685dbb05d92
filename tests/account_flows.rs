//! ---
//! sd_section: "07-testing-qa"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "End-to-end account, profile, settings, and billing flows."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use savedrops_backend::{
    collections, AccountDirectory, AuthError, AuthService, DocumentStore, Filter, GeoPoint,
    OrderBy, UserProfile, UserSettings,
};
use savedrops_dashboard::ensure_bill;

/// Fresh sign-up through to a complete profile, custom settings, and a bill.
#[test]
fn new_account_onboarding_flow() {
    let store = DocumentStore::new();
    let auth = AuthService::new(store.clone());
    let session = auth.sign_up("onboard@example.com", "raindrop").unwrap();

    // Sign-up leaves an incomplete profile stub behind.
    let stub = store
        .query(
            collections::USERS,
            &Filter::any().field_eq("userId", session.user_id.as_str()),
            &OrderBy::desc("createdAt"),
            Some(1),
        )
        .unwrap();
    assert_eq!(stub[0].payload["profileComplete"], serde_json::json!(false));

    let directory = AccountDirectory::new(store.clone());
    let profile = UserProfile {
        name: "Priya Narayan".into(),
        phone: "555-0188".into(),
        address: "4 Aqueduct Lane".into(),
        location: GeoPoint {
            latitude: "12.97".into(),
            longitude: "77.59".into(),
        },
    };
    directory.save_profile(&session.user_id, &profile).unwrap();
    assert_eq!(directory.load_profile(&session.user_id).unwrap(), profile);

    // Saving the profile must reuse the stub document rather than append.
    let users = store
        .query(
            collections::USERS,
            &Filter::any().field_eq("userId", session.user_id.as_str()),
            &OrderBy::desc("createdAt"),
            None,
        )
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].payload["profileComplete"], serde_json::json!(true));

    let mut settings = UserSettings::default();
    settings.notifications.sms = true;
    settings.preferences.theme = "dark".into();
    directory.save_settings(&session.user_id, &settings).unwrap();
    assert_eq!(directory.load_settings(&session.user_id).unwrap(), settings);

    assert_eq!(ensure_bill(&store, &session.user_id).unwrap(), 0.0);
}

/// A returning user signs in and finds their saved documents untouched.
#[test]
fn returning_user_sees_saved_state() {
    let store = DocumentStore::new();
    let auth = AuthService::new(store.clone());
    let directory = AccountDirectory::new(store.clone());

    let first = auth.sign_up("returning@example.com", "raindrop").unwrap();
    let mut settings = UserSettings::default();
    settings.privacy.data_sharing = true;
    directory.save_settings(&first.user_id, &settings).unwrap();
    ensure_bill(&store, &first.user_id).unwrap();
    auth.sign_out();
    assert!(auth.current_user().is_none());

    let second = auth.sign_in("returning@example.com", "raindrop").unwrap();
    assert_eq!(second.user_id, first.user_id);
    assert_eq!(directory.load_settings(&second.user_id).unwrap(), settings);

    // ensure_bill on a return visit must not duplicate the record.
    ensure_bill(&store, &second.user_id).unwrap();
    let bills = store
        .query(
            collections::BILLS,
            &Filter::any().field_eq("userId", second.user_id.as_str()),
            &OrderBy::desc("date"),
            None,
        )
        .unwrap();
    assert_eq!(bills.len(), 1);
}

#[test]
fn auth_error_taxonomy() {
    let auth = AuthService::new(DocumentStore::new());
    auth.sign_up("taken@example.com", "raindrop").unwrap();

    assert_eq!(
        auth.sign_up("taken@example.com", "different-pass").unwrap_err(),
        AuthError::EmailInUse
    );
    assert_eq!(
        auth.sign_up("not-an-email", "raindrop").unwrap_err(),
        AuthError::InvalidEmail
    );
    assert_eq!(
        auth.sign_up("short@example.com", "tiny").unwrap_err(),
        AuthError::WeakPassword
    );
    assert_eq!(
        auth.sign_in("taken@example.com", "wrong").unwrap_err(),
        AuthError::InvalidCredentials
    );
    // Unknown accounts get the same answer as wrong passwords.
    assert_eq!(
        auth.sign_in("ghost@example.com", "raindrop").unwrap_err(),
        AuthError::InvalidCredentials
    );
}

/// Password reset acknowledges without revealing whether the email exists.
#[test]
fn password_reset_never_leaks_existence() {
    let auth = AuthService::new(DocumentStore::new());
    auth.sign_up("real@example.com", "raindrop").unwrap();
    assert!(auth.reset_password("real@example.com").is_ok());
    assert!(auth.reset_password("nobody@example.com").is_ok());
}

/// Injected connectivity loss surfaces as a network failure on both the
/// auth service and the document store.
#[test]
fn offline_backend_fails_loudly() {
    let store = DocumentStore::new();
    let auth = AuthService::new(store.clone());
    let directory = AccountDirectory::new(store.clone());
    let session = auth.sign_up("flaky@example.com", "raindrop").unwrap();

    auth.set_offline(true);
    store.set_offline(true);

    assert_eq!(
        auth.sign_in("flaky@example.com", "raindrop").unwrap_err(),
        AuthError::NetworkFailure
    );
    assert!(directory
        .save_settings(&session.user_id, &UserSettings::default())
        .is_err());
    assert!(ensure_bill(&store, &session.user_id).is_err());

    // Back online, everything recovers.
    auth.set_offline(false);
    store.set_offline(false);
    assert!(auth.sign_in("flaky@example.com", "raindrop").is_ok());
    assert_eq!(ensure_bill(&store, &session.user_id).unwrap(), 0.0);
}
