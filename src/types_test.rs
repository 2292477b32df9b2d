use super::*;

fn profile_json(extra: serde_json::Value) -> serde_json::Value {
    let mut base = serde_json::json!({
        "id": "7d3c1f4e-9a57-4a43-9f0e-2f6b6a3c0b11",
        "full_name": "Ada Lovelace",
        "role": "teacher",
        "is_phone_public": true,
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    base
}

// =============================================================================
// Profile
// =============================================================================

#[test]
fn profile_parses_row_with_defaults() {
    let profile: Profile = serde_json::from_value(profile_json(serde_json::json!({}))).unwrap();
    assert_eq!(profile.full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(profile.role, Role::Teacher);
    assert!(profile.is_phone_public);
    assert!(profile.bio.is_none());
    assert!(profile.social_links.is_none());
}

#[test]
fn profile_missing_role_defaults_to_student() {
    let profile: Profile =
        serde_json::from_value(serde_json::json!({"id": "7d3c1f4e-9a57-4a43-9f0e-2f6b6a3c0b11"})).unwrap();
    assert_eq!(profile.role, Role::Student);
    assert!(!profile.is_phone_public);
}

#[test]
fn profile_rejects_unknown_role() {
    let result = serde_json::from_value::<Profile>(profile_json(serde_json::json!({"role": "janitor"})));
    assert!(result.is_err());
}

#[test]
fn profile_drops_null_social_links() {
    let profile: Profile = serde_json::from_value(profile_json(serde_json::json!({
        "social_links": {"linkedin": "https://linkedin.com/in/ada", "twitter": null}
    })))
    .unwrap();
    assert_eq!(profile.social_link("linkedin"), Some("https://linkedin.com/in/ada"));
    assert_eq!(profile.social_link("twitter"), None);
    assert_eq!(profile.social_links.as_ref().map(BTreeMap::len), Some(1));
}

#[test]
fn profile_null_social_links_is_none() {
    let profile: Profile = serde_json::from_value(profile_json(serde_json::json!({"social_links": null}))).unwrap();
    assert!(profile.social_links.is_none());
}

#[test]
fn role_display_matches_wire_value() {
    assert_eq!(Role::Student.to_string(), "student");
    assert_eq!(Role::Admin.as_str(), "admin");
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn session_expires_within_margin() {
    let session = Session {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        token_type: "bearer".into(),
        expires_at: 1_000,
        user: SessionUser { id: Uuid::new_v4(), email: None, identities: None },
    };
    assert!(!session.expires_within(900, 10));
    assert!(session.expires_within(990, 10));
    assert!(session.expires_within(1_200, 0));
}

#[test]
fn session_user_without_identities_omits_field() {
    let user = SessionUser { id: Uuid::nil(), email: Some("a@b.c".into()), identities: None };
    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("identities").is_none());
}

// =============================================================================
// ProfileUpdate / SignUpMetadata
// =============================================================================

#[test]
fn profile_update_serializes_cleared_links_as_null() {
    let mut links = BTreeMap::new();
    links.insert("github".to_owned(), None);
    let update = ProfileUpdate {
        full_name: "Ada".into(),
        phone_number: "+44 1".into(),
        bio: String::new(),
        social_links: Some(links),
        updated_at: "2026-01-01T00:00:00Z".into(),
    };
    let json = serde_json::to_value(&update).unwrap();
    assert!(json["social_links"]["github"].is_null());
}

#[test]
fn signup_metadata_skips_missing_name() {
    let json = serde_json::to_value(SignUpMetadata::default()).unwrap();
    assert_eq!(json, serde_json::json!({}));
}

// =============================================================================
// OAuthProvider
// =============================================================================

#[test]
fn microsoft_uses_azure_slug() {
    assert_eq!(OAuthProvider::Microsoft.slug(), "azure");
    assert_eq!(OAuthProvider::Google.slug(), "google");
}

#[test]
fn provider_parses_aliases_case_insensitively() {
    assert_eq!("Google".parse::<OAuthProvider>(), Ok(OAuthProvider::Google));
    assert_eq!("azure".parse::<OAuthProvider>(), Ok(OAuthProvider::Microsoft));
    assert_eq!(" MICROSOFT ".parse::<OAuthProvider>(), Ok(OAuthProvider::Microsoft));
}

#[test]
fn provider_rejects_unknown_name() {
    let err = "github".parse::<OAuthProvider>().unwrap_err();
    assert!(err.contains("unknown oauth provider"));
}
