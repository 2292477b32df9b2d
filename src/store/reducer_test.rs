use super::*;
use crate::store::state::Phase;
use crate::test_helpers::{profile_for, session_for};

fn fetch_of(effect: Effect) -> (RequestToken, Uuid) {
    match effect {
        Effect::FetchProfile { request, user_id } => (request, user_id),
        Effect::None => panic!("expected a profile fetch"),
    }
}

fn signed_in(user_id: Uuid) -> Reducer {
    let mut reducer = Reducer::new();
    let (request, _) = fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(user_id)))));
    reducer.apply(Action::ProfileLoaded { request, profile: Some(profile_for(user_id)) });
    reducer
}

// =========================================================================
// initial load
// =========================================================================

#[test]
fn starts_initializing() {
    let reducer = Reducer::new();
    assert!(reducer.state().loading);
    assert_eq!(reducer.state().phase(), Phase::Initializing);
    assert!(!reducer.state().mobile_sidebar_open);
}

#[test]
fn no_session_ends_anonymous() {
    let mut reducer = Reducer::new();
    assert_eq!(reducer.apply(Action::SessionLoaded(None)), Effect::None);
    assert_eq!(reducer.state().phase(), Phase::Anonymous);
}

#[test]
fn lookup_failure_ends_anonymous() {
    let mut reducer = Reducer::new();
    reducer.apply(Action::SessionLoadFailed);
    assert!(!reducer.state().loading);
    assert_eq!(reducer.state().session, None);
}

#[test]
fn session_resolves_through_profile_fetch() {
    let user_id = Uuid::new_v4();
    let mut reducer = Reducer::new();

    let (request, fetched) = fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(user_id)))));
    assert_eq!(fetched, user_id);
    assert_eq!(reducer.state().phase(), Phase::ResolvingProfile);

    reducer.apply(Action::ProfileLoaded { request, profile: Some(profile_for(user_id)) });
    assert_eq!(reducer.state().phase(), Phase::Authenticated);
    assert_eq!(reducer.state().profile.as_ref().map(|p| p.id), Some(user_id));
}

#[test]
fn missing_profile_still_finishes_loading() {
    let user_id = Uuid::new_v4();
    let mut reducer = Reducer::new();
    let (request, _) = fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(user_id)))));

    reducer.apply(Action::ProfileLoaded { request, profile: None });

    assert_eq!(reducer.state().phase(), Phase::Authenticated);
    assert_eq!(reducer.state().profile, None);
}

// =========================================================================
// change notifications
// =========================================================================

#[test]
fn signed_out_clears_session_and_profile_together() {
    let mut reducer = signed_in(Uuid::new_v4());

    reducer.apply(Action::AuthChanged(AuthChange::SessionAbsent));

    assert_eq!(reducer.state().session, None);
    assert_eq!(reducer.state().profile, None);
    assert_eq!(reducer.state().phase(), Phase::Anonymous);
}

#[test]
fn token_refresh_keeps_profile_of_same_user() {
    let user_id = Uuid::new_v4();
    let mut reducer = signed_in(user_id);
    let mut refreshed = session_for(user_id);
    refreshed.access_token = "rotated".into();

    let effect = reducer.apply(Action::AuthChanged(AuthChange::SessionPresent(refreshed)));

    assert!(matches!(effect, Effect::FetchProfile { .. }));
    assert!(reducer.state().loading);
    assert_eq!(reducer.state().profile.as_ref().map(|p| p.id), Some(user_id));
}

#[test]
fn new_user_drops_previous_profile_immediately() {
    let mut reducer = signed_in(Uuid::new_v4());
    let other = Uuid::new_v4();

    reducer.apply(Action::AuthChanged(AuthChange::SessionPresent(session_for(other))));

    assert_eq!(reducer.state().profile, None);
    assert!(reducer.state().is_consistent());
}

#[test]
fn stale_fetch_after_logout_is_ignored() {
    let user_id = Uuid::new_v4();
    let mut reducer = Reducer::new();
    let (request, _) = fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(user_id)))));

    reducer.apply(Action::AuthChanged(AuthChange::SessionAbsent));
    reducer.apply(Action::ProfileLoaded { request, profile: Some(profile_for(user_id)) });

    assert_eq!(reducer.state().profile, None);
    assert_eq!(reducer.state().phase(), Phase::Anonymous);
}

#[test]
fn superseded_fetch_does_not_overwrite_newer_user() {
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let mut reducer = Reducer::new();
    let (old, _) = fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(first)))));
    let (new, _) = fetch_of(reducer.apply(Action::AuthChanged(AuthChange::SessionPresent(session_for(second)))));

    reducer.apply(Action::ProfileLoaded { request: old, profile: Some(profile_for(first)) });
    assert_eq!(reducer.state().profile, None);
    assert!(reducer.state().loading);

    reducer.apply(Action::ProfileLoaded { request: new, profile: Some(profile_for(second)) });
    assert_eq!(reducer.state().profile.as_ref().map(|p| p.id), Some(second));
    assert!(!reducer.state().loading);
}

#[test]
fn profile_for_another_user_is_never_stored() {
    let mut reducer = Reducer::new();
    let (request, _) = fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(Uuid::new_v4())))));

    reducer.apply(Action::ProfileLoaded { request, profile: Some(profile_for(Uuid::new_v4())) });

    assert_eq!(reducer.state().profile, None);
    assert!(!reducer.state().loading);
}

#[test]
fn invariant_holds_over_mixed_sequences() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut reducer = Reducer::new();
    let mut issued = Vec::new();

    let steps = [
        Action::SessionLoaded(Some(session_for(a))),
        Action::AuthChanged(AuthChange::SessionPresent(session_for(b))),
        Action::AuthChanged(AuthChange::SessionAbsent),
        Action::AuthChanged(AuthChange::SessionPresent(session_for(a))),
        Action::RefreshProfile,
        Action::AuthChanged(AuthChange::SessionAbsent),
        Action::AuthChanged(AuthChange::SessionPresent(session_for(b))),
    ];
    for action in steps {
        if let Effect::FetchProfile { request, user_id } = reducer.apply(action) {
            issued.push((request, user_id));
        }
        assert!(reducer.state().is_consistent());
        // Resolve every fetch issued so far, newest first.
        for (request, user_id) in issued.iter().rev() {
            reducer.apply(Action::ProfileLoaded { request: *request, profile: Some(profile_for(*user_id)) });
            assert!(reducer.state().is_consistent());
        }
    }

    assert_eq!(reducer.state().user_id(), Some(b));
    assert!(!reducer.state().loading);
}

#[test]
fn loading_never_sticks_after_terminal_outcomes() {
    let user_id = Uuid::new_v4();
    let mut reducer = Reducer::new();
    fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(user_id)))));
    let (request, _) = fetch_of(reducer.apply(Action::AuthChanged(AuthChange::SessionPresent(session_for(user_id)))));

    reducer.apply(Action::ProfileLoaded { request, profile: None });
    assert!(!reducer.state().loading);

    reducer.apply(Action::AuthChanged(AuthChange::SessionPresent(session_for(user_id))));
    reducer.apply(Action::AuthChanged(AuthChange::SessionAbsent));
    assert!(!reducer.state().loading);
}

// =========================================================================
// user actions
// =========================================================================

#[test]
fn refresh_without_session_is_noop() {
    let mut reducer = Reducer::new();
    reducer.apply(Action::SessionLoaded(None));
    let before = reducer.state().clone();

    assert_eq!(reducer.apply(Action::RefreshProfile), Effect::None);
    assert_eq!(reducer.state(), &before);
}

#[test]
fn refresh_issues_fetch_without_touching_loading() {
    let user_id = Uuid::new_v4();
    let mut reducer = signed_in(user_id);

    let (_, fetched) = fetch_of(reducer.apply(Action::RefreshProfile));

    assert_eq!(fetched, user_id);
    assert!(!reducer.state().loading);
}

#[test]
fn toggle_flips_only_the_sidebar_flag() {
    let mut reducer = signed_in(Uuid::new_v4());
    let before = reducer.state().clone();

    reducer.apply(Action::ToggleMobileSidebar);
    assert!(reducer.state().mobile_sidebar_open);
    assert_eq!(reducer.state().session, before.session);
    assert_eq!(reducer.state().profile, before.profile);
    assert_eq!(reducer.state().loading, before.loading);

    reducer.apply(Action::ToggleMobileSidebar);
    assert_eq!(reducer.state(), &before);
}

#[test]
fn saved_profile_replaces_cached_copy() {
    let user_id = Uuid::new_v4();
    let mut reducer = signed_in(user_id);
    let mut saved = profile_for(user_id);
    saved.bio = Some("updated".into());

    reducer.apply(Action::ProfileSaved(saved.clone()));

    assert_eq!(reducer.state().profile, Some(saved));
}

#[test]
fn saved_profile_for_other_user_is_ignored() {
    let user_id = Uuid::new_v4();
    let mut reducer = signed_in(user_id);

    reducer.apply(Action::ProfileSaved(profile_for(Uuid::new_v4())));

    assert_eq!(reducer.state().profile.as_ref().map(|p| p.id), Some(user_id));
}

// =========================================================================
// shutdown
// =========================================================================

#[test]
fn nothing_applies_after_shutdown() {
    let user_id = Uuid::new_v4();
    let mut reducer = Reducer::new();
    let (request, _) = fetch_of(reducer.apply(Action::SessionLoaded(Some(session_for(user_id)))));

    reducer.apply(Action::Shutdown);
    let frozen = reducer.state().clone();

    reducer.apply(Action::ProfileLoaded { request, profile: Some(profile_for(user_id)) });
    reducer.apply(Action::AuthChanged(AuthChange::SessionAbsent));
    assert_eq!(reducer.apply(Action::RefreshProfile), Effect::None);

    assert!(reducer.is_closed());
    assert_eq!(reducer.pending(), None);
    assert_eq!(reducer.state(), &frozen);
}
