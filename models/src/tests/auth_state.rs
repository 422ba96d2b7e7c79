use crate::{AuthSnapshot, AuthState, AuthStatus};

use common::RedactedToken;

/// **VALUE**: Verifies that a provider reporting `authenticated` without a token does not
/// produce an authenticated state.
///
/// **WHY THIS MATTERS**: Session providers attach the token after flipping the status. If the
/// half-populated snapshot counted as authenticated, the gate would try to connect with no
/// credentials.
#[test]
fn given_authenticated_snapshot_without_token_when_converted_then_unauthenticated() {
    // GIVEN: An authenticated snapshot with no token
    let snapshot = AuthSnapshot::new(AuthStatus::Authenticated, None);

    // WHEN: Converting to AuthState
    let state = AuthState::from(snapshot);

    // THEN: Treated as unauthenticated
    assert_eq!(state, AuthState::Unauthenticated);
}

/// **VALUE**: Verifies that an empty token is rejected the same way as a missing one.
#[test]
fn given_empty_token_when_building_authenticated_then_unauthenticated() {
    // GIVEN / WHEN: An authenticated state built from an empty token
    let state = AuthState::authenticated("");

    // THEN: No token is exposed
    assert_eq!(state, AuthState::Unauthenticated);
    assert!(state.token().is_none());
}

/// **VALUE**: Verifies the happy path of the snapshot conversion and status accessors.
#[test]
fn given_authenticated_snapshot_with_token_when_converted_then_carries_token() {
    // GIVEN: A complete snapshot
    let snapshot = AuthSnapshot::new(AuthStatus::Authenticated, Some(RedactedToken::new("T1")));

    // WHEN: Converting
    let state = AuthState::from(snapshot);

    // THEN: Authenticated with the same token
    assert!(state.is_authenticated());
    assert_eq!(state.status(), AuthStatus::Authenticated);
    assert_eq!(state.token().map(|t| t.expose()), Some("T1"));
}

/// **VALUE**: Verifies that snapshots parse from the provider's JSON shape.
#[test]
fn given_provider_json_when_deserialized_then_snapshot_matches() {
    // GIVEN: JSON as emitted by a session provider
    let json = r#"{"status":"loading"}"#;

    // WHEN: Deserializing
    let snapshot: AuthSnapshot = serde_json::from_str(json).unwrap();

    // THEN: Loading without token
    assert_eq!(snapshot.status, AuthStatus::Loading);
    assert!(snapshot.token.is_none());
    assert_eq!(AuthState::from(snapshot), AuthState::Loading);
}

/// **VALUE**: Verifies the initial state is `Loading`, so nothing connects before auth resolves.
#[test]
fn given_default_state_when_inspected_then_loading() {
    assert_eq!(AuthState::default(), AuthState::Loading);
}
