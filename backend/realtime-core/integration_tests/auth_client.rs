//! `AuthClient` and `SessionState` against a mocked backend.

use crate::helpers::TEST_ACCESS_TOKEN;

use realtime_core::{AuthClient, SessionState};

use common::RedactedToken;
use models::AuthState;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn auth_envelope(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "status": 200,
        "message": "OK",
        "data": {
            "accessToken": access,
            "refreshToken": refresh,
            "tokenType": "Bearer",
            "expiresIn": 3600,
            "userInfo": { "id": "u-1", "username": "dispatcher", "roles": ["ADMIN"] }
        }
    })
}

/// **VALUE**: Login posts the credentials and unwraps the response envelope.
#[tokio::test]
async fn given_valid_credentials_when_login_then_tokens_returned() {
    // GIVEN: A backend accepting the credentials
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "dispatcher", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_envelope(TEST_ACCESS_TOKEN, "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;
    let client = AuthClient::new(&server.uri()).unwrap();

    // WHEN: Logging in
    let response = client.login("dispatcher", "secret").await.unwrap();

    // THEN: Tokens and user come back
    assert_eq!(response.access_token.expose(), TEST_ACCESS_TOKEN);
    assert_eq!(response.refresh_token.expose(), "refresh-1");
    assert_eq!(response.expires_in, 3600);
    assert_eq!(response.user_info.map(|user| user.username).as_deref(), Some("dispatcher"));
}

/// **VALUE**: Rejected credentials surface as an auth rejection, not a retryable error.
#[tokio::test]
async fn given_bad_credentials_when_login_then_auth_rejected_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;
    let client = AuthClient::new(&server.uri()).unwrap();

    let error = client.login("dispatcher", "wrong").await.unwrap_err();

    assert!(error.is_auth_rejected());
    assert!(!error.is_retryable());
    assert_eq!(error.status_code(), Some(401));
}

/// **VALUE**: A base URL with a path prefix keeps the prefix.
///
/// **BUG THIS CATCHES**: `Url::join` on `http://host/backend` would resolve
/// `api/auth/login` to `http://host/api/auth/login`.
#[tokio::test]
async fn given_base_url_with_prefix_when_refreshing_then_prefix_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/backend/api/auth/refresh-token"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_envelope("access-2", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;
    let client = AuthClient::new(&format!("{}/backend", server.uri())).unwrap();

    let response = client
        .refresh_token(&RedactedToken::new("refresh-1"))
        .await
        .unwrap();

    assert_eq!(response.access_token.expose(), "access-2");
}

/// **VALUE**: Full session flow publishes the states a gate reacts to.
///
/// **WHY THIS MATTERS**: Sign-in must end Authenticated with the access token,
/// a rejected refresh must end the session, and sign-out must send the bearer.
#[tokio::test]
async fn given_session_when_signed_in_refresh_rejected_then_signed_out() {
    // GIVEN: A backend that logs in, rejects refresh, accepts logout
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_envelope(TEST_ACCESS_TOKEN, "refresh-1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Refresh token expired"))
        .mount(&server)
        .await;
    let client = AuthClient::new(&server.uri()).unwrap();
    let session = SessionState::new();
    let mut rx = session.subscribe();

    // WHEN: Signing in
    let response = session.sign_in(&client, "dispatcher", "secret").await.unwrap();
    rx.wait_for(|state| state.is_authenticated()).await.unwrap();

    // THEN: Authenticated with the access token
    assert_eq!(session.current(), AuthState::authenticated(TEST_ACCESS_TOKEN));

    // WHEN: Refresh is rejected
    let error = session.refresh(&client, &response.refresh_token).await.unwrap_err();

    // THEN: Session ended
    assert!(error.is_auth_rejected());
    rx.wait_for(|state| *state == AuthState::Unauthenticated).await.unwrap();
}

#[tokio::test]
async fn given_signed_in_session_when_signed_out_then_logout_sent_with_bearer() {
    // GIVEN: A signed-in session
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_envelope(TEST_ACCESS_TOKEN, "refresh-1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", format!("Bearer {TEST_ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let client = AuthClient::new(&server.uri()).unwrap();
    let session = SessionState::new();
    let mut rx = session.subscribe();
    session.sign_in(&client, "dispatcher", "secret").await.unwrap();
    rx.wait_for(|state| state.is_authenticated()).await.unwrap();

    // WHEN: Signing out
    session.sign_out(Some(&client)).await.unwrap();

    // THEN: Unauthenticated (and the mock verifies the logout call on drop)
    rx.wait_for(|state| *state == AuthState::Unauthenticated).await.unwrap();
}

/// **VALUE**: Sign-out straight after a token is set still logs out on the server.
///
/// **BUG THIS CATCHES**: If sign-out reads the session before the sign-in has
/// been applied it sees no token and never calls logout, leaking the
/// server-side session.
#[tokio::test]
async fn given_token_just_set_when_signed_out_immediately_then_logout_sent() {
    // GIVEN: A backend expecting exactly one logout with the fresh token
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let client = AuthClient::new(&server.uri()).unwrap();
    let session = SessionState::new();

    // WHEN: Setting the token and signing out with no wait in between
    session
        .update(realtime_core::SessionCommand::SignedIn(RedactedToken::new("fresh-token")))
        .await
        .unwrap();
    session.sign_out(Some(&client)).await.unwrap();

    // THEN: Unauthenticated, and the mock verifies the logout on drop
    assert_eq!(session.current(), AuthState::Unauthenticated);
}

/// **VALUE**: A failed login leaves the session signed out, not stuck in Loading.
#[tokio::test]
async fn given_unreachable_backend_when_sign_in_then_unauthenticated() {
    // GIVEN: Nothing listening on the port
    let port = {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        reserved.local_addr().unwrap().port()
    };
    let client = AuthClient::new(&format!("http://127.0.0.1:{port}")).unwrap();
    let session = SessionState::new();
    let mut rx = session.subscribe();

    // WHEN: Signing in
    let error = session.sign_in(&client, "dispatcher", "secret").await.unwrap_err();

    // THEN: Network error, session ends Unauthenticated
    assert!(matches!(error, realtime_core::error::SessionError::Network { .. }));
    rx.wait_for(|state| *state == AuthState::Unauthenticated).await.unwrap();
}
