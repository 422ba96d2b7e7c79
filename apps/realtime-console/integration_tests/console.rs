//! Console runs against a mocked backend.

use realtime_console::app::{Console, RefreshSchedule};
use realtime_console::credentials::Credentials;
use realtime_console::error::ConsoleError;

use common::RedactedToken;
use models::{AuthResponse, AuthState, RealtimeMessage};
use realtime_core::{MessageHandler, RealtimeConfig};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCESS_TOKEN: &str = "console-access-token";

fn config_for(server: &MockServer) -> RealtimeConfig {
    let mut config = RealtimeConfig::default();
    config.api.base_url = server.uri();
    config.realtime.enabled = false;
    config
}

fn ignore_messages() -> MessageHandler {
    Arc::new(|_: &RealtimeMessage| {})
}

fn login_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": 200,
        "message": "Login successful",
        "data": {
            "accessToken": ACCESS_TOKEN,
            "refreshToken": "console-refresh-token",
            "tokenType": "Bearer",
            "expiresIn": 3600
        }
    }))
}

/// Resolves once the console's session is signed in.
fn once_signed_in(console: &Console) -> impl Future<Output = ()> + 'static {
    let mut rx = console.session().subscribe();
    async move {
        let _ = rx.wait_for(|state| state.is_authenticated()).await;
    }
}

fn password() -> Credentials {
    Credentials::Password {
        username: "dispatcher".to_string(),
        password: RedactedToken::new("secret"),
    }
}

/// **VALUE**: A full run logs in, and on shutdown logs out with the bearer and
/// leaves the session signed out.
///
/// **WHY THIS MATTERS**: ctrl-c must release the server-side session too,
/// otherwise tokens pile up for every console restart.
#[tokio::test]
async fn given_password_credentials_when_run_until_shutdown_then_login_and_logout() {
    // GIVEN: A backend expecting one login and one logout
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let console = Console::new(config_for(&server)).unwrap();

    // WHEN: Running until shutdown right after sign-in
    let shutdown = once_signed_in(&console);
    let result = console.run_until(password(), ignore_messages(), shutdown).await;

    // THEN: Clean exit, signed out
    assert!(result.is_ok(), "Run failed: {result:?}");
    let mut rx = console.session().subscribe();
    rx.wait_for(|state| *state == AuthState::Unauthenticated)
        .await
        .unwrap();
}

/// **VALUE**: A pre-issued token skips login entirely.
#[tokio::test]
async fn given_access_token_when_run_then_no_login_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response())
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer pre-issued"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let console = Console::new(config_for(&server)).unwrap();
    let shutdown = once_signed_in(&console);

    let result = console
        .run_until(
            Credentials::AccessToken(RedactedToken::new("pre-issued")),
            ignore_messages(),
            shutdown,
        )
        .await;

    assert!(result.is_ok(), "Run failed: {result:?}");
}

/// **VALUE**: Shutdown during a slow login ends the run without waiting for
/// the backend.
///
/// **BUG THIS CATCHES**: Awaiting the login before watching for shutdown
/// leaves ctrl-c ignored until the HTTP call returns or times out.
#[tokio::test]
async fn given_slow_login_when_shutdown_requested_then_run_ends_promptly() {
    // GIVEN: A backend that takes far longer to answer than the shutdown delay
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response().set_delay(Duration::from_secs(20)))
        .mount(&server)
        .await;
    let console = Console::new(config_for(&server)).unwrap();

    // WHEN: Shutdown fires while the login is in flight
    let run = console.run_until(
        password(),
        ignore_messages(),
        tokio::time::sleep(Duration::from_millis(200)),
    );
    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("Run ignored shutdown during sign-in");

    // THEN: Clean exit, signed out
    assert!(result.is_ok(), "Run failed: {result:?}");
    assert_eq!(console.session().current(), AuthState::Unauthenticated);
}

/// **VALUE**: Rejected credentials end the run with a session error.
#[tokio::test]
async fn given_rejected_credentials_when_run_then_session_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;
    let console = Console::new(config_for(&server)).unwrap();

    let result = console
        .run_until(password(), ignore_messages(), std::future::pending())
        .await;

    assert!(matches!(result, Err(ConsoleError::Session { .. })));
    assert_eq!(console.session().current(), AuthState::Unauthenticated);
}

/// **VALUE**: Token refresh is scheduled at 80% of the lifetime, with a floor.
#[test]
fn given_auth_responses_when_scheduled_then_refresh_before_expiry() {
    let response = |expires_in: u64| -> AuthResponse {
        serde_json::from_value(json!({
            "accessToken": "a",
            "refreshToken": "r",
            "expiresIn": expires_in
        }))
        .unwrap()
    };

    let hour = RefreshSchedule::from_response(&response(3600)).unwrap();
    assert_eq!(hour.refresh_in, Duration::from_secs(2880));
    assert_eq!(hour.refresh_token.expose(), "r");

    let short = RefreshSchedule::from_response(&response(2)).unwrap();
    assert_eq!(short.refresh_in, Duration::from_secs(5));

    assert!(RefreshSchedule::from_response(&response(0)).is_none());
}
