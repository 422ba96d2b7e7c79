// Unit tests for error module
// Tests conversion from core errors

use crate::error::ConsoleError;

use realtime_core::error::SessionError;
use realtime_core::error::config::ConfigError;

/// **VALUE**: Core errors keep their message and gain the console stage.
///
/// **WHY THIS MATTERS**: The console prints a single line on failure. It has
/// to say both which stage failed and what the core reported.
#[test]
fn given_session_error_when_converted_then_session_variant_with_core_message() {
    // GIVEN: A rejected login
    let core = SessionError::from_http_response(401, "Bad credentials");

    // WHEN: Converting
    let err = ConsoleError::from(core);

    // THEN: Session variant carrying the HTTP detail
    assert!(matches!(err, ConsoleError::Session { .. }));
    let text = err.to_string();
    assert!(text.starts_with("Session Error:"), "Got: {text}");
    assert!(text.contains("401"));
    assert!(text.contains("Bad credentials"));
}

#[test]
fn given_config_error_when_converted_then_config_variant() {
    let err = ConsoleError::from(ConfigError::validation("realtime.ws_path must start with '/'"));

    assert!(matches!(err, ConsoleError::Config { .. }));
    assert!(err.to_string().contains("ws_path"));
}

/// **VALUE**: The location points at the console call site, not inside the helper.
#[test]
fn given_credentials_helper_when_called_then_location_is_caller() {
    let err = ConsoleError::credentials("missing");

    let ConsoleError::Credentials { location, .. } = err else {
        panic!("Expected Credentials variant");
    };
    assert!(location.file.ends_with("error.rs"));
    assert!(location.file.contains("tests"));
}
