use crate::RedactedToken;

/// **VALUE**: Verifies that a token never shows up in Debug or Display output.
///
/// **WHY THIS MATTERS**: The gate and transport log every connect/disconnect. If the
/// token leaked through `{:?}`, every log file would contain live credentials.
#[test]
fn given_token_when_formatted_then_value_is_redacted() {
    // GIVEN: A token
    let token = RedactedToken::new("eyJhbGciOiJIUzI1NiJ9.secret");

    // WHEN: Formatting with Debug and Display
    let debug = format!("{:?}", token);
    let display = format!("{}", token);

    // THEN: Neither contains the secret
    assert!(!debug.contains("secret"));
    assert!(!display.contains("secret"));
    assert_eq!(token.expose(), "eyJhbGciOiJIUzI1NiJ9.secret");
}

/// **VALUE**: Verifies that serializing a token is refused.
///
/// **BUG THIS CATCHES**: Would catch a derive(Serialize) sneaking in, which would let a
/// token end up in a saved config file or a JSON log.
#[test]
fn given_token_when_serialized_then_returns_error() {
    // GIVEN: A token
    let token = RedactedToken::new("abc");

    // WHEN: Serializing to JSON
    let result = serde_json::to_string(&token);

    // THEN: Serialization fails
    assert!(result.is_err(), "Token serialization must be refused");
}

/// **VALUE**: Verifies that tokens deserialize from plain JSON strings and compare by value.
#[test]
fn given_json_string_when_deserialized_then_token_equals_same_value() {
    // GIVEN / WHEN: A token from JSON
    let token: RedactedToken = serde_json::from_str("\"T1\"").unwrap();

    // THEN: Equal to a token built from the same value, unequal to another
    assert_eq!(token, RedactedToken::from("T1"));
    assert_ne!(token, RedactedToken::from("T2"));
    assert_eq!(token.preview(), "T1…");
}
