use crate::HttpStatusCode;

/// **VALUE**: Retry and sign-out decisions come from the numeric code.
///
/// **BUG THIS CATCHES**: Retrying a 401 would hammer the login endpoint with a
/// dead token; not retrying a 503 would end a session over a deploy.
#[test]
fn given_status_codes_when_classified_then_retry_and_auth_flags_match() {
    let cases = [
        (401, false, true),
        (403, false, true),
        (404, false, false),
        (429, true, false),
        (500, false, false),
        (502, true, false),
        (503, true, false),
        (504, true, false),
    ];

    for (code, retryable, rejected) in cases {
        let status = HttpStatusCode::from(code);
        assert_eq!(status.is_retryable(), retryable, "retryable for {code}");
        assert_eq!(status.is_auth_rejected(), rejected, "auth rejected for {code}");
    }
    assert!(HttpStatusCode(418).is_client_error());
    assert!(HttpStatusCode(599).is_server_error());
}
