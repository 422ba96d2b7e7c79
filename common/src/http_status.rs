//! HTTP status codes as returned by the auth API.

use std::fmt;

/// Status code of a failed REST call, kept as a number so retry and sign-out
/// decisions never depend on parsing error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    pub const UNAUTHORIZED: Self = Self(401);
    pub const FORBIDDEN: Self = Self(403);
    pub const TOO_MANY_REQUESTS: Self = Self(429);

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// Gateway failures and rate limiting: the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        *self == Self::TOO_MANY_REQUESTS || matches!(self.0, 502..=504)
    }

    /// The server no longer accepts the credentials or token; the session is over.
    pub fn is_auth_rejected(&self) -> bool {
        *self == Self::UNAUTHORIZED || *self == Self::FORBIDDEN
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
