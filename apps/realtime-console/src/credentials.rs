use crate::error::ConsoleError;

use common::RedactedToken;

use std::env;
use std::fmt;

pub const ENV_USERNAME: &str = "REALTIME_USERNAME";
pub const ENV_PASSWORD: &str = "REALTIME_PASSWORD";
/// A pre-issued access token skips the login call.
pub const ENV_ACCESS_TOKEN: &str = "REALTIME_ACCESS_TOKEN";

/// How the console obtains its session.
pub enum Credentials {
    Password {
        username: String,
        password: RedactedToken,
    },
    AccessToken(RedactedToken),
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConsoleError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve credentials through `lookup`. An access token wins over a
    /// username/password pair; blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConsoleError> {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(token) = read(ENV_ACCESS_TOKEN) {
            return Ok(Credentials::AccessToken(RedactedToken::new(token)));
        }

        match (read(ENV_USERNAME), read(ENV_PASSWORD)) {
            (Some(username), Some(password)) => Ok(Credentials::Password {
                username,
                password: RedactedToken::new(password),
            }),
            (Some(_), None) => Err(ConsoleError::credentials(format!(
                "{ENV_USERNAME} is set but {ENV_PASSWORD} is missing"
            ))),
            _ => Err(ConsoleError::credentials(format!(
                "Set {ENV_ACCESS_TOKEN}, or {ENV_USERNAME} and {ENV_PASSWORD}"
            ))),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, password } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", password)
                .finish(),
            Credentials::AccessToken(token) => f.debug_tuple("AccessToken").field(token).finish(),
        }
    }
}
