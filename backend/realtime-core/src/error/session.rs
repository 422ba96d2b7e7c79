//! Error types for session operations (auth REST calls and the session actor).
//!
//! - HTTP status codes stored directly (not parsed from strings)
//! - `is_retryable()` uses categories and status codes, not message content
//! - `#[track_caller]` for automatic location capture

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("Server Error: HTTP {status_code} - {message} {location}")]
    Server {
        status_code: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Network Error: {message} {location}")]
    Network {
        message: String,
        is_timeout: bool,
        is_connection: bool,
        location: ErrorLocation,
    },

    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Session Actor Error: {message} {location}")]
    Actor {
        message: String,
        location: ErrorLocation,
    },
}

impl SessionError {
    /// Create from reqwest error with proper categorization.
    #[track_caller]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let location = ErrorLocation::from(Location::caller());

        // Check for specific error types BEFORE converting to string
        let is_timeout = error.is_timeout();
        let is_connect = error.is_connect();

        if let Some(status) = error.status() {
            return SessionError::Server {
                status_code: HttpStatusCode(status.as_u16()),
                message: error.to_string(),
                location,
            };
        }

        if error.is_decode() {
            return SessionError::Decode {
                message: error.to_string(),
                location,
            };
        }

        SessionError::Network {
            message: error.to_string(),
            is_timeout,
            is_connection: is_connect,
            location,
        }
    }

    #[track_caller]
    pub fn from_http_response(status_code: u16, body: impl Into<String>) -> Self {
        SessionError::Server {
            status_code: HttpStatusCode(status_code),
            message: body.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn actor(message: impl Into<String>) -> Self {
        SessionError::Actor {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Network {
                is_timeout,
                is_connection,
                ..
            } => *is_timeout || *is_connection,
            SessionError::Server { status_code, .. } => status_code.is_retryable(),
            SessionError::Decode { .. } => false,
            SessionError::UrlParse { .. } => false,
            SessionError::Actor { .. } => false,
        }
    }

    /// True when the server refused the credentials or token.
    pub fn is_auth_rejected(&self) -> bool {
        match self {
            SessionError::Server { status_code, .. } => status_code.is_auth_rejected(),
            _ => false,
        }
    }

    pub fn error_category(&self) -> &'static str {
        match self {
            SessionError::Server { status_code, .. } if status_code.is_client_error() => {
                "client_error"
            }
            SessionError::Server { status_code, .. } if status_code.is_server_error() => {
                "server_error"
            }
            SessionError::Server { .. } => "server",
            SessionError::Network {
                is_timeout: true, ..
            } => "timeout",
            SessionError::Network {
                is_connection: true,
                ..
            } => "connection",
            SessionError::Network { .. } => "network",
            SessionError::Decode { .. } => "decode",
            SessionError::UrlParse { .. } => "url",
            SessionError::Actor { .. } => "actor",
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            SessionError::Server { status_code, .. } => Some(status_code.0),
            _ => None,
        }
    }
}

impl From<url::ParseError> for SessionError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        SessionError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for SessionError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        SessionError::from_reqwest(&error)
    }
}
