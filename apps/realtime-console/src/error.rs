use common::ErrorLocation;

use realtime_core::error::config::ConfigError;
use realtime_core::error::{SessionError, TransportError};

use std::panic::Location;

use thiserror::Error;

/// Errors that end the console run.
///
/// Core errors are flattened to their message so the variant says which
/// stage failed and the location says where the console observed it.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Error from this App
    #[error("Console Error: {message} {location}")]
    Console {
        message: String,
        location: ErrorLocation,
    },

    /// Config could not be loaded, validated or overridden
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Neither an access token nor a username/password pair was provided
    #[error("Credentials Error: {message} {location}")]
    Credentials {
        message: String,
        location: ErrorLocation,
    },

    /// Login, refresh or the session actor failed
    #[error("Session Error: {message} {location}")]
    Session {
        message: String,
        location: ErrorLocation,
    },

    /// Realtime transport could not be built
    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },
}

impl ConsoleError {
    #[track_caller]
    pub fn console(message: impl Into<String>) -> Self {
        ConsoleError::Console {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn credentials(message: impl Into<String>) -> Self {
        ConsoleError::Credentials {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for ConsoleError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ConsoleError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<SessionError> for ConsoleError {
    #[track_caller]
    fn from(error: SessionError) -> Self {
        ConsoleError::Session {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TransportError> for ConsoleError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        ConsoleError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
