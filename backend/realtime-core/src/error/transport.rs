use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Failures inside a realtime transport session.
///
/// These never reach the connection gate: the transport logs them and decides
/// whether to reconnect.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Endpoint Error: {message} {location}")]
    Endpoint {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("Frame Error: {message} {location}")]
    Frame {
        message: String,
        location: ErrorLocation,
    },

    #[error("STOMP Error: {message} {location}")]
    Stomp {
        message: String,
        location: ErrorLocation,
    },

    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Heartbeat Timeout Error: {message} {location}")]
    HeartbeatTimeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    #[track_caller]
    pub fn frame(message: impl Into<String>) -> Self {
        TransportError::Frame {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn closed(message: impl Into<String>) -> Self {
        TransportError::Closed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether the session may be re-established with the same token.
    ///
    /// A rejected handshake or bad endpoint will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Endpoint { .. } => false,
            TransportError::Handshake { .. } => true,
            TransportError::Send { .. } => true,
            TransportError::Read { .. } => true,
            TransportError::Frame { .. } => true,
            TransportError::Stomp { .. } => true,
            TransportError::Decode { .. } => true,
            TransportError::HeartbeatTimeout { .. } => true,
            TransportError::Closed { .. } => true,
        }
    }
}

impl From<url::ParseError> for TransportError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        TransportError::Endpoint {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        TransportError::Decode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<WsError> for TransportError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        let location = ErrorLocation::from(Location::caller());
        let message = error.to_string();
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                TransportError::Closed { message, location }
            }
            WsError::Url(_) => TransportError::Endpoint { message, location },
            WsError::Http(_) | WsError::HttpFormat(_) => {
                TransportError::Handshake { message, location }
            }
            _ => TransportError::Read { message, location },
        }
    }
}
