use crate::ErrorLocation;

use thiserror::Error;

/// Raised when a secret is about to leave the process through serde.
#[derive(Debug, Error)]
pub enum RedactError {
    #[error("Redact Error: {type_name} must not be serialized, call expose() explicitly {location}")]
    SecretSerialization {
        type_name: &'static str,
        location: ErrorLocation,
    },
}
