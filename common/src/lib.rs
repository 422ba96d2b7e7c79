//! Shared building blocks for the realtime workspace.
//!
//! Everything here is dependency-light and used by every other crate:
//!
//! - [`ErrorLocation`] for `#[track_caller]` error provenance
//! - [`RedactedToken`] for bearer tokens that must never reach a log line
//! - [`HttpStatusCode`] for retry decisions on REST failures

pub mod error;
pub mod http_status;
pub mod redacted_token;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;
