//! Domain models for the realtime workspace.
//!
//! This crate contains pure data structures: the authentication state the
//! connection gate observes, the DTOs of the auth REST API, and the realtime
//! status messages pushed by the logistics backend. Models carry no I/O.
//!
//! ## Architecture
//!
//! - **models** (this crate): Pure data structures
//! - **realtime-core**: Gate, transport and session logic operating on models
//! - **realtime-console**: Application wiring everything together

pub mod auth;
pub mod realtime_message;

#[cfg(test)]
mod tests;

pub use auth::response::{ApiResponse, AuthResponse, LoginRequest, RefreshTokenRequest, UserInfo};
pub use auth::{AuthSnapshot, AuthState, AuthStatus};
pub use realtime_message::{EntityType, RealtimeMessage};
