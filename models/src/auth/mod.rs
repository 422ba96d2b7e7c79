//! Authentication state as seen by consumers of a session.

pub mod response;

use common::RedactedToken;

use serde::Deserialize;

/// Coarse session status, mirroring what a session provider reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Raw observation pushed by a session provider: a status plus an optional token.
///
/// The pair is not guaranteed to be consistent (a provider may report
/// `authenticated` before the token is attached), so consumers convert it
/// into an [`AuthState`] first.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    #[serde(default)]
    pub token: Option<RedactedToken>,
}

impl AuthSnapshot {
    pub fn new(status: AuthStatus, token: Option<RedactedToken>) -> Self {
        Self { status, token }
    }
}

/// Authentication state of the current session.
///
/// `Authenticated` always carries a non-empty token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Loading,
    Authenticated(RedactedToken),
    Unauthenticated,
}

impl AuthState {
    /// Build an authenticated state, or `Unauthenticated` if the token is empty.
    pub fn authenticated(token: impl Into<RedactedToken>) -> Self {
        let token = token.into();
        if token.is_empty() {
            AuthState::Unauthenticated
        } else {
            AuthState::Authenticated(token)
        }
    }

    pub fn status(&self) -> AuthStatus {
        match self {
            AuthState::Loading => AuthStatus::Loading,
            AuthState::Authenticated(_) => AuthStatus::Authenticated,
            AuthState::Unauthenticated => AuthStatus::Unauthenticated,
        }
    }

    pub fn token(&self) -> Option<&RedactedToken> {
        match self {
            AuthState::Authenticated(token) => Some(token),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

impl From<AuthSnapshot> for AuthState {
    /// An `authenticated` snapshot without a usable token counts as unauthenticated.
    fn from(snapshot: AuthSnapshot) -> Self {
        match snapshot.status {
            AuthStatus::Loading => AuthState::Loading,
            AuthStatus::Unauthenticated => AuthState::Unauthenticated,
            AuthStatus::Authenticated => match snapshot.token {
                Some(token) => AuthState::authenticated(token),
                None => AuthState::Unauthenticated,
            },
        }
    }
}
