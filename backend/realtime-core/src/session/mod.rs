//! Session state management using actor pattern.
//!
//! [`SessionState`] owns the current [`AuthState`] and publishes every
//! transition on a `watch` channel, which is what the connection gate
//! observes.
//!
//! # Architecture
//!
//! - Commands are sent via an mpsc channel, each with a oneshot ack
//! - A dedicated task applies them sequentially
//! - `update` returns once the actor has applied the command, so
//!   [`SessionState::current`] reads back what was just sent
//! - Observers hold `watch::Receiver<AuthState>` and see each distinct state
//!
//! Commands that leave the state unchanged (a refresh returning the same
//! token) are applied without waking observers.

mod client;

pub use client::AuthClient;

use crate::error::session::SessionError;

use common::RedactedToken;
use models::{AuthResponse, AuthState};

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{Mutex, mpsc, oneshot, watch};

/// Commands that mutate session state.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Session is being resolved (startup, login in flight)
    Loading,

    /// Login succeeded
    SignedIn(RedactedToken),

    /// Access token was rotated
    Refreshed(RedactedToken),

    /// Logout, expiry or failed login
    SignedOut,
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Loading => "Loading",
            SessionCommand::SignedIn(_) => "SignedIn",
            SessionCommand::Refreshed(_) => "Refreshed",
            SessionCommand::SignedOut => "SignedOut",
        }
    }
}

/// A command plus the channel the actor acknowledges it on.
type Envelope = (SessionCommand, oneshot::Sender<()>);

/// Session state manager.
///
/// # Thread Safety
///
/// This type is `Clone` and can be shared across tasks. All clones share the
/// same underlying state and actor.
#[derive(Clone)]
pub struct SessionState {
    /// Channel to send state mutation commands to the actor
    command_tx: Arc<Mutex<Option<mpsc::Sender<Envelope>>>>,

    /// Publishes the current auth state to observers
    auth_tx: Arc<watch::Sender<AuthState>>,

    /// Track if actor has been initialized
    actor_init: Arc<Mutex<bool>>,
}

impl SessionState {
    /// Create a session in `Loading`. The actor is spawned lazily on first update.
    pub fn new() -> Self {
        let (auth_tx, _) = watch::channel(AuthState::Loading);
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            auth_tx: Arc::new(auth_tx),
            actor_init: Arc::new(Mutex::new(false)),
        }
    }

    /// Send a state update command and wait until the actor has applied it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Actor`] if the session actor has died.
    pub async fn update(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.ensure_actor().await;

        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let tx_guard = self.command_tx.lock().await;
            let tx = tx_guard
                .as_ref()
                .ok_or_else(|| SessionError::actor("Session actor not initialized"))?;

            tx.send((cmd, ack_tx)).await.map_err(|e| {
                let (cmd, _) = e.0;
                SessionError::actor(format!("Session actor died, {} not applied", cmd.name()))
            })?;
        }

        ack_rx
            .await
            .map_err(|_| SessionError::actor("Session actor stopped before applying command"))
    }

    /// Observe auth transitions. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.auth_tx.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.auth_tx.borrow().clone()
    }

    /// Log in and publish the resulting state.
    ///
    /// Publishes `Loading` first; a failed login publishes `Unauthenticated`.
    pub async fn sign_in(
        &self,
        client: &AuthClient,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, SessionError> {
        self.update(SessionCommand::Loading).await?;

        match client.login(username, password).await {
            Ok(response) => {
                self.update(SessionCommand::SignedIn(response.access_token.clone()))
                    .await?;
                Ok(response)
            }
            Err(e) => {
                warn!("Login failed ({}): {}", e.error_category(), e);
                self.update(SessionCommand::SignedOut).await?;
                Err(e)
            }
        }
    }

    /// Rotate the access token.
    ///
    /// A rejected refresh token ends the session; transient failures leave it as is.
    pub async fn refresh(
        &self,
        client: &AuthClient,
        refresh_token: &RedactedToken,
    ) -> Result<AuthResponse, SessionError> {
        match client.refresh_token(refresh_token).await {
            Ok(response) => {
                self.update(SessionCommand::Refreshed(response.access_token.clone()))
                    .await?;
                Ok(response)
            }
            Err(e) => {
                if e.is_auth_rejected() {
                    warn!("Refresh token rejected, signing out");
                    self.update(SessionCommand::SignedOut).await?;
                }
                Err(e)
            }
        }
    }

    /// Log out on the server (best effort) and publish `Unauthenticated`.
    pub async fn sign_out(&self, client: Option<&AuthClient>) -> Result<(), SessionError> {
        if let (Some(client), Some(token)) = (client, self.current().token().cloned()) {
            if let Err(e) = client.logout(&token).await {
                warn!("Server logout failed, clearing local session anyway: {}", e);
            }
        }
        self.update(SessionCommand::SignedOut).await
    }

    /// Ensure actor is spawned (called lazily from async context).
    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(100);
            let auth_clone = Arc::clone(&self.auth_tx);

            // Store tx BEFORE spawning to avoid race
            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(session_actor(rx, auth_clone));
            *init_guard = true;
            info!("Session state actor spawned");
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// The session actor task.
///
/// Runs until every `SessionState` handle is dropped.
async fn session_actor(
    mut command_rx: mpsc::Receiver<Envelope>,
    auth: Arc<watch::Sender<AuthState>>,
) {
    info!("Session state actor started");

    while let Some((cmd, ack)) = command_rx.recv().await {
        let next = match cmd {
            SessionCommand::Loading => AuthState::Loading,
            SessionCommand::SignedIn(token) => AuthState::authenticated(token),
            SessionCommand::Refreshed(token) => {
                if !auth.borrow().is_authenticated() {
                    warn!("Token refreshed while not signed in, treating as sign-in");
                }
                AuthState::authenticated(token)
            }
            SessionCommand::SignedOut => AuthState::Unauthenticated,
        };

        let changed = auth.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                info!("Session status {:?} -> {:?}", current.status(), next.status());
                *current = next;
                true
            }
        });

        if !changed {
            log::debug!("Session command left state unchanged");
        }

        // The caller may have stopped waiting.
        let _ = ack.send(());
    }

    info!("Session state actor stopped");
}
