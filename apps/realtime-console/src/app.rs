//! Wires config, session, gate and transport into one console run.

use crate::credentials::Credentials;
use crate::error::ConsoleError;

use common::RedactedToken;
use models::AuthResponse;
use realtime_core::{
    AuthClient, ConnectionGate, MessageHandler, RealtimeConfig, RealtimeTransport,
    SessionCommand, SessionState, StompTransport, spawn_gate,
};

use std::future::{Future, pending};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::sleep;

/// Floor for the refresh timer, whatever lifetime the server reports.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Wait before retrying a refresh that failed for a transient reason.
const REFRESH_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// When and with what to rotate the access token.
#[derive(Debug)]
pub struct RefreshSchedule {
    pub refresh_token: RedactedToken,
    pub refresh_in: Duration,
}

impl RefreshSchedule {
    /// Refresh at 80% of the access token lifetime. `None` if the server
    /// reports no lifetime.
    pub fn from_response(response: &AuthResponse) -> Option<Self> {
        if response.expires_in == 0 {
            return None;
        }
        let lifetime = Duration::from_secs(response.expires_in);
        Some(Self {
            refresh_token: response.refresh_token.clone(),
            refresh_in: (lifetime * 4 / 5).max(MIN_REFRESH_INTERVAL),
        })
    }
}

pub struct Console {
    config: RealtimeConfig,
    client: AuthClient,
    session: SessionState,
}

impl Console {
    pub fn new(config: RealtimeConfig) -> Result<Self, ConsoleError> {
        let client = AuthClient::new(&config.api.base_url)?;
        Ok(Self {
            config,
            client,
            session: SessionState::new(),
        })
    }

    /// Load `realtime.json` from `config_dir` and apply environment overrides.
    pub fn load(config_dir: &Path) -> Result<Self, ConsoleError> {
        let mut config = RealtimeConfig::load(config_dir)?;
        config.apply_env_overrides()?;
        Self::new(config)
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Establish the session. Returns the refresh schedule when the session
    /// came from a login.
    pub async fn sign_in(
        &self,
        credentials: Credentials,
    ) -> Result<Option<RefreshSchedule>, ConsoleError> {
        match credentials {
            Credentials::Password { username, password } => {
                let response = self
                    .session
                    .sign_in(&self.client, &username, password.expose())
                    .await?;
                Ok(RefreshSchedule::from_response(&response))
            }
            Credentials::AccessToken(token) => {
                info!("Using pre-issued access token {}", token.preview());
                self.session.update(SessionCommand::SignedIn(token)).await?;
                Ok(None)
            }
        }
    }

    /// Run until `shutdown` resolves: sign in, keep the token fresh, and let
    /// the gate drive the realtime connection. Always signs out and tears the
    /// gate down before returning.
    pub async fn run_until(
        &self,
        credentials: Credentials,
        handler: MessageHandler,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ConsoleError> {
        let transport: Arc<dyn RealtimeTransport> =
            Arc::new(StompTransport::from_config(&self.config, Handle::current())?);
        let (enabled_tx, enabled_rx) = watch::channel(self.config.realtime.enabled);
        if !self.config.realtime.enabled {
            warn!("Realtime updates are disabled by configuration");
        }

        let gate = ConnectionGate::new(transport, handler);
        let gate_handle = spawn_gate(gate, self.session.subscribe(), enabled_rx);

        let result = self.serve(credentials, shutdown).await;
        if let Err(e) = &result {
            error!("Console stopped: {e}");
        }

        if let Err(e) = self.session.sign_out(Some(&self.client)).await {
            warn!("Sign-out failed: {e}");
        }
        gate_handle.shutdown().await;
        drop(enabled_tx);

        info!("Console finished");
        result
    }

    async fn serve(
        &self,
        credentials: Credentials,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ConsoleError> {
        tokio::pin!(shutdown);

        let mut schedule = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested while signing in");
                return Ok(());
            }
            signed_in = self.sign_in(credentials) => signed_in?,
        };

        loop {
            let wait = schedule.as_ref().map(|next| next.refresh_in);

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                _ = sleep_or_pending(wait) => {
                    schedule = self.refresh(schedule).await;
                }
            }
        }
    }

    async fn refresh(&self, schedule: Option<RefreshSchedule>) -> Option<RefreshSchedule> {
        let current = schedule?;

        match self.session.refresh(&self.client, &current.refresh_token).await {
            Ok(response) => RefreshSchedule::from_response(&response),
            Err(e) if e.is_auth_rejected() => {
                error!("Session expired, realtime updates stop until restart: {e}");
                None
            }
            Err(e) => {
                warn!("Token refresh failed, retrying in {REFRESH_RETRY_INTERVAL:?}: {e}");
                Some(RefreshSchedule {
                    refresh_token: current.refresh_token,
                    refresh_in: REFRESH_RETRY_INTERVAL,
                })
            }
        }
    }
}

async fn sleep_or_pending(wait: Option<Duration>) {
    match wait {
        Some(wait) => sleep(wait).await,
        None => pending().await,
    }
}
