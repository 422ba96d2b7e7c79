//! Session-gated control of the shared realtime connection.
//!
//! A [`ConnectionGate`] decides *when* the realtime transport should be open:
//! only while the session is authenticated and the gate is enabled. It owns
//! no socket; it issues `connect`/`disconnect` on the shared transport and
//! keeps exactly one listener attached for as long as it holds a connection.
//!
//! # State machine
//!
//! ```text
//!            Authenticated(token) && enabled
//!   IDLE  ─────────────────────────────────▶  WANT_CONNECTED
//!         ◀─────────────────────────────────
//!            Loading | Unauthenticated | !enabled
//! ```
//!
//! Re-entering `WANT_CONNECTED` with the same token is a no-op. A different
//! token (refresh, re-login as another user) releases the old connection and
//! opens a new one. There is no terminal state; only [`ConnectionGate::teardown`]
//! ends the gate's authority.
//!
//! The gate never retries and never reacts to transport health; reconnects
//! are the transport's business.

mod driver;
mod handler;

pub use driver::{GateHandle, spawn_gate};
pub use handler::HandlerCell;

use crate::transport::{ListenerCancel, MessageHandler, RealtimeTransport};

use common::RedactedToken;
use models::{AuthSnapshot, AuthState, RealtimeMessage};

use std::sync::Arc;

use log::{debug, info, trace};

/// Derived connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    WantConnected,
}

/// Connection this gate requested and the listener it attached for it.
struct ActiveConnection {
    token: RedactedToken,
    listener: ListenerCancel,
}

pub struct ConnectionGate {
    transport: Arc<dyn RealtimeTransport>,
    handler: HandlerCell,
    enabled: bool,
    auth: AuthState,
    active: Option<ActiveConnection>,
    torn_down: bool,
}

impl ConnectionGate {
    /// New gate in `IDLE`, enabled, with auth still `Loading`.
    pub fn new(transport: Arc<dyn RealtimeTransport>, handler: MessageHandler) -> Self {
        Self {
            transport,
            handler: HandlerCell::new(handler),
            enabled: true,
            auth: AuthState::Loading,
            active: None,
            torn_down: false,
        }
    }

    /// Set the initial enabled flag without issuing any transport call.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self.reconcile();
        self
    }

    /// Record an auth observation and reconcile the connection.
    pub fn observe(&mut self, auth: AuthState) {
        trace!("Gate observed auth status {:?}", auth.status());
        self.auth = auth;
        self.reconcile();
    }

    pub fn observe_snapshot(&mut self, snapshot: AuthSnapshot) {
        self.observe(AuthState::from(snapshot));
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!("Realtime gate {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        self.reconcile();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true` iff the session is authenticated and the gate is enabled.
    pub fn intent(&self) -> bool {
        self.enabled && self.auth.is_authenticated()
    }

    pub fn phase(&self) -> GatePhase {
        if self.intent() {
            GatePhase::WantConnected
        } else {
            GatePhase::Idle
        }
    }

    /// Whether this gate currently holds a connection request and listener.
    pub fn holds_connection(&self) -> bool {
        self.active.is_some()
    }

    /// Polled transport status; the gate does not act on it.
    pub fn transport_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Swap the message handler. The listener stays registered.
    pub fn replace_handler(&self, handler: MessageHandler) {
        self.handler.replace(handler);
    }

    pub fn handler_cell(&self) -> HandlerCell {
        self.handler.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// End the gate's scope: remove the listener and disconnect unconditionally.
    ///
    /// Only the first call touches the transport. Later observations are ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            debug!("Realtime gate already torn down");
            return;
        }
        self.torn_down = true;

        if let Some(active) = self.active.take() {
            active.listener.cancel();
        }
        self.transport.disconnect();
        info!("Realtime gate torn down");
    }

    fn reconcile(&mut self) {
        if self.torn_down {
            debug!("Ignoring observation on torn-down gate");
            return;
        }

        let desired = if self.enabled {
            self.auth.token().cloned()
        } else {
            None
        };

        let held = self.active.as_ref().map(|active| active.token.clone());

        match (desired, held) {
            (Some(token), Some(held)) if held == token => {
                trace!("Connection intent unchanged");
            }
            (Some(token), Some(_)) => {
                info!("Session token changed, re-establishing realtime connection");
                self.release();
                self.establish(token);
            }
            (Some(token), None) => self.establish(token),
            (None, Some(_)) => self.release(),
            (None, None) => trace!("Realtime connection not wanted"),
        }
    }

    fn establish(&mut self, token: RedactedToken) {
        if self.transport.is_connected() {
            debug!("Transport already connected, not issuing connect");
        } else {
            info!("Session authenticated, requesting realtime connection");
            self.transport.connect(&token);
        }

        let cell = self.handler.clone();
        let listener = self.transport.add_listener(Arc::new(move |message: &RealtimeMessage| {
            cell.dispatch(message);
        }));

        self.active = Some(ActiveConnection { token, listener });
    }

    fn release(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Realtime connection no longer wanted, disconnecting");
            active.listener.cancel();
            self.transport.disconnect();
        }
    }
}

impl Drop for ConnectionGate {
    fn drop(&mut self) {
        self.teardown();
    }
}
