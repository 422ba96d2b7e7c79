//! Realtime transport abstraction.
//!
//! The connection gate never talks to a socket directly. It drives a
//! [`RealtimeTransport`], a process-wide shared connection that:
//!
//! - opens a session for a bearer token (`connect`)
//! - closes it (`disconnect`)
//! - reports whether a session is currently up (`is_connected`)
//! - fans incoming messages out to registered listeners (`add_listener`)
//!
//! All four calls are fire-and-forget and never block on network I/O. The
//! concrete [`StompTransport`] runs its socket on a background tokio task and
//! owns retry policy; callers only see the polled connection flag.

mod listeners;
mod reconnect;
pub mod stomp;
mod ws;

pub use listeners::ListenerRegistry;
pub use reconnect::ReconnectPolicy;
pub use ws::{StompSettings, StompTransport, websocket_endpoint};

use common::RedactedToken;
use models::RealtimeMessage;

use std::fmt;
use std::sync::Arc;

/// Callback receiving every message delivered by a transport.
pub type MessageHandler = Arc<dyn Fn(&RealtimeMessage) + Send + Sync>;

/// Contract the connection gate consumes.
///
/// Implementations must tolerate redundant calls: `connect` while connected or
/// connecting and `disconnect` while idle are no-ops.
pub trait RealtimeTransport: Send + Sync {
    fn connect(&self, token: &RedactedToken);

    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Register a listener. The returned [`ListenerCancel`] is the only way to
    /// remove it; the transport never drops registrations on its own.
    fn add_listener(&self, handler: MessageHandler) -> ListenerCancel;
}

/// Cancellation handle for one listener registration.
///
/// Cancelling consumes the handle, so a registration can be removed at most
/// once by its owner. Dropping the handle without cancelling leaves the
/// listener attached.
pub struct ListenerCancel {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerCancel {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for ListenerCancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerCancel")
            .field("pending", &self.cancel.is_some())
            .finish()
    }
}
