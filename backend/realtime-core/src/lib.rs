pub mod config;
pub mod error;
pub mod gate;
pub mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::RealtimeConfig;
pub use error::CoreError;
pub use gate::{ConnectionGate, GateHandle, GatePhase, HandlerCell, spawn_gate};
pub use session::{AuthClient, SessionCommand, SessionState};
pub use transport::{ListenerCancel, MessageHandler, RealtimeTransport, StompTransport};

pub const DEFAULT_API_HOSTNAME: &str = "localhost";
pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_API_BASE_URL: &str =
    const_format::concatcp!("http://", DEFAULT_API_HOSTNAME, ":", DEFAULT_API_PORT);
pub const DEFAULT_WS_PATH: &str = "/ws";
