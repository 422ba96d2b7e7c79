//! Runs a [`ConnectionGate`] on its own task, fed by watch channels.
//!
//! The task is the single logical thread the gate lives on: every auth or
//! enabled change is applied to the gate in arrival order, one at a time.
//! Dropping or shutting down the [`GateHandle`] ends the scope and tears the
//! gate down.

use crate::gate::{ConnectionGate, HandlerCell};
use crate::transport::MessageHandler;

use models::AuthState;

use log::{debug, error, info};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Handle to a gate running on a background task.
pub struct GateHandle {
    handler: HandlerCell,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl GateHandle {
    /// Swap the message handler of the running gate.
    pub fn replace_handler(&self, handler: MessageHandler) {
        self.handler.replace(handler);
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Tear the gate down and wait for the task to finish.
    pub async fn shutdown(self) {
        // Fails only if the task already ended on its own.
        let _ = self.shutdown.send(());

        if let Err(e) = self.task.await {
            error!("Realtime gate task failed: {e}");
        }
    }
}

/// Spawn `gate` on the current tokio runtime.
///
/// The current values of both channels are applied immediately; after that
/// every change is observed. If both channels close the gate tears itself down.
pub fn spawn_gate(
    gate: ConnectionGate,
    auth: watch::Receiver<AuthState>,
    enabled: watch::Receiver<bool>,
) -> GateHandle {
    let handler = gate.handler_cell();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(drive_gate(gate, auth, enabled, shutdown_rx));

    GateHandle {
        handler,
        shutdown: shutdown_tx,
        task,
    }
}

async fn drive_gate(
    mut gate: ConnectionGate,
    mut auth: watch::Receiver<AuthState>,
    mut enabled: watch::Receiver<bool>,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!("Realtime gate started");

    let initial_enabled = *enabled.borrow_and_update();
    gate.set_enabled(initial_enabled);
    let initial_auth = auth.borrow_and_update().clone();
    gate.observe(initial_auth);

    let mut auth_open = true;
    let mut enabled_open = true;

    while auth_open || enabled_open {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Realtime gate shutdown requested");
                break;
            }
            changed = auth.changed(), if auth_open => match changed {
                Ok(()) => {
                    let state = auth.borrow_and_update().clone();
                    gate.observe(state);
                }
                Err(_) => {
                    debug!("Auth state channel closed");
                    auth_open = false;
                }
            },
            changed = enabled.changed(), if enabled_open => match changed {
                Ok(()) => {
                    let flag = *enabled.borrow_and_update();
                    gate.set_enabled(flag);
                }
                Err(_) => {
                    debug!("Enabled flag channel closed");
                    enabled_open = false;
                }
            },
        }
    }

    gate.teardown();
}
