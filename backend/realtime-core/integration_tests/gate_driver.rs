//! Gate running on its own task, driven by the session actor.

use crate::helpers::{RecordingTransport, TEST_ACCESS_TOKEN, wait_for};

use realtime_core::{ConnectionGate, SessionCommand, SessionState, spawn_gate};

use common::RedactedToken;
use models::RealtimeMessage;

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

fn shipment(status: &str) -> RealtimeMessage {
    RealtimeMessage::ShipmentStatusUpdate {
        shipment_order_id: "so-42".to_string(),
        status: status.to_string(),
        message: String::new(),
        timestamp: None,
    }
}

/// **VALUE**: The spawned gate follows the session and the enabled flag, and
/// shutdown tears it down.
///
/// **WHY THIS MATTERS**: This is how the console wires things: the session
/// actor publishes, the gate task reacts. No call site drives the gate by hand.
#[tokio::test]
async fn given_spawned_gate_when_session_and_flag_change_then_transport_follows() {
    // GIVEN: A session, an enabled flag and a gate task
    let transport = RecordingTransport::new();
    let session = SessionState::new();
    let (enabled_tx, enabled_rx) = watch::channel(true);
    let gate = ConnectionGate::new(transport.clone(), Arc::new(|_: &RealtimeMessage| {}));
    let handle = spawn_gate(gate, session.subscribe(), enabled_rx);

    // WHEN: Signing in
    session
        .update(SessionCommand::SignedIn(RedactedToken::new(TEST_ACCESS_TOKEN)))
        .await
        .unwrap();

    // THEN: One connect with the session token
    wait_for("connect", || transport.connects().len() == 1).await;
    assert_eq!(transport.connects()[0], TEST_ACCESS_TOKEN);
    assert_eq!(transport.listeners(), 1);

    // WHEN: Realtime is switched off
    enabled_tx.send(false).unwrap();

    // THEN: Disconnected, listener gone
    wait_for("disconnect", || transport.disconnects() == 1).await;
    assert_eq!(transport.listeners(), 0);

    // WHEN: Switched back on, then the gate is shut down
    enabled_tx.send(true).unwrap();
    wait_for("reconnect", || transport.connects().len() == 2).await;
    handle.shutdown().await;

    // THEN: Teardown released the listener and disconnected once more
    assert_eq!(transport.disconnects(), 2);
    assert_eq!(transport.listeners(), 0);
}

/// **VALUE**: A handler swapped through the handle receives the next message.
#[tokio::test]
async fn given_running_gate_when_handler_replaced_then_new_handler_receives() {
    // GIVEN: A connected gate task
    let transport = RecordingTransport::new();
    let (auth_tx, auth_rx) = watch::channel(models::AuthState::authenticated(TEST_ACCESS_TOKEN));
    let (_enabled_tx, enabled_rx) = watch::channel(true);
    let gate = ConnectionGate::new(transport.clone(), Arc::new(|_: &RealtimeMessage| {}));
    let handle = spawn_gate(gate, auth_rx, enabled_rx);
    wait_for("listener", || transport.listeners() == 1).await;

    // WHEN: Replacing the handler and delivering
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    handle.replace_handler(Arc::new(move |message: &RealtimeMessage| {
        sink.lock().unwrap().push(message.status().to_string());
    }));
    transport.registry().notify(&shipment("ARRIVED"));

    // THEN: New handler ran, still a single listener
    assert_eq!(*seen.lock().unwrap(), vec!["ARRIVED".to_string()]);
    assert_eq!(transport.listeners(), 1);
    assert_eq!(transport.connects().len(), 1);

    drop(auth_tx);
    handle.shutdown().await;
}

/// **VALUE**: When every input closes, the gate tears itself down.
#[tokio::test]
async fn given_running_gate_when_inputs_closed_then_task_ends_and_disconnects() {
    // GIVEN: A connected gate task
    let transport = RecordingTransport::new();
    let (auth_tx, auth_rx) = watch::channel(models::AuthState::authenticated(TEST_ACCESS_TOKEN));
    let (enabled_tx, enabled_rx) = watch::channel(true);
    let gate = ConnectionGate::new(transport.clone(), Arc::new(|_: &RealtimeMessage| {}));
    let handle = spawn_gate(gate, auth_rx, enabled_rx);
    wait_for("connect", || transport.connects().len() == 1).await;

    // WHEN: Both senders are dropped
    drop(auth_tx);
    drop(enabled_tx);

    // THEN: The task finishes after one teardown
    wait_for("gate task to finish", || !handle.is_running()).await;
    assert_eq!(transport.disconnects(), 1);
    assert_eq!(transport.listeners(), 0);
}
