use crate::gate::{ConnectionGate, GatePhase};
use crate::tests::mock_transport::{
    MockTransport, noop_handler, recording_handler, shipment_update,
};

use common::RedactedToken;
use models::{AuthSnapshot, AuthState, AuthStatus};

/// **VALUE**: Checks that the derived intent tracks auth and the enabled flag after every step.
///
/// **WHY THIS MATTERS**: Intent is never stored; if it drifted from
/// `Authenticated && enabled` the gate would connect a signed-out user or
/// stay silent for a signed-in one.
#[test]
fn given_mixed_observations_when_each_applied_then_intent_matches_auth_and_enabled() {
    // GIVEN: A fresh gate over a mock transport
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    assert!(!gate.intent(), "Initial Loading state must not want a connection");
    assert_eq!(gate.phase(), GatePhase::Idle);

    let steps: Vec<(AuthState, bool)> = vec![
        (AuthState::Unauthenticated, true),
        (AuthState::authenticated("T1"), true),
        (AuthState::authenticated("T1"), false),
        (AuthState::Loading, false),
        (AuthState::authenticated("T2"), true),
        (AuthState::Loading, true),
        (AuthState::authenticated("T2"), true),
        (AuthState::Unauthenticated, false),
    ];

    for (auth, enabled) in steps {
        // WHEN: Applying the flag then the auth observation
        gate.set_enabled(enabled);
        gate.observe(auth.clone());

        // THEN: Intent and phase follow the formula
        let expected = enabled && auth.is_authenticated();
        assert_eq!(gate.intent(), expected, "Intent wrong for {auth:?}, enabled={enabled}");
        assert_eq!(gate.holds_connection(), expected);
        let phase = if expected {
            GatePhase::WantConnected
        } else {
            GatePhase::Idle
        };
        assert_eq!(gate.phase(), phase);
    }
}

/// **VALUE**: A disabled gate never opens the connection.
///
/// **BUG THIS CATCHES**: An establish path that checks auth but forgets the flag.
#[test]
fn given_gate_disabled_when_authenticated_repeatedly_then_connect_never_called() {
    // GIVEN: A gate disabled from the start
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler()).with_enabled(false);

    // WHEN: Auth flips around, including token changes
    gate.observe(AuthState::authenticated("T1"));
    gate.observe(AuthState::Loading);
    gate.observe(AuthState::authenticated("T2"));
    gate.observe(AuthState::Unauthenticated);
    gate.observe(AuthState::authenticated("T3"));

    // THEN: No connect and no listener
    assert!(mock.connect_calls().is_empty());
    assert_eq!(mock.add_listener_calls(), 0);
}

/// **VALUE**: Signing in opens exactly one connection with the session's token.
#[test]
fn given_unauthenticated_when_signed_in_then_connects_once_with_token() {
    // GIVEN: An enabled gate that has seen a signed-out session
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    gate.observe(AuthState::Unauthenticated);
    assert!(mock.connect_calls().is_empty());

    // WHEN: The session becomes authenticated
    gate.observe(AuthState::authenticated("T1"));

    // THEN: One connect with that token and one listener
    assert_eq!(mock.connect_calls(), vec!["T1".to_string()]);
    assert_eq!(mock.add_listener_calls(), 1);
    assert_eq!(mock.live_listeners(), 1);
}

/// **VALUE**: Losing the session disconnects once, however many intermediate states pass.
///
/// **BUG THIS CATCHES**: Issuing `disconnect()` on every non-authenticated
/// observation instead of only on the transition out of `WANT_CONNECTED`.
#[test]
fn given_authenticated_when_loading_repeats_then_signed_out_then_disconnects_once() {
    // GIVEN: A connected gate
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    gate.observe(AuthState::authenticated("T1"));

    // WHEN: Several Loading observations followed by Unauthenticated
    gate.observe(AuthState::Loading);
    gate.observe(AuthState::Loading);
    gate.observe(AuthState::Loading);
    gate.observe(AuthState::Unauthenticated);

    // THEN: Exactly one disconnect, listener removed
    assert_eq!(mock.disconnect_calls(), 1);
    assert_eq!(mock.cancel_calls(), 1);
    assert_eq!(mock.live_listeners(), 0);
}

/// **VALUE**: Swapping the handler does not touch the transport and takes effect immediately.
///
/// **WHY THIS MATTERS**: Consumers re-render and pass new closures all the
/// time; re-subscribing on each swap would churn listeners and could drop
/// messages between cancel and add.
#[test]
fn given_connected_when_handler_replaced_then_no_resubscribe_and_new_handler_receives() {
    // GIVEN: A connected gate with a first handler
    let mock = MockTransport::new();
    let (first, first_seen) = recording_handler();
    let mut gate = ConnectionGate::new(mock.clone(), first);
    gate.observe(AuthState::authenticated("T1"));
    mock.deliver(&shipment_update("CREATED"));

    // WHEN: The handler is replaced and another message arrives
    let (second, second_seen) = recording_handler();
    gate.replace_handler(second);
    mock.deliver(&shipment_update("IN_TRANSIT"));

    // THEN: Still one listener, and only the newest handler saw the second message
    assert_eq!(mock.add_listener_calls(), 1);
    assert_eq!(mock.connect_calls().len(), 1);
    assert_eq!(*first_seen.lock().unwrap(), vec!["CREATED".to_string()]);
    assert_eq!(*second_seen.lock().unwrap(), vec!["IN_TRANSIT".to_string()]);
}

/// **VALUE**: Teardown releases everything once and a second teardown is silent.
///
/// **BUG THIS CATCHES**: Double disconnect when both an explicit teardown and
/// `Drop` run, which would close a connection another consumer reopened.
#[test]
fn given_connected_when_torn_down_twice_then_single_cancel_and_disconnect() {
    // GIVEN: A connected gate
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    gate.observe(AuthState::authenticated("T1"));
    let before = mock.total_calls();

    // WHEN: Tearing down twice, then dropping
    gate.teardown();
    let after_first = mock.total_calls();
    gate.teardown();
    drop(gate);

    // THEN: One cancel + one disconnect, nothing after
    assert_eq!(mock.cancel_calls(), 1);
    assert_eq!(mock.disconnect_calls(), 1);
    assert_eq!(after_first - before, 2);
    assert_eq!(mock.total_calls(), after_first);
    assert_eq!(mock.live_listeners(), 0);
}

/// **VALUE**: Identical observations never produce a second connect.
#[test]
fn given_identical_observations_when_repeated_then_single_connect() {
    // GIVEN: A gate
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());

    // WHEN: The same (Authenticated, T1, enabled) arrives many times
    for _ in 0..5 {
        gate.set_enabled(true);
        gate.observe(AuthState::authenticated("T1"));
    }

    // THEN: One connect, one listener, no disconnect
    assert_eq!(mock.connect_calls().len(), 1);
    assert_eq!(mock.add_listener_calls(), 1);
    assert_eq!(mock.disconnect_calls(), 0);
}

/// **VALUE**: A rotated token re-opens the connection without stacking listeners.
///
/// **BUG THIS CATCHES**: Adding the new listener before cancelling the old one
/// leaves two attached and every message is handled twice.
#[test]
fn given_connected_when_token_changes_then_reconnects_with_single_listener() {
    // GIVEN: A gate connected with T1
    let mock = MockTransport::new();
    let (handler, seen) = recording_handler();
    let mut gate = ConnectionGate::new(mock.clone(), handler);
    gate.observe(AuthState::authenticated("T1"));

    // WHEN: The session refreshes to T2
    gate.observe(AuthState::authenticated("T2"));
    mock.deliver(&shipment_update("DELIVERED"));

    // THEN: Released then re-established, one live listener
    assert_eq!(mock.connect_calls(), vec!["T1".to_string(), "T2".to_string()]);
    assert_eq!(mock.disconnect_calls(), 1);
    assert_eq!(mock.live_listeners(), 1);
    assert_eq!(seen.lock().unwrap().len(), 1, "Message must be handled exactly once");
}

/// **VALUE**: Disabling and re-enabling cycles the connection.
#[test]
fn given_connected_when_disabled_then_enabled_then_disconnects_and_reconnects() {
    // GIVEN: A connected gate
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    gate.observe(AuthState::authenticated("T1"));

    // WHEN: Disabled
    gate.set_enabled(false);

    // THEN: Disconnected
    assert_eq!(mock.disconnect_calls(), 1);
    assert!(!gate.holds_connection());

    // WHEN: Enabled again with the same session
    gate.set_enabled(true);

    // THEN: Connected again
    assert_eq!(mock.connect_calls().len(), 2);
    assert_eq!(mock.live_listeners(), 1);
}

/// **VALUE**: Teardown always issues one disconnect, even when nothing was connected.
#[test]
fn given_idle_gate_when_torn_down_then_disconnects_once_without_cancel() {
    // GIVEN: A gate that never connected
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    gate.observe(AuthState::Unauthenticated);

    // WHEN: Torn down
    gate.teardown();

    // THEN: One disconnect, no cancel
    assert_eq!(mock.disconnect_calls(), 1);
    assert_eq!(mock.cancel_calls(), 0);
    assert!(gate.is_torn_down());
}

/// **VALUE**: Dropping the gate is the same as tearing it down.
#[test]
fn given_connected_gate_when_dropped_then_torn_down() {
    // GIVEN: A connected gate
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    gate.observe(AuthState::authenticated("T1"));

    // WHEN: Dropped
    drop(gate);

    // THEN: Listener cancelled and disconnected
    assert_eq!(mock.cancel_calls(), 1);
    assert_eq!(mock.disconnect_calls(), 1);
}

/// **VALUE**: Observations after teardown have no effect.
#[test]
fn given_torn_down_gate_when_authenticated_then_ignored() {
    // GIVEN: A torn-down gate
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());
    gate.teardown();
    let calls = mock.total_calls();

    // WHEN: A sign-in arrives late
    gate.observe(AuthState::authenticated("T1"));

    // THEN: Nothing happens
    assert_eq!(mock.total_calls(), calls);
    assert!(!gate.holds_connection());
}

/// **VALUE**: An `authenticated` snapshot with no token is treated as signed out.
///
/// **WHY THIS MATTERS**: Session providers can report the status before the
/// token is attached; connecting with an empty bearer would be rejected anyway.
#[test]
fn given_authenticated_snapshot_without_token_when_observed_then_stays_idle() {
    // GIVEN: A gate
    let mock = MockTransport::new();
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());

    // WHEN: Snapshots with missing and empty tokens arrive
    gate.observe_snapshot(AuthSnapshot::new(AuthStatus::Authenticated, None));
    gate.observe_snapshot(AuthSnapshot::new(
        AuthStatus::Authenticated,
        Some(RedactedToken::new("")),
    ));

    // THEN: No connection
    assert!(!gate.intent());
    assert!(mock.connect_calls().is_empty());

    // WHEN: The token shows up
    gate.observe_snapshot(AuthSnapshot::new(
        AuthStatus::Authenticated,
        Some(RedactedToken::new("T1")),
    ));

    // THEN: Connected
    assert_eq!(mock.connect_calls(), vec!["T1".to_string()]);
}

/// **VALUE**: A transport someone else already opened is not connected again.
#[test]
fn given_transport_already_connected_when_signed_in_then_only_listener_added() {
    // GIVEN: A shared transport reporting connected
    let mock = MockTransport::new();
    mock.set_connected(true);
    let mut gate = ConnectionGate::new(mock.clone(), noop_handler());

    // WHEN: Signed in
    gate.observe(AuthState::authenticated("T1"));

    // THEN: No connect, but a listener is attached
    assert!(mock.connect_calls().is_empty());
    assert_eq!(mock.live_listeners(), 1);
    assert!(gate.transport_connected());
}
