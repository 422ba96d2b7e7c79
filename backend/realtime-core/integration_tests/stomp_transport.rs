//! End-to-end tests of `StompTransport` against a loopback broker.

use crate::helpers::{
    TEST_ACCESS_TOKEN, accept_client, bind_broker, error_frame, handshake,
    handshake_with_heartbeat, message_frame, read_frame, read_text, reject_connect, wait_for,
};

use realtime_core::transport::stomp::StompCommand;
use realtime_core::transport::{StompSettings, StompTransport};
use realtime_core::{MessageHandler, RealtimeTransport};

use common::RedactedToken;
use models::RealtimeMessage;

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

const TOPICS: [&str; 2] = ["/topic/subshipment-status", "/topic/status-updates"];

fn settings(port: u16, max_reconnect_attempts: u32) -> StompSettings {
    StompSettings {
        endpoint: Url::parse(&format!("ws://127.0.0.1:{port}/ws")).unwrap(),
        topics: TOPICS.iter().map(|topic| topic.to_string()).collect(),
        reconnect_delay: Duration::from_millis(50),
        max_reconnect_attempts,
        heartbeat_outgoing: Duration::ZERO,
        heartbeat_incoming: Duration::ZERO,
        connect_timeout: Duration::from_secs(5),
    }
}

fn forwarding_handler() -> (MessageHandler, mpsc::UnboundedReceiver<RealtimeMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: MessageHandler = Arc::new(move |message: &RealtimeMessage| {
        let _ = tx.send(message.clone());
    });
    (handler, rx)
}

const SUB_STATUS_BODY: &str = r#"{"type":"SUB_STATUS_UPDATE","subShipmentId":"sub-7","shipmentOrderId":"so-1","status":"IN_TRANSIT","message":"Picked up"}"#;

/// **VALUE**: Full session: bearer on upgrade and CONNECT, one SUBSCRIBE per
/// topic, MESSAGE delivered to listeners, DISCONNECT on shutdown.
///
/// **WHY THIS MATTERS**: This is the whole contract the gate relies on. A
/// missing bearer or subscription means the console silently receives nothing.
#[tokio::test]
async fn given_broker_when_connected_then_subscribes_and_delivers_messages() {
    // GIVEN: A loopback broker and a transport with a listener
    let (listener, port) = bind_broker().await;
    let transport = StompTransport::new(settings(port, 0), Handle::current());
    let (handler, mut received) = forwarding_handler();
    let _registration = transport.add_listener(handler);

    // WHEN: Connecting
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));
    let (mut socket, authorization) = accept_client(&listener).await;
    let (connect, subscriptions) = handshake(&mut socket, TOPICS.len()).await;

    // THEN: Bearer on both layers, one subscription per topic
    let bearer = format!("Bearer {TEST_ACCESS_TOKEN}");
    assert_eq!(authorization.as_deref(), Some(bearer.as_str()));
    assert_eq!(connect.header("Authorization"), Some(bearer.as_str()));
    assert_eq!(connect.header("accept-version"), Some("1.2"));
    let destinations: Vec<&str> = subscriptions
        .iter()
        .filter_map(|frame| frame.header("destination"))
        .collect();
    assert_eq!(destinations, TOPICS.to_vec());
    assert_eq!(subscriptions[0].header("id"), Some("sub-0"));
    assert_eq!(subscriptions[1].header("id"), Some("sub-1"));

    // WHEN: The broker pushes a status update
    crate::helpers::send_frame(&mut socket, message_frame(TOPICS[0], SUB_STATUS_BODY)).await;

    // THEN: The listener gets the decoded message and the transport reports connected
    let message = timeout(Duration::from_secs(2), received.recv())
        .await
        .expect("Message not delivered")
        .expect("Listener channel closed");
    assert_eq!(message.status(), "IN_TRANSIT");
    assert_eq!(message.shipment_order_id(), Some("so-1"));
    assert!(transport.is_connected());

    // WHEN: Disconnecting
    transport.disconnect();

    // THEN: Flag drops immediately and the broker sees DISCONNECT
    assert!(!transport.is_connected());
    let goodbye = timeout(Duration::from_secs(2), read_frame(&mut socket))
        .await
        .expect("Broker did not hear from client");
    assert_eq!(goodbye.map(|frame| frame.command), Some(StompCommand::Disconnect));
}

/// **VALUE**: Redundant `connect` calls open a single socket.
#[tokio::test]
async fn given_connecting_transport_when_connect_called_again_then_single_session() {
    // GIVEN: A transport already connecting
    let (listener, port) = bind_broker().await;
    let transport = StompTransport::new(settings(port, 0), Handle::current());
    let token = RedactedToken::new(TEST_ACCESS_TOKEN);
    transport.connect(&token);

    // WHEN: Connect is called again before the handshake finishes
    transport.connect(&token);
    let (mut socket, _) = accept_client(&listener).await;
    handshake(&mut socket, TOPICS.len()).await;
    wait_for("transport connected", || transport.is_connected()).await;

    // THEN: No second client shows up
    let second = timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(second.is_err(), "A second socket was opened");

    transport.disconnect();
}

/// **VALUE**: A dropped socket is re-established with the same token.
///
/// **BUG THIS CATCHES**: Treating a server-side close as final would leave the
/// console deaf after any broker restart.
#[tokio::test]
async fn given_connected_when_broker_drops_socket_then_reconnects_and_resubscribes() {
    // GIVEN: A connected session
    let (listener, port) = bind_broker().await;
    let transport = StompTransport::new(settings(port, 3), Handle::current());
    let (handler, mut received) = forwarding_handler();
    let _registration = transport.add_listener(handler);
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));

    let (mut first, _) = accept_client(&listener).await;
    handshake(&mut first, TOPICS.len()).await;
    wait_for("first session", || transport.is_connected()).await;

    // WHEN: The broker closes the socket
    first.close(None).await.expect("Close failed");
    drop(first);

    // THEN: The transport comes back, resubscribes, and still delivers
    let (mut second, authorization) = timeout(Duration::from_secs(2), accept_client(&listener))
        .await
        .expect("No reconnect");
    assert_eq!(
        authorization,
        Some(format!("Bearer {TEST_ACCESS_TOKEN}"))
    );
    let (_, subscriptions) = handshake(&mut second, TOPICS.len()).await;
    assert_eq!(subscriptions.len(), TOPICS.len());

    crate::helpers::send_frame(
        &mut second,
        message_frame(
            TOPICS[1],
            r#"{"type":"STATUS_UPDATE","entityId":"so-1","entityType":"SHIPMENT","status":"DELIVERED"}"#,
        ),
    )
    .await;
    let message = timeout(Duration::from_secs(2), received.recv())
        .await
        .expect("Message not delivered after reconnect")
        .expect("Listener channel closed");
    assert_eq!(message.status(), "DELIVERED");

    transport.disconnect();
}

/// **VALUE**: Undecodable bodies are dropped without ending the session.
#[tokio::test]
async fn given_connected_when_body_is_not_a_known_message_then_session_survives() {
    // GIVEN: A connected session
    let (listener, port) = bind_broker().await;
    let transport = StompTransport::new(settings(port, 0), Handle::current());
    let (handler, mut received) = forwarding_handler();
    let _registration = transport.add_listener(handler);
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));
    let (mut socket, _) = accept_client(&listener).await;
    handshake(&mut socket, TOPICS.len()).await;

    // WHEN: A junk body then a valid one
    crate::helpers::send_frame(&mut socket, message_frame(TOPICS[0], "not json")).await;
    crate::helpers::send_frame(&mut socket, message_frame(TOPICS[0], SUB_STATUS_BODY)).await;

    // THEN: Only the valid one arrives, still connected
    let message = timeout(Duration::from_secs(2), received.recv())
        .await
        .expect("Valid message not delivered")
        .expect("Listener channel closed");
    assert_eq!(message.status(), "IN_TRANSIT");
    assert!(transport.is_connected());

    transport.disconnect();
}

/// **VALUE**: A STOMP `ERROR` mid-session ends that session and the reconnect
/// schedule brings it back.
///
/// **BUG THIS CATCHES**: Ignoring `ERROR` leaves a session the broker has
/// already given up on looking connected forever.
#[tokio::test]
async fn given_connected_when_broker_sends_error_then_session_dropped_and_reconnected() {
    // GIVEN: A connected session
    let (listener, port) = bind_broker().await;
    let transport = StompTransport::new(settings(port, 3), Handle::current());
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));
    let (mut first, _) = accept_client(&listener).await;
    handshake(&mut first, TOPICS.len()).await;
    wait_for("first session", || transport.is_connected()).await;

    // WHEN: The broker reports an error
    crate::helpers::send_frame(&mut first, error_frame("Subscription revoked")).await;

    // THEN: A new socket arrives and completes the handshake
    let (mut second, _) = timeout(Duration::from_secs(2), accept_client(&listener))
        .await
        .expect("No reconnect after ERROR");
    let (_, subscriptions) = handshake(&mut second, TOPICS.len()).await;
    assert_eq!(subscriptions.len(), TOPICS.len());
    wait_for("second session", || transport.is_connected()).await;

    transport.disconnect();
}

/// **VALUE**: A rejected CONNECT is retried under the reconnect schedule.
#[tokio::test]
async fn given_connect_rejected_when_broker_accepts_retry_then_connected() {
    // GIVEN: A broker that rejects the first CONNECT
    let (listener, port) = bind_broker().await;
    let transport = StompTransport::new(settings(port, 2), Handle::current());
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));
    let (mut first, _) = accept_client(&listener).await;

    // WHEN: Rejecting, then accepting the retry
    reject_connect(&mut first, "Broker not ready").await;
    assert!(!transport.is_connected());
    let (mut second, authorization) = timeout(Duration::from_secs(2), accept_client(&listener))
        .await
        .expect("Rejected CONNECT was not retried");
    handshake(&mut second, TOPICS.len()).await;

    // THEN: Same bearer, session up
    assert_eq!(authorization, Some(format!("Bearer {TEST_ACCESS_TOKEN}")));
    wait_for("session after retry", || transport.is_connected()).await;

    transport.disconnect();
}

/// **VALUE**: Running out of reconnect attempts stops the session task, and a
/// later `connect` starts over.
///
/// **BUG THIS CATCHES**: An unbounded retry loop against a dead broker, or a
/// finished task that blocks every future `connect`.
#[tokio::test]
async fn given_one_retry_allowed_when_broker_keeps_refusing_then_gives_up_after_two_tries() {
    // GIVEN: A transport allowed a single retry, and a broker that drops every socket
    let (listener, port) = bind_broker().await;
    let transport = StompTransport::new(settings(port, 1), Handle::current());
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));

    // WHEN: The initial attempt and the retry are both dropped before the upgrade
    for attempt in 1..=2 {
        let (stream, _) = timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap_or_else(|_| panic!("Attempt {attempt} never arrived"))
            .expect("Accept failed");
        drop(stream);
    }

    // THEN: No third attempt
    let third = timeout(Duration::from_millis(500), listener.accept()).await;
    assert!(third.is_err(), "Transport kept retrying past its limit");
    assert!(!transport.is_connected());

    // WHEN: Connecting again
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));

    // THEN: A fresh session starts
    let (mut socket, _) = timeout(Duration::from_secs(2), accept_client(&listener))
        .await
        .expect("New connect after giving up did not start a session");
    handshake(&mut socket, TOPICS.len()).await;
    wait_for("fresh session", || transport.is_connected()).await;

    transport.disconnect();
}

/// **VALUE**: With heart-beats negotiated the client sends EOLs, and a broker
/// that goes silent is dropped and reconnected.
///
/// **WHY THIS MATTERS**: A half-open TCP connection never reports an error.
/// Without the watchdog the console would sit "connected" and receive nothing.
#[tokio::test]
async fn given_heartbeats_negotiated_when_broker_goes_silent_then_client_reconnects() {
    // GIVEN: A transport asking for 100 ms heart-beats both ways
    let (listener, port) = bind_broker().await;
    let mut beating = settings(port, 2);
    beating.heartbeat_outgoing = Duration::from_millis(100);
    beating.heartbeat_incoming = Duration::from_millis(100);
    let transport = StompTransport::new(beating, Handle::current());
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));

    let (mut first, _) = accept_client(&listener).await;
    let (connect, _) = handshake_with_heartbeat(&mut first, TOPICS.len(), "100,100").await;
    assert_eq!(connect.header("heart-beat"), Some("100,100"));
    wait_for("first session", || transport.is_connected()).await;

    // THEN: The client heart-beats on its own schedule
    let beat = timeout(Duration::from_secs(1), read_text(&mut first))
        .await
        .expect("No heart-beat from client");
    assert_eq!(beat.as_deref(), Some("\n"));

    // WHEN: The broker stays silent but keeps the socket open
    let (mut second, _) = timeout(Duration::from_secs(2), accept_client(&listener))
        .await
        .expect("Silent broker was not detected");

    // THEN: The client came back on a new socket
    handshake(&mut second, TOPICS.len()).await;
    wait_for("session after silence", || transport.is_connected()).await;
    drop(first);

    transport.disconnect();
}

/// **VALUE**: `wss` endpoints go through a TLS handshake and failures there
/// follow the reconnect schedule.
///
/// **BUG THIS CATCHES**: Building without TLS support turns every `https`
/// backend into a permanent endpoint error after a single attempt.
#[tokio::test]
async fn given_wss_endpoint_when_tls_handshake_fails_then_retried() {
    // GIVEN: A plain TCP listener behind a wss endpoint
    let (listener, port) = bind_broker().await;
    let mut secure = settings(port, 2);
    secure.endpoint = Url::parse(&format!("wss://127.0.0.1:{port}/ws")).unwrap();
    let transport = StompTransport::new(secure, Handle::current());

    // WHEN: Connecting and dropping each TLS attempt
    transport.connect(&RedactedToken::new(TEST_ACCESS_TOKEN));
    for attempt in 1..=2 {
        let (stream, _) = timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap_or_else(|_| panic!("TLS attempt {attempt} never arrived"))
            .expect("Accept failed");
        drop(stream);
    }

    // THEN: Attempted more than once, never connected
    assert!(!transport.is_connected());

    transport.disconnect();
}
