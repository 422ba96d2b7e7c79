//! Test helpers for realtime-core integration tests.
//!
//! - A recording transport for driving the gate without a network
//! - A minimal STOMP broker on a loopback WebSocket
//! - Polling helpers for fire-and-forget APIs

use realtime_core::transport::stomp::{StompCommand, StompFrame, decode_frames};
use realtime_core::transport::{ListenerCancel, ListenerRegistry, MessageHandler};
use realtime_core::RealtimeTransport;

use common::RedactedToken;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, sleep};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

pub const TEST_ACCESS_TOKEN: &str = "access-token-12345";

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        if Instant::now() >= deadline {
            panic!("Timed out waiting for {what}");
        }
        sleep(Duration::from_millis(10)).await;
    }
}

// ============================================
// RECORDING TRANSPORT
// ============================================

#[derive(Default)]
pub struct RecordingTransport {
    connected: AtomicBool,
    connects: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
    registry: ListenerRegistry,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn listeners(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }
}

impl RealtimeTransport for RecordingTransport {
    fn connect(&self, token: &RedactedToken) {
        self.connects.lock().unwrap().push(token.expose().to_string());
        self.connected.store(true, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn add_listener(&self, handler: MessageHandler) -> ListenerCancel {
        self.registry.add(handler)
    }
}

// ============================================
// LOOPBACK STOMP BROKER
// ============================================

pub type BrokerSocket = WebSocketStream<TcpStream>;

pub async fn bind_broker() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind broker");
    let port = listener.local_addr().expect("No local addr").port();
    (listener, port)
}

/// Accept one WebSocket upgrade, returning the socket and its `Authorization` header.
pub async fn accept_client(listener: &TcpListener) -> (BrokerSocket, Option<String>) {
    let (stream, _) = listener.accept().await.expect("Accept failed");

    let authorization = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&authorization);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        *captured.lock().unwrap() = request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        Ok(response)
    };

    let socket = accept_hdr_async(stream, callback)
        .await
        .expect("WebSocket upgrade failed");
    let header = authorization.lock().unwrap().clone();
    (socket, header)
}

/// Read the next STOMP frame, skipping heart-beats.
pub async fn read_frame(socket: &mut BrokerSocket) -> Option<StompFrame> {
    while let Some(message) = socket.next().await {
        let text = match message.ok()? {
            Message::Text(text) => text.as_str().to_string(),
            Message::Close(_) => return None,
            _ => continue,
        };
        if let Some(frame) = decode_frames(&text).expect("Client sent a bad frame").into_iter().next() {
            return Some(frame);
        }
    }
    None
}

pub async fn send_frame(socket: &mut BrokerSocket, frame: StompFrame) {
    socket
        .send(Message::text(frame.encode()))
        .await
        .expect("Broker send failed");
}

/// Next raw text payload from the client, heart-beats included.
pub async fn read_text(socket: &mut BrokerSocket) -> Option<String> {
    while let Some(message) = socket.next().await {
        match message.ok()? {
            Message::Text(text) => return Some(text.as_str().to_string()),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

/// Complete the STOMP handshake and collect `expected_topics` SUBSCRIBE frames.
pub async fn handshake(socket: &mut BrokerSocket, expected_topics: usize) -> (StompFrame, Vec<StompFrame>) {
    handshake_with_heartbeat(socket, expected_topics, "0,0").await
}

/// Same as [`handshake`], answering CONNECT with the given `heart-beat` header.
pub async fn handshake_with_heartbeat(
    socket: &mut BrokerSocket,
    expected_topics: usize,
    heart_beat: &str,
) -> (StompFrame, Vec<StompFrame>) {
    let connect = read_frame(socket).await.expect("No CONNECT frame");
    assert_eq!(connect.command, StompCommand::Connect);

    send_frame(
        socket,
        StompFrame::new(StompCommand::Connected)
            .with_header("version", "1.2")
            .with_header("heart-beat", heart_beat),
    )
    .await;

    let mut subscriptions = Vec::new();
    for _ in 0..expected_topics {
        let frame = read_frame(socket).await.expect("No SUBSCRIBE frame");
        assert_eq!(frame.command, StompCommand::Subscribe);
        subscriptions.push(frame);
    }
    (connect, subscriptions)
}

pub fn message_frame(destination: &str, body: &str) -> StompFrame {
    StompFrame::new(StompCommand::Message)
        .with_header("destination", destination)
        .with_header("subscription", "sub-0")
        .with_header("message-id", "m-1")
        .with_header("content-type", "application/json")
        .with_body(body)
}

/// Answer the client's CONNECT with an ERROR frame.
pub async fn reject_connect(socket: &mut BrokerSocket, reason: &str) {
    let connect = read_frame(socket).await.expect("No CONNECT frame");
    assert_eq!(connect.command, StompCommand::Connect);
    send_frame(socket, error_frame(reason)).await;
}

pub fn error_frame(reason: &str) -> StompFrame {
    StompFrame::new(StompCommand::Error)
        .with_header("message", reason)
        .with_body(reason)
}
