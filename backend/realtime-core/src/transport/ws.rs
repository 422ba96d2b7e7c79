//! STOMP-over-WebSocket transport.
//!
//! One background task per session owns the socket. The public handle only
//! flips flags and sends a shutdown signal, so every [`RealtimeTransport`]
//! call returns immediately.
//!
//! # Session lifecycle
//!
//! 1. WebSocket upgrade with `Authorization: Bearer <token>`
//! 2. STOMP `CONNECT` carrying the same token, wait for `CONNECTED`
//! 3. `SUBSCRIBE` to every configured topic
//! 4. Deliver `MESSAGE` bodies to listeners, exchange heart-beats
//! 5. On drop: linear reconnect schedule; on shutdown: `DISCONNECT` + close

use crate::config::RealtimeConfig;
use crate::error::transport::TransportError;
use crate::transport::stomp::{
    HEADER_ACCEPT_VERSION, HEADER_AUTHORIZATION, HEADER_DESTINATION, HEADER_HEART_BEAT,
    HEADER_HOST, HEADER_ID, HEADER_MESSAGE, HEADER_RECEIPT, HEARTBEAT, STOMP_VERSION,
    StompCommand, StompFrame, decode_frames, negotiate_heartbeat,
};
use crate::transport::{
    ListenerCancel, ListenerRegistry, MessageHandler, RealtimeTransport, ReconnectPolicy,
};

use common::{ErrorLocation, RedactedToken};
use models::RealtimeMessage;

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::time::Duration;

use backoff::backoff::Backoff;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, interval_at, sleep, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upgrade plus STOMP handshake must finish within this window.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Missing this many incoming heart-beat intervals drops the session.
const HEARTBEAT_GRACE_FACTOR: u32 = 2;

/// Build the WebSocket endpoint from the REST base URL and the socket path.
///
/// `http` maps to `ws` and `https` to `wss`; `ws`/`wss` are taken as-is.
#[track_caller]
pub fn websocket_endpoint(base_url: &str, ws_path: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(base_url)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::Endpoint {
                message: format!("Unsupported scheme '{other}' in {base_url}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    url.set_scheme(scheme).map_err(|_| TransportError::Endpoint {
        message: format!("Cannot switch {base_url} to {scheme}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let base_path = url.path().trim_end_matches('/').to_string();
    let ws_path = ws_path.trim_start_matches('/');
    url.set_path(&format!("{base_path}/{ws_path}"));

    Ok(url)
}

/// Install aws-lc-rs as the process-wide rustls provider before the first
/// `wss` handshake. A provider installed elsewhere in the process is kept.
fn ensure_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }
    });
}

/// Connection parameters resolved from [`RealtimeConfig`].
#[derive(Debug, Clone)]
pub struct StompSettings {
    pub endpoint: Url,
    pub topics: Vec<String>,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub heartbeat_outgoing: Duration,
    pub heartbeat_incoming: Duration,
    pub connect_timeout: Duration,
}

impl StompSettings {
    pub fn from_config(config: &RealtimeConfig) -> Result<Self, TransportError> {
        let channel = &config.realtime;
        Ok(Self {
            endpoint: websocket_endpoint(&config.api.base_url, &channel.ws_path)?,
            topics: channel.topics.clone(),
            reconnect_delay: Duration::from_millis(channel.reconnect_delay_ms),
            max_reconnect_attempts: channel.max_reconnect_attempts,
            heartbeat_outgoing: Duration::from_millis(channel.heartbeat_outgoing_ms),
            heartbeat_incoming: Duration::from_millis(channel.heartbeat_incoming_ms),
            connect_timeout: CONNECT_TIMEOUT,
        })
    }

    fn host(&self) -> &str {
        self.endpoint.host_str().unwrap_or("localhost")
    }
}

/// One socket task. Each session owns its connected flag so a session that is
/// still closing cannot clobber the flag of its successor.
struct SessionHandle {
    shutdown: oneshot::Sender<()>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// [`RealtimeTransport`] speaking STOMP 1.2 over a WebSocket.
///
/// Intended to be created once and shared (`Arc`) by every consumer in the
/// process.
pub struct StompTransport {
    settings: Arc<StompSettings>,
    runtime: Handle,
    listeners: ListenerRegistry,
    session: Mutex<Option<SessionHandle>>,
}

impl StompTransport {
    /// `runtime` is where the socket task is spawned; transport calls may come
    /// from any thread.
    pub fn new(settings: StompSettings, runtime: Handle) -> Self {
        if settings.endpoint.scheme() == "wss" {
            ensure_crypto_provider();
        }
        Self {
            settings: Arc::new(settings),
            runtime,
            listeners: ListenerRegistry::new(),
            session: Mutex::new(None),
        }
    }

    pub fn from_config(config: &RealtimeConfig, runtime: Handle) -> Result<Self, TransportError> {
        Ok(Self::new(StompSettings::from_config(config)?, runtime))
    }

    pub fn settings(&self) -> &StompSettings {
        &self.settings
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn session(&self) -> MutexGuard<'_, Option<SessionHandle>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RealtimeTransport for StompTransport {
    fn connect(&self, token: &RedactedToken) {
        let mut session = self.session();

        if let Some(handle) = session.as_ref() {
            if !handle.task.is_finished() {
                debug!("Realtime transport already connected or connecting");
                return;
            }
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(false));
        let task = self.runtime.spawn(run_session(
            Arc::clone(&self.settings),
            token.clone(),
            self.listeners.clone(),
            Arc::clone(&connected),
            shutdown_rx,
        ));

        info!(
            "Realtime transport connecting to {} with token {}",
            self.settings.endpoint,
            token.preview()
        );

        *session = Some(SessionHandle {
            shutdown: shutdown_tx,
            connected,
            task,
        });
    }

    fn disconnect(&self) {
        let handle = self.session().take();

        match handle {
            Some(handle) => {
                info!("Realtime transport disconnecting");
                // The task may already have ended on its own.
                let _ = handle.shutdown.send(());
            }
            None => debug!("Realtime transport disconnect requested while idle"),
        }
    }

    fn is_connected(&self) -> bool {
        self.session()
            .as_ref()
            .is_some_and(|handle| handle.connected.load(Ordering::SeqCst))
    }

    fn add_listener(&self, handler: MessageHandler) -> ListenerCancel {
        self.listeners.add(handler)
    }
}

impl Drop for StompTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

enum SessionEnd {
    Shutdown,
    Lost(TransportError),
}

/// Socket task: connect, pump frames, reconnect on loss until shut down or out of retries.
async fn run_session(
    settings: Arc<StompSettings>,
    token: RedactedToken,
    listeners: ListenerRegistry,
    connected: Arc<AtomicBool>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let session_id = Uuid::new_v4();
    let mut policy =
        ReconnectPolicy::new(settings.reconnect_delay, settings.max_reconnect_attempts);

    info!("Realtime session {session_id} started");

    loop {
        let end = run_connection(
            &settings,
            &token,
            &listeners,
            &connected,
            &mut policy,
            &mut shutdown,
        )
        .await;
        connected.store(false, Ordering::SeqCst);

        let error = match end {
            SessionEnd::Shutdown => {
                info!("Realtime session {session_id} closed");
                return;
            }
            SessionEnd::Lost(error) => error,
        };

        warn!("Realtime session {session_id} lost: {error}");

        if !error.is_retryable() {
            error!("Realtime session {session_id} cannot be re-established, giving up");
            return;
        }

        let Some(delay) = policy.next_backoff() else {
            error!(
                "Realtime session {session_id}: max reconnect attempts ({}) reached",
                policy.max_attempts()
            );
            return;
        };

        info!(
            "Realtime session {session_id}: reconnecting in {delay:?} (attempt {}/{})",
            policy.attempts(),
            policy.max_attempts()
        );

        tokio::select! {
            _ = &mut shutdown => {
                info!("Realtime session {session_id} cancelled while waiting to reconnect");
                return;
            }
            _ = sleep(delay) => {}
        }
    }
}

async fn run_connection(
    settings: &StompSettings,
    token: &RedactedToken,
    listeners: &ListenerRegistry,
    connected: &AtomicBool,
    policy: &mut ReconnectPolicy,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let opened = tokio::select! {
        _ = &mut *shutdown => return SessionEnd::Shutdown,
        result = timeout(settings.connect_timeout, open_session(settings, token)) => result,
    };

    let (mut socket, outgoing, incoming) = match opened {
        Ok(Ok(opened)) => opened,
        Ok(Err(error)) => return SessionEnd::Lost(error),
        Err(_) => {
            return SessionEnd::Lost(TransportError::Handshake {
                message: format!("No CONNECTED frame within {:?}", settings.connect_timeout),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    if let Err(error) = subscribe_topics(&mut socket, &settings.topics).await {
        return SessionEnd::Lost(error);
    }

    connected.store(true, Ordering::SeqCst);
    policy.reset();
    info!(
        "Realtime transport connected to {} ({} topic(s))",
        settings.endpoint,
        settings.topics.len()
    );

    let mut heartbeat = outgoing.map(|period| interval_at(Instant::now() + period, period));
    let silence_limit = incoming.map(|period| period * HEARTBEAT_GRACE_FACTOR);
    let mut last_seen = Instant::now();

    loop {
        let deadline = silence_limit.map(|limit| last_seen + limit);

        tokio::select! {
            _ = &mut *shutdown => {
                close_gracefully(&mut socket).await;
                return SessionEnd::Shutdown;
            }
            _ = next_tick(&mut heartbeat) => {
                trace!("Sending heart-beat");
                if let Err(error) = socket.send(Message::text(HEARTBEAT)).await {
                    return SessionEnd::Lost(error.into());
                }
            }
            _ = wait_until(deadline) => {
                return SessionEnd::Lost(TransportError::HeartbeatTimeout {
                    message: format!("No traffic for {:?}", silence_limit.unwrap_or_default()),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            received = socket.next() => {
                last_seen = Instant::now();
                match received {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(error) = handle_payload(text.as_str(), listeners) {
                            return SessionEnd::Lost(error);
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            if let Err(error) = handle_payload(text, listeners) {
                                return SessionEnd::Lost(error);
                            }
                        }
                        Err(e) => warn!("Dropping non UTF-8 binary frame: {e}"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return SessionEnd::Lost(TransportError::closed(format!(
                            "Server closed the socket: {frame:?}"
                        )));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => return SessionEnd::Lost(error.into()),
                    None => {
                        return SessionEnd::Lost(TransportError::closed("Socket stream ended"));
                    }
                }
            }
        }
    }
}

/// Upgrade the socket and complete the STOMP handshake.
///
/// Returns the socket with the negotiated `(outgoing, incoming)` heart-beat periods.
async fn open_session(
    settings: &StompSettings,
    token: &RedactedToken,
) -> Result<(Socket, Option<Duration>, Option<Duration>), TransportError> {
    let bearer = format!("Bearer {}", token.expose());

    let mut request = settings.endpoint.as_str().into_client_request()?;
    let header = HeaderValue::from_str(&bearer).map_err(|e| TransportError::Handshake {
        message: format!("Token is not a valid header value: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    request.headers_mut().insert(AUTHORIZATION, header);

    let (mut socket, response) = connect_async(request).await?;
    debug!("WebSocket upgrade completed with status {}", response.status());

    let connect = StompFrame::new(StompCommand::Connect)
        .with_header(HEADER_ACCEPT_VERSION, STOMP_VERSION)
        .with_header(HEADER_HOST, settings.host())
        .with_header(
            HEADER_HEART_BEAT,
            format!(
                "{},{}",
                settings.heartbeat_outgoing.as_millis(),
                settings.heartbeat_incoming.as_millis()
            ),
        )
        .with_header(HEADER_AUTHORIZATION, bearer);
    send_frame(&mut socket, &connect).await?;

    let connected = await_connected(&mut socket).await?;
    let (outgoing, incoming) = negotiate_heartbeat(
        settings.heartbeat_outgoing,
        settings.heartbeat_incoming,
        connected.header(HEADER_HEART_BEAT),
    );
    debug!("STOMP session established, heart-beat out={outgoing:?} in={incoming:?}");

    Ok((socket, outgoing, incoming))
}

async fn await_connected(socket: &mut Socket) -> Result<StompFrame, TransportError> {
    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text.as_str().to_string(),
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(frame) => {
                return Err(TransportError::closed(format!(
                    "Socket closed during handshake: {frame:?}"
                )));
            }
            _ => continue,
        };

        if let Some(frame) = decode_frames(&text)?.into_iter().next() {
            return match frame.command {
                StompCommand::Connected => Ok(frame),
                StompCommand::Error => Err(TransportError::Stomp {
                    message: frame
                        .header(HEADER_MESSAGE)
                        .unwrap_or("CONNECT rejected")
                        .to_string(),
                    location: ErrorLocation::from(Location::caller()),
                }),
                other => Err(TransportError::frame(format!(
                    "Expected CONNECTED, got {other}"
                ))),
            };
        }
    }

    Err(TransportError::closed("Socket ended before CONNECTED"))
}

async fn subscribe_topics(socket: &mut Socket, topics: &[String]) -> Result<(), TransportError> {
    for (index, topic) in topics.iter().enumerate() {
        let subscribe = StompFrame::new(StompCommand::Subscribe)
            .with_header(HEADER_ID, format!("sub-{index}"))
            .with_header(HEADER_DESTINATION, topic.as_str())
            .with_header("ack", "auto");
        send_frame(socket, &subscribe).await?;
        info!("Subscribed to {topic}");
    }
    Ok(())
}

/// Decode and dispatch every frame in one WebSocket payload.
///
/// Undecodable frames and bodies are dropped; only a STOMP `ERROR` ends the session.
fn handle_payload(payload: &str, listeners: &ListenerRegistry) -> Result<(), TransportError> {
    let frames = match decode_frames(payload) {
        Ok(frames) => frames,
        Err(e) => {
            warn!("Dropping malformed STOMP payload: {e}");
            return Ok(());
        }
    };

    for frame in frames {
        match frame.command {
            StompCommand::Message => match serde_json::from_str::<RealtimeMessage>(&frame.body) {
                Ok(message) => {
                    info!("Notification: {}", message.summary());
                    let delivered = listeners.notify(&message);
                    debug!("Realtime message delivered to {delivered} listener(s)");
                }
                Err(e) => warn!("Failed to parse realtime message body: {e}"),
            },
            StompCommand::Error => {
                return Err(TransportError::Stomp {
                    message: frame
                        .header(HEADER_MESSAGE)
                        .unwrap_or("server sent ERROR")
                        .to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            StompCommand::Receipt => {
                debug!("Receipt {}", frame.header(HEADER_RECEIPT).unwrap_or("?"));
            }
            other => debug!("Ignoring {other} frame"),
        }
    }

    Ok(())
}

async fn send_frame(socket: &mut Socket, frame: &StompFrame) -> Result<(), TransportError> {
    socket
        .send(Message::text(frame.encode()))
        .await
        .map_err(|e| TransportError::Send {
            message: format!("Failed to send {} frame: {e}", frame.command),
            location: ErrorLocation::from(Location::caller()),
        })
}

async fn close_gracefully(socket: &mut Socket) {
    let disconnect = StompFrame::new(StompCommand::Disconnect);
    if let Err(e) = send_frame(socket, &disconnect).await {
        debug!("DISCONNECT not delivered: {e}");
    }
    if let Err(e) = socket.close(None).await {
        debug!("WebSocket close failed: {e}");
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
