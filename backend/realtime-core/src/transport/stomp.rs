//! Minimal STOMP 1.2 frame codec.
//!
//! Only what a subscribing client needs: `CONNECT`, `SUBSCRIBE`,
//! `DISCONNECT` going out and `CONNECTED`, `MESSAGE`, `RECEIPT`, `ERROR`
//! coming in. Frames travel as WebSocket text messages; a message may carry
//! several NUL-terminated frames or a bare EOL heart-beat.

use crate::error::transport::TransportError;

use std::fmt;
use std::time::Duration;

pub const HEADER_ACCEPT_VERSION: &str = "accept-version";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_DESTINATION: &str = "destination";
pub const HEADER_HEART_BEAT: &str = "heart-beat";
pub const HEADER_HOST: &str = "host";
pub const HEADER_ID: &str = "id";
pub const HEADER_MESSAGE: &str = "message";
pub const HEADER_RECEIPT: &str = "receipt";
pub const HEADER_SUBSCRIPTION: &str = "subscription";
pub const HEADER_VERSION: &str = "version";

pub const STOMP_VERSION: &str = "1.2";

/// A heart-beat on the wire is a single end-of-line.
pub const HEARTBEAT: &str = "\n";

const NUL: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompCommand {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl StompCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            StompCommand::Connect => "CONNECT",
            StompCommand::Connected => "CONNECTED",
            StompCommand::Subscribe => "SUBSCRIBE",
            StompCommand::Unsubscribe => "UNSUBSCRIBE",
            StompCommand::Send => "SEND",
            StompCommand::Message => "MESSAGE",
            StompCommand::Receipt => "RECEIPT",
            StompCommand::Error => "ERROR",
            StompCommand::Disconnect => "DISCONNECT",
        }
    }

    #[track_caller]
    fn parse(line: &str) -> Result<Self, TransportError> {
        match line {
            "CONNECT" | "STOMP" => Ok(StompCommand::Connect),
            "CONNECTED" => Ok(StompCommand::Connected),
            "SUBSCRIBE" => Ok(StompCommand::Subscribe),
            "UNSUBSCRIBE" => Ok(StompCommand::Unsubscribe),
            "SEND" => Ok(StompCommand::Send),
            "MESSAGE" => Ok(StompCommand::Message),
            "RECEIPT" => Ok(StompCommand::Receipt),
            "ERROR" => Ok(StompCommand::Error),
            "DISCONNECT" => Ok(StompCommand::Disconnect),
            other => Err(TransportError::frame(format!("Unknown command '{other}'"))),
        }
    }

    /// CONNECT and CONNECTED headers are sent verbatim (no escaping).
    fn escapes_headers(&self) -> bool {
        !matches!(self, StompCommand::Connect | StompCommand::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: StompCommand,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header. Repeated headers keep the first occurrence.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }

    /// Parse a single frame without its NUL terminator.
    #[track_caller]
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let (head, body) = match split_head(raw) {
            Some((index, separator)) => (&raw[..index], &raw[index + separator..]),
            None => (raw.trim_end_matches(['\r', '\n']), ""),
        };

        let mut lines = head.lines();
        let command_line = lines
            .next()
            .map(|line| line.trim_end_matches('\r'))
            .ok_or_else(|| TransportError::frame("Missing command line"))?;
        let command = StompCommand::parse(command_line)?;
        let unescape = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| TransportError::frame(format!("Malformed header '{line}'")))?;
            if unescape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            command,
            headers,
            body: body.to_string(),
        })
    }
}

/// Split one WebSocket text payload into frames.
///
/// Leading EOLs are heart-beats and are skipped, so a payload of only
/// heart-beats yields no frames. Trailing data without a NUL terminator is an
/// error.
#[track_caller]
pub fn decode_frames(payload: &str) -> Result<Vec<StompFrame>, TransportError> {
    let mut frames = Vec::new();
    let mut rest = payload;

    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            break;
        }
        let end = rest
            .find(NUL)
            .ok_or_else(|| TransportError::frame("Frame is not NUL-terminated"))?;
        frames.push(StompFrame::parse(&rest[..end])?);
        rest = &rest[end + 1..];
    }

    Ok(frames)
}

/// Resolve the heart-beat intervals from the client's `(send, receive)` wish
/// and the server's `heart-beat` header.
///
/// Returns `(outgoing, incoming)`; `None` disables that direction.
pub fn negotiate_heartbeat(
    client_send: Duration,
    client_receive: Duration,
    server_header: Option<&str>,
) -> (Option<Duration>, Option<Duration>) {
    let (server_send, server_receive) = server_header
        .and_then(|value| value.split_once(','))
        .and_then(|(send, receive)| {
            let send = send.trim().parse::<u64>().ok()?;
            let receive = receive.trim().parse::<u64>().ok()?;
            Some((Duration::from_millis(send), Duration::from_millis(receive)))
        })
        .unwrap_or((Duration::ZERO, Duration::ZERO));

    let resolve = |ours: Duration, theirs: Duration| {
        if ours.is_zero() || theirs.is_zero() {
            None
        } else {
            Some(ours.max(theirs))
        }
    };

    (
        resolve(client_send, server_receive),
        resolve(client_receive, server_send),
    )
}

/// Position and length of the blank line ending the headers. The body may
/// itself hold blank lines, so the earliest separator of either EOL style wins.
fn split_head(raw: &str) -> Option<(usize, usize)> {
    let lf = raw.find("\n\n").map(|index| (index, 2));
    let crlf = raw.find("\r\n\r\n").map(|index| (index, 4));
    match (lf, crlf) {
        (Some(lf), Some(crlf)) => Some(if crlf.0 < lf.0 { crlf } else { lf }),
        (lf, crlf) => lf.or(crlf),
    }
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

#[track_caller]
fn unescape_header(raw: &str) -> Result<String, TransportError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some(other) => {
                return Err(TransportError::frame(format!(
                    "Undefined header escape '\\{other}'"
                )));
            }
            None => return Err(TransportError::frame("Dangling '\\' in header")),
        }
    }
    Ok(out)
}
