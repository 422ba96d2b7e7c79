// In-memory transport recording every call the gate makes.

use crate::transport::{ListenerCancel, ListenerRegistry, MessageHandler, RealtimeTransport};

use common::RedactedToken;
use models::RealtimeMessage;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    connects: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
    listeners_added: AtomicUsize,
    cancels: Arc<AtomicUsize>,
    registry: ListenerRegistry,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pretend another consumer already opened the shared connection.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn add_listener_calls(&self) -> usize {
        self.listeners_added.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Listeners currently attached.
    pub fn live_listeners(&self) -> usize {
        self.registry.len()
    }

    pub fn total_calls(&self) -> usize {
        self.connect_calls().len()
            + self.disconnect_calls()
            + self.add_listener_calls()
            + self.cancel_calls()
    }

    pub fn deliver(&self, message: &RealtimeMessage) -> usize {
        self.registry.notify(message)
    }
}

impl RealtimeTransport for MockTransport {
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
        self.listeners_added.fetch_add(1, Ordering::SeqCst);
        let registration = self.registry.add(handler);
        let cancels = Arc::clone(&self.cancels);
        ListenerCancel::new(move || {
            cancels.fetch_add(1, Ordering::SeqCst);
            registration.cancel();
        })
    }
}

pub fn shipment_update(status: &str) -> RealtimeMessage {
    RealtimeMessage::ShipmentStatusUpdate {
        shipment_order_id: "so-1".to_string(),
        status: status.to_string(),
        message: String::new(),
        timestamp: None,
    }
}

/// Handler that records the status of every message it sees.
pub fn recording_handler() -> (MessageHandler, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: MessageHandler = Arc::new(move |message: &RealtimeMessage| {
        sink.lock().unwrap().push(message.status().to_string());
    });
    (handler, seen)
}

pub fn noop_handler() -> MessageHandler {
    Arc::new(|_: &RealtimeMessage| {})
}
