//! Listener fan-out shared by transport implementations.

use crate::transport::{ListenerCancel, MessageHandler};

use models::RealtimeMessage;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, error};

type ListenerId = u64;

#[derive(Default)]
struct ListenerSet {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, MessageHandler)>,
}

/// Set of message listeners keyed by registration id.
///
/// `Clone` shares the same underlying set, so the socket task and the public
/// transport handle see the same registrations.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<ListenerSet>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return the handle that removes exactly this registration.
    pub fn add(&self, handler: MessageHandler) -> ListenerCancel {
        let id = {
            let mut set = lock(&self.inner);
            let id = set.next_id;
            set.next_id += 1;
            set.listeners.push((id, handler));
            debug!("Listener {id} registered ({} total)", set.listeners.len());
            id
        };

        let weak: Weak<Mutex<ListenerSet>> = Arc::downgrade(&self.inner);
        ListenerCancel::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut set = lock(&inner);
                set.listeners.retain(|(listener_id, _)| *listener_id != id);
                debug!("Listener {id} removed ({} remaining)", set.listeners.len());
            }
        })
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a message to every registered listener.
    ///
    /// Handlers run outside the lock so they may register or cancel listeners.
    /// A panicking handler is logged and does not stop delivery to the others.
    /// Returns the number of handlers that completed.
    pub fn notify(&self, message: &RealtimeMessage) -> usize {
        let handlers: Vec<(ListenerId, MessageHandler)> = lock(&self.inner)
            .listeners
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Listener {id} panicked while handling a realtime message"),
            }
        }
        delivered
    }
}

fn lock(inner: &Mutex<ListenerSet>) -> MutexGuard<'_, ListenerSet> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
