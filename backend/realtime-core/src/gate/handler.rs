use crate::transport::MessageHandler;

use models::RealtimeMessage;

use std::sync::{Arc, PoisonError, RwLock};

/// Shared slot holding the current message handler.
///
/// The transport listener captures a clone of the cell, not the handler, so
/// swapping the handler takes effect on the next message without touching the
/// listener registration.
#[derive(Clone, Default)]
pub struct HandlerCell {
    inner: Arc<RwLock<Option<MessageHandler>>>,
}

impl HandlerCell {
    pub fn new(handler: MessageHandler) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(handler))),
        }
    }

    pub fn replace(&self, handler: MessageHandler) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Drop the handler; messages are discarded until a new one is set.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Call the current handler. Returns false if none is set.
    pub fn dispatch(&self, message: &RealtimeMessage) -> bool {
        let handler = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone);

        match handler {
            Some(handler) => {
                handler(message);
                true
            }
            None => false,
        }
    }
}
