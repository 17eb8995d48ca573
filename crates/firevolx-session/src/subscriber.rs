//! Single-slot subscriber registry.
//!
//! Each connection id holds at most one handler. Registering a handler for an
//! id that already has one replaces it: the last subscriber wins, and the
//! replaced handler receives nothing further. Fan-out to several viewers is
//! not supported.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use firevolx_core::{ConnectionId, Message};

/// Callback receiving a session's messages.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Handler per connection id.
#[derive(Default)]
pub struct HandlerSlots {
    slots: Mutex<HashMap<ConnectionId, MessageHandler>>,
}

impl HandlerSlots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ConnectionId, MessageHandler>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `id`, returning the handler it replaced.
    pub fn set(&self, id: ConnectionId, handler: MessageHandler) -> Option<MessageHandler> {
        self.slots().insert(id, handler)
    }

    /// Remove the handler for `id`.
    pub fn clear(&self, id: &ConnectionId) -> Option<MessageHandler> {
        self.slots().remove(id)
    }

    #[cfg(test)]
    fn contains(&self, id: &ConnectionId) -> bool {
        self.slots().contains_key(id)
    }

    /// Deliver `message` to the handler for `id`, if any.
    ///
    /// The registry lock is released before the handler runs, so handlers may
    /// subscribe or unsubscribe. Returns whether a handler received it.
    pub fn deliver(&self, id: &ConnectionId, message: &Message) -> bool {
        let handler = self.slots().get(id).cloned();
        handler.is_some_and(|handler| {
            handler(message);
            true
        })
    }
}

impl std::fmt::Debug for HandlerSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSlots")
            .field("subscribed", &self.slots().len())
            .finish()
    }
}
