//! Event bus for persistence notifications
//!
//! Every user-facing save error is published here before the caller's
//! error callback runs, so editor chrome (toasts, banners) can react
//! without owning the save callbacks.

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::UserError;

/// Events emitted by the persistence adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceEvent {
    /// A save failed with an error shown to the user
    Error { map_id: String, error: UserError },
    /// A save completed successfully
    Saved { map_id: String },
    /// A map was loaded
    Loaded { map_id: String },
}

/// Broadcasts persistence events to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PersistenceEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: PersistenceEvent) {
        trace!(event = ?event, "Emitting persistence event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PersistenceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
