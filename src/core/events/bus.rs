

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::base::{Event, EventType};


pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;


#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<EventType, Vec<EventHandler>>>>,
}

impl EventBus {

    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }


    pub async fn register(&self, event_type: EventType, handler: EventHandler) {
        let mut handlers = self.handlers.write().await;
        handlers.entry(event_type).or_default().push(handler);
        debug!("Registered handler for event type: {}", event_type);
    }


    pub async fn register_all(&self, handler: EventHandler) {
        for event_type in [
            EventType::DeletionRequested,
            EventType::DeletionFinalized,
            EventType::DeletionCancelled,
            EventType::RestoreFailed,
            EventType::AssetCleanupFailed,
        ] {
            self.register(event_type, Arc::clone(&handler)).await;
        }
    }

    /// Handlers run on their own tasks; a slow handler never holds up the emitter.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;

        if let Some(event_handlers) = handlers.get(&event.event_type) {
            for handler in event_handlers {
                let handler = Arc::clone(handler);
                let event = event.clone();

                tokio::spawn(async move {
                    handler(event);
                });
            }
        } else {
            debug!("No handlers for event type: {}", event.event_type);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
