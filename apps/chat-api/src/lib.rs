pub mod auth;
pub mod config;
pub mod error;
pub mod realtime;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use realtime::fanout::{EventBus, Notifier};
use realtime::presence::PresenceRegistry;
use store::ConversationStore;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub config: Arc<Config>,
    pub presence: Arc<PresenceRegistry>,
    pub broadcast: EventBus,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            config: Arc::new(config),
            presence: Arc::new(PresenceRegistry::new()),
            broadcast: EventBus::new(),
        }
    }

    /// Fan-out helper bound to this state's bus and presence registry.
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.broadcast.clone(), self.presence.clone())
    }
}
