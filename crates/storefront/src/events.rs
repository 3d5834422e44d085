//! Process-wide store events.
//!
//! Services publish [`StoreEvent`]s on a shared [`EventBus`]; any component
//! can subscribe. Publishing with no subscribers is not an error.

use atelie_core::ProductId;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Events shared between storefront services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The session was created, changed, or cleared.
    AuthChanged,
    /// The cart was saved or cleared.
    CartUpdated,
    /// A favorite was added or removed.
    FavoritesUpdated {
        product_id: ProductId,
        is_favorite: bool,
    },
    /// A message for the customer.
    ShowAlert(String),
    /// The customer must log in to continue.
    OpenAuthModal,
}

/// Cheaply cloneable publish/subscribe handle.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    pub fn publish(&self, event: StoreEvent) {
        tracing::trace!(?event, "publishing store event");
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
