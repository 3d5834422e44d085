//! Favorite products of the logged-in customer.
//!
//! [`FavoritesStore`] caches favorite ids for quick lookups. Toggling is an
//! explicit [`ToggleFavorite`] command: the local change is applied before the
//! backend call, and a failed call returns the change so the caller can
//! [`FavoritesStore::revert`] it.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use atelie_core::{ProductId, UserId};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::api::{ApiClient, ApiError};
use crate::events::{EventBus, StoreEvent};
use crate::session::SessionStore;
use crate::storage::StorageError;

/// Alert shown when favoriting without a session.
pub const LOGIN_REQUIRED_MESSAGE: &str =
    "Sua sessão expirou ou você não está logado. Faça login para favoritar.";

/// Alert shown when the backend rejects a toggle.
pub const TOGGLE_FAILED_MESSAGE: &str = "Erro ao atualizar favoritos. Tente novamente.";

/// Backend operations on favorites.
pub trait FavoritesBackend: Send + Sync {
    fn list(&self, user_id: UserId) -> impl Future<Output = Result<Vec<ProductId>, ApiError>> + Send;

    fn add(&self, user_id: UserId, product_id: ProductId) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn remove(&self, user_id: UserId, product_id: ProductId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl FavoritesBackend for ApiClient {
    async fn list(&self, user_id: UserId) -> Result<Vec<ProductId>, ApiError> {
        let products = self.list_favorites(user_id).await?;
        Ok(products.into_iter().map(|product| product.id).collect())
    }

    async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), ApiError> {
        self.add_favorite(user_id, product_id).await
    }

    async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), ApiError> {
        self.remove_favorite(user_id, product_id).await
    }
}

/// A favorite state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteChange {
    pub product_id: ProductId,
    /// State after the change.
    pub is_favorite: bool,
}

impl FavoriteChange {
    /// The change that undoes this one.
    #[must_use]
    pub const fn inverse(self) -> Self {
        Self {
            product_id: self.product_id,
            is_favorite: !self.is_favorite,
        }
    }
}

#[derive(Debug, Error)]
pub enum FavoriteError {
    /// No session. The customer has been asked to log in.
    #[error("not logged in")]
    NotLoggedIn,

    /// The backend call failed after the local change was applied.
    #[error("failed to update favorite: {source}")]
    Backend {
        change: FavoriteChange,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Toggle one product's favorite state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleFavorite {
    pub product_id: ProductId,
}

impl ToggleFavorite {
    #[must_use]
    pub const fn new(product_id: ProductId) -> Self {
        Self { product_id }
    }

    /// Run the toggle against `store`.
    ///
    /// # Errors
    ///
    /// [`FavoriteError::NotLoggedIn`] after prompting for login, or
    /// [`FavoriteError::Backend`] carrying the applied local change.
    pub async fn execute<B: FavoritesBackend>(self, store: &FavoritesStore<B>) -> Result<FavoriteChange, FavoriteError> {
        store.toggle(self.product_id).await
    }
}

/// Cached favorites of the current session.
pub struct FavoritesStore<B> {
    backend: B,
    session: SessionStore,
    events: EventBus,
    ids: RwLock<HashSet<ProductId>>,
}

impl<B: FavoritesBackend> FavoritesStore<B> {
    pub fn new(backend: B, session: SessionStore) -> Self {
        let events = session.events().clone();
        Self {
            backend,
            session,
            events,
            ids: RwLock::new(HashSet::new()),
        }
    }

    pub async fn is_favorite(&self, product_id: ProductId) -> bool {
        self.ids.read().await.contains(&product_id)
    }

    /// Favorite ids in no particular order.
    pub async fn ids(&self) -> Vec<ProductId> {
        self.ids.read().await.iter().copied().collect()
    }

    /// Reload from the backend. Logged out means no favorites; a failed load
    /// keeps the current cache.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        let Some(user) = self.session.user().await else {
            self.ids.write().await.clear();
            return;
        };

        match self.backend.list(user.id).await {
            Ok(ids) => *self.ids.write().await = ids.into_iter().collect(),
            Err(e) => tracing::warn!(error = %e, "failed to load favorites"),
        }
    }

    async fn toggle(&self, product_id: ProductId) -> Result<FavoriteChange, FavoriteError> {
        let user = self.session.user().await;
        let authenticated = self.session.is_authenticated().await;

        let Some(user) = user.filter(|_| authenticated) else {
            self.events
                .publish(StoreEvent::ShowAlert(LOGIN_REQUIRED_MESSAGE.to_string()));
            if !authenticated {
                self.session.forget_stale_user().await?;
            }
            self.events.publish(StoreEvent::OpenAuthModal);
            return Err(FavoriteError::NotLoggedIn);
        };

        let change = FavoriteChange {
            product_id,
            is_favorite: !self.is_favorite(product_id).await,
        };
        self.apply(change).await;

        let result = if change.is_favorite {
            self.backend.add(user.id, product_id).await
        } else {
            self.backend.remove(user.id, product_id).await
        };

        match result {
            Ok(()) => {
                self.events.publish(StoreEvent::FavoritesUpdated {
                    product_id,
                    is_favorite: change.is_favorite,
                });
                Ok(change)
            }
            Err(source) => {
                tracing::warn!(error = %source, %product_id, "favorite toggle failed");
                self.events
                    .publish(StoreEvent::ShowAlert(TOGGLE_FAILED_MESSAGE.to_string()));
                Err(FavoriteError::Backend { change, source })
            }
        }
    }

    /// Undo a locally applied change.
    pub async fn revert(&self, change: FavoriteChange) {
        self.apply(change.inverse()).await;
    }

    async fn apply(&self, change: FavoriteChange) {
        let mut ids = self.ids.write().await;
        if change.is_favorite {
            ids.insert(change.product_id);
        } else {
            ids.remove(&change.product_id);
        }
    }
}

impl<B: FavoritesBackend + 'static> FavoritesStore<B> {
    /// Load favorites now and reload on every [`StoreEvent::AuthChanged`].
    pub fn spawn_auth_listener(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.events.subscribe();
        tokio::spawn(async move {
            self.refresh().await;
            loop {
                match events.recv().await {
                    Ok(StoreEvent::AuthChanged) | Err(RecvError::Lagged(_)) => self.refresh().await,
                    Ok(_) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
