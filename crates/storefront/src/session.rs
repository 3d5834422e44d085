//! Cached login session.
//!
//! The bearer token and user profile are persisted under the `auth_token`
//! and `user` storage keys and mirrored in memory. Changes other than
//! [`SessionStore::set_session`] publish [`StoreEvent::AuthChanged`]; login
//! publishes it itself once the cart has been migrated.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::api::User;
use crate::events::{EventBus, StoreEvent};
use crate::storage::{LocalStorage, StorageError};

const TOKEN_KEY: &str = "auth_token";
const USER_KEY: &str = "user";

#[derive(Default)]
struct SessionState {
    token: Option<SecretString>,
    user: Option<User>,
}

/// Shared handle to the current session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    storage: LocalStorage,
    events: EventBus,
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// Restore the persisted session. Unreadable entries are treated as absent.
    pub async fn load(storage: LocalStorage, events: EventBus) -> Self {
        let token = read_or_warn::<String>(&storage, TOKEN_KEY)
            .await
            .map(SecretString::from);
        let user = read_or_warn::<User>(&storage, USER_KEY).await;

        Self {
            inner: Arc::new(SessionInner {
                storage,
                events,
                state: RwLock::new(SessionState { token, user }),
            }),
        }
    }

    /// Local storage backing this session.
    #[must_use]
    pub fn storage(&self) -> &LocalStorage {
        &self.inner.storage
    }

    /// Event bus this session publishes on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub async fn token(&self) -> Option<SecretString> {
        self.inner.state.read().await.token.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.inner.state.read().await.user.clone()
    }

    /// Whether a bearer token is present.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.token.is_some()
    }

    /// Store a fresh login. Does not publish.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails; memory is left unchanged then.
    pub async fn set_session(&self, token: String, user: User) -> Result<(), StorageError> {
        let mut state = self.inner.state.write().await;
        // The token goes last: a token on disk means a complete session.
        self.inner.storage.set(USER_KEY, &user).await?;
        if let Err(e) = self.inner.storage.set(TOKEN_KEY, &token).await {
            let rollback = match &state.user {
                Some(previous) => self.inner.storage.set(USER_KEY, previous).await,
                None => self.inner.storage.remove(USER_KEY).await,
            };
            if let Err(rollback) = rollback {
                tracing::warn!(error = %rollback, "failed to restore persisted user");
            }
            return Err(e);
        }
        state.token = Some(SecretString::from(token));
        state.user = Some(user);
        tracing::info!("session started");
        Ok(())
    }

    /// Replace the cached user and publish the change.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub async fn set_user(&self, user: User) -> Result<(), StorageError> {
        {
            let mut state = self.inner.state.write().await;
            self.inner.storage.set(USER_KEY, &user).await?;
            state.user = Some(user);
        }
        self.inner.events.publish(StoreEvent::AuthChanged);
        Ok(())
    }

    /// Drop the session and publish the change.
    ///
    /// # Errors
    ///
    /// Returns an error if removing the persisted entries fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        {
            let mut state = self.inner.state.write().await;
            *state = SessionState::default();
            self.inner.storage.remove(TOKEN_KEY).await?;
            self.inner.storage.remove(USER_KEY).await?;
        }
        tracing::info!("session cleared");
        self.inner.events.publish(StoreEvent::AuthChanged);
        Ok(())
    }

    /// Remove a cached user left behind without a token.
    ///
    /// Returns `true` and publishes when something was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if removing the persisted user fails.
    pub async fn forget_stale_user(&self) -> Result<bool, StorageError> {
        {
            let mut state = self.inner.state.write().await;
            if state.token.is_some() || state.user.is_none() {
                return Ok(false);
            }
            self.inner.storage.remove(USER_KEY).await?;
            state.user = None;
        }
        self.inner.events.publish(StoreEvent::AuthChanged);
        Ok(true)
    }
}

async fn read_or_warn<T: serde::de::DeserializeOwned>(storage: &LocalStorage, key: &str) -> Option<T> {
    match storage.get(key).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring unreadable session entry");
            None
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("storage", &self.inner.storage)
            .finish_non_exhaustive()
    }
}
