//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::ProviderConfigStore;

/// Application state shared across all handlers.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    store: S,
}

impl<S: ProviderConfigStore> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(AppStateInner { store }),
        }
    }

    /// Provider configuration storage.
    pub fn store(&self) -> &S {
        &self.inner.store
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
