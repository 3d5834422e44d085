//! Category list with a short-lived cache.

use std::sync::Arc;
use std::time::Duration;

use atelie_core::CategoryId;
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::api::{ApiClient, Category};

const CATEGORIES_KEY: &str = "categories";

/// Cached view of the backend's categories.
///
/// Failed fetches are logged and yield an empty list without being cached.
#[derive(Clone)]
pub struct CategoryStore {
    api: ApiClient,
    cache: Cache<&'static str, Arc<Vec<Category>>>,
}

impl CategoryStore {
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { api, cache }
    }

    /// All categories.
    #[instrument(skip(self))]
    pub async fn all(&self) -> Arc<Vec<Category>> {
        if let Some(categories) = self.cache.get(CATEGORIES_KEY).await {
            debug!("Cache hit for categories");
            return categories;
        }

        match self.api.try_get_categories().await {
            Ok(categories) => {
                let categories = Arc::new(categories);
                self.cache
                    .insert(CATEGORIES_KEY, Arc::clone(&categories))
                    .await;
                categories
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch categories");
                Arc::default()
            }
        }
    }

    pub async fn get(&self, id: CategoryId) -> Option<Category> {
        self.all().await.iter().find(|c| c.id == id).cloned()
    }

    pub async fn by_slug(&self, slug: &str) -> Option<Category> {
        self.all()
            .await
            .iter()
            .find(|c| c.slug.as_deref() == Some(slug))
            .cloned()
    }

    /// Drop the cached list so the next read refetches.
    pub async fn invalidate(&self) {
        self.cache.invalidate(CATEGORIES_KEY).await;
    }
}

impl std::fmt::Debug for CategoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryStore")
            .field("cached", &self.cache.contains_key(CATEGORIES_KEY))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;
    use crate::api::tests::{client_for, serve};
    use crate::events::EventBus;

    const CATEGORY_ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    #[tokio::test]
    async fn test_caches_until_invalidated() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/categories",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(serde_json::json!([
                        {"id": CATEGORY_ID, "name": "Guias", "slug": "guias"}
                    ]))
                }
            }),
        );
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let store = CategoryStore::new(
            client_for(addr, dir.path(), EventBus::new()).await,
            Duration::from_secs(60),
        );

        assert_eq!(store.all().await.len(), 1);
        assert_eq!(store.by_slug("guias").await.unwrap().name, "Guias");
        assert!(store.get(CATEGORY_ID.parse().unwrap()).await.is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        store.invalidate().await;
        store.all().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/categories",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        );
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let store = CategoryStore::new(
            client_for(addr, dir.path(), EventBus::new()).await,
            Duration::from_secs(60),
        );

        assert!(store.all().await.is_empty());
        assert!(store.all().await.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
