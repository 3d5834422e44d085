//! Products, categories and reviews.

use atelie_core::ProductId;
use tracing::instrument;

use super::types::{Category, Listing, NewReview, Product, ProductFilters, Review};
use super::{ApiClient, ApiError};

impl ApiClient {
    /// List products matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_products(&self, filters: &ProductFilters) -> Result<Vec<Product>, ApiError> {
        let listing: Listing<Product> = self
            .get_with_query("/products", &filters.query_pairs())
            .await?;
        Ok(listing.into_items())
    }

    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown products.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.get(&format!("/products/{id}")).await
    }

    /// All categories. Failures are logged and yield an empty list.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Vec<Category> {
        self.get::<Vec<Category>>("/categories")
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to fetch categories");
                Vec::new()
            })
    }

    /// Same as [`Self::get_categories`] but surfacing errors, for callers
    /// that must not cache a failure.
    pub(crate) async fn try_get_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get("/categories").await
    }

    /// Reviews of a product. Failures are logged and yield an empty list.
    #[instrument(skip(self))]
    pub async fn get_reviews(&self, product_id: ProductId) -> Vec<Review> {
        self.get::<Vec<Review>>(&format!("/reviews/product/{product_id}"))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to fetch reviews");
                Vec::new()
            })
    }

    /// # Errors
    ///
    /// Returns an error if the backend rejects the review.
    #[instrument(skip(self, review), fields(product_id = %review.product_id))]
    pub async fn create_review(&self, review: &NewReview) -> Result<Review, ApiError> {
        self.post("/reviews", review).await
    }
}
