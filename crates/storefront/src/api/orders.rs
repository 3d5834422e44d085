//! Checkout, orders, shipping quotes and browsing history.

use atelie_core::{OrderId, ProductId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use super::types::{NewOrder, Order, Product, ProductEntry, QuoteItem, QuoteResponse, ShippingOption};
use super::{ApiClient, ApiError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest<'a> {
    cep: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    subtotal: Decimal,
    items: Vec<QuoteItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    user_id: UserId,
    product_id: ProductId,
}

/// A line used to price a shipping quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteLine {
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl ApiClient {
    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns an error if checkout fails.
    #[instrument(skip(self, order), fields(items = order.items.len()))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, ApiError> {
        self.post("/checkout/process", order).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown orders.
    #[instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ApiError> {
        self.get(&format!("/orders/{id}")).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_user_orders(&self, user_id: UserId) -> Result<Vec<Order>, ApiError> {
        self.get(&format!("/orders/user/{user_id}")).await
    }

    /// Quote shipping to `cep` for the given lines.
    ///
    /// The subtotal sent is the sum of line totals. Failures are logged and
    /// yield no options.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn calculate_shipping(&self, cep: &str, lines: &[QuoteLine]) -> Vec<ShippingOption> {
        let request = QuoteRequest {
            cep,
            subtotal: lines
                .iter()
                .map(|line| line.unit_price * Decimal::from(line.quantity))
                .sum(),
            items: lines
                .iter()
                .map(|line| QuoteItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
        };

        match self.post::<QuoteResponse, _>("/shipping/quote", &request).await {
            Ok(response) => response.into_options(),
            Err(e) => {
                tracing::warn!(error = %e, "shipping quote failed");
                Vec::new()
            }
        }
    }

    /// Recently viewed products. Failures yield an empty list.
    #[instrument(skip(self))]
    pub async fn get_history(&self, user_id: UserId) -> Vec<Product> {
        match self
            .get::<Vec<ProductEntry>>(&format!("/history/user/{user_id}"))
            .await
        {
            Ok(entries) => entries.into_iter().map(|entry| entry.product).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch history");
                Vec::new()
            }
        }
    }

    /// Record a product view. Failures are logged only.
    #[instrument(skip(self))]
    pub async fn add_history(&self, user_id: UserId, product_id: ProductId) {
        let entry = HistoryEntry {
            user_id,
            product_id,
        };
        if let Err(e) = self.post_unit("/history", &entry).await {
            tracing::warn!(error = %e, "failed to record history");
        }
    }

    /// Clear browsing history. Failures are logged only.
    #[instrument(skip(self))]
    pub async fn clear_history(&self, user_id: UserId) {
        if let Err(e) = self.delete(&format!("/history/user/{user_id}")).await {
            tracing::warn!(error = %e, "failed to clear history");
        }
    }
}
