//! Shopping cart kept locally and mirrored to the backend for logged-in users.
//!
//! Guests use the `cart_guest` key. Logged-in customers use `cart_user_<id>`
//! and their cart is synced with `/cart/<id>`; a non-empty remote cart wins
//! over the local copy. Lines are identified by product and variant.

use atelie_core::{ProductId, UserId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::instrument;

use crate::api::{ApiClient, Product, QuoteLine};
use crate::events::StoreEvent;
use crate::storage::StorageError;

const GUEST_CART_KEY: &str = "cart_guest";

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product id.
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    /// Stored as an empty string when the product has no variants.
    #[serde(default, with = "empty_variant")]
    pub variant_id: Option<VariantId>,
}

impl CartItem {
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32, variant_id: Option<VariantId>) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            image: product.thumbnail().map(str::to_string),
            quantity,
            variant_id,
        }
    }

    fn same_line(&self, product_id: ProductId, variant_id: Option<VariantId>) -> bool {
        self.id == product_id && self.variant_id == variant_id
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Add `item` to `items`, summing quantities of an existing line.
pub fn merge_line(items: &mut Vec<CartItem>, item: CartItem) {
    match items
        .iter_mut()
        .find(|existing| existing.same_line(item.id, item.variant_id))
    {
        Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
        None => items.push(item),
    }
}

/// Sum of line totals.
#[must_use]
pub fn subtotal(items: &[CartItem]) -> Decimal {
    items.iter().map(CartItem::line_total).sum()
}

/// Lines to send with a shipping quote.
#[must_use]
pub fn quote_lines(items: &[CartItem]) -> Vec<QuoteLine> {
    items
        .iter()
        .map(|item| QuoteLine {
            product_id: item.id,
            unit_price: item.price,
            quantity: item.quantity,
        })
        .collect()
}

#[derive(Deserialize)]
struct RemoteCart {
    #[serde(default)]
    items: Vec<CartItem>,
}

/// Local cart shapes: a bare list or an object with `items`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCart {
    Items(Vec<CartItem>),
    Wrapped { items: Vec<CartItem> },
}

fn cart_key(user: Option<UserId>) -> String {
    user.map_or_else(|| GUEST_CART_KEY.to_string(), |id| format!("cart_user_{id}"))
}

/// Cart operations for the current session.
#[derive(Debug, Clone)]
pub struct CartService {
    api: ApiClient,
}

impl CartService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn current_user(&self) -> Option<UserId> {
        self.api.session().user().await.map(|user| user.id)
    }

    /// Cart of the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the local copy cannot be written.
    pub async fn get(&self) -> Result<Vec<CartItem>, StorageError> {
        let user = self.current_user().await;
        self.get_for(user).await
    }

    /// Cart of `user`, or the guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the local copy cannot be written.
    #[instrument(skip(self))]
    pub async fn get_for(&self, user: Option<UserId>) -> Result<Vec<CartItem>, StorageError> {
        let storage = self.api.session().storage();
        let key = cart_key(user);
        let mut items = match storage.get::<StoredCart>(&key).await {
            Ok(Some(StoredCart::Items(items) | StoredCart::Wrapped { items })) => items,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable cart");
                Vec::new()
            }
        };

        if let Some(user_id) = user {
            match self.api.get::<RemoteCart>(&format!("/cart/{user_id}")).await {
                Ok(remote) if !remote.items.is_empty() => {
                    items = remote.items;
                    storage.set(&key, &items).await?;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "failed to fetch remote cart"),
            }
        }
        Ok(items)
    }

    /// Replace the cart of the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the local copy cannot be written.
    pub async fn save(&self, items: &[CartItem]) -> Result<(), StorageError> {
        let user = self.current_user().await;
        self.save_for(user, items).await
    }

    /// Persist locally, sync to the backend for users, and publish
    /// [`StoreEvent::CartUpdated`]. Sync failures are logged only.
    ///
    /// # Errors
    ///
    /// Returns an error if the local copy cannot be written.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn save_for(&self, user: Option<UserId>, items: &[CartItem]) -> Result<(), StorageError> {
        self.api.session().storage().set(&cart_key(user), &items).await?;

        if let Some(user_id) = user
            && let Err(e) = self.api.post_unit(&format!("/cart/{user_id}/sync"), items).await
        {
            tracing::warn!(error = %e, "failed to sync cart");
        }

        self.api.session().events().publish(StoreEvent::CartUpdated);
        Ok(())
    }

    /// Add a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    pub async fn add(
        &self,
        product: &Product,
        quantity: u32,
        variant_id: Option<VariantId>,
    ) -> Result<Vec<CartItem>, StorageError> {
        let user = self.current_user().await;
        let mut items = self.get_for(user).await?;
        merge_line(&mut items, CartItem::from_product(product, quantity, variant_id));
        self.save_for(user, &items).await?;
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    pub async fn remove(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Vec<CartItem>, StorageError> {
        let user = self.current_user().await;
        let mut items = self.get_for(user).await?;
        items.retain(|item| !item.same_line(product_id, variant_id));
        self.save_for(user, &items).await?;
        Ok(items)
    }

    /// Set a line's quantity, never below 1. Unknown lines are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
    ) -> Result<Vec<CartItem>, StorageError> {
        let user = self.current_user().await;
        let mut items = self.get_for(user).await?;
        if let Some(item) = items
            .iter_mut()
            .find(|item| item.same_line(product_id, variant_id))
        {
            item.quantity = quantity.max(1);
            self.save_for(user, &items).await?;
        }
        Ok(items)
    }

    /// Empty the cart locally and remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if the local copy cannot be removed.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let user = self.current_user().await;
        self.api.session().storage().remove(&cart_key(user)).await?;

        if let Some(user_id) = user
            && let Err(e) = self.api.delete(&format!("/cart/{user_id}")).await
        {
            tracing::warn!(error = %e, "failed to clear remote cart");
        }

        self.api.session().events().publish(StoreEvent::CartUpdated);
        Ok(())
    }

    /// Merge the guest cart into `user_id`'s cart and drop the guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if either cart cannot be read or written.
    #[instrument(skip(self))]
    pub async fn migrate(&self, user_id: UserId) -> Result<(), StorageError> {
        let storage = self.api.session().storage();
        let guest = match storage.get::<StoredCart>(GUEST_CART_KEY).await? {
            Some(StoredCart::Items(items) | StoredCart::Wrapped { items }) => items,
            None => Vec::new(),
        };
        if guest.is_empty() {
            return Ok(());
        }

        let mut items = self.get_for(Some(user_id)).await?;
        for item in guest {
            merge_line(&mut items, item);
        }
        self.save_for(Some(user_id), &items).await?;
        storage.remove(GUEST_CART_KEY).await?;
        tracing::info!(lines = items.len(), "guest cart migrated");
        Ok(())
    }
}

mod empty_variant {
    use super::{Deserialize, Deserializer, Serializer, VariantId};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<VariantId>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<VariantId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const P1: &str = "7d0e3c52-6a4f-4b0a-9f1e-2b8a4c6d9e01";
    const V1: &str = "1b2c3d4e-5f60-4718-8a9b-0c1d2e3f4a5b";

    fn item(variant: Option<&str>, quantity: u32) -> CartItem {
        CartItem {
            id: P1.parse().unwrap(),
            name: "Vela".into(),
            price: Decimal::new(1990, 2),
            image: None,
            quantity,
            variant_id: variant.map(|v| v.parse().unwrap()),
        }
    }

    #[test]
    fn test_merge_by_product_and_variant() {
        let mut items = vec![item(None, 1)];
        merge_line(&mut items, item(None, 2));
        merge_line(&mut items, item(Some(V1), 1));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(subtotal(&items), Decimal::new(7960, 2));
    }

    #[test]
    fn test_variant_serializes_as_empty_string() {
        let json = serde_json::to_value(item(None, 1)).unwrap();
        assert_eq!(json["variantId"], "");
        let back: CartItem = serde_json::from_value(json).unwrap();
        assert_eq!(back.variant_id, None);

        let json = serde_json::to_value(item(Some(V1), 1)).unwrap();
        assert_eq!(json["variantId"], V1);
    }

    #[test]
    fn test_variant_accepts_null_and_missing() {
        let back: CartItem = serde_json::from_value(serde_json::json!({
            "id": P1, "price": 10, "quantity": 1, "variantId": null
        }))
        .unwrap();
        assert_eq!(back.variant_id, None);
        let back: CartItem =
            serde_json::from_value(serde_json::json!({"id": P1, "price": 10, "quantity": 1})).unwrap();
        assert_eq!(back.variant_id, None);
    }

    #[test]
    fn test_cart_keys() {
        assert_eq!(cart_key(None), "cart_guest");
        let id: UserId = P1.parse().unwrap();
        assert_eq!(cart_key(Some(id)), format!("cart_user_{P1}"));
    }
}
