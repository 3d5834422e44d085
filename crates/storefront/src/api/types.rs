//! Wire types for the shop backend.
//!
//! Field names follow the backend's camelCase JSON. Products are normalized on
//! the way in because the catalog endpoints disagree on field names.

use atelie_core::{
    AddressId, CardId, CategoryId, MediaId, OrderId, OrderStatus, PlanId, Price, ProductId, ReviewId,
    SubscriptionId, SubscriptionStatus, UserId, VariantId,
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

/// A catalog product with normalized field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawProduct")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub images: Vec<String>,
    pub stock_quantity: i64,
    pub category_id: Option<CategoryId>,
    pub average_rating: Option<f64>,
    pub total_reviews: u32,
    pub variants: Vec<Variant>,
}

impl Product {
    /// First image, used as the cart thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawVariant")]
pub struct Variant {
    pub id: VariantId,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub stock_quantity: i64,
}

/// Product as sent by the backend. `title`/`name`, `stock`/`stockQuantity`
/// and `categoryId`/`category` are used interchangeably.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProduct {
    id: ProductId,
    title: Option<String>,
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    original_price: Option<Decimal>,
    images: Option<Vec<String>>,
    stock: Option<i64>,
    stock_quantity: Option<i64>,
    category_id: Option<String>,
    category: Option<CategoryRef>,
    average_rating: Option<f64>,
    total_reviews: Option<u32>,
    variants: Option<Vec<Variant>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoryRef {
    Id(String),
    Object { id: Option<String> },
}

impl From<RawProduct> for Product {
    fn from(raw: RawProduct) -> Self {
        let name = [raw.title, raw.name]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .unwrap_or_default();

        let category_id = raw
            .category_id
            .filter(|id| !id.is_empty())
            .or_else(|| match raw.category {
                Some(CategoryRef::Id(id)) => Some(id),
                Some(CategoryRef::Object { id }) => id,
                None => None,
            })
            .and_then(|id| id.parse().ok());

        Self {
            id: raw.id,
            name,
            description: raw.description,
            price: raw.price.unwrap_or_default(),
            original_price: raw.original_price,
            images: raw.images.unwrap_or_default(),
            stock_quantity: raw.stock.or(raw.stock_quantity).unwrap_or(0),
            category_id,
            average_rating: raw.average_rating,
            total_reviews: raw.total_reviews.unwrap_or(0),
            variants: raw.variants.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariant {
    id: VariantId,
    name: Option<String>,
    sku: Option<String>,
    price: Option<Decimal>,
    stock_quantity: Option<i64>,
    stock: Option<i64>,
}

impl From<RawVariant> for Variant {
    fn from(raw: RawVariant) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            sku: raw.sku,
            price: raw.price,
            stock_quantity: raw.stock_quantity.or(raw.stock).unwrap_or(0),
        }
    }
}

/// A list endpoint that may answer with a page or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Page { content: Vec<T> },
    Items(Vec<T>),
}

impl<T> Listing<T> {
    pub(crate) fn into_items(self) -> Vec<T> {
        match self {
            Self::Page { content } => content,
            Self::Items(items) => items,
        }
    }
}

/// Product list filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilters {
    pub category_id: Option<CategoryId>,
    pub slug: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
    /// Sales channel; `LOJA_VIRTUAL` when unset.
    pub marketplace: Option<String>,
}

/// Marketplace used when a filter does not name one.
pub const DEFAULT_MARKETPLACE: &str = "LOJA_VIRTUAL";

impl ProductFilters {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category_id) = self.category_id {
            pairs.push(("categoryId", category_id.to_string()));
        }
        if let Some(slug) = &self.slug {
            pairs.push(("slug", slug.clone()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("q", search.clone()));
        }
        pairs.push((
            "marketplace",
            self.marketplace
                .clone()
                .unwrap_or_else(|| DEFAULT_MARKETPLACE.to_string()),
        ));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    #[serde(default)]
    pub user_name: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: Option<UserId>,
    pub rating: u8,
    pub comment: Option<String>,
}

/// Wrapper used by the favorites and history endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ProductEntry {
    pub product: Product,
}

// =============================================================================
// Account
// =============================================================================

/// The logged-in customer, as cached in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
}

/// `/auth/login` response: the user plus a bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: Option<String>,
    #[serde(flatten)]
    pub user: User,
}

/// Google `userinfo` fields forwarded on Google sign-in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleProfile {
    /// Google account id.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

/// Fields accepted by `PATCH /users/profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AddressId>,
    #[serde(default)]
    pub label: Option<String>,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCard {
    pub id: CardId,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub last_four_digits: Option<String>,
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub expiration_month: Option<u8>,
    #[serde(default)]
    pub expiration_year: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaUpload {
    pub id: MediaId,
}

// =============================================================================
// Orders & shipping
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Pix,
    Card,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

/// `POST /checkout/process` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_document: Option<String>,
    pub items: Vec<OrderItemInput>,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub payment_token: Option<String>,
    pub card_id: Option<CardId>,
    pub save_card: bool,
    pub save_address: bool,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub shipping_cost: Option<Decimal>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuoteItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A shipping option shown at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub provider: String,
    pub price: Decimal,
    pub days: u32,
    pub original_price: Option<Decimal>,
    pub free: bool,
}

impl ShippingOption {
    /// Price as shown at checkout: `Grátis` or `R$ 41,50`.
    #[must_use]
    pub fn price_label(&self) -> String {
        if self.free || self.price.is_zero() {
            FREE_SHIPPING_LABEL.to_string()
        } else {
            Price::brl(self.price).to_string()
        }
    }
}

/// Label of a free shipping option.
pub const FREE_SHIPPING_LABEL: &str = "Grátis";

/// Days shown when a legacy quote carries no estimate.
pub const DEFAULT_ESTIMATED_DAYS: u32 = 5;

/// `/shipping/quote` answers with an option list or a single legacy quote.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum QuoteResponse {
    Options {
        options: Vec<atelie_core::shipping::ShippingOffer>,
    },
    #[serde(rename_all = "camelCase")]
    Single {
        provider: Option<String>,
        shipping_cost: Option<Decimal>,
        estimated_days: Option<u32>,
        #[serde(rename = "free_shipping")]
        free_shipping: Option<bool>,
    },
}

impl QuoteResponse {
    pub(crate) fn into_options(self) -> Vec<ShippingOption> {
        match self {
            Self::Options { options } => options
                .into_iter()
                .map(|offer| ShippingOption {
                    provider: offer.name,
                    price: offer.price,
                    days: offer.delivery_days.unwrap_or(DEFAULT_ESTIMATED_DAYS),
                    original_price: Some(offer.original_price),
                    free: offer.free_shipping,
                })
                .collect(),
            Self::Single {
                provider,
                shipping_cost,
                estimated_days,
                free_shipping,
            } => vec![ShippingOption {
                provider: provider.unwrap_or_default(),
                price: shipping_cost.unwrap_or_default(),
                days: estimated_days
                    .filter(|days| *days > 0)
                    .unwrap_or(DEFAULT_ESTIMATED_DAYS),
                original_price: None,
                free: free_shipping.unwrap_or(false),
            }],
        }
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Weekly => "Semanal",
            Self::Biweekly => "Quinzenal",
            Self::Monthly => "Mensal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    Fixed,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyRule {
    pub frequency: Frequency,
    #[serde(default)]
    pub discount_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    #[serde(default)]
    pub base_price: Decimal,
    #[serde(default)]
    pub min_products: Option<u32>,
    #[serde(default)]
    pub max_products: Option<u32>,
    #[serde(default)]
    pub frequency_rules: Vec<FrequencyRule>,
}

impl SubscriptionPlan {
    /// Check a custom kit size against the plan bounds.
    #[must_use]
    pub fn accepts_product_count(&self, count: u32) -> bool {
        if self.plan_type == PlanType::Fixed {
            return true;
        }
        self.min_products.is_none_or(|min| count >= min)
            && self.max_products.is_none_or(|max| count <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    #[serde(default)]
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub plan: Option<SubscriptionPlan>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub next_billing_at: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<SubscriptionItem>,
}

/// `POST /subscriptions/user/{id}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub plan_id: PlanId,
    pub frequency: Frequency,
    pub shipping_address_id: AddressId,
    pub items: Vec<SubscriptionItem>,
}
