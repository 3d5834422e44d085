//! Ateliê storefront client library.
//!
//! Services a storefront front end needs on top of the shop backend: catalog,
//! cart, session, favorites, checkout and account management, plus the
//! moderation gate for customer uploads.
//!
//! # Example
//!
//! ```rust,no_run
//! use atelie_storefront::{
//!     api::ApiClient, auth::AuthService, config::StorefrontConfig, events::EventBus,
//!     session::SessionStore, storage::LocalStorage,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorefrontConfig::from_env()?;
//! let session = SessionStore::load(LocalStorage::new(&config.data_dir), EventBus::new()).await;
//! let api = ApiClient::new(&config, session)?;
//!
//! let user = AuthService::new(api.clone()).login("maria@example.com", "secret").await?;
//! println!("Olá, {}", user.name);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod config;
pub mod error;
pub mod events;
pub mod favorites;
pub mod moderation;
pub mod session;
pub mod storage;

pub use error::{Result, StorefrontError};
