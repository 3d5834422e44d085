//! Unified error type for storefront services.

use atelie_core::EmailError;
use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::favorites::FavoriteError;
use crate::moderation::ModerationError;
use crate::storage::StorageError;

/// Errors surfaced by storefront services.
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Moderation error: {0}")]
    Moderation(#[from] ModerationError),

    #[error("Favorites error: {0}")]
    Favorite(#[from] FavoriteError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The action needs a logged-in customer.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The backend answered a login without a token.
    #[error("Invalid login response")]
    InvalidLoginResponse,

    /// The image was classified as inappropriate.
    #[error("{0}")]
    ImageRejected(String),
}

impl StorefrontError {
    /// Message suitable for showing to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotLoggedIn => {
                "Sua sessão expirou ou você não está logado. Faça login para continuar.".to_string()
            }
            Self::ImageRejected(reason) => reason.clone(),
            Self::InvalidEmail(_) => "Informe um e-mail válido.".to_string(),
            Self::Api(ApiError::Api { message, .. }) => message.clone(),
            Self::Api(ApiError::Unauthorized) | Self::InvalidLoginResponse => {
                "E-mail ou senha inválidos.".to_string()
            }
            _ => "Ocorreu um erro. Tente novamente.".to_string(),
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;
