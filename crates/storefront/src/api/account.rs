//! Registration, login, profile, addresses, saved cards, favorites and media.

use atelie_core::{AddressId, CardId, MediaId, ProductId, UserId};
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use super::types::{
    Address, GoogleProfile, LoginResponse, MediaUpload, Product, ProductEntry, ProfileUpdate, Registration,
    SavedCard,
};
use super::{ApiClient, ApiError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteKey {
    user_id: UserId,
    product_id: ProductId,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if registration is rejected.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<serde_json::Value, ApiError> {
        self.post("/auth/register", registration).await
    }

    /// Confirm an email address with the code sent to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is rejected.
    #[instrument(skip(self, code))]
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<serde_json::Value, ApiError> {
        self.post("/auth/verify", &json!({ "email": email, "code": code }))
            .await
    }

    /// Exchange credentials for a session. Does not touch local state.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for bad credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    /// Exchange a Google profile fetched by the caller for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the Google account.
    #[instrument(skip(self, profile, access_token), fields(email = %profile.email))]
    pub async fn google_login(
        &self,
        profile: &GoogleProfile,
        access_token: &str,
    ) -> Result<LoginResponse, ApiError> {
        self.post(
            "/auth/google",
            &json!({
                "email": profile.email,
                "name": profile.name,
                "picture": profile.picture,
                "googleId": profile.sub,
                "accessToken": access_token,
            }),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        self.post_unit("/auth/password-reset", &json!({ "email": email }))
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the reset token is invalid or expired.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        self.post_unit(
            "/auth/password-reset/reset",
            &json!({ "token": token, "newPassword": new_password }),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip(self))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.patch_unit("/users/profile", update).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend rejects the URL.
    #[instrument(skip(self))]
    pub async fn update_profile_photo(&self, photo_url: &str) -> Result<(), ApiError> {
        self.patch_unit("/users/profile/photo", &json!({ "photoUrl": photo_url }))
            .await
    }

    /// Upload a public avatar image.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> Result<MediaId, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("category", "avatars")
            .text("public", "true");
        let upload: MediaUpload = self.post_multipart("/media/upload", form).await?;
        Ok(upload.id)
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// Saved addresses. Failures are logged and yield an empty list.
    #[instrument(skip(self))]
    pub async fn list_addresses(&self, user_id: UserId) -> Vec<Address> {
        self.get::<Vec<Address>>(&format!("/addresses/user/{user_id}"))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to fetch addresses");
                Vec::new()
            })
    }

    /// # Errors
    ///
    /// Returns an error if the address is rejected.
    #[instrument(skip(self, address))]
    pub async fn create_address(&self, user_id: UserId, address: &Address) -> Result<Address, ApiError> {
        self.post(&format!("/addresses/user/{user_id}"), address).await
    }

    /// # Errors
    ///
    /// Returns an error if the address is rejected.
    #[instrument(skip(self, address))]
    pub async fn update_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
        address: &Address,
    ) -> Result<Address, ApiError> {
        self.put(&format!("/addresses/{address_id}/user/{user_id}"), address)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn delete_address(&self, user_id: UserId, address_id: AddressId) -> Result<(), ApiError> {
        self.delete(&format!("/addresses/{address_id}/user/{user_id}"))
            .await
    }

    // =========================================================================
    // Saved cards
    // =========================================================================

    /// Cards of the logged-in customer. Failures yield an empty list.
    #[instrument(skip(self))]
    pub async fn list_cards(&self) -> Vec<SavedCard> {
        self.get::<Vec<SavedCard>>("/customer/cards")
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to fetch saved cards");
                Vec::new()
            })
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn delete_card(&self, card_id: CardId) -> Result<(), ApiError> {
        self.delete(&format!("/customer/cards/{card_id}")).await
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Favorite products.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_favorites(&self, user_id: UserId) -> Result<Vec<Product>, ApiError> {
        let entries: Vec<ProductEntry> = self.get(&format!("/favorites/user/{user_id}")).await?;
        Ok(entries.into_iter().map(|entry| entry.product).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn add_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<(), ApiError> {
        self.post_unit("/favorites", &FavoriteKey { user_id, product_id })
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn remove_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<(), ApiError> {
        self.delete_with_query("/favorites", &FavoriteKey { user_id, product_id })
            .await
    }
}
