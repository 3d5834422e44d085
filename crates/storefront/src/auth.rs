//! Login, registration and profile management.

use atelie_core::Email;
use tracing::instrument;

use crate::api::{ApiClient, GoogleProfile, LoginResponse, ProfileUpdate, Registration, User};
use crate::cart::CartService;
use crate::error::{Result, StorefrontError};
use crate::events::StoreEvent;
use crate::moderation::{ModelLoader, ModerationGate};

/// Account operations that keep the local session in step with the backend.
#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
    cart: CartService,
}

impl AuthService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let cart = CartService::new(api.clone());
        Self { api, cart }
    }

    pub async fn current_user(&self) -> Option<User> {
        self.api.session().user().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated().await
    }

    /// Log in with email and password.
    ///
    /// Starts the session, moves the guest cart to the user and publishes
    /// [`StoreEvent::AuthChanged`].
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::InvalidEmail`] before calling the backend,
    /// [`StorefrontError::InvalidLoginResponse`] if the backend answers
    /// without a token, or the backend error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = Email::parse(email)?;
        let response = self.api.login(email.as_str(), password).await.inspect_err(|e| {
            tracing::warn!(error = %e, "login failed");
        })?;
        self.start_session(response).await
    }

    /// Log in with a Google profile the caller already fetched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::login`].
    #[instrument(skip(self, profile, access_token))]
    pub async fn google_login(&self, profile: &GoogleProfile, access_token: &str) -> Result<User> {
        let response = self.api.google_login(profile, access_token).await?;
        self.start_session(response).await
    }

    async fn start_session(&self, response: LoginResponse) -> Result<User> {
        let token = response
            .token
            .filter(|token| !token.is_empty())
            .ok_or(StorefrontError::InvalidLoginResponse)?;
        let user = response.user;

        self.api.session().set_session(token, user.clone()).await?;
        if let Err(e) = self.cart.migrate(user.id).await {
            tracing::warn!(error = %e, "failed to migrate guest cart");
        }
        self.api.session().events().publish(StoreEvent::AuthChanged);

        tracing::info!(user_id = %user.id, "logged in");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns an error if the session files cannot be removed.
    pub async fn logout(&self) -> Result<()> {
        self.api.session().clear().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn register(&self, registration: &Registration) -> Result<serde_json::Value> {
        let registration = Registration {
            email: Email::parse(&registration.email)?.to_string(),
            ..registration.clone()
        };
        Ok(self.api.register(&registration).await?)
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn verify(&self, email: &str, code: &str) -> Result<serde_json::Value> {
        Ok(self.api.verify_email(email, code).await?)
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = Email::parse(email)?;
        Ok(self.api.request_password_reset(email.as_str()).await?)
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        Ok(self.api.reset_password(token, new_password).await?)
    }

    /// Update profile fields and the cached user.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::NotLoggedIn`] without a session, or the
    /// backend error.
    #[instrument(skip(self))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let mut user = self.require_user().await?;
        self.api.update_profile(update).await?;

        if let Some(name) = &update.name {
            user.name.clone_from(name);
        }
        if let Some(document) = &update.document {
            user.document = Some(document.clone());
        }
        self.api.session().set_user(user.clone()).await?;
        Ok(user)
    }

    /// Screen, upload and set a new profile photo. Returns its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::ImageRejected`] if moderation flags the
    /// image, in which case nothing is uploaded.
    #[instrument(skip(self, gate, image), fields(size = image.len()))]
    pub async fn upload_profile_photo<L: ModelLoader>(
        &self,
        gate: &ModerationGate<L>,
        image: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> Result<String> {
        let mut user = self.require_user().await?;

        let verdict = gate.check(&image).await?;
        if !verdict.safe {
            return Err(StorefrontError::ImageRejected(
                verdict.reason.unwrap_or_default(),
            ));
        }

        let media_id = self.api.upload_avatar(image, file_name, mime).await?;
        let photo_url = self.api.public_media_url(media_id);
        self.api.update_profile_photo(&photo_url).await?;

        user.photo_url = Some(photo_url.clone());
        self.api.session().set_user(user).await?;
        Ok(photo_url)
    }

    async fn require_user(&self) -> Result<User> {
        if !self.is_authenticated().await {
            return Err(StorefrontError::NotLoggedIn);
        }
        self.current_user().await.ok_or(StorefrontError::NotLoggedIn)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::response::IntoResponse;
    use axum::routing::{get, patch, post};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::api::tests::{client_for, serve, user};
    use crate::cart::CartItem;
    use crate::events::EventBus;
    use crate::moderation::{ImageClassifier, ModerationError, Prediction};

    const USER_ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
    const MEDIA_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    fn login_body(token: Option<&str>) -> serde_json::Value {
        json!({
            "token": token,
            "id": USER_ID,
            "name": "Maria",
            "email": "maria@example.com",
            "emailVerified": true,
        })
    }

    struct Verdict(f32);

    impl ImageClassifier for Verdict {
        async fn classify(&self, _: &[u8]) -> std::result::Result<Vec<Prediction>, ModerationError> {
            Ok(vec![Prediction {
                class_name: "Porn".into(),
                probability: self.0,
            }])
        }
    }

    struct VerdictLoader(f32);

    impl ModelLoader for VerdictLoader {
        type Classifier = Verdict;

        async fn load(&self) -> std::result::Result<Verdict, ModerationError> {
            Ok(Verdict(self.0))
        }
    }

    #[tokio::test]
    async fn test_login_migrates_guest_cart_then_announces() {
        let router = Router::new()
            .route("/api/auth/login", post(|| async { axum::Json(login_body(Some("tok"))) }))
            .route("/api/cart/{id}", get(|| async { axum::Json(json!({"items": []})) }))
            .route("/api/cart/{id}/sync", post(|| async { axum::http::StatusCode::OK }));
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::new();
        let api = client_for(addr, dir.path(), events.clone()).await;
        let guest_line = CartItem {
            id: "6ba7b810-9dad-11d1-80b4-00c04fd430c8".parse().unwrap(),
            name: "Guia".into(),
            price: Decimal::new(50, 0),
            image: None,
            quantity: 2,
            variant_id: None,
        };
        CartService::new(api.clone()).save_for(None, &[guest_line]).await.unwrap();
        let mut rx = events.subscribe();

        let auth = AuthService::new(api.clone());
        let user = auth.login("maria@example.com", "secret").await.unwrap();

        assert_eq!(user.id.to_string(), USER_ID);
        assert!(auth.is_authenticated().await);
        let cart = CartService::new(api.clone()).get().await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 2);
        assert!(api.session().storage().get::<serde_json::Value>("cart_guest").await.unwrap().is_none());

        assert_eq!(rx.recv().await.unwrap(), StoreEvent::CartUpdated);
        assert_eq!(rx.recv().await.unwrap(), StoreEvent::AuthChanged);
    }

    #[tokio::test]
    async fn test_login_without_token_is_rejected() {
        let router = Router::new()
            .route("/api/auth/login", post(|| async { axum::Json(login_body(None)) }));
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let auth = AuthService::new(client_for(addr, dir.path(), EventBus::new()).await);

        let err = auth.login("maria@example.com", "secret").await.unwrap_err();
        assert!(matches!(err, StorefrontError::InvalidLoginResponse));
        assert!(!auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_login_normalizes_email_and_rejects_invalid() {
        let router = Router::new().route(
            "/api/auth/login",
            post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                if body["email"] == "maria@example.com" {
                    axum::Json(login_body(Some("tok"))).into_response()
                } else {
                    axum::http::StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        );
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let auth = AuthService::new(client_for(addr, dir.path(), EventBus::new()).await);

        let err = auth.login("maria.example.com", "secret").await.unwrap_err();
        assert!(matches!(err, StorefrontError::InvalidEmail(_)));
        assert_eq!(err.user_message(), "Informe um e-mail válido.");

        auth.login("  Maria@Example.com ", "secret").await.unwrap();
        assert!(auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_rejected_photo_is_never_uploaded() {
        let uploads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&uploads);
        let router = Router::new().route(
            "/api/media/upload",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(json!({ "id": MEDIA_ID }))
                }
            }),
        );
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let api = client_for(addr, dir.path(), EventBus::new()).await;
        api.session().set_session("tok".into(), user()).await.unwrap();
        let auth = AuthService::new(api);

        let gate = ModerationGate::new(VerdictLoader(0.9));
        let err = auth
            .upload_profile_photo(&gate, b"img".to_vec(), "me.png", "image/png")
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "A imagem contém conteúdo inadequado e não pode ser enviada."
        );
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_photo_upload_updates_cached_user() {
        let router = Router::new()
            .route("/api/media/upload", post(|| async { axum::Json(json!({ "id": MEDIA_ID })) }))
            .route("/api/users/profile/photo", patch(|| async { axum::http::StatusCode::OK }));
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let api = client_for(addr, dir.path(), EventBus::new()).await;
        api.session().set_session("tok".into(), user()).await.unwrap();
        let auth = AuthService::new(api);

        let gate = ModerationGate::new(VerdictLoader(0.1));
        let url = auth
            .upload_profile_photo(&gate, b"img".to_vec(), "me.png", "image/png")
            .await
            .unwrap();

        assert_eq!(url, format!("http://{addr}/api/media/public/{MEDIA_ID}"));
        assert_eq!(auth.current_user().await.unwrap().photo_url, Some(url));
    }

    #[tokio::test]
    async fn test_profile_update_requires_session() {
        let addr = serve(Router::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let auth = AuthService::new(client_for(addr, dir.path(), EventBus::new()).await);

        let update = ProfileUpdate {
            name: Some("Ana".into()),
            document: None,
        };
        assert!(matches!(
            auth.update_profile(&update).await,
            Err(StorefrontError::NotLoggedIn)
        ));
    }
}
