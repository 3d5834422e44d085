//! Mercado Pago public key lookup and card tokenization.
//!
//! Card data goes straight to Mercado Pago; the shop backend only ever sees
//! the resulting token.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiClient, ApiError};

/// Mercado Pago card token endpoint.
const CARD_TOKENS_URL: &str = "https://api.mercadopago.com/v1/card_tokens";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

impl ApiClient {
    /// Mercado Pago public key. `None` when payments are not configured.
    #[instrument(skip(self))]
    pub async fn mercado_pago_public_key(&self) -> Option<String> {
        match self
            .get::<PublicKeyResponse>("/config/public/mercado-pago/public-key")
            .await
        {
            Ok(response) => Some(response.public_key),
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch Mercado Pago public key");
                None
            }
        }
    }
}

/// Tax document of the cardholder (CPF or CNPJ).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identification {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

/// Card details typed at checkout.
pub struct CardData {
    pub number: SecretString,
    pub security_code: SecretString,
    pub expiration_month: u8,
    pub expiration_year: u16,
    pub holder_name: String,
    pub identification: Identification,
}

impl std::fmt::Debug for CardData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardData")
            .field("number", &"[REDACTED]")
            .field("security_code", &"[REDACTED]")
            .field("expiration_month", &self.expiration_month)
            .field("expiration_year", &self.expiration_year)
            .field("holder_name", &self.holder_name)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CardTokenRequest<'a> {
    card_number: &'a str,
    security_code: &'a str,
    expiration_month: u8,
    expiration_year: u16,
    cardholder: Cardholder<'a>,
}

#[derive(Serialize)]
struct Cardholder<'a> {
    name: &'a str,
    identification: &'a Identification,
}

/// Single-use card token.
#[derive(Debug, Clone, Deserialize)]
pub struct CardToken {
    pub id: String,
    #[serde(default)]
    pub last_four_digits: Option<String>,
}

/// Client for the Mercado Pago card token endpoint.
#[derive(Debug, Clone)]
pub struct CardTokenizer {
    client: reqwest::Client,
    endpoint: String,
    public_key: String,
}

impl CardTokenizer {
    #[must_use]
    pub fn new(public_key: impl Into<String>) -> Self {
        Self::with_endpoint(public_key, CARD_TOKENS_URL)
    }

    /// Tokenizer posting to a different endpoint.
    #[must_use]
    pub fn with_endpoint(public_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            public_key: public_key.into(),
        }
    }

    /// Exchange card data for a token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Api`] when Mercado Pago rejects the card.
    #[instrument(skip_all, fields(holder = %card.holder_name))]
    pub async fn tokenize(&self, card: &CardData) -> Result<CardToken, ApiError> {
        let request = CardTokenRequest {
            card_number: card.number.expose_secret(),
            security_code: card.security_code.expose_secret(),
            expiration_month: card.expiration_month,
            expiration_year: card.expiration_year,
            cardholder: Cardholder {
                name: &card.holder_name,
                identification: &card.identification,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("public_key", self.public_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::Parse(format!("Failed to parse card token: {e}")));
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(status = status.as_u16(), "card tokenization rejected");
        Err(ApiError::Api {
            status: status.as_u16(),
            message: super::error_message(&message),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::extract::Query;
    use axum::routing::post;

    use super::*;
    use crate::api::tests::serve;

    fn card() -> CardData {
        CardData {
            number: SecretString::from("5031433215406351"),
            security_code: SecretString::from("123"),
            expiration_month: 11,
            expiration_year: 2030,
            holder_name: "APRO".into(),
            identification: Identification {
                kind: "CPF".into(),
                number: "12345678909".into(),
            },
        }
    }

    #[test]
    fn test_debug_redacts_card() {
        let debug = format!("{:?}", card());
        assert!(!debug.contains("5031"));
        assert!(debug.contains("APRO"));
    }

    #[tokio::test]
    async fn test_tokenize_posts_card_and_key() {
        let router = Router::new().route(
            "/v1/card_tokens",
            post(
                |Query(query): Query<std::collections::HashMap<String, String>>,
                 axum::Json(body): axum::Json<serde_json::Value>| async move {
                    assert_eq!(query["public_key"], "TEST-KEY");
                    assert_eq!(body["card_number"], "5031433215406351");
                    assert_eq!(body["cardholder"]["identification"]["type"], "CPF");
                    axum::Json(serde_json::json!({"id": "tok_1", "last_four_digits": "6351"}))
                },
            ),
        );
        let addr = serve(router).await;
        let tokenizer =
            CardTokenizer::with_endpoint("TEST-KEY", format!("http://{addr}/v1/card_tokens"));

        let token = tokenizer.tokenize(&card()).await.unwrap();
        assert_eq!(token.id, "tok_1");
        assert_eq!(token.last_four_digits.as_deref(), Some("6351"));
    }
}
