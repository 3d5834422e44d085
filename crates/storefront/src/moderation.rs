//! NSFW screening of customer-uploaded images.
//!
//! The classifier model is heavy, so [`ModerationGate`] loads it on first use
//! and shares it across calls. Images are rejected when the `Porn` or `Hentai`
//! probability exceeds the configured threshold.

use std::collections::BTreeMap;
use std::future::Future;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::config::DEFAULT_MODERATION_THRESHOLD;

/// Reason given for rejected images.
pub const REJECTION_REASON: &str = "A imagem contém conteúdo inadequado e não pode ser enviada.";

/// Classes whose probability can reject an image.
pub const BLOCKED_CLASSES: [&str; 2] = ["Porn", "Hentai"];

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("failed to load classifier: {0}")]
    Load(String),

    #[error("failed to classify image: {0}")]
    Classify(String),

    #[error("invalid data URL")]
    InvalidDataUrl,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One class probability reported by a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub class_name: String,
    pub probability: f32,
}

/// An image classifier, e.g. a local NSFW model.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> impl Future<Output = Result<Vec<Prediction>, ModerationError>> + Send;
}

/// Produces the classifier on first use.
pub trait ModelLoader: Send + Sync {
    type Classifier: ImageClassifier;

    fn load(&self) -> impl Future<Output = Result<Self::Classifier, ModerationError>> + Send;
}

/// Outcome of screening one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationResult {
    pub safe: bool,
    pub reason: Option<String>,
    /// Probability per class name.
    pub predictions: BTreeMap<String, f32>,
}

impl ModerationResult {
    /// Judge `predictions` against `threshold`.
    #[must_use]
    pub fn from_predictions(predictions: Vec<Prediction>, threshold: f32) -> Self {
        let predictions: BTreeMap<String, f32> = predictions
            .into_iter()
            .map(|p| (p.class_name, p.probability))
            .collect();

        let unsafe_image = BLOCKED_CLASSES
            .iter()
            .any(|class| predictions.get(*class).copied().unwrap_or(0.0) > threshold);

        Self {
            safe: !unsafe_image,
            reason: unsafe_image.then(|| REJECTION_REASON.to_string()),
            predictions,
        }
    }
}

/// Lazily loaded moderation model with a rejection threshold.
pub struct ModerationGate<L: ModelLoader> {
    loader: L,
    threshold: f32,
    model: OnceCell<L::Classifier>,
}

impl<L: ModelLoader> ModerationGate<L> {
    pub fn new(loader: L) -> Self {
        Self::with_threshold(loader, DEFAULT_MODERATION_THRESHOLD)
    }

    pub fn with_threshold(loader: L, threshold: f32) -> Self {
        Self {
            loader,
            threshold,
            model: OnceCell::new(),
        }
    }

    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether the model has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Load the model ahead of the first check.
    ///
    /// # Errors
    ///
    /// Returns the loader's error. A failed load is retried on the next call.
    pub async fn preload(&self) -> Result<(), ModerationError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<&L::Classifier, ModerationError> {
        self.model
            .get_or_try_init(|| async {
                tracing::info!("loading moderation model");
                self.loader.load().await
            })
            .await
    }

    /// Screen raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns `ModerationError` if the model cannot be loaded or fails on
    /// this image.
    #[instrument(skip(self, image), fields(len = image.len()))]
    pub async fn check(&self, image: &[u8]) -> Result<ModerationResult, ModerationError> {
        let predictions = self.model().await?.classify(image).await?;
        let result = ModerationResult::from_predictions(predictions, self.threshold);
        if !result.safe {
            tracing::info!(predictions = ?result.predictions, "image rejected");
        }
        Ok(result)
    }

    /// Screen an image given as a `data:` URL.
    ///
    /// # Errors
    ///
    /// Returns `ModerationError` for a malformed URL or a classifier failure.
    pub async fn check_data_url(&self, data_url: &str) -> Result<ModerationResult, ModerationError> {
        let (_, bytes) = decode_data_url(data_url)?;
        self.check(&bytes).await
    }
}

impl<L: ModelLoader> std::fmt::Debug for ModerationGate<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationGate")
            .field("threshold", &self.threshold)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

/// Split a base64 `data:` URL into its MIME type and decoded bytes.
///
/// # Errors
///
/// Returns [`ModerationError::InvalidDataUrl`] unless the URL has the form
/// `data:<mime>;base64,<payload>`.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), ModerationError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(ModerationError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(ModerationError::InvalidDataUrl)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(ModerationError::InvalidDataUrl)?;

    let bytes = STANDARD.decode(payload.trim())?;
    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn prediction(class_name: &str, probability: f32) -> Prediction {
        Prediction {
            class_name: class_name.into(),
            probability,
        }
    }

    struct FixedClassifier(Vec<Prediction>);

    impl ImageClassifier for FixedClassifier {
        async fn classify(&self, _: &[u8]) -> Result<Vec<Prediction>, ModerationError> {
            Ok(self.0.clone())
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        predictions: Vec<Prediction>,
    }

    impl ModelLoader for CountingLoader {
        type Classifier = FixedClassifier;

        async fn load(&self) -> Result<FixedClassifier, ModerationError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(FixedClassifier(self.predictions.clone()))
        }
    }

    fn gate(predictions: Vec<Prediction>) -> ModerationGate<CountingLoader> {
        ModerationGate::new(CountingLoader {
            loads: AtomicUsize::new(0),
            predictions,
        })
    }

    #[test]
    fn test_blocked_classes_over_threshold() {
        let result = ModerationResult::from_predictions(
            vec![prediction("Neutral", 0.2), prediction("Hentai", 0.7)],
            0.6,
        );
        assert!(!result.safe);
        assert_eq!(result.reason.as_deref(), Some(REJECTION_REASON));

        let result = ModerationResult::from_predictions(
            vec![prediction("Sexy", 0.9), prediction("Porn", 0.6)],
            0.6,
        );
        assert!(result.safe);
        assert!(result.reason.is_none());
        assert_eq!(result.predictions.get("Sexy"), Some(&0.9));
    }

    #[test]
    fn test_no_predictions_is_safe() {
        assert!(ModerationResult::from_predictions(Vec::new(), 0.6).safe);
    }

    #[tokio::test]
    async fn test_model_loads_once() {
        let gate = gate(vec![prediction("Porn", 0.95)]);
        assert!(!gate.is_loaded());

        assert!(!gate.check(b"img").await.unwrap().safe);
        assert!(!gate.check(b"img").await.unwrap().safe);
        assert_eq!(gate.loader.loads.load(Ordering::SeqCst), 1);
        assert!(gate.is_loaded());
    }

    #[tokio::test]
    async fn test_check_data_url() {
        let gate = gate(vec![prediction("Neutral", 0.99)]);
        let url = format!("data:image/png;base64,{}", STANDARD.encode(b"png"));
        assert!(gate.check_data_url(&url).await.unwrap().safe);
    }

    #[test]
    fn test_decode_data_url() {
        let (mime, bytes) = decode_data_url("data:image/jpeg;base64,aGk=").unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, b"hi");

        assert!(matches!(
            decode_data_url("image/jpeg;base64,aGk="),
            Err(ModerationError::InvalidDataUrl)
        ));
        assert!(matches!(
            decode_data_url("data:image/jpeg,aGk="),
            Err(ModerationError::InvalidDataUrl)
        ));
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,@@"),
            Err(ModerationError::Base64(_))
        ));
    }
}
