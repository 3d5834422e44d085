//! Melhor Envio provider configuration as stored by the backend.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::rule::{FreeShippingRule, RuleMap, decode_rules};

/// Melhor Envio configuration object.
///
/// Every field is optional on the wire; missing fields deserialize to empty
/// values. The editor always emits all four fields.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelhorEnvioConfig {
    /// Melhor Envio API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Origin postal code (CEP).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    /// Allowed carrier ids. Empty allows every carrier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_carriers: Option<Vec<String>>,
    /// Free-shipping rules keyed by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleMap>,
}

impl MelhorEnvioConfig {
    /// Allowed carrier ids, empty when unset.
    #[must_use]
    pub fn allowed_carriers(&self) -> &[String] {
        self.allowed_carriers.as_deref().unwrap_or_default()
    }

    /// Whether quotes from `carrier` may be offered.
    #[must_use]
    pub fn allows_carrier(&self, carrier: &str) -> bool {
        let allowed = self.allowed_carriers();
        allowed.is_empty() || allowed.iter().any(|id| id == carrier)
    }

    /// Decoded rules, empty when unset.
    #[must_use]
    pub fn decoded_rules(&self) -> Vec<FreeShippingRule> {
        self.rules.as_ref().map(decode_rules).unwrap_or_default()
    }

    /// A copy safe to show back to admins, with the token masked.
    #[must_use]
    pub fn masked(&self) -> Self {
        Self {
            token: self.token.as_deref().map(mask_token),
            ..self.clone()
        }
    }
}

/// Keep the last four characters of a token.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

impl fmt::Debug for MelhorEnvioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MelhorEnvioConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("zip_code", &self.zip_code)
            .field("allowed_carriers", &self.allowed_carriers)
            .field("rules", &self.rules)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let config: MelhorEnvioConfig = serde_json::from_str(r#"{"zipCode":"01001-000"}"#).unwrap();
        assert_eq!(config.zip_code.as_deref(), Some("01001-000"));
        assert!(config.allowed_carriers().is_empty());
        assert!(config.decoded_rules().is_empty());
    }

    #[test]
    fn test_serialize_shape() {
        let config = MelhorEnvioConfig {
            token: Some("tok".into()),
            zip_code: Some(String::new()),
            allowed_carriers: Some(vec!["PAC".into()]),
            rules: Some([("Frete", "true")].into_iter().collect()),
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "token": "tok",
                "zipCode": "",
                "allowedCarriers": ["PAC"],
                "rules": {"Frete": "true"}
            })
        );
    }

    #[test]
    fn test_allows_carrier() {
        let mut config = MelhorEnvioConfig::default();
        assert!(config.allows_carrier("Loggi"));
        config.allowed_carriers = Some(vec!["PAC".into()]);
        assert!(config.allows_carrier("PAC"));
        assert!(!config.allows_carrier("Loggi"));
    }

    #[test]
    fn test_token_is_masked_and_redacted() {
        let config = MelhorEnvioConfig {
            token: Some("secret-token-1234".into()),
            ..Default::default()
        };
        assert_eq!(config.masked().token.as_deref(), Some("*************1234"));
        assert!(!format!("{config:?}").contains("secret"));
        assert_eq!(mask_token("abc"), "***");
    }
}
