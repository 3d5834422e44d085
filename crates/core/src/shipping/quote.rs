//! Applying a provider configuration to carrier quotes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::config::MelhorEnvioConfig;
use super::predicate::{FreeShippingPredicate, RouteContext};

/// A raw quote returned by the carrier API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierQuote {
    /// Carrier service name, matched against `allowedCarriers`.
    pub name: String,
    /// Quoted price. Quotes without a price are unavailable.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, rename = "delivery_time")]
    pub delivery_days: Option<u32>,
    /// Error message when the carrier cannot serve the route.
    #[serde(default)]
    pub error: Option<String>,
}

/// A shipping option offered to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOffer {
    pub name: String,
    /// Price charged; zero when free shipping applies.
    pub price: Decimal,
    /// Price before free shipping.
    pub original_price: Decimal,
    #[serde(rename = "delivery_time")]
    pub delivery_days: Option<u32>,
    pub free_shipping: bool,
}

/// Whether any configured rule grants free shipping on `route`.
#[must_use]
pub fn is_free_shipping(config: &MelhorEnvioConfig, route: &RouteContext) -> bool {
    config.rules.as_ref().is_some_and(|rules| {
        rules
            .iter()
            .any(|(_, expression)| FreeShippingPredicate::parse_lenient(expression).evaluate(route))
    })
}

/// Turn carrier quotes into customer offers.
///
/// Quotes with an error or without a price are dropped, as are carriers
/// outside the allow-list. Every remaining offer is free when any rule
/// matches the route.
#[must_use]
pub fn apply_free_shipping(
    quotes: Vec<CarrierQuote>,
    config: &MelhorEnvioConfig,
    route: &RouteContext,
) -> Vec<ShippingOffer> {
    let free = is_free_shipping(config, route);

    quotes
        .into_iter()
        .filter(|quote| quote.error.is_none() && config.allows_carrier(&quote.name))
        .filter_map(|quote| {
            let original_price = quote.price?;
            Some(ShippingOffer {
                name: quote.name,
                price: if free { Decimal::ZERO } else { original_price },
                original_price,
                delivery_days: quote.delivery_days,
                free_shipping: free,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quote(name: &str, price: i64) -> CarrierQuote {
        CarrierQuote {
            name: name.to_string(),
            price: Some(Decimal::new(price, 2)),
            delivery_days: Some(5),
            error: None,
        }
    }

    fn config(rules: &[(&str, &str)], carriers: &[&str]) -> MelhorEnvioConfig {
        MelhorEnvioConfig {
            allowed_carriers: Some(carriers.iter().map(ToString::to_string).collect()),
            rules: Some(rules.iter().copied().collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_rule_zeroes_price() {
        let config = config(&[("SP", "region == 'SP' and total >= 200")], &[]);
        let route = RouteContext::new(Some("SP"), Decimal::new(250, 0));
        let offers = apply_free_shipping(vec![quote("PAC", 2590)], &config, &route);
        assert_eq!(offers.len(), 1);
        assert!(offers[0].free_shipping);
        assert_eq!(offers[0].price, Decimal::ZERO);
        assert_eq!(offers[0].original_price, Decimal::new(2590, 2));
    }

    #[test]
    fn test_no_match_keeps_price() {
        let config = config(&[("SP", "region == 'SP' and total >= 200")], &[]);
        let route = RouteContext::new(Some("RJ"), Decimal::new(250, 0));
        let offers = apply_free_shipping(vec![quote("PAC", 2590)], &config, &route);
        assert!(!offers[0].free_shipping);
        assert_eq!(offers[0].price, Decimal::new(2590, 2));
    }

    #[test]
    fn test_allow_list_and_unavailable_quotes() {
        let config = config(&[], &["SEDEX"]);
        let route = RouteContext::new(None, Decimal::ZERO);
        let mut broken = quote("SEDEX", 100);
        broken.error = Some("Serviço indisponível".into());
        let mut unpriced = quote("SEDEX", 0);
        unpriced.price = None;

        let offers = apply_free_shipping(
            vec![quote("PAC", 100), quote("SEDEX", 3000), broken, unpriced],
            &config,
            &route,
        );
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].name, "SEDEX");
    }

    #[test]
    fn test_unparseable_rule_is_unconditional() {
        let config = config(&[("?", "some unrelated text")], &[]);
        let route = RouteContext::new(Some("AM"), Decimal::ONE);
        assert!(is_free_shipping(&config, &route));
    }

    #[test]
    fn test_quote_wire_names() {
        let quote: CarrierQuote =
            serde_json::from_str(r#"{"name":"Loggi","price":"12.50","delivery_time":3}"#).unwrap();
        assert_eq!(quote.delivery_days, Some(3));
        assert_eq!(quote.price, Some(Decimal::new(1250, 2)));
    }
}
