//! Free-shipping rule commands.
//!
//! Input files hold either a full Melhor Envio provider config
//! (`{"token": ..., "rules": {...}}`) or a bare rule map
//! (`{"Frete Grátis SP": "region == 'SP' and total >= 200"}`).

use std::io::Write;
use std::path::Path;

use atelie_core::shipping::{
    FreeShippingPredicate, FreeShippingRule, MelhorEnvioConfig, RouteContext, RuleMap,
    StateFilter,
};
use rust_decimal::Decimal;
use serde_json::Value;

use super::CommandError;

const CONFIG_KEYS: [&str; 4] = ["token", "zipCode", "allowedCarriers", "rules"];

/// Print the decoded rules of `path`, one per line, or as JSON.
pub fn decode(path: &Path, json: bool, out: &mut impl Write) -> Result<(), CommandError> {
    let config = load_config(path)?;
    warn_unparsed(&config);
    let rules = config.decoded_rules();

    if json {
        let text = serde_json::to_string_pretty(&rules).map_err(|source| CommandError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writeln!(out, "{text}")?;
        return Ok(());
    }

    for rule in &rules {
        let min_amount = if rule.min_amount.is_empty() {
            "-"
        } else {
            rule.min_amount.as_str()
        };
        writeln!(out, "{}\t{}\t{min_amount}", rule.name, rule.state)?;
    }
    Ok(())
}

/// Print the stored expression for one rule.
pub fn encode(state: &str, min_amount: &str, out: &mut impl Write) -> Result<(), CommandError> {
    let rule = FreeShippingRule::new("", StateFilter::from_code(state), min_amount);
    writeln!(out, "{}", rule.encode())?;
    Ok(())
}

/// Print whether any rule in `path` grants free shipping, then each
/// matching rule name.
pub fn evaluate(
    path: &Path,
    region: Option<&str>,
    total: Decimal,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let config = load_config(path)?;
    warn_unparsed(&config);
    let route = RouteContext::new(region, total);

    let matching: Vec<FreeShippingRule> = config
        .decoded_rules()
        .into_iter()
        .filter(|rule| rule.predicate().evaluate(&route))
        .collect();

    let verdict = if matching.is_empty() { "no" } else { "yes" };
    writeln!(out, "free shipping: {verdict}")?;
    for rule in &matching {
        writeln!(out, "{}", rule.name)?;
    }
    Ok(())
}

/// Read a provider config, or a bare rule map wrapped into one.
fn load_config(path: &Path) -> Result<MelhorEnvioConfig, CommandError> {
    let text = std::fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let json_error = |source| CommandError::Json {
        path: path.to_path_buf(),
        source,
    };
    // `Value` objects are sorted, so only sniff the shape from it and read
    // rules straight from the text to keep their order.
    let value: Value = serde_json::from_str(&text).map_err(json_error)?;
    let is_config = value
        .as_object()
        .is_some_and(|object| CONFIG_KEYS.iter().any(|key| object.contains_key(*key)));
    if is_config {
        return serde_json::from_str(&text).map_err(json_error);
    }

    let rules: RuleMap = serde_json::from_str(&text).map_err(json_error)?;
    Ok(MelhorEnvioConfig {
        rules: Some(rules),
        ..Default::default()
    })
}

/// Decoding never fails; flag expressions that were read leniently.
fn warn_unparsed(config: &MelhorEnvioConfig) {
    let Some(rules) = &config.rules else {
        return;
    };
    for (name, expression) in rules.iter() {
        if let Err(e) = FreeShippingPredicate::parse(expression) {
            tracing::warn!(rule = name, expression, error = %e, "rule read leniently");
        }
    }
}
