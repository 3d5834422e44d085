//! Free-shipping rules as edited by admins, and their stored form.
//!
//! Admins edit a list of [`FreeShippingRule`]s. The backend stores a
//! [`RuleMap`] from rule name to predicate expression. [`decode_rules`] and
//! [`encode_rules`] convert between the two; decoding never fails.

use core::fmt;

use rust_decimal::Decimal;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::predicate::{FreeShippingPredicate, parse_literal};
use super::region::StateFilter;
use crate::types::RowKey;

/// A free-shipping rule in editable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeShippingRule {
    /// Row key for list stability. Regenerated on every decode.
    #[serde(default = "Uuid::new_v4")]
    pub id: RowKey,
    /// Display label, also the key in the stored map.
    pub name: String,
    /// Region restriction.
    #[serde(default)]
    pub state: StateFilter,
    /// Minimum subtotal as typed; empty means no threshold.
    #[serde(default)]
    pub min_amount: String,
}

impl FreeShippingRule {
    /// Create a rule with a fresh row key.
    #[must_use]
    pub fn new(name: impl Into<String>, state: StateFilter, min_amount: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state,
            min_amount: min_amount.into(),
        }
    }

    /// Create a rule that grants free shipping everywhere.
    #[must_use]
    pub fn unconditional(name: impl Into<String>) -> Self {
        Self::new(name, StateFilter::All, String::new())
    }

    /// Decode one stored expression. Unrecognizable text gives the
    /// unconditional rule. The threshold keeps its stored scale, so
    /// `total >= 99.90` reads back as `99.90`.
    #[must_use]
    pub fn from_expression(name: impl Into<String>, expression: &str) -> Self {
        let predicate = FreeShippingPredicate::parse_lenient(expression);
        Self::new(
            name,
            predicate
                .region
                .as_deref()
                .map_or(StateFilter::All, StateFilter::from_code),
            predicate
                .min_total
                .map(|min| min.to_string())
                .unwrap_or_default(),
        )
    }

    /// The predicate this rule stands for.
    ///
    /// `min_amount` is read like a browser number field: the leading numeric
    /// part counts, anything unparseable or not strictly positive means no
    /// threshold.
    #[must_use]
    pub fn predicate(&self) -> FreeShippingPredicate {
        FreeShippingPredicate::new(
            self.state.code().map(str::to_string),
            parse_amount(&self.min_amount),
        )
    }

    /// Encode to the stored expression.
    #[must_use]
    pub fn encode(&self) -> String {
        self.predicate().to_string()
    }
}

/// Parse the leading decimal number of `text`.
///
/// Accepts an optional sign, digits and one decimal point, ignoring trailing
/// garbage (`"12abc"` is 12). Returns `None` when no number is present.
/// Numbers past the `Decimal` range saturate.
#[must_use]
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let mut seen_point = false;
    let end = unsigned
        .find(|ch: char| match ch {
            '0'..='9' => false,
            '.' if !seen_point => {
                seen_point = true;
                false
            }
            _ => true,
        })
        .unwrap_or(unsigned.len());

    let value = parse_literal(unsigned.get(..end)?)?;
    Some(if negative { -value } else { value })
}

/// Decode a stored rule map into editable rules, preserving map order.
#[must_use]
pub fn decode_rules(map: &RuleMap) -> Vec<FreeShippingRule> {
    map.iter()
        .map(|(name, expression)| FreeShippingRule::from_expression(name, expression))
        .collect()
}

/// Encode editable rules into the stored map.
///
/// Rules sharing a name collapse into one entry at the first rule's position
/// holding the last rule's expression.
#[must_use]
pub fn encode_rules(rules: &[FreeShippingRule]) -> RuleMap {
    rules
        .iter()
        .map(|rule| (rule.name.clone(), rule.encode()))
        .collect()
}

// =============================================================================
// RuleMap
// =============================================================================

/// Insertion-ordered map from rule name to predicate expression.
///
/// Serializes as a JSON object. Inserting an existing name replaces its
/// expression without moving it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleMap {
    entries: Vec<(String, String)>,
}

impl RuleMap {
    /// Create an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace an expression. Returns the previous expression.
    pub fn insert(&mut self, name: impl Into<String>, expression: impl Into<String>) -> Option<String> {
        let name = name.into();
        let expression = expression.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(existing, expression));
        }
        self.entries.push((name, expression));
        None
    }

    /// Look up an expression by rule name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, expression)| expression.as_str())
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, expression)| (name.as_str(), expression.as_str()))
    }

    /// Number of rules.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no rules.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, E: Into<String>> FromIterator<(N, E)> for RuleMap {
    fn from_iter<I: IntoIterator<Item = (N, E)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, expression) in iter {
            map.insert(name, expression);
        }
        map
    }
}

impl Serialize for RuleMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, expression) in &self.entries {
            map.serialize_entry(name, expression)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuleMapVisitor;

        impl<'de> Visitor<'de> for RuleMapVisitor {
            type Value = RuleMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of rule names to expressions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = RuleMap::new();
                while let Some((name, expression)) = access.next_entry::<String, String>()? {
                    map.insert(name, expression);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(RuleMapVisitor)
    }
}
