//! Brazilian federative units and the region filter used by free-shipping rules.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The 27 Brazilian federative units (UF), in the order shown to admins.
pub const UF_CODES: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB", "PR",
    "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

/// Sentinel meaning "no region restriction".
pub const ALL_REGIONS: &str = "ALL";

/// Legacy spelling of [`ALL_REGIONS`] written by older admin dashboards.
pub const ALL_REGIONS_LEGACY: &str = "TODOS";

/// Returns true if `code` is one of [`UF_CODES`].
#[must_use]
pub fn is_known_uf(code: &str) -> bool {
    UF_CODES.contains(&code)
}

/// Region constraint of a free-shipping rule.
///
/// Serialized as the region code, or `"ALL"` for [`StateFilter::All`].
/// Both `"ALL"` and `"TODOS"` (and an empty string) deserialize to `All`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum StateFilter {
    /// Applies to every destination.
    #[default]
    All,
    /// Applies only to destinations in this region.
    Only(String),
}

impl StateFilter {
    /// Build a filter from a form value or a decoded region code.
    ///
    /// Codes are upper-cased, so a stored `'sp'` edits as `SP`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() || code == ALL_REGIONS || code == ALL_REGIONS_LEGACY {
            Self::All
        } else {
            Self::Only(code)
        }
    }

    /// The region code, if restricted.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Only(code) => Some(code),
        }
    }

    /// Whether this filter places no restriction.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for StateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or(ALL_REGIONS))
    }
}

impl Serialize for StateFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code().unwrap_or(ALL_REGIONS))
    }
}

impl<'de> Deserialize<'de> for StateFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_code(&raw))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_map_to_all() {
        assert_eq!(StateFilter::from_code("ALL"), StateFilter::All);
        assert_eq!(StateFilter::from_code("TODOS"), StateFilter::All);
        assert_eq!(StateFilter::from_code(""), StateFilter::All);
        assert_eq!(StateFilter::from_code(" SP "), StateFilter::Only("SP".into()));
    }

    #[test]
    fn test_codes_are_upper_cased() {
        assert_eq!(StateFilter::from_code("sp"), StateFilter::Only("SP".into()));
        assert_eq!(StateFilter::from_code("todos"), StateFilter::All);
        let rs: StateFilter = serde_json::from_str("\"rs\"").unwrap();
        assert_eq!(rs.code(), Some("RS"));
    }

    #[test]
    fn test_serde_uses_code_or_all() {
        assert_eq!(serde_json::to_string(&StateFilter::All).unwrap(), "\"ALL\"");
        let rj: StateFilter = serde_json::from_str("\"RJ\"").unwrap();
        assert_eq!(rj.code(), Some("RJ"));
        let legacy: StateFilter = serde_json::from_str("\"TODOS\"").unwrap();
        assert!(legacy.is_all());
    }

    #[test]
    fn test_uf_list() {
        assert_eq!(UF_CODES.len(), 27);
        assert!(is_known_uf("SP"));
        assert!(!is_known_uf("XX"));
    }
}
