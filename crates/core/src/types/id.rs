//! Newtype IDs for type-safe entity references.
//!
//! The backend identifies every entity by UUID. Use the `define_id!` macro to
//! create wrappers that prevent accidentally passing a product ID where a user
//! ID is expected.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`uuid::Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `random()`, `as_uuid()`
/// - `Display` and `FromStr` using the hyphenated UUID form
///
/// # Example
///
/// ```rust
/// # use atelie_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::random();
/// let order_id = OrderId::random();
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random (v4) ID.
            #[must_use]
            pub fn random() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(CategoryId);
define_id!(OrderId);
define_id!(AddressId);
define_id!(CardId);
define_id!(ReviewId);
define_id!(PlanId);
define_id!(SubscriptionId);
define_id!(MediaId);

/// Client-side identifier for a row in an editor list.
///
/// Only used to keep list keys stable while rules are renamed; it is never
/// sent to the backend.
pub type RowKey = ::uuid::Uuid;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trips_through_string() {
        let id = ProductId::random();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_serializes_transparently() {
        let raw = "8f2c1d1e-4a51-4c1b-9a77-3c1f0a4e5b6d";
        let id: UserId = raw.parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{raw}\""));
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        assert!("not-a-uuid".parse::<OrderId>().is_err());
    }
}
