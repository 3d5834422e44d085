//! Free-shipping rules and Melhor Envio configuration.
//!
//! Rules are stored as a map from rule name to a predicate expression such as
//! `region == 'SP' and total >= 200`. [`predicate`] owns the grammar,
//! [`rule`] converts between stored expressions and editable rules, and
//! [`editor`] drives admin edits of the whole provider configuration.

pub mod carrier;
pub mod config;
pub mod editor;
pub mod predicate;
pub mod quote;
pub mod region;
pub mod rule;

pub use carrier::{CARRIER_CATALOG, Carrier, find_carrier, is_known_carrier};
pub use config::{MelhorEnvioConfig, mask_token};
pub use editor::{
    ConfigListener, EditorCommand, EditorDraft, EditorError, RuleField, ShippingConfigEditor,
};
pub use predicate::{FreeShippingPredicate, PredicateError, RouteContext};
pub use quote::{CarrierQuote, ShippingOffer, apply_free_shipping, is_free_shipping};
pub use region::{ALL_REGIONS, ALL_REGIONS_LEGACY, StateFilter, UF_CODES, is_known_uf};
pub use rule::{FreeShippingRule, RuleMap, decode_rules, encode_rules, parse_amount};
