//! Ateliê Core - Shared domain types.
//!
//! This crate provides the types used across all Ateliê components:
//! - `storefront` - Client library for the shop's REST backend
//! - `admin` - Shipping configuration server
//! - `cli` - Command-line tools for inspecting shipping rules
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`shipping`] - Free-shipping predicate grammar, rule codec, carrier catalog,
//!   and the Melhor Envio configuration editor

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod shipping;
pub mod types;

pub use types::*;
