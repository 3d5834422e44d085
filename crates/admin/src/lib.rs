//! Ateliê admin library.
//!
//! Serves the Melhor Envio shipping settings API used by the admin
//! dashboard. Settings live in the shop backend and are read and written
//! through a [`backend::ProviderConfigStore`].
//!
//! # Security
//!
//! This crate holds the backend admin token. Bind it to a private interface.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
