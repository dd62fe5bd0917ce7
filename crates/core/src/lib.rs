//! Cartwheel Core - Shared types library.
//!
//! This crate provides the domain vocabulary used across all Cartwheel components:
//! - `api` - HTTP backend for the catalog, carts and checkout
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP.
//! The optional `postgres` feature adds `sqlx` encode/decode support for the
//! newtype IDs.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, usernames and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
