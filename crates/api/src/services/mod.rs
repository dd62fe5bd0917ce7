//! Business logic services.
//!
//! - `auth` - registration, password login and bearer tokens
//! - `ids` - snowflake id generation

pub mod auth;
pub mod ids;
