//! Domain models for the API.
//!
//! - [`item`] - catalog items and their images
//! - [`cart`] - carts, cart lines and the embedded item summary
//! - [`user`] - API users and access tokens

pub mod cart;
pub mod item;
pub mod user;

pub use cart::{Cart, CartLine};
pub use item::{Image, Item, ItemSummary};
pub use user::{AccessToken, User};
