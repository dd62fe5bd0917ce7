//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness
//! GET    /health/ready           - Store reachability
//!
//! # Auth
//! POST   /api/register           - Create a user
//! POST   /api/login              - Issue a bearer token
//!
//! # Catalog (bearer token; writes need admin)
//! GET    /api/items              - List items
//! POST   /api/items              - Create item
//! GET    /api/items/{id}         - Get item
//! PUT    /api/items/{id}         - Update item
//! DELETE /api/items/{id}         - Delete item
//!
//! # Carts (bearer token)
//! GET    /api/carts              - List carts
//! POST   /api/carts              - Create cart for the caller
//! GET    /api/carts/{id}         - Get cart
//! DELETE /api/carts/{id}         - Delete cart
//! POST   /api/carts/{id}/pay     - Settle cart
//! GET    /api/users/{id}/carts   - Carts of one user
//! ```

pub mod assets;
pub mod auth;
pub mod carts;
pub mod health;
pub mod items;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(items::list).post(items::create))
        .route(
            "/{id}",
            get(items::show).put(items::update).delete(items::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(carts::list).post(carts::create))
        .route("/{id}", get(carts::show).delete(carts::delete))
        .route("/{id}/pay", post(carts::pay))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .nest("/api/items", item_routes())
        .nest("/api/carts", cart_routes())
        .route("/api/users/{id}/carts", get(carts::list_for_user))
}
