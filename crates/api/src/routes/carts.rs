//! Cart and payment handlers.
//!
//! Any authenticated user may read carts. Deleting or paying for a cart is
//! limited to its owner and admins.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;

use cartwheel_core::{CartId, ItemId, Price, UserId};

use super::assets::cart_with_urls;
use crate::db::store::{NewCart, NewCartLine};
use crate::db::{CartRepository, SettlementTransactor};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Cart, User};
use crate::state::AppState;

/// One requested cart line.
#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub item_id: ItemId,
    pub quantity: i32,
}

/// Cart creation request body.
#[derive(Debug, Deserialize)]
pub struct CreateCartRequest {
    pub items: Vec<LineRequest>,
    /// Total in minor currency units, stored as given.
    pub total_price: Option<i64>,
    pub payment_method: String,
}

/// Payment request body.
#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub payment_token: String,
}

fn with_urls(state: &AppState, carts: Vec<Cart>) -> Vec<Cart> {
    carts
        .into_iter()
        .map(|cart| cart_with_urls(cart, state.config()))
        .collect()
}

/// Load a cart the caller may modify.
async fn owned_cart(state: &AppState, user: &User, id: CartId) -> Result<Cart> {
    let cart = CartRepository::new(state.store()).get_by_id(id).await?;
    if cart.user_id != user.id && !user.role.is_admin() {
        return Err(AppError::Forbidden("cart belongs to another user".to_string()));
    }
    Ok(cart)
}

/// GET /api/carts
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> Result<Json<Vec<Cart>>> {
    let carts = CartRepository::new(state.store()).list_all().await?;
    Ok(Json(with_urls(&state, carts)))
}

/// GET /api/users/{id}/carts
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list_for_user(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Cart>>> {
    let carts = CartRepository::new(state.store())
        .list_by_user(user_id)
        .await?;
    Ok(Json(with_urls(&state, carts)))
}

/// GET /api/carts/{id}
///
/// # Errors
///
/// Returns 404 if the cart does not exist.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<CartId>,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.store()).get_by_id(id).await?;
    Ok(Json(cart_with_urls(cart, state.config())))
}

/// POST /api/carts
///
/// Creates a pending cart owned by the caller.
///
/// # Errors
///
/// Returns 400 for non-positive quantities or an empty payment method, 409 if
/// an item does not exist.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreateCartRequest>,
) -> Result<(StatusCode, Json<Cart>)> {
    if request.items.iter().any(|line| line.quantity < 1) {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }
    if request.payment_method.trim().is_empty() {
        return Err(AppError::BadRequest("payment_method is required".to_string()));
    }

    let ids = state.ids();
    let cart = CartRepository::new(state.store())
        .create(NewCart {
            id: ids.next_id(),
            user_id: user.id,
            created_at: Utc::now(),
            total_price: request.total_price.map(Price::from_minor),
            payment_method: request.payment_method,
            lines: request
                .items
                .iter()
                .map(|line| NewCartLine {
                    id: ids.next_id(),
                    item_id: line.item_id,
                    quantity: line.quantity,
                })
                .collect(),
        })
        .await?;

    tracing::info!(cart_id = %cart.id, lines = cart.lines.len(), "cart created");
    Ok((StatusCode::CREATED, Json(cart_with_urls(cart, state.config()))))
}

/// DELETE /api/carts/{id}
///
/// # Errors
///
/// Returns 403 if the cart belongs to another user, 404 if it does not exist.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CartId>,
) -> Result<StatusCode> {
    owned_cart(&state, &user, id).await?;
    CartRepository::new(state.store()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/carts/{id}/pay
///
/// Settles the cart and returns it as paid.
///
/// # Errors
///
/// Returns 400 without a payment token, 403 if the cart belongs to another
/// user, 404 if it does not exist, 409 if it is already paid or stock is
/// insufficient.
pub async fn pay(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CartId>,
    Json(request): Json<PayRequest>,
) -> Result<Json<Cart>> {
    if request.payment_token.trim().is_empty() {
        return Err(AppError::BadRequest("payment_token is required".to_string()));
    }

    owned_cart(&state, &user, id).await?;
    SettlementTransactor::new(state.store()).settle(id).await?;

    let cart = CartRepository::new(state.store()).get_by_id(id).await?;
    Ok(Json(cart_with_urls(cart, state.config())))
}
