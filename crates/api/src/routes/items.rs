//! Catalog handlers.
//!
//! Reads need any authenticated user; writes need an admin.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;

use cartwheel_core::{ItemId, Price};

use super::assets::item_with_urls;
use crate::db::ItemRepository;
use crate::db::store::{ItemUpdate, NewImage, NewItem};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::Item;
use crate::state::AppState;

/// Item creation request body.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub item_name: String,
    #[serde(default)]
    pub desc: String,
    /// Unit price in minor currency units.
    pub price: i64,
    pub stock: i32,
    /// Already-stored image paths.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Item update request body. Images are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub item_name: String,
    #[serde(default)]
    pub desc: String,
    pub price: i64,
    pub stock: i32,
}

fn validate(name: &str, price: i64, stock: i32) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("item_name must not be empty".to_string()));
    }
    if price < 0 {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }
    if stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".to_string()));
    }
    Ok(())
}

/// GET /api/items
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> Result<Json<Vec<Item>>> {
    let items = ItemRepository::new(state.store()).list().await?;
    Ok(Json(
        items
            .into_iter()
            .map(|item| item_with_urls(item, state.config()))
            .collect(),
    ))
}

/// GET /api/items/{id}
///
/// # Errors
///
/// Returns 404 if the item does not exist.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<ItemId>,
) -> Result<Json<Item>> {
    let item = ItemRepository::new(state.store()).get_by_id(id).await?;
    Ok(Json(item_with_urls(item, state.config())))
}

/// POST /api/items
///
/// # Errors
///
/// Returns 400 for invalid fields, 403 for non-admins.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>)> {
    validate(&request.item_name, request.price, request.stock)?;
    if request.images.iter().any(|path| path.trim().is_empty()) {
        return Err(AppError::BadRequest("image paths must not be empty".to_string()));
    }

    let ids = state.ids();
    let item = ItemRepository::new(state.store())
        .create(NewItem {
            id: ids.next_id(),
            name: request.item_name,
            description: request.desc,
            price: Price::from_minor(request.price),
            stock: request.stock,
            created_by: admin.id,
            created_at: Utc::now(),
            images: request
                .images
                .into_iter()
                .map(|url| NewImage { id: ids.next_id(), url })
                .collect(),
        })
        .await?;

    tracing::info!(item_id = %item.id, "item created");
    Ok((StatusCode::CREATED, Json(item_with_urls(item, state.config()))))
}

/// PUT /api/items/{id}
///
/// # Errors
///
/// Returns 400 for invalid fields, 403 for non-admins, 404 if the item does
/// not exist.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ItemId>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<Item>> {
    validate(&request.item_name, request.price, request.stock)?;

    let item = ItemRepository::new(state.store())
        .update(
            id,
            ItemUpdate {
                name: request.item_name,
                description: request.desc,
                price: Price::from_minor(request.price),
                stock: request.stock,
                modified_by: admin.id,
                modified_at: Utc::now(),
            },
        )
        .await?;

    Ok(Json(item_with_urls(item, state.config())))
}

/// DELETE /api/items/{id}
///
/// # Errors
///
/// Returns 403 for non-admins, 404 if the item does not exist, 409 if a cart
/// still references it.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ItemId>,
) -> Result<StatusCode> {
    ItemRepository::new(state.store()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
