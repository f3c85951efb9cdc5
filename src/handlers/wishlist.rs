//! Wishlist endpoints for the signed-in customer.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::response::{success_many, success_one_ok};
use crate::service::{CartService, WishlistService};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WishItem {
    pub product_id: Uuid,
}

pub async fn get_wishlist(CurrentUser(user): CurrentUser, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let items = WishlistService::list(&state.pool, &state.tables, user.id).await?;
    Ok(success_many(items))
}

pub async fn add_item(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<WishItem>,
) -> Result<impl IntoResponse, AppError> {
    let items = WishlistService::add(&state.pool, &state.tables, user.id, body.product_id).await?;
    Ok(success_many(items))
}

pub async fn remove_item(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    WishlistService::remove(&state.pool, &state.tables, user.id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the cart after the move.
pub async fn move_to_cart(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    WishlistService::move_to_cart(&state.pool, &state.tables, user.id, product_id).await?;
    tracing::info!(user_id = %user.id, %product_id, "wishlist item moved to cart");
    let cart = CartService::view(&state.pool, &state.tables, user.id).await?;
    Ok(success_one_ok(cart))
}
