//! Cart endpoints for the signed-in customer.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::response::success_one_ok;
use crate::service::CartService;
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
pub struct AddItem {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i32,
}

pub async fn get_cart(CurrentUser(user): CurrentUser, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let cart = CartService::view(&state.pool, &state.tables, user.id).await?;
    Ok(success_one_ok(cart))
}

pub async fn add_item(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<AddItem>,
) -> Result<impl IntoResponse, AppError> {
    let cart = CartService::add(&state.pool, &state.tables, user.id, body.product_id, body.quantity).await?;
    Ok(success_one_ok(cart))
}

pub async fn set_quantity(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(body): Json<SetQuantity>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity < 0 {
        return Err(AppError::Validation("quantity cannot be negative".into()));
    }
    let cart = CartService::set_quantity(&state.pool, &state.tables, user.id, product_id, body.quantity).await?;
    Ok(success_one_ok(cart))
}

pub async fn remove_item(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let cart = CartService::remove(&state.pool, &state.tables, user.id, product_id).await?;
    Ok(success_one_ok(cart))
}

pub async fn clear_cart(CurrentUser(user): CurrentUser, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    CartService::clear(&state.pool, &state.tables, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
