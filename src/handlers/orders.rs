//! Checkout, order history and the signed-in user.

use super::{body_to_map, from_body};
use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{checkout_rules, OrderService, RequestValidator, Shipping};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    success_one_ok(user)
}

pub async fn checkout(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let body = body_to_map(body)?;
    RequestValidator::validate(&body, &checkout_rules())?;
    let shipping: Shipping = from_body(body)?;
    let order = OrderService::checkout(&state.pool, &state.tables, user.id, &shipping).await?;
    Ok(success_one(order))
}

pub async fn list_orders(CurrentUser(user): CurrentUser, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let orders = OrderService::list_for_user(&state.pool, &state.tables, user.id).await?;
    Ok(success_many(orders))
}

pub async fn get_order(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let order = OrderService::get(&state.pool, &state.tables, id, Some(user.id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {}", id)))?;
    Ok(success_one_ok(order))
}
