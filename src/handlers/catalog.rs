//! Public catalog: active products and categories.

use crate::error::AppError;
use crate::response::{success_many, success_one_ok, success_page};
use crate::service::ProductService;
use crate::sql::ProductFilter;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

pub async fn list_products(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<impl IntoResponse, AppError> {
    filter.active = Some(true);
    let rows = ProductService::list(&state.pool, &state.tables, &filter).await?;
    Ok(success_page(rows, filter.page()))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, AppError> {
    let product = ProductService::get_active(&state.pool, &state.tables, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", id)))?;
    Ok(success_one_ok(product))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let rows = ProductService::categories(&state.pool, &state.tables).await?;
    Ok(success_many(rows))
}
