//! Back-office handlers. Every route here sits behind `require_admin`.

use super::{body_to_map, from_body};
use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::model::OrderStatus;
use crate::response::{success_many, success_one, success_one_ok, success_page};
use crate::service::{
    new_product_rules, product_patch_rules, AnalyticsService, CustomerService, NewProduct, OrderQuery, OrderService,
    ProductPatch, ProductService, RequestValidator,
};
use crate::sql::ProductFilter;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub days: Option<u32>,
}

fn product_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("product {}", id))
}

/// Reject patches that try to touch the SKU. SKUs are fixed once allocated.
fn reject_sku_change(body: &serde_json::Map<String, Value>) -> Result<(), AppError> {
    if body.contains_key("sku") {
        return Err(AppError::Validation("sku cannot be changed".into()));
    }
    Ok(())
}

/// All products, archived included unless `active` is given.
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<impl IntoResponse, AppError> {
    let rows = ProductService::list(&state.pool, &state.tables, &filter).await?;
    Ok(success_page(rows, filter.page()))
}

pub async fn create_product(
    CurrentUser(admin): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let body = body_to_map(body)?;
    RequestValidator::validate(&body, &new_product_rules())?;
    let input: NewProduct = from_body(body)?;
    let product = ProductService::create(
        &state.pool,
        &state.tables,
        &state.sku_store(),
        state.settings.sku_max_attempts,
        &input,
    )
    .await?;
    tracing::info!(admin_id = %admin.id, sku = %product.sku, "admin created product");
    Ok(success_one(product))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, AppError> {
    let product = ProductService::get(&state.pool, &state.tables, id)
        .await?
        .ok_or_else(|| product_not_found(id))?;
    Ok(success_one_ok(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let body = body_to_map(body)?;
    reject_sku_change(&body)?;
    RequestValidator::validate(&body, &product_patch_rules())?;
    let patch: ProductPatch = from_body(body)?;
    let product = ProductService::update(&state.pool, &state.tables, id, &patch)
        .await?
        .ok_or_else(|| product_not_found(id))?;
    Ok(success_one_ok(product))
}

/// Archives the product; order history keeps pointing at it.
pub async fn archive_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, AppError> {
    let product = ProductService::archive(&state.pool, &state.tables, id)
        .await?
        .ok_or_else(|| product_not_found(id))?;
    tracing::info!(product_id = %id, sku = %product.sku, "product archived");
    Ok(success_one_ok(product))
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StockAdjustment>,
) -> Result<impl IntoResponse, AppError> {
    let product = ProductService::adjust_stock(&state.pool, &state.tables, id, body.delta).await?;
    Ok(success_one_ok(product))
}

pub async fn low_stock(
    State(state): State<AppState>,
    Query(q): Query<LowStockQuery>,
) -> Result<impl IntoResponse, AppError> {
    let threshold = q.threshold.unwrap_or(state.settings.low_stock_threshold);
    if threshold < 0 {
        return Err(AppError::Validation("threshold cannot be negative".into()));
    }
    let rows = ProductService::low_stock(&state.pool, &state.tables, threshold).await?;
    Ok(success_many(rows))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(q): Query<OrderQuery>,
) -> Result<impl IntoResponse, AppError> {
    let orders = OrderService::list(&state.pool, &state.tables, &q).await?;
    Ok(success_many(orders))
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, AppError> {
    let order = OrderService::get(&state.pool, &state.tables, id, None)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {}", id)))?;
    Ok(success_one_ok(order))
}

pub async fn update_order_status(
    CurrentUser(admin): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let next: OrderStatus = body.status.parse()?;
    let order = OrderService::update_status(&state.pool, &state.tables, id, next).await?;
    tracing::info!(admin_id = %admin.id, order_id = %id, status = next.as_str(), "order status changed");
    Ok(success_one_ok(order))
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<impl IntoResponse, AppError> {
    let rows = CustomerService::list(&state.pool, &state.tables, page.limit, page.offset).await?;
    Ok(success_many(rows))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(q): Query<DashboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let dashboard = AnalyticsService::dashboard(&state.pool, &state.tables, q.days).await?;
    Ok(success_one_ok(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sku_in_patch_is_rejected() {
        let body = body_to_map(json!({"name": "Silk scarf", "sku": "SCARF-9"})).unwrap();
        assert!(matches!(reject_sku_change(&body), Err(AppError::Validation(_))));
        let body = body_to_map(json!({"name": "Silk scarf"})).unwrap();
        assert!(reject_sku_change(&body).is_ok());
    }

    #[test]
    fn patch_body_deserializes_partially() {
        let body = body_to_map(json!({"price_cents": 4500, "active": false})).unwrap();
        RequestValidator::validate(&body, &product_patch_rules()).unwrap();
        let patch: ProductPatch = from_body(body).unwrap();
        assert_eq!(patch.price_cents, Some(4500));
        assert_eq!(patch.active, Some(false));
        assert!(patch.name.is_none());
    }

    #[test]
    fn non_object_body_is_a_bad_request() {
        assert!(matches!(body_to_map(json!([1, 2])), Err(AppError::BadRequest(_))));
    }
}
