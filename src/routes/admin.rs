//! Back-office routes under /api/v1/admin. All of them require an admin session.

use crate::extractors::require_admin;
use crate::handlers::admin;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/products", get(admin::list_products).post(admin::create_product))
        .route(
            "/products/:id",
            get(admin::get_product)
                .patch(admin::update_product)
                .delete(admin::archive_product),
        )
        .route("/products/:id/stock", post(admin::adjust_stock))
        .route("/inventory/low-stock", get(admin::low_stock))
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id", get(admin::get_order).patch(admin::update_order_status))
        .route("/customers", get(admin::list_customers))
        .route("/dashboard", get(admin::dashboard))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}
