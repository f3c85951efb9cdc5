//! Route tables and the assembled application router.

mod admin;
mod common;
mod shop;

pub use admin::admin_routes;
pub use common::common_routes;
pub use shop::shop_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Full application: common routes at the root, the shop under /api/v1, the back office under /api/v1/admin.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.body_limit_bytes;
    Router::new()
        .merge(common_routes())
        .nest("/api/v1/admin", admin_routes(state.clone()))
        .nest("/api/v1", shop_routes())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
