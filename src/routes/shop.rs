//! Storefront routes under /api/v1.

use crate::handlers::{cart, catalog, orders, wishlist};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(orders::me))
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/:product_id",
            patch(cart::set_quantity).delete(cart::remove_item),
        )
        .route("/wishlist", get(wishlist::get_wishlist))
        .route("/wishlist/items", post(wishlist::add_item))
        .route("/wishlist/items/:product_id", axum::routing::delete(wishlist::remove_item))
        .route("/wishlist/items/:product_id/move-to-cart", post(wishlist::move_to_cart))
        .route("/checkout", post(orders::checkout))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
}
