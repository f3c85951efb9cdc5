//! Services: SQL against the boutique tables, one struct per area.

mod analytics;
mod auth;
pub mod cart;
mod customers;
mod orders;
mod products;
mod validation;
mod wishlist;

pub use analytics::{AnalyticsService, Dashboard};
pub use auth::AuthService;
pub use cart::{Cart, CartService};
pub use customers::{CustomerService, CustomerSummary};
pub use orders::{OrderQuery, OrderService, Shipping};
pub use products::{CategoryCount, NewProduct, ProductPatch, ProductService};
pub use validation::{checkout_rules, new_product_rules, product_patch_rules, RequestValidator};
pub use wishlist::{WishlistItem, WishlistService};
