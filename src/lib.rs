//! Boutique: storefront and back-office REST backend on PostgreSQL.

pub mod error;
pub mod extractors;
pub mod format;
pub mod handlers;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sku;
pub mod sql;
pub mod state;
pub mod store;

pub use error::{AppError, ConfigError};
pub use response::{success_many, success_one, success_one_ok, success_page};
pub use routes::build_router;
pub use settings::Settings;
pub use sku::{allocate, allocate_and_insert, next_sku, SkuStore};
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_tables, PgSkuStore, Tables};
