//! Shared application state for all routes.

use crate::settings::Settings;
use crate::store::{PgSkuStore, Tables};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    pub tables: Arc<Tables>,
}

impl AppState {
    pub fn new(pool: PgPool, settings: Settings) -> Self {
        let tables = Tables::new(&settings.schema);
        AppState {
            pool,
            settings: Arc::new(settings),
            tables: Arc::new(tables),
        }
    }

    pub fn sku_store(&self) -> PgSkuStore<'_> {
        PgSkuStore {
            pool: &self.pool,
            tables: &self.tables,
        }
    }
}
