//! Wishlist add/remove and moving an item into the cart.

use crate::error::AppError;
use crate::format::format_price;
use crate::service::cart::CartService;
use crate::store::Tables;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct WishlistItem {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub in_stock: bool,
    pub active: bool,
    pub added_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub price_display: String,
}

pub struct WishlistService;

impl WishlistService {
    pub async fn list(pool: &PgPool, t: &Tables, user_id: Uuid) -> Result<Vec<WishlistItem>, AppError> {
        let sql = format!(
            "SELECT p.id AS product_id, p.sku, p.name, p.image_url, p.price_cents, p.stock > 0 AS in_stock, \
             p.active, w.added_at FROM {} w JOIN {} p ON p.id = w.product_id \
             WHERE w.user_id = $1 ORDER BY w.added_at DESC, p.id",
            t.wishlist_items, t.products
        );
        tracing::debug!(sql = %sql, "query");
        let mut items = sqlx::query_as::<_, WishlistItem>(&sql).bind(user_id).fetch_all(pool).await?;
        for item in &mut items {
            item.price_display = format_price(item.price_cents);
        }
        Ok(items)
    }

    /// Idempotent: adding a product that is already wished for is a no-op.
    pub async fn add(pool: &PgPool, t: &Tables, user_id: Uuid, product_id: Uuid) -> Result<Vec<WishlistItem>, AppError> {
        let active: Option<(bool,)> = sqlx::query_as(&format!("SELECT active FROM {} WHERE id = $1", t.products))
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
        match active {
            None => return Err(AppError::NotFound(format!("product {}", product_id))),
            Some((false,)) => return Err(AppError::Validation("product is not available".into())),
            Some((true,)) => {}
        }
        let sql = format!(
            "INSERT INTO {} (user_id, product_id) VALUES ($1, $2) ON CONFLICT (user_id, product_id) DO NOTHING",
            t.wishlist_items
        );
        tracing::debug!(sql = %sql, "query");
        sqlx::query(&sql)
            .bind(user_id)
            .bind(product_id)
            .execute(pool)
            .await
            .map_err(|e| AppError::from_write(e, None))?;
        Self::list(pool, t, user_id).await
    }

    pub async fn remove(pool: &PgPool, t: &Tables, user_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {} WHERE user_id = $1 AND product_id = $2", t.wishlist_items);
        tracing::debug!(sql = %sql, "query");
        let res = sqlx::query(&sql).bind(user_id).bind(product_id).execute(pool).await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("wishlist item {}", product_id)));
        }
        Ok(())
    }

    /// Remove from the wishlist and add one unit to the cart, both or neither.
    pub async fn move_to_cart(pool: &PgPool, t: &Tables, user_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        let res = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND product_id = $2",
            t.wishlist_items
        ))
        .bind(user_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("wishlist item {}", product_id)));
        }
        CartService::add_in(&mut tx, t, user_id, product_id, 1).await?;
        tx.commit().await?;
        Ok(())
    }
}
