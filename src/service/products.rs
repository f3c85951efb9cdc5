//! Product queries for the shop and product/inventory management for the back office.

use crate::error::AppError;
use crate::model::{Product, PRODUCT_COLUMNS};
use crate::sku::{allocate_and_insert, SkuStore};
use crate::sql::{select_products, ProductFilter, QueryBuf};
use crate::store::Tables;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Input for product creation. `sku` is the base SKU handed to the allocator.
#[derive(Clone, Debug, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i32,
    pub image_url: Option<String>,
}

/// Partial update. There is no `sku` field: SKUs never change after creation.
/// `image_url` is tri-state: absent keeps it, `null` clears it, a string replaces it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
    pub active: Option<bool>,
}

/// Maps a present field (including `null`) to `Some`, so absence stays `None` via `default`.
fn present<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(d).map(Some)
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub product_count: i64,
}

/// Stock level after applying `delta`, or a validation error when it would leave `0..=i32::MAX`.
pub fn stock_after(stock: i32, delta: i32) -> Result<i32, AppError> {
    match stock.checked_add(delta) {
        Some(n) if n >= 0 => Ok(n),
        Some(_) => Err(AppError::Validation(format!(
            "stock cannot go below zero (current {}, delta {})",
            stock, delta
        ))),
        None => Err(AppError::Validation(format!(
            "stock out of range (current {}, delta {})",
            stock, delta
        ))),
    }
}

pub struct ProductService;

impl ProductService {
    pub async fn list(pool: &PgPool, t: &Tables, filter: &ProductFilter) -> Result<Vec<Product>, AppError> {
        let q = select_products(&t.products, filter);
        Self::fetch_all(pool, &q).await
    }

    pub async fn get(pool: &PgPool, t: &Tables, id: Uuid) -> Result<Option<Product>, AppError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", PRODUCT_COLUMNS, t.products);
        tracing::debug!(sql = %sql, "query");
        Ok(sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(pool).await?)
    }

    /// Shop view of one product: archived products are invisible.
    pub async fn get_active(pool: &PgPool, t: &Tables, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(Self::get(pool, t, id).await?.filter(|p| p.active))
    }

    pub async fn categories(pool: &PgPool, t: &Tables) -> Result<Vec<CategoryCount>, AppError> {
        let sql = format!(
            "SELECT category, COUNT(*) AS product_count FROM {} \
             WHERE active AND category <> '' GROUP BY category ORDER BY category",
            t.products
        );
        tracing::debug!(sql = %sql, "query");
        Ok(sqlx::query_as::<_, CategoryCount>(&sql).fetch_all(pool).await?)
    }

    /// Insert a product under a freshly allocated SKU, re-allocating if a concurrent insert wins the race.
    pub async fn create<S: SkuStore + ?Sized>(
        pool: &PgPool,
        t: &Tables,
        skus: &S,
        max_attempts: u32,
        input: &NewProduct,
    ) -> Result<Product, AppError> {
        let sql = format!(
            "INSERT INTO {} (sku, name, description, category, price_cents, stock, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            t.products, PRODUCT_COLUMNS
        );
        let product = allocate_and_insert(skus, &input.sku, max_attempts, |sku| {
            let sql = sql.as_str();
            async move {
                tracing::debug!(sql = %sql, sku = %sku, "query");
                sqlx::query_as::<_, Product>(sql)
                    .bind(&sku)
                    .bind(&input.name)
                    .bind(&input.description)
                    .bind(&input.category)
                    .bind(input.price_cents)
                    .bind(input.stock)
                    .bind(&input.image_url)
                    .fetch_one(pool)
                    .await
                    .map_err(|e| AppError::from_write(e, Some(&sku)))
            }
        })
        .await?;
        tracing::info!(product_id = %product.id, base_sku = %input.sku, sku = %product.sku, "product created");
        Ok(product)
    }

    pub async fn update(pool: &PgPool, t: &Tables, id: Uuid, patch: &ProductPatch) -> Result<Option<Product>, AppError> {
        let sql = format!(
            "UPDATE {} SET name = COALESCE($2, name), description = COALESCE($3, description), \
             category = COALESCE($4, category), price_cents = COALESCE($5, price_cents), \
             image_url = CASE WHEN $8 THEN $6 ELSE image_url END, active = COALESCE($7, active), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            t.products, PRODUCT_COLUMNS
        );
        tracing::debug!(sql = %sql, "query");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.description)
            .bind(&patch.category)
            .bind(patch.price_cents)
            .bind(patch.image_url.clone().flatten())
            .bind(patch.active)
            .bind(patch.image_url.is_some())
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::from_write(e, None))
    }

    /// Archive instead of delete: orders keep referencing the row.
    pub async fn archive(pool: &PgPool, t: &Tables, id: Uuid) -> Result<Option<Product>, AppError> {
        Self::update(
            pool,
            t,
            id,
            &ProductPatch {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Add `delta` (possibly negative) to stock. The result must stay within `0..=i32::MAX`.
    pub async fn adjust_stock(pool: &PgPool, t: &Tables, id: Uuid, delta: i32) -> Result<Product, AppError> {
        let sql = format!(
            "UPDATE {} SET stock = stock + $2, updated_at = NOW() \
             WHERE id = $1 AND stock::BIGINT + $2 BETWEEN 0 AND {} RETURNING {}",
            t.products,
            i32::MAX,
            PRODUCT_COLUMNS
        );
        tracing::debug!(sql = %sql, delta, "query");
        let updated = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(delta)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::from_write(e, None))?;
        match updated {
            Some(p) => {
                tracing::info!(product_id = %id, delta, stock = p.stock, "stock adjusted");
                Ok(p)
            }
            None => match Self::get(pool, t, id).await? {
                None => Err(AppError::NotFound(format!("product {}", id))),
                Some(p) => {
                    stock_after(p.stock, delta)?;
                    Err(AppError::Conflict(format!("stock of product {} changed concurrently", id)))
                }
            },
        }
    }

    pub async fn low_stock(pool: &PgPool, t: &Tables, threshold: i32) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE active AND stock <= $1 ORDER BY stock, name",
            PRODUCT_COLUMNS, t.products
        );
        tracing::debug!(sql = %sql, threshold, "query");
        Ok(sqlx::query_as::<_, Product>(&sql).bind(threshold).fetch_all(pool).await?)
    }

    async fn fetch_all(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Product>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_as::<_, Product>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_all(pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_may_not_go_negative() {
        assert_eq!(stock_after(5, -5).unwrap(), 0);
        assert_eq!(stock_after(5, 10).unwrap(), 15);
        assert!(matches!(stock_after(5, -6), Err(AppError::Validation(_))));
    }

    #[test]
    fn stock_overflow_is_a_validation_error() {
        assert!(matches!(stock_after(5, i32::MAX), Err(AppError::Validation(_))));
        assert_eq!(stock_after(0, i32::MAX).unwrap(), i32::MAX);
    }

    #[test]
    fn image_url_distinguishes_absent_from_null() {
        let keep: ProductPatch = serde_json::from_value(serde_json::json!({"name": "Scarf"})).unwrap();
        assert_eq!(keep.image_url, None);

        let clear: ProductPatch = serde_json::from_value(serde_json::json!({"image_url": null})).unwrap();
        assert_eq!(clear.image_url, Some(None));

        let set: ProductPatch =
            serde_json::from_value(serde_json::json!({"image_url": "https://cdn.example/scarf.jpg"})).unwrap();
        assert_eq!(set.image_url, Some(Some("https://cdn.example/scarf.jpg".to_string())));
    }
}
