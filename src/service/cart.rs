//! Cart mutations and the priced cart view.

use crate::error::AppError;
use crate::format::format_price;
use crate::store::Tables;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub stock: i32,
    pub active: bool,
    pub quantity: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PricedLine {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total_cents: i64,
    pub line_total_display: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    pub items: Vec<PricedLine>,
    pub item_count: i64,
    pub subtotal_cents: i64,
    pub subtotal_display: String,
}

impl Cart {
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let items: Vec<PricedLine> = lines
            .into_iter()
            .map(|line| {
                let total = line.price_cents * i64::from(line.quantity);
                PricedLine {
                    line,
                    line_total_cents: total,
                    line_total_display: format_price(total),
                }
            })
            .collect();
        let subtotal_cents = items.iter().map(|l| l.line_total_cents).sum();
        Cart {
            item_count: items.iter().map(|l| i64::from(l.line.quantity)).sum(),
            subtotal_cents,
            subtotal_display: format_price(subtotal_cents),
            items,
        }
    }
}

/// Check a resulting line quantity against the product's availability.
pub fn check_quantity(quantity: i32, stock: i32, active: bool) -> Result<(), AppError> {
    if !active {
        return Err(AppError::Validation("product is not available".into()));
    }
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".into()));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::Validation(format!(
            "quantity must be at most {}",
            MAX_LINE_QUANTITY
        )));
    }
    if quantity > stock {
        return Err(AppError::Validation(format!("only {} left in stock", stock)));
    }
    Ok(())
}

fn availability_sql(t: &Tables) -> String {
    format!("SELECT stock, active FROM {} WHERE id = $1 FOR UPDATE", t.products)
}

pub struct CartService;

impl CartService {
    pub async fn view(pool: &PgPool, t: &Tables, user_id: Uuid) -> Result<Cart, AppError> {
        let sql = format!(
            "SELECT p.id AS product_id, p.sku, p.name, p.image_url, p.price_cents, p.stock, p.active, c.quantity \
             FROM {} c JOIN {} p ON p.id = c.product_id WHERE c.user_id = $1 ORDER BY c.added_at, p.id",
            t.cart_items, t.products
        );
        tracing::debug!(sql = %sql, "query");
        let lines = sqlx::query_as::<_, CartLine>(&sql).bind(user_id).fetch_all(pool).await?;
        Ok(Cart::from_lines(lines))
    }

    pub async fn add(pool: &PgPool, t: &Tables, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<Cart, AppError> {
        let mut tx = pool.begin().await?;
        Self::add_in(&mut tx, t, user_id, product_id, quantity).await?;
        tx.commit().await?;
        Self::view(pool, t, user_id).await
    }

    /// Add `quantity` to the user's line for `product_id` on an open transaction.
    pub async fn add_in(
        conn: &mut PgConnection,
        t: &Tables,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), AppError> {
        if quantity < 1 {
            return Err(AppError::Validation("quantity must be at least 1".into()));
        }
        let (stock, active) = Self::product_availability(&mut *conn, t, product_id).await?;
        let current: Option<(i32,)> = sqlx::query_as(&format!(
            "SELECT quantity FROM {} WHERE user_id = $1 AND product_id = $2 FOR UPDATE",
            t.cart_items
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
        let new_quantity = current.map(|(q,)| q).unwrap_or(0).saturating_add(quantity);
        check_quantity(new_quantity, stock, active)?;

        let sql = format!(
            "INSERT INTO {} (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
            t.cart_items
        );
        tracing::debug!(sql = %sql, "query (tx)");
        sqlx::query(&sql)
            .bind(user_id)
            .bind(product_id)
            .bind(new_quantity)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::from_write(e, None))?;
        Ok(())
    }

    /// Set a line's quantity; zero removes the line.
    pub async fn set_quantity(
        pool: &PgPool,
        t: &Tables,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, AppError> {
        if quantity == 0 {
            return Self::remove(pool, t, user_id, product_id).await;
        }
        let mut tx = pool.begin().await?;
        let (stock, active) = Self::product_availability(&mut tx, t, product_id).await?;
        check_quantity(quantity, stock, active)?;
        let sql = format!(
            "UPDATE {} SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
            t.cart_items
        );
        tracing::debug!(sql = %sql, "query (tx)");
        let res = sqlx::query(&sql)
            .bind(user_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("cart item {}", product_id)));
        }
        tx.commit().await?;
        Self::view(pool, t, user_id).await
    }

    pub async fn remove(pool: &PgPool, t: &Tables, user_id: Uuid, product_id: Uuid) -> Result<Cart, AppError> {
        let sql = format!("DELETE FROM {} WHERE user_id = $1 AND product_id = $2", t.cart_items);
        tracing::debug!(sql = %sql, "query");
        let res = sqlx::query(&sql).bind(user_id).bind(product_id).execute(pool).await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("cart item {}", product_id)));
        }
        Self::view(pool, t, user_id).await
    }

    pub async fn clear(pool: &PgPool, t: &Tables, user_id: Uuid) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {} WHERE user_id = $1", t.cart_items);
        tracing::debug!(sql = %sql, "query");
        sqlx::query(&sql).bind(user_id).execute(pool).await?;
        Ok(())
    }

    /// Stock and active flag, with the product row locked until the transaction ends.
    /// The lock serializes concurrent changes to lines of the same product, including first adds.
    async fn product_availability(conn: &mut PgConnection, t: &Tables, product_id: Uuid) -> Result<(i32, bool), AppError> {
        let row: Option<(i32, bool)> = sqlx::query_as(&availability_sql(t))
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.ok_or_else(|| AppError::NotFound(format!("product {}", product_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price_cents: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            sku: "SKU".into(),
            name: "Thing".into(),
            image_url: None,
            price_cents,
            stock: 100,
            active: true,
            quantity,
        }
    }

    #[test]
    fn quantity_rules() {
        assert!(check_quantity(1, 1, true).is_ok());
        assert!(check_quantity(99, 500, true).is_ok());
        assert!(check_quantity(0, 5, true).is_err());
        assert!(check_quantity(100, 500, true).is_err());
        assert!(check_quantity(6, 5, true).is_err());
        assert!(check_quantity(1, 5, false).is_err());
    }

    #[test]
    fn cart_totals() {
        let cart = Cart::from_lines(vec![line(1999, 2), line(500, 1)]);
        assert_eq!(cart.subtotal_cents, 4498);
        assert_eq!(cart.subtotal_display, "$44.98");
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.items[0].line_total_cents, 3998);
        assert_eq!(cart.items[0].line_total_display, "$39.98");
    }

    #[test]
    fn availability_check_locks_the_product_row() {
        let sql = availability_sql(&Tables::new("shop"));
        assert!(sql.starts_with("SELECT stock, active FROM \"shop\".\"products\""));
        assert!(sql.ends_with("FOR UPDATE"));
    }

    #[test]
    fn empty_cart() {
        let cart = Cart::from_lines(Vec::new());
        assert_eq!(cart.subtotal_cents, 0);
        assert_eq!(cart.subtotal_display, "$0.00");
        assert!(cart.items.is_empty());
    }
}
