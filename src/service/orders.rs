//! Checkout and order management.

use crate::error::AppError;
use crate::model::{Order, OrderLine, OrderRow, OrderStatus};
use crate::store::Tables;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const ORDER_COLUMNS: &str =
    "id, user_id, status, total_cents, shipping_name, shipping_address, created_at, updated_at";

#[derive(Clone, Debug, Deserialize)]
pub struct Shipping {
    pub shipping_name: String,
    pub shipping_address: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A cart line joined with its (locked) product at checkout time.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: i32,
    pub active: bool,
    pub quantity: i32,
}

/// Verify every line can be fulfilled and return the order total.
pub fn plan_checkout(lines: &[CheckoutLine]) -> Result<i64, AppError> {
    if lines.is_empty() {
        return Err(AppError::BadRequest("cart is empty".into()));
    }
    let mut total: i64 = 0;
    for line in lines {
        if !line.active {
            return Err(AppError::Conflict(format!("{} is no longer available", line.sku)));
        }
        if line.quantity > line.stock {
            return Err(AppError::Conflict(format!(
                "insufficient stock for {}: requested {}, available {}",
                line.sku, line.quantity, line.stock
            )));
        }
        total = line
            .price_cents
            .checked_mul(i64::from(line.quantity))
            .and_then(|n| total.checked_add(n))
            .ok_or_else(|| AppError::Validation("order total out of range".into()))?;
    }
    Ok(total)
}

pub struct OrderService;

impl OrderService {
    /// Turn the user's cart into a pending order: stock is decremented and the cart emptied atomically.
    pub async fn checkout(pool: &PgPool, t: &Tables, user_id: Uuid, shipping: &Shipping) -> Result<Order, AppError> {
        let mut tx = pool.begin().await?;
        let sql = format!(
            "SELECT p.id AS product_id, p.sku, p.name, p.price_cents, p.stock, p.active, c.quantity \
             FROM {} c JOIN {} p ON p.id = c.product_id WHERE c.user_id = $1 ORDER BY p.id FOR UPDATE OF p",
            t.cart_items, t.products
        );
        tracing::debug!(sql = %sql, "query (tx)");
        let lines = sqlx::query_as::<_, CheckoutLine>(&sql)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;
        let total = plan_checkout(&lines)?;

        let order: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO {} (user_id, total_cents, shipping_name, shipping_address) VALUES ($1, $2, $3, $4) RETURNING {}",
            t.orders, ORDER_COLUMNS
        ))
        .bind(user_id)
        .bind(total)
        .bind(&shipping.shipping_name)
        .bind(&shipping.shipping_address)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_write(e, None))?;

        let decrement = format!("UPDATE {} SET stock = stock - $2, updated_at = NOW() WHERE id = $1", t.products);
        let insert_item = format!(
            "INSERT INTO {} (order_id, product_id, sku, name, unit_price_cents, quantity) VALUES ($1, $2, $3, $4, $5, $6)",
            t.order_items
        );
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            sqlx::query(&decrement)
                .bind(line.product_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::from_write(e, None))?;
            sqlx::query(&insert_item)
                .bind(order.id)
                .bind(line.product_id)
                .bind(&line.sku)
                .bind(&line.name)
                .bind(line.price_cents)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::from_write(e, None))?;
            items.push(OrderLine {
                order_id: order.id,
                product_id: line.product_id,
                sku: line.sku,
                name: line.name,
                unit_price_cents: line.price_cents,
                quantity: line.quantity,
            });
        }

        sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1", t.cart_items))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, %user_id, total_cents = total, lines = items.len(), "order placed");
        Ok(Order::new(order, items))
    }

    pub async fn list_for_user(pool: &PgPool, t: &Tables, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = $1 ORDER BY created_at DESC, id",
            ORDER_COLUMNS, t.orders
        );
        tracing::debug!(sql = %sql, "query");
        let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(user_id).fetch_all(pool).await?;
        Self::with_items(pool, t, rows).await
    }

    /// One order; when `owner` is set, orders of other users are reported as missing.
    pub async fn get(pool: &PgPool, t: &Tables, id: Uuid, owner: Option<Uuid>) -> Result<Option<Order>, AppError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", ORDER_COLUMNS, t.orders);
        tracing::debug!(sql = %sql, "query");
        let row = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(pool).await?;
        let Some(row) = row.filter(|o| owner.map_or(true, |u| o.user_id == u)) else {
            return Ok(None);
        };
        Ok(Self::with_items(pool, t, vec![row]).await?.pop())
    }

    pub async fn list(pool: &PgPool, t: &Tables, query: &OrderQuery) -> Result<Vec<Order>, AppError> {
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<OrderStatus>)
            .transpose()?;
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0);
        let sql = format!(
            "SELECT {} FROM {} WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC, id LIMIT {} OFFSET {}",
            ORDER_COLUMNS, t.orders, limit, offset
        );
        tracing::debug!(sql = %sql, "query");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(pool)
            .await?;
        Self::with_items(pool, t, rows).await
    }

    /// Move an order along the status workflow. Cancelling puts the ordered quantities back in stock.
    pub async fn update_status(pool: &PgPool, t: &Tables, id: Uuid, next: OrderStatus) -> Result<Order, AppError> {
        let mut tx = pool.begin().await?;
        let current: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT status FROM {} WHERE id = $1 FOR UPDATE",
            t.orders
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let current: OrderStatus = current
            .ok_or_else(|| AppError::NotFound(format!("order {}", id)))?
            .0
            .parse()?;
        if !current.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "cannot move order from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }
        if next == OrderStatus::Cancelled {
            Self::restock(&mut tx, t, id).await?;
        }
        let row: OrderRow = sqlx::query_as(&format!(
            "UPDATE {} SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            t.orders, ORDER_COLUMNS
        ))
        .bind(id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(order_id = %id, from = current.as_str(), to = next.as_str(), "order status changed");
        Self::with_items(pool, t, vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("order {}", id)))
    }

    async fn restock(conn: &mut PgConnection, t: &Tables, order_id: Uuid) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {p} SET stock = {p}.stock + oi.quantity, updated_at = NOW() \
             FROM {oi} oi WHERE oi.order_id = $1 AND {p}.id = oi.product_id",
            p = t.products,
            oi = t.order_items
        );
        tracing::debug!(sql = %sql, "query (tx)");
        sqlx::query(&sql).bind(order_id).execute(&mut *conn).await?;
        Ok(())
    }

    async fn with_items(pool: &PgPool, t: &Tables, rows: Vec<OrderRow>) -> Result<Vec<Order>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|o| o.id).collect();
        let sql = format!(
            "SELECT order_id, product_id, sku, name, unit_price_cents, quantity FROM {} \
             WHERE order_id = ANY($1) ORDER BY sku",
            t.order_items
        );
        tracing::debug!(sql = %sql, orders = ids.len(), "query");
        let lines = sqlx::query_as::<_, OrderLine>(&sql).bind(&ids).fetch_all(pool).await?;
        let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for line in lines {
            by_order.entry(line.order_id).or_default().push(line);
        }
        Ok(rows
            .into_iter()
            .map(|o| {
                let items = by_order.remove(&o.id).unwrap_or_default();
                Order::new(o, items)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: &str, price_cents: i64, quantity: i32, stock: i32) -> CheckoutLine {
        CheckoutLine {
            product_id: Uuid::new_v4(),
            sku: sku.into(),
            name: sku.into(),
            price_cents,
            stock,
            active: true,
            quantity,
        }
    }

    #[test]
    fn total_sums_every_line() {
        let lines = vec![line("A", 1250, 2, 10), line("B", 99, 3, 3)];
        assert_eq!(plan_checkout(&lines).unwrap(), 2797);
    }

    #[test]
    fn empty_cart_is_a_bad_request() {
        assert!(matches!(plan_checkout(&[]), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn stock_shortfall_is_a_conflict() {
        let lines = vec![line("A", 100, 1, 5), line("B", 100, 4, 3)];
        match plan_checkout(&lines) {
            Err(AppError::Conflict(msg)) => assert!(msg.contains("B")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn archived_products_block_checkout() {
        let mut l = line("A", 100, 1, 5);
        l.active = false;
        assert!(matches!(plan_checkout(&[l]), Err(AppError::Conflict(_))));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let lines = vec![line("A", i64::MAX, 2, 10)];
        assert!(matches!(plan_checkout(&lines), Err(AppError::Validation(_))));
    }
}
