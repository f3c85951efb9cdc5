//! Back-office dashboard figures. Cancelled orders never count towards revenue.

use crate::error::AppError;
use crate::format::format_price;
use crate::model::OrderStatus;
use crate::store::Tables;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 365;
const TOP_PRODUCTS: i64 = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub revenue_cents: i64,
    pub orders: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Dashboard {
    pub window_days: u32,
    pub revenue_cents: i64,
    pub revenue_display: String,
    pub order_count: i64,
    pub average_order_cents: i64,
    pub average_order_display: String,
    pub customer_count: i64,
    pub active_product_count: i64,
    pub daily: Vec<DailyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub orders_by_status: HashMap<&'static str, i64>,
}

/// One entry per day from `start` over `days` days, zero where nothing was sold.
pub fn fill_daily(start: NaiveDate, days: u32, rows: &[(NaiveDate, i64, i64)]) -> Vec<DailyRevenue> {
    let by_day: HashMap<NaiveDate, (i64, i64)> = rows.iter().map(|(d, r, o)| (*d, (*r, *o))).collect();
    (0..i64::from(days))
        .map(|i| {
            let day = start + Duration::days(i);
            let (revenue_cents, orders) = by_day.get(&day).copied().unwrap_or((0, 0));
            DailyRevenue {
                day,
                revenue_cents,
                orders,
            }
        })
        .collect()
}

/// Count per status, including statuses without orders.
pub fn status_counts(rows: &[(String, i64)]) -> HashMap<&'static str, i64> {
    let mut out: HashMap<&'static str, i64> = OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for (status, n) in rows {
        match status.parse::<OrderStatus>() {
            Ok(st) => *out.entry(st.as_str()).or_default() += n,
            Err(_) => tracing::warn!(status = %status, "unknown order status in orders table"),
        }
    }
    out
}

pub fn average(total: i64, count: i64) -> i64 {
    if count == 0 {
        0
    } else {
        total / count
    }
}

pub struct AnalyticsService;

impl AnalyticsService {
    pub async fn dashboard(pool: &PgPool, t: &Tables, days: Option<u32>) -> Result<Dashboard, AppError> {
        let window_days = days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, MAX_WINDOW_DAYS);
        let today = Utc::now().date_naive();
        let start = today - Duration::days(i64::from(window_days) - 1);
        let since = start.and_time(NaiveTime::default()).and_utc();

        let (revenue_cents, order_count): (i64, i64) = sqlx::query_as(&format!(
            "SELECT COALESCE(SUM(total_cents), 0)::BIGINT, COUNT(*) FROM {} \
             WHERE status <> 'cancelled' AND created_at >= $1",
            t.orders
        ))
        .bind(since)
        .fetch_one(pool)
        .await?;

        let (customer_count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {} WHERE role = 'customer'", t.users))
                .fetch_one(pool)
                .await?;
        let (active_product_count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {} WHERE active", t.products))
                .fetch_one(pool)
                .await?;

        let daily_rows: Vec<(NaiveDate, i64, i64)> = sqlx::query_as(&format!(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, SUM(total_cents)::BIGINT, COUNT(*) FROM {} \
             WHERE status <> 'cancelled' AND created_at >= $1 GROUP BY day",
            t.orders
        ))
        .bind(since)
        .fetch_all(pool)
        .await?;

        let top_products = sqlx::query_as::<_, TopProduct>(&format!(
            "SELECT oi.product_id, MAX(oi.sku) AS sku, MAX(oi.name) AS name, \
             SUM(oi.quantity)::BIGINT AS units_sold, SUM(oi.quantity * oi.unit_price_cents)::BIGINT AS revenue_cents \
             FROM {} oi JOIN {} o ON o.id = oi.order_id \
             WHERE o.status <> 'cancelled' AND o.created_at >= $1 \
             GROUP BY oi.product_id ORDER BY units_sold DESC, revenue_cents DESC LIMIT {}",
            t.order_items, t.orders, TOP_PRODUCTS
        ))
        .bind(since)
        .fetch_all(pool)
        .await?;

        let status_rows: Vec<(String, i64)> =
            sqlx::query_as(&format!("SELECT status, COUNT(*) FROM {} GROUP BY status", t.orders))
                .fetch_all(pool)
                .await?;

        let average_order_cents = average(revenue_cents, order_count);
        tracing::debug!(window_days, revenue_cents, order_count, "dashboard computed");
        Ok(Dashboard {
            window_days,
            revenue_cents,
            revenue_display: format_price(revenue_cents),
            order_count,
            average_order_cents,
            average_order_display: format_price(average_order_cents),
            customer_count,
            active_product_count,
            daily: fill_daily(start, window_days, &daily_rows),
            top_products,
            orders_by_status: status_counts(&status_rows),
        })
    }
}
