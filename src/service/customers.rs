//! Back-office customer listing.

use crate::error::AppError;
use crate::format::format_price;
use crate::store::Tables;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub order_count: i64,
    pub lifetime_spend_cents: i64,
    #[sqlx(skip)]
    pub lifetime_spend_display: String,
}

pub struct CustomerService;

impl CustomerService {
    /// Customers with their non-cancelled order count and spend, biggest spenders first.
    pub async fn list(pool: &PgPool, t: &Tables, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<CustomerSummary>, AppError> {
        let limit = limit.unwrap_or(50).clamp(1, 200);
        let offset = offset.unwrap_or(0);
        let sql = format!(
            "SELECT u.id, u.email, u.name, u.created_at, \
             COUNT(o.id) AS order_count, COALESCE(SUM(o.total_cents), 0)::BIGINT AS lifetime_spend_cents \
             FROM {} u LEFT JOIN {} o ON o.user_id = u.id AND o.status <> 'cancelled' \
             WHERE u.role = 'customer' \
             GROUP BY u.id ORDER BY lifetime_spend_cents DESC, u.email LIMIT {} OFFSET {}",
            t.users, t.orders, limit, offset
        );
        tracing::debug!(sql = %sql, "query");
        let mut rows = sqlx::query_as::<_, CustomerSummary>(&sql).fetch_all(pool).await?;
        for row in &mut rows {
            row.lifetime_spend_display = format_price(row.lifetime_spend_cents);
        }
        Ok(rows)
    }
}
