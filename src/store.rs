//! Table DDL and database bootstrap. Every table lives in the schema named by `BOUTIQUE_SCHEMA` (default `boutique`).

use crate::error::{AppError, SKU_UNIQUE_CONSTRAINT};
use crate::model::{Product, PRODUCT_COLUMNS};
use crate::sku::SkuStore;
use crate::sql::{like_prefix, qualified_table, quoted};
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Schema-qualified table names, computed once from settings.
#[derive(Clone, Debug)]
pub struct Tables {
    pub schema: String,
    pub users: String,
    pub sessions: String,
    pub products: String,
    pub cart_items: String,
    pub wishlist_items: String,
    pub orders: String,
    pub order_items: String,
}

impl Tables {
    pub fn new(schema: &str) -> Self {
        Tables {
            schema: quoted(schema),
            users: qualified_table(schema, "users"),
            sessions: qualified_table(schema, "sessions"),
            products: qualified_table(schema, "products"),
            cart_items: qualified_table(schema, "cart_items"),
            wishlist_items: qualified_table(schema, "wishlist_items"),
            orders: qualified_table(schema, "orders"),
            order_items: qualified_table(schema, "order_items"),
        }
    }

    fn ddl(&self) -> Vec<String> {
        vec![
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    email TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL DEFAULT '',
                    role TEXT NOT NULL DEFAULT 'customer' CHECK (role IN ('customer', 'admin')),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                self.users
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    token TEXT PRIMARY KEY,
                    user_id UUID NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
                    expires_at TIMESTAMPTZ NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                self.sessions, self.users
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    sku TEXT NOT NULL CONSTRAINT {} UNIQUE,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    category TEXT NOT NULL DEFAULT '',
                    price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
                    stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                    image_url TEXT,
                    active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                self.products, SKU_UNIQUE_CONSTRAINT
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    user_id UUID NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
                    product_id UUID NOT NULL REFERENCES {} (id),
                    quantity INTEGER NOT NULL CHECK (quantity > 0),
                    added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    PRIMARY KEY (user_id, product_id)
                )
                "#,
                self.cart_items, self.users, self.products
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    user_id UUID NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
                    product_id UUID NOT NULL REFERENCES {} (id),
                    added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    PRIMARY KEY (user_id, product_id)
                )
                "#,
                self.wishlist_items, self.users, self.products
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    user_id UUID NOT NULL REFERENCES {} (id),
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'paid', 'shipped', 'delivered', 'cancelled')),
                    total_cents BIGINT NOT NULL CHECK (total_cents >= 0),
                    shipping_name TEXT NOT NULL,
                    shipping_address TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                self.orders, self.users
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    order_id UUID NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
                    product_id UUID NOT NULL REFERENCES {} (id),
                    sku TEXT NOT NULL,
                    name TEXT NOT NULL,
                    unit_price_cents BIGINT NOT NULL,
                    quantity INTEGER NOT NULL CHECK (quantity > 0),
                    PRIMARY KEY (order_id, product_id)
                )
                "#,
                self.order_items, self.orders, self.products
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS orders_user_id_idx ON {} (user_id)",
                self.orders
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS products_category_idx ON {} (category)",
                self.products
            ),
        ]
    }
}

/// Create the schema and every table if missing. Safe to run on each start.
pub async fn ensure_tables(pool: &PgPool, tables: &Tables) -> Result<(), AppError> {
    for ddl in tables.ddl() {
        tracing::debug!(sql = %ddl.trim(), "ddl");
        sqlx::query(&ddl).execute(pool).await?;
    }
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin, db_name) = admin_connect_options(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let mut conn: sqlx::PgConnection = admin.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// Options for the `postgres` maintenance database on the same server, plus the target database name.
fn admin_connect_options(database_url: &str) -> Result<(PgConnectOptions, String), AppError> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let db_name = opts.get_database().unwrap_or_default().trim().to_string();
    Ok((opts.database("postgres"), db_name))
}

/// `SkuStore` over the products table.
pub struct PgSkuStore<'a> {
    pub pool: &'a PgPool,
    pub tables: &'a Tables,
}

#[async_trait]
impl SkuStore for PgSkuStore<'_> {
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, AppError> {
        let sql = format!("SELECT {} FROM {} WHERE sku = $1", PRODUCT_COLUMNS, self.tables.products);
        tracing::debug!(sql = %sql, sku, "query");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    async fn skus_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let sql = format!("SELECT sku FROM {} WHERE sku LIKE $1", self.tables.products);
        tracing::debug!(sql = %sql, prefix, "query");
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(like_prefix(prefix))
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_options_target_the_postgres_database() {
        let (admin, name) = admin_connect_options("postgres://u:p@db:5432/boutique?sslmode=disable").unwrap();
        assert_eq!(name, "boutique");
        assert_eq!(admin.get_database(), Some("postgres"));
        assert_eq!(admin.get_host(), "db");
        assert_eq!(admin.get_port(), 5432);
    }

    #[test]
    fn slashes_in_the_query_string_do_not_move_the_database_name() {
        let (admin, name) = admin_connect_options(
            "postgres://u:p@db:5432/boutique?sslmode=verify-full&sslrootcert=/etc/ssl/ca.pem",
        )
        .unwrap();
        assert_eq!(name, "boutique");
        assert_eq!(admin.get_database(), Some("postgres"));

        let (admin, name) = admin_connect_options("postgres:///boutique?host=/var/run/postgresql").unwrap();
        assert_eq!(name, "boutique");
        assert_eq!(admin.get_database(), Some("postgres"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(matches!(admin_connect_options("not a url"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn tables_are_schema_qualified() {
        let t = Tables::new("shop");
        assert_eq!(t.products, "\"shop\".\"products\"");
        assert_eq!(t.schema, "\"shop\"");
        assert!(t.ddl().iter().any(|d| d.contains(&format!("CONSTRAINT {} UNIQUE", SKU_UNIQUE_CONSTRAINT))));
    }
}
