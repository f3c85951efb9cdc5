//! Builds parameterized SELECTs whose WHERE clause depends on request filters.

use super::params::PgBindValue;
use crate::model::PRODUCT_COLUMNS;
use serde::Deserialize;

/// Quote identifier for PostgreSQL (safe: only from settings).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Escape `\`, `%` and `_` so `s` matches literally inside a LIKE pattern (default escape char).
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// LIKE pattern matching every string that starts with `prefix`.
pub fn like_prefix(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn push_param(&mut self, v: impl Into<PgBindValue>) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v.into());
        n
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    fn order_clause(&self) -> &'static str {
        match self {
            ProductSort::Newest => "created_at DESC, id",
            ProductSort::PriceAsc => "price_cents ASC, id",
            ProductSort::PriceDesc => "price_cents DESC, id",
            ProductSort::Name => "name ASC, id",
        }
    }
}

/// Catalog filters. Deserialized straight from the query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    #[serde(default)]
    pub sort: ProductSort,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Only honoured for back-office listings; the shop always restricts to active products.
    pub active: Option<bool>,
}

impl ProductFilter {
    /// Effective `(limit, offset)` after defaults and clamping.
    pub fn page(&self) -> (u32, u32) {
        (
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            self.offset.unwrap_or(0),
        )
    }
}

/// SELECT products matching `filter`, ORDER BY the requested sort, LIMIT/OFFSET clamped.
pub fn select_products(table: &str, filter: &ProductFilter) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut where_parts = Vec::new();

    if let Some(active) = filter.active {
        let n = q.push_param(active);
        where_parts.push(format!("active = ${}", n));
    }
    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        let n = q.push_param(category);
        where_parts.push(format!("category = ${}", n));
    }
    if let Some(term) = filter.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let n = q.push_param(format!("%{}%", escape_like(term)));
        where_parts.push(format!("(name ILIKE ${n} OR description ILIKE ${n})", n = n));
    }
    if let Some(min) = filter.min_price {
        let n = q.push_param(min);
        where_parts.push(format!("price_cents >= ${}", n));
    }
    if let Some(max) = filter.max_price {
        let n = q.push_param(max);
        where_parts.push(format!("price_cents <= ${}", n));
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let (limit, offset) = filter.page();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        PRODUCT_COLUMNS,
        table,
        where_clause,
        filter.sort.order_clause(),
        limit,
        offset
    );
    q
}
