//! SKU allocation.
//!
//! A base SKU is used as-is when free. Otherwise the result is `{base}-{n}` where `n` is one
//! more than the largest numeric suffix already present; gaps are never filled.
//!
//! `allocate` only reads. Uniqueness under concurrent creation comes from the
//! `products_sku_key` constraint: [`allocate_and_insert`] re-allocates from a fresh snapshot
//! whenever the insert reports the candidate as taken.

use crate::error::AppError;
use crate::model::Product;
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;

/// Read access to persisted SKUs.
#[async_trait]
pub trait SkuStore: Send + Sync {
    /// Exact-match lookup.
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, AppError>;

    /// Every SKU starting with the literal `prefix`.
    async fn skus_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError>;
}

/// Next free SKU for `base` given the SKUs sharing its `{base}-` prefix.
///
/// Only full `{base}-<digits>` matches count, compared literally. A suffix too large for
/// `u64` is skipped.
pub fn next_sku<'a>(base: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let existing: HashSet<&str> = existing.into_iter().collect();
    let max = existing
        .iter()
        .filter_map(|sku| numeric_suffix(base, sku))
        .max()
        .unwrap_or(0);
    let mut n = u128::from(max) + 1;
    loop {
        let candidate = format!("{}-{}", base, n);
        // Only reachable when a skipped oversized suffix sits exactly on max+1.
        if !existing.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// `Some(n)` when `sku` is exactly `{base}-{n}` with a decimal `n` that fits in `u64`.
fn numeric_suffix(base: &str, sku: &str) -> Option<u64> {
    let digits = sku.strip_prefix(base)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Pick a SKU for `base` that is unused in the store's current snapshot.
pub async fn allocate<S: SkuStore + ?Sized>(store: &S, base: &str) -> Result<String, AppError> {
    if store.find_by_sku(base).await?.is_none() {
        return Ok(base.to_string());
    }
    let taken = store.skus_with_prefix(&format!("{}-", base)).await?;
    Ok(next_sku(base, taken.iter().map(String::as_str)))
}

/// Allocate a SKU and hand it to `insert`, retrying with a fresh snapshot while the insert
/// fails with [`AppError::SkuTaken`]. Other errors are returned as-is.
pub async fn allocate_and_insert<S, T, F, Fut>(
    store: &S,
    base: &str,
    max_attempts: u32,
    mut insert: F,
) -> Result<T, AppError>
where
    S: SkuStore + ?Sized,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        let candidate = allocate(store, base).await?;
        match insert(candidate.clone()).await {
            Err(AppError::SkuTaken(_)) => {
                tracing::warn!(base, attempt, candidate = %candidate, "sku taken by a concurrent insert, retrying");
            }
            other => return other,
        }
    }
    Err(AppError::SkuExhausted {
        base: base.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    /// In-memory store; `insert` enforces uniqueness like the `products_sku_key` constraint.
    #[derive(Default)]
    struct MemoryStore {
        skus: Mutex<BTreeSet<String>>,
        reads: AtomicU32,
    }

    impl MemoryStore {
        fn with(skus: &[&str]) -> Self {
            MemoryStore {
                skus: Mutex::new(skus.iter().map(|s| s.to_string()).collect()),
                reads: AtomicU32::new(0),
            }
        }

        fn insert(&self, sku: &str) -> Result<(), AppError> {
            if self.skus.lock().unwrap().insert(sku.to_string()) {
                Ok(())
            } else {
                Err(AppError::SkuTaken(sku.to_string()))
            }
        }
    }

    fn product(sku: &str) -> Product {
        Product {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            name: sku.to_string(),
            description: String::new(),
            category: String::new(),
            price_cents: 100,
            stock: 1,
            image_url: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl SkuStore for MemoryStore {
        async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, AppError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.skus.lock().unwrap().get(sku).map(|s| product(s)))
        }

        async fn skus_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .skus
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl SkuStore for FailingStore {
        async fn find_by_sku(&self, _sku: &str) -> Result<Option<Product>, AppError> {
            Err(AppError::Db(sqlx::Error::PoolTimedOut))
        }

        async fn skus_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, AppError> {
            Err(AppError::Db(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn free_base_is_returned_unchanged() {
        let store = MemoryStore::with(&["GADGET", "GADGET-1"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET");
    }

    #[tokio::test]
    async fn taken_base_without_variants_gets_suffix_one() {
        let store = MemoryStore::with(&["WIDGET"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET-1");
    }

    #[tokio::test]
    async fn suffix_follows_the_maximum_not_the_count() {
        let store = MemoryStore::with(&["WIDGET", "WIDGET-1", "WIDGET-2", "WIDGET-5"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET-6");
    }

    #[tokio::test]
    async fn non_numeric_suffixes_are_ignored() {
        let store = MemoryStore::with(&["WIDGET", "WIDGET-ABC", "WIDGET-2X", "WIDGET--3", "WIDGET-"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET-1");
    }

    #[tokio::test]
    async fn longer_skus_sharing_the_prefix_do_not_count() {
        let store = MemoryStore::with(&["WIDGET", "WIDGET-1-9", "WIDGETS-4", "WIDGET-BLUE-7"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET-1");
    }

    #[tokio::test]
    async fn unparseable_suffix_is_excluded_rather_than_zero() {
        let store = MemoryStore::with(&["WIDGET", "WIDGET-3", "WIDGET-99999999999999999999999"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET-4");
    }

    #[tokio::test]
    async fn leading_zeros_parse_as_decimal() {
        let store = MemoryStore::with(&["WIDGET", "WIDGET-007"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET-8");
    }

    #[tokio::test]
    async fn regex_metacharacters_in_base_are_literal() {
        let store = MemoryStore::with(&["A.B", "AXB-7", "A.B-2"]);
        assert_eq!(allocate(&store, "A.B").await.unwrap(), "A.B-3");

        let store = MemoryStore::with(&["C++(x)", "C++(x)-4"]);
        assert_eq!(allocate(&store, "C++(x)").await.unwrap(), "C++(x)-5");

        let store = MemoryStore::with(&["50%_OFF", "50%_OFF-1"]);
        assert_eq!(allocate(&store, "50%_OFF").await.unwrap(), "50%_OFF-2");
    }

    #[tokio::test]
    async fn no_case_or_whitespace_normalization() {
        let store = MemoryStore::with(&["widget", " WIDGET"]);
        assert_eq!(allocate(&store, "WIDGET").await.unwrap(), "WIDGET");
        assert_eq!(allocate(&store, "widget").await.unwrap(), "widget-1");
    }

    #[tokio::test]
    async fn never_collides_with_the_snapshot() {
        let sets: [&[&str]; 5] = [
            &[],
            &["B"],
            &["B", "B-1", "B-2"],
            &["B", "B-9", "B-x", "B-10"],
            &["B-1", "B-2"],
        ];
        for set in sets {
            let store = MemoryStore::with(set);
            let got = allocate(&store, "B").await.unwrap();
            if set.contains(&"B") {
                assert_ne!(got, "B");
                assert!(!set.contains(&got.as_str()), "{} collides with {:?}", got, set);
            } else {
                assert_eq!(got, "B");
            }
        }
    }

    #[tokio::test]
    async fn repeated_allocation_without_persisting_repeats_the_answer() {
        let store = MemoryStore::with(&["WIDGET", "WIDGET-1"]);
        let first = allocate(&store, "WIDGET").await.unwrap();
        let second = allocate(&store, "WIDGET").await.unwrap();
        assert_eq!(first, "WIDGET-2");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let err = allocate(&FailingStore, "WIDGET").await.unwrap_err();
        assert!(matches!(err, AppError::Db(sqlx::Error::PoolTimedOut)));
    }

    #[tokio::test]
    async fn concurrent_creations_get_distinct_skus() {
        let store = Arc::new(MemoryStore::with(&["WIDGET"]));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let s = Arc::clone(&store);
                allocate_and_insert(&*store, "WIDGET", 16, move |sku| {
                    let s = Arc::clone(&s);
                    async move {
                        tokio::task::yield_now().await;
                        s.insert(&sku).map(|_| sku)
                    }
                })
                .await
            }));
        }
        let mut got = BTreeSet::new();
        for h in handles {
            got.insert(h.await.unwrap().unwrap());
        }
        assert_eq!(got.len(), 8);
        assert_eq!(store.skus.lock().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn retry_uses_a_fresh_snapshot() {
        let store = MemoryStore::with(&["WIDGET"]);
        let calls = AtomicU32::new(0);
        let sku = allocate_and_insert(&store, "WIDGET", 3, |candidate| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            // A concurrent writer grabs the first candidate just before we insert it.
            if n == 0 {
                store.insert(&candidate).unwrap();
            }
            let res = store.insert(&candidate).map(|_| candidate);
            async move { res }
        })
        .await
        .unwrap();
        assert_eq!(sku, "WIDGET-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = MemoryStore::with(&["WIDGET"]);
        let calls = AtomicU32::new(0);
        let err = allocate_and_insert(&store, "WIDGET", 3, |candidate| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<String, _>(AppError::SkuTaken(candidate)) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SkuExhausted { ref base, attempts: 3 } if base == "WIDGET"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.reads.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn other_insert_errors_are_not_retried() {
        let store = MemoryStore::with(&[]);
        let calls = AtomicU32::new(0);
        let err = allocate_and_insert(&store, "WIDGET", 5, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AppError::Validation("price_cents must be >= 0".into())) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn suffix_past_u64_max_skips_oversized_entries() {
        let at_max = format!("X-{}", u64::MAX);
        assert_eq!(next_sku("X", [at_max.as_str()]), "X-18446744073709551616");
        assert_eq!(
            next_sku("X", [at_max.as_str(), "X-18446744073709551616"]),
            "X-18446744073709551617"
        );
    }

    #[test]
    fn numeric_suffix_requires_exact_shape() {
        assert_eq!(numeric_suffix("A", "A-12"), Some(12));
        assert_eq!(numeric_suffix("A", "A-"), None);
        assert_eq!(numeric_suffix("A", "A-+1"), None);
        assert_eq!(numeric_suffix("A", "A-1 "), None);
        assert_eq!(numeric_suffix("A", "AB-1"), None);
        assert_eq!(numeric_suffix("A", "A-١"), None);
    }
}
