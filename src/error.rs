//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Name of the uniqueness constraint on `products.sku`.
pub const SKU_UNIQUE_CONSTRAINT: &str = "products_sku_key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("sku already taken: {0}")]
    SkuTaken(String),
    #[error("could not allocate a unique sku for '{base}' after {attempts} attempts")]
    SkuExhausted { base: String, attempts: u32 },
}

impl AppError {
    /// Classify a failed INSERT/UPDATE by the constraint it violated.
    pub fn from_write(err: sqlx::Error, attempted_sku: Option<&str>) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                if db.constraint() == Some(SKU_UNIQUE_CONSTRAINT) {
                    return AppError::SkuTaken(attempted_sku.unwrap_or_default().to_string());
                }
                return AppError::Conflict(db.message().to_string());
            }
            if db.is_foreign_key_violation() {
                return AppError::NotFound(db.message().to_string());
            }
            if db.is_check_violation() {
                return AppError::Validation(db.message().to_string());
            }
        }
        AppError::Db(err)
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::SkuTaken(_) => (StatusCode::CONFLICT, "sku_taken"),
            AppError::SkuExhausted { .. } => (StatusCode::CONFLICT, "sku_exhausted"),
        };
        let (message, details) = match &self {
            AppError::Db(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "database error");
                ("internal database error".to_string(), None)
            }
            AppError::Config(e) => {
                tracing::error!(error = %e, "config error");
                (self.to_string(), None)
            }
            AppError::SkuExhausted { base, attempts } => (
                self.to_string(),
                Some(serde_json::json!({ "base_sku": base, "attempts": attempts })),
            ),
            _ => (self.to_string(), None),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};

    #[derive(Clone, Copy, Debug)]
    enum Violation {
        Unique,
        ForeignKey,
        Check,
        Other,
    }

    /// Minimal driver error carrying a violation kind and a constraint name.
    #[derive(Debug)]
    struct FakeDbError {
        violation: Violation,
        constraint: Option<&'static str>,
    }

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "violates {:?}", self.constraint)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn kind(&self) -> ErrorKind {
            match self.violation {
                Violation::Unique => ErrorKind::UniqueViolation,
                Violation::ForeignKey => ErrorKind::ForeignKeyViolation,
                Violation::Check => ErrorKind::CheckViolation,
                Violation::Other => ErrorKind::Other,
            }
        }
    }

    fn db_error(violation: Violation, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError { violation, constraint }))
    }

    #[test]
    fn sku_constraint_violation_means_sku_taken() {
        let err = AppError::from_write(
            db_error(Violation::Unique, Some(SKU_UNIQUE_CONSTRAINT)),
            Some("WIDGET-3"),
        );
        assert!(matches!(err, AppError::SkuTaken(ref sku) if sku == "WIDGET-3"));
    }

    #[test]
    fn other_unique_violations_are_conflicts() {
        let err = AppError::from_write(db_error(Violation::Unique, Some("users_email_key")), Some("WIDGET"));
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn foreign_key_and_check_violations_are_classified() {
        let err = AppError::from_write(db_error(Violation::ForeignKey, Some("cart_items_product_id_fkey")), None);
        assert!(matches!(err, AppError::NotFound(_)));
        let err = AppError::from_write(db_error(Violation::Check, Some("products_stock_check")), None);
        assert!(matches!(err, AppError::Validation(_)));
        let err = AppError::from_write(db_error(Violation::Other, None), None);
        assert!(matches!(err, AppError::Db(_)));
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::SkuTaken("A".into()), StatusCode::CONFLICT),
            (
                AppError::SkuExhausted { base: "A".into(), attempts: 3 },
                StatusCode::CONFLICT,
            ),
            (AppError::Db(sqlx::Error::RowNotFound), StatusCode::NOT_FOUND),
            (AppError::Db(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn non_database_errors_pass_through_from_write() {
        let err = AppError::from_write(sqlx::Error::PoolTimedOut, Some("A"));
        assert!(matches!(err, AppError::Db(sqlx::Error::PoolTimedOut)));
    }
}
