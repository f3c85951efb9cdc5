//! Request validation against per-field rules.

use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<&'static str>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl ValidationRule {
    fn text(required: bool, min_length: usize, max_length: usize) -> Self {
        ValidationRule {
            required,
            min_length: Some(min_length),
            max_length: Some(max_length),
            ..Default::default()
        }
    }

    fn integer(required: bool, minimum: i64, maximum: i64) -> Self {
        ValidationRule {
            required,
            minimum: Some(minimum),
            maximum: Some(maximum),
            ..Default::default()
        }
    }
}

pub type Rules = Vec<(&'static str, ValidationRule)>;

const URL_PATTERN: &str = r"^https?://\S+$";

/// Rules for creating a product. `sku` is the base SKU; it is not normalized.
pub fn new_product_rules() -> Rules {
    vec![
        ("sku", ValidationRule::text(true, 1, 64)),
        ("name", ValidationRule::text(true, 1, 200)),
        ("description", ValidationRule::text(false, 0, 5000)),
        ("category", ValidationRule::text(false, 0, 100)),
        ("price_cents", ValidationRule::integer(true, 0, 100_000_000)),
        ("stock", ValidationRule::integer(false, 0, 1_000_000)),
        (
            "image_url",
            ValidationRule {
                max_length: Some(2000),
                pattern: Some(URL_PATTERN),
                ..Default::default()
            },
        ),
    ]
}

/// Rules for patching a product. Same bounds as creation, nothing required.
pub fn product_patch_rules() -> Rules {
    new_product_rules()
        .into_iter()
        .filter(|(field, _)| *field != "sku")
        .map(|(field, rule)| (field, ValidationRule { required: false, ..rule }))
        .collect()
}

pub fn checkout_rules() -> Rules {
    vec![
        ("shipping_name", ValidationRule::text(true, 1, 200)),
        ("shipping_address", ValidationRule::text(true, 5, 1000)),
    ]
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate body against per-field rules. All required fields must be present and non-null.
    pub fn validate(body: &Map<String, Value>, rules: &[(&'static str, ValidationRule)]) -> Result<(), AppError> {
        for (field, rule) in rules {
            let val = body.get(*field);
            if rule.required && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
            if let Some(v) = val {
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if rule.min_length.is_some() || rule.max_length.is_some() || rule.pattern.is_some() {
        let s = v
            .as_str()
            .ok_or_else(|| AppError::Validation(format!("{} must be a string", field)))?;
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max {
                return Err(AppError::Validation(format!("{} must be at most {} characters", field, max)));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min {
                return Err(AppError::Validation(format!("{} must be at least {} characters", field, min)));
            }
        }
        if s.chars().any(|c| c.is_control() && c != '\n') {
            return Err(AppError::Validation(format!("{} contains control characters", field)));
        }
        if let Some(pattern) = rule.pattern {
            let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", field)))?;
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", field)));
            }
        }
    }
    if rule.minimum.is_some() || rule.maximum.is_some() {
        let n = v
            .as_i64()
            .ok_or_else(|| AppError::Validation(format!("{} must be an integer", field)))?;
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", field, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", field, max)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn accepts_a_complete_product() {
        let body = obj(json!({
            "sku": "Tee.Blue(L)",
            "name": "Blue tee",
            "price_cents": 1999,
            "stock": 10,
            "image_url": "https://cdn.example.com/tee.png"
        }));
        assert!(RequestValidator::validate(&body, &new_product_rules()).is_ok());
    }

    #[test]
    fn required_and_bounds() {
        let rules = new_product_rules();
        let missing = obj(json!({ "name": "x", "price_cents": 1 }));
        assert!(matches!(
            RequestValidator::validate(&missing, &rules),
            Err(AppError::Validation(m)) if m == "sku is required"
        ));
        let negative = obj(json!({ "sku": "A", "name": "x", "price_cents": -1 }));
        assert!(RequestValidator::validate(&negative, &rules).is_err());
        let fractional = obj(json!({ "sku": "A", "name": "x", "price_cents": 9.99 }));
        assert!(RequestValidator::validate(&fractional, &rules).is_err());
        let empty_sku = obj(json!({ "sku": "", "name": "x", "price_cents": 1 }));
        assert!(RequestValidator::validate(&empty_sku, &rules).is_err());
        let bad_url = obj(json!({ "sku": "A", "name": "x", "price_cents": 1, "image_url": "javascript:alert(1)" }));
        assert!(RequestValidator::validate(&bad_url, &rules).is_err());
    }

    #[test]
    fn patch_rules_require_nothing_and_skip_sku() {
        let rules = product_patch_rules();
        assert!(rules.iter().all(|(f, r)| !r.required && *f != "sku"));
        assert!(RequestValidator::validate(&Map::new(), &rules).is_ok());
        let body = obj(json!({ "price_cents": -5 }));
        assert!(RequestValidator::validate(&body, &rules).is_err());
    }

    #[test]
    fn checkout_needs_shipping_details() {
        let ok = obj(json!({ "shipping_name": "Ada", "shipping_address": "12 Analytical St" }));
        assert!(RequestValidator::validate(&ok, &checkout_rules()).is_ok());
        let bad = obj(json!({ "shipping_name": "Ada", "shipping_address": "x" }));
        assert!(RequestValidator::validate(&bad, &checkout_rules()).is_err());
    }
}
