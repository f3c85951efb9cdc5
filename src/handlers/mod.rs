//! HTTP handlers for the shop and the back office.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod wishlist;

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Deserialize an already validated body into its typed form.
fn from_body<T: DeserializeOwned>(body: Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(body)).map_err(|e| AppError::Validation(e.to_string()))
}
