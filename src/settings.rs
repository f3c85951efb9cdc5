//! Runtime settings read from the environment (and `.env` via dotenvy in the binary).

use crate::error::ConfigError;
use std::collections::HashMap;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/boutique";
pub const DEFAULT_SCHEMA: &str = "boutique";

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// Schema holding every boutique table. Must be a plain PostgreSQL identifier.
    pub schema: String,
    pub max_connections: u32,
    /// Allocation attempts before product creation gives up on a base SKU.
    pub sku_max_attempts: u32,
    pub session_cookie: String,
    pub low_stock_threshold: i32,
    pub body_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            bind_addr: "0.0.0.0:3000".into(),
            schema: DEFAULT_SCHEMA.into(),
            max_connections: 5,
            sku_max_attempts: 3,
            session_cookie: "boutique_session".into(),
            low_stock_threshold: 5,
            body_limit_bytes: 64 * 1024,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Build settings from an explicit variable map; missing keys fall back to defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let text = |key: &str, default: String| {
            vars.get(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
        };

        let schema = text("BOUTIQUE_SCHEMA", defaults.schema);
        if !is_identifier(&schema) {
            return Err(ConfigError::Invalid {
                key: "BOUTIQUE_SCHEMA",
                value: schema,
                reason: "must match [a-z_][a-z0-9_]*".into(),
            });
        }

        let sku_max_attempts = number(vars, "SKU_MAX_ATTEMPTS", defaults.sku_max_attempts)?;
        if sku_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "SKU_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Settings {
            database_url: text("DATABASE_URL", defaults.database_url),
            bind_addr: text("BIND_ADDR", defaults.bind_addr),
            schema,
            max_connections: number(vars, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            sku_max_attempts,
            session_cookie: text("SESSION_COOKIE", defaults.session_cookie),
            low_stock_threshold: number(vars, "LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?,
            body_limit_bytes: number(vars, "BODY_LIMIT_BYTES", defaults.body_limit_bytes)?,
        })
    }
}

fn number<T>(vars: &HashMap<String, String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = Settings::from_vars(&HashMap::new()).unwrap();
        assert_eq!(s.schema, "boutique");
        assert_eq!(s.sku_max_attempts, 3);
        assert_eq!(s.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn overrides_are_parsed() {
        let s = Settings::from_vars(&vars(&[
            ("BOUTIQUE_SCHEMA", "shop_test"),
            ("SKU_MAX_ATTEMPTS", " 7 "),
            ("LOW_STOCK_THRESHOLD", "2"),
        ]))
        .unwrap();
        assert_eq!(s.schema, "shop_test");
        assert_eq!(s.sku_max_attempts, 7);
        assert_eq!(s.low_stock_threshold, 2);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Settings::from_vars(&vars(&[("SKU_MAX_ATTEMPTS", "0")])).is_err());
        assert!(Settings::from_vars(&vars(&[("SKU_MAX_ATTEMPTS", "many")])).is_err());
        assert!(Settings::from_vars(&vars(&[("BOUTIQUE_SCHEMA", "shop; drop")])).is_err());
        assert!(Settings::from_vars(&vars(&[("BOUTIQUE_SCHEMA", "1shop")])).is_err());
    }
}
