//! Supplied-value ingestion from TOML
//!
//! Turns a flat TOML table into the `BTreeMap<String, Value>` that
//! [`Schema::resolve`](crate::variables::Schema::resolve) consumes. The full
//! configuration machinery (lookups, environments, stack wiring) lives in the
//! calling tool; this covers typed value ingestion only.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::variables::Value;

/// Errors that can occur while loading supplied values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read values file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse values TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML value kind the variable model has no counterpart for
    #[error("unsupported TOML value for '{key}': {kind}")]
    UnsupportedValue { key: String, kind: &'static str },
}

/// Load supplied variable values from a TOML file
pub fn values_from_file(path: &Path) -> Result<BTreeMap<String, Value>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    values_from_str(&content)
}

/// Parse supplied variable values from a TOML string
pub fn values_from_str(content: &str) -> Result<BTreeMap<String, Value>, ConfigError> {
    let table: toml::Table = toml::from_str(content)?;
    let mut values = BTreeMap::new();
    for (key, raw) in table {
        let value = convert(&key, raw)?;
        values.insert(key, value);
    }
    Ok(values)
}

fn convert(key: &str, raw: toml::Value) -> Result<Value, ConfigError> {
    match raw {
        toml::Value::String(s) => Ok(Value::String(s)),
        toml::Value::Integer(n) => Ok(Value::Int(n)),
        toml::Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                list.push(convert(key, item)?);
            }
            Ok(Value::List(list))
        }
        toml::Value::Table(table) => {
            let mut fields = BTreeMap::new();
            for (name, item) in table {
                let path = format!("{}.{}", key, name);
                let value = convert(&path, item)?;
                fields.insert(name, value);
            }
            Ok(Value::Object(fields))
        }
        toml::Value::Boolean(_) => Err(ConfigError::UnsupportedValue {
            key: key.to_string(),
            kind: "boolean",
        }),
        toml::Value::Float(_) => Err(ConfigError::UnsupportedValue {
            key: key.to_string(),
            kind: "float",
        }),
        toml::Value::Datetime(_) => Err(ConfigError::UnsupportedValue {
            key: key.to_string(),
            kind: "datetime",
        }),
    }
}
