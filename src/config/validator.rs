//! Shape checks for a config object before it is deserialized.

use crate::error::ConfigError;
use serde_json::{Map, Value};

pub const REQUIRED_KEYS: [&str; 5] = ["driver", "host", "database", "user", "password"];
pub const OPTIONAL_KEYS: [&str; 2] = ["port", "filepath"];

const INVALID_OBJECT: &str = "The contents of the file do not contain a valid object";

/// Every required key present and a string, no unknown keys, `port` numeric and `filepath` a string.
pub fn validate(obj: &Map<String, Value>) -> Result<(), ConfigError> {
    let has_all = REQUIRED_KEYS.iter().all(|k| obj.contains_key(*k));
    let only_known = obj
        .keys()
        .all(|k| REQUIRED_KEYS.contains(&k.as_str()) || OPTIONAL_KEYS.contains(&k.as_str()));
    let types_ok = REQUIRED_KEYS.iter().all(|k| matches!(obj.get(*k), Some(Value::String(_))));
    let port_ok = match obj.get("port") {
        None => true,
        Some(Value::Number(n)) => n.as_u64().map_or(false, |p| p <= u16::MAX as u64),
        Some(_) => false,
    };
    let filepath_ok = matches!(obj.get("filepath"), None | Some(Value::String(_)));

    if !(has_all && only_known && types_ok && port_ok && filepath_ok) {
        return Err(ConfigError::Validation(INVALID_OBJECT.into()));
    }
    if let Some(Value::String(driver)) = obj.get("driver") {
        driver.parse::<crate::config::DriverKind>()?;
    }
    Ok(())
}
