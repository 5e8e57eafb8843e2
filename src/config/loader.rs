//! Load `DatabaseConfig` from a JSON file or from `SKYORM_*` environment variables.

use crate::config::{validate, DatabaseConfig, DriverKind};
use crate::error::ConfigError;
use serde_json::Value;
use std::path::Path;

impl DatabaseConfig {
    /// Read a JSON config file and check its shape.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Load("Database configuration file does not exist".into()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
        let obj = match value {
            Value::Object(obj) => obj,
            _ => {
                return Err(ConfigError::Validation(
                    "The contents of the file do not contain a valid object".into(),
                ))
            }
        };
        validate(&obj)?;
        serde_json::from_value(Value::Object(obj)).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Read `SKYORM_*` variables, loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let driver: DriverKind = get("SKYORM_DRIVER")
            .ok_or_else(|| ConfigError::Load("SKYORM_DRIVER is not set".into()))?
            .parse()?;
        let port = match get("SKYORM_PORT") {
            Some(p) => Some(
                p.parse::<u16>()
                    .map_err(|_| ConfigError::Validation(format!("SKYORM_PORT is not a port: {}", p)))?,
            ),
            None => None,
        };
        let required = |key: &str| -> Result<String, ConfigError> {
            match get(key) {
                Some(v) => Ok(v),
                None if driver == DriverKind::Sqlite => Ok(String::new()),
                None => Err(ConfigError::Load(format!("{} is not set", key))),
            }
        };
        Ok(DatabaseConfig {
            driver,
            host: required("SKYORM_HOST")?,
            database: required("SKYORM_DATABASE")?,
            user: required("SKYORM_USER")?,
            password: get("SKYORM_PASSWORD").unwrap_or_default(),
            port,
            filepath: get("SKYORM_FILEPATH"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn loads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"driver": "postgres", "host": "db", "database": "store", "user": "app", "password": "pw", "port": 6432}}"#
        )
        .unwrap();
        let config = DatabaseConfig::from_path(file.path()).unwrap();
        assert_eq!(config.driver, DriverKind::Postgres);
        assert_eq!(config.port, Some(6432));
        assert_eq!(config.url(), "postgres://app:pw@db:6432/store");
    }

    #[test]
    fn missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatabaseConfig::from_path(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn malformed_contents_are_rejected() {
        assert!(matches!(DatabaseConfig::from_json_str("not json"), Err(ConfigError::Load(_))));
        assert!(matches!(DatabaseConfig::from_json_str("[1, 2]"), Err(ConfigError::Validation(_))));
        assert!(matches!(
            DatabaseConfig::from_json_str(r#"{"driver": "sqlite"}"#),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn reads_variables() {
        let vars: HashMap<&str, &str> = [
            ("SKYORM_DRIVER", "sqlite"),
            ("SKYORM_FILEPATH", "catalog.db"),
        ]
        .into_iter()
        .collect();
        let config = DatabaseConfig::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.driver, DriverKind::Sqlite);
        assert_eq!(config.url(), "sqlite://catalog.db");

        let vars: HashMap<&str, &str> = [("SKYORM_DRIVER", "postgres"), ("SKYORM_HOST", "db")].into_iter().collect();
        let err = DatabaseConfig::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::Load(m) if m.contains("SKYORM_DATABASE")));
    }
}
