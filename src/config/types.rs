//! Connection settings as read from a JSON file, the environment, or built in code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Mysql,
    Postgres,
    Sqlite,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Mysql => "mysql",
            DriverKind::Postgres => "postgres",
            DriverKind::Sqlite => "sqlite",
        }
    }

    /// Port used when the config does not name one. SQLite has none.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DriverKind::Mysql => Some(3306),
            DriverKind::Postgres => Some(5432),
            DriverKind::Sqlite => None,
        }
    }
}

impl FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(DriverKind::Mysql),
            "postgres" => Ok(DriverKind::Postgres),
            "sqlite" => Ok(DriverKind::Sqlite),
            other => Err(ConfigError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub driver: DriverKind,
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// SQLite database file; in-memory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

impl DatabaseConfig {
    /// In-memory SQLite settings, handy for tests and demos.
    pub fn sqlite_memory() -> Self {
        DatabaseConfig {
            driver: DriverKind::Sqlite,
            host: String::new(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            port: None,
            filepath: None,
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.port.or_else(|| self.driver.default_port())
    }

    /// Connection URL understood by sqlx.
    pub fn url(&self) -> String {
        match self.driver {
            DriverKind::Sqlite => match &self.filepath {
                Some(path) => format!("sqlite://{}", path),
                None => "sqlite::memory:".to_string(),
            },
            DriverKind::Mysql | DriverKind::Postgres => format!(
                "{}://{}:{}@{}:{}/{}",
                self.driver,
                self.user,
                self.password,
                self.host,
                self.port().unwrap_or_default(),
                self.database
            ),
        }
    }
}
