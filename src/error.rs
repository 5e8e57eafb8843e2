//! Typed errors and their classification.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),
}

#[derive(Error, Debug)]
pub enum OrmError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("validation: {0}")]
    Validation(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("database not connected")]
    NotConnected,
    #[error("driver: {0}")]
    Driver(String),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Coarse error taxonomy: bad input, wrong call order, or a failure while talking to the database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    Execution,
}

impl OrmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrmError::Validation(_) | OrmError::Config(ConfigError::Validation(_)) => ErrorKind::Validation,
            OrmError::State(_) => ErrorKind::State,
            OrmError::Config(_)
            | OrmError::Db(_)
            | OrmError::NotConnected
            | OrmError::Driver(_)
            | OrmError::Decode(_) => ErrorKind::Execution,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_state(&self) -> bool {
        self.kind() == ErrorKind::State
    }
}

pub type Result<T, E = OrmError> = std::result::Result<T, E>;
