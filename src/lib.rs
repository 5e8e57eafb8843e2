//! skyorm: declarative query builder and relation loader over a narrow async driver contract.

pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod model;
pub mod query;
pub mod relation;
pub mod sql;

pub use config::{DatabaseConfig, DriverKind};
pub use database::{Database, Transaction};
pub use driver::{Driver, ExecResult, PgDriver, Row, SqliteDriver};
pub use error::{ConfigError, ErrorKind, OrmError, Result};
pub use model::{Entity, Model, ModelMeta, TableRef};
pub use query::{CreateHandle, Page, QueryBuilder, UpdateHandle};
pub use relation::{RelationDescriptor, RelationKind, RelationRegistry};
pub use sql::{Condition, Conditions, Dialect, IntoConditions, Operator};
