//! Driver contract: the only thing the query core knows about a database engine.

mod postgres;
mod sqlite;

pub use postgres::{PgBindValue, PgDriver};
pub use sqlite::SqliteDriver;

use crate::error::OrmError;
use crate::sql::Dialect;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One result row: column name → value, in select-list order.
pub type Row = Map<String, Value>;

/// Outcome of a statement that returns no rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Auto-increment id reported by the engine, when it has one.
    pub last_insert_id: Option<Value>,
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn connect(&self) -> Result<(), OrmError>;

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, OrmError>;

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, OrmError>;

    async fn close(&self) -> Result<(), OrmError>;

    async fn begin_transaction(&self) -> Result<(), OrmError>;

    async fn commit(&self) -> Result<(), OrmError>;

    async fn rollback(&self) -> Result<(), OrmError>;
}
