//! SQLite adapter over one sqlx connection. `sqlite::memory:` keeps its data for the life of the connection.

use crate::driver::{Driver, ExecResult, Row};
use crate::error::OrmError;
use crate::sql::Dialect;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use tokio::sync::Mutex;

pub struct SqliteDriver {
    url: String,
    conn: Mutex<Option<SqliteConnection>>,
}

impl SqliteDriver {
    pub fn new(url: impl Into<String>) -> Self {
        SqliteDriver {
            url: url.into(),
            conn: Mutex::new(None),
        }
    }

    /// Private in-memory database.
    pub fn memory() -> Self {
        SqliteDriver::new("sqlite::memory:")
    }

    async fn run(&self, sql: &str) -> Result<(), OrmError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(OrmError::NotConnected)?;
        tracing::debug!(sql = %sql, "statement");
        sqlx::query(sql).execute(&mut *conn).await?;
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    v: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match v {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(v.to_string()),
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self) -> Result<(), OrmError> {
        let opts = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| OrmError::Driver(format!("invalid sqlite url: {}", e)))?
            .create_if_missing(true);
        let conn = opts.connect().await?;
        *self.conn.lock().await = Some(conn);
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, OrmError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(OrmError::NotConnected)?;
        tracing::debug!(sql = %sql, params = ?params, "query");
        let mut query = sqlx::query(sql);
        for p in params {
            query = bind_value(query, p);
        }
        let rows = query.fetch_all(&mut *conn).await.map_err(|e| {
            tracing::warn!(sql = %sql, error = %e, "query failed");
            e
        })?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, OrmError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(OrmError::NotConnected)?;
        tracing::debug!(sql = %sql, params = ?params, "execute");
        let mut query = sqlx::query(sql);
        for p in params {
            query = bind_value(query, p);
        }
        let done = query.execute(&mut *conn).await.map_err(|e| {
            tracing::warn!(sql = %sql, error = %e, "execute failed");
            e
        })?;
        Ok(ExecResult {
            rows_affected: done.rows_affected(),
            last_insert_id: Some(Value::Number(done.last_insert_rowid().into())),
        })
    }

    async fn close(&self) -> Result<(), OrmError> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().await?;
        }
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<(), OrmError> {
        self.run("BEGIN").await
    }

    async fn commit(&self) -> Result<(), OrmError> {
        self.run("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), OrmError> {
        self.run("ROLLBACK").await
    }
}

fn row_to_json(row: &SqliteRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

/// Decodes by the value's storage class rather than the declared column type.
fn cell_to_value(row: &SqliteRow, idx: usize) -> Value {
    use sqlx::{Row as _, TypeInfo, ValueRef};
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };
    match type_name.as_str() {
        "INTEGER" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(idx)
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(idx)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
