//! PostgreSQL adapter over one sqlx connection.

use crate::driver::{Driver, ExecResult, Row};
use crate::error::OrmError;
use crate::sql::Dialect;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgTypeInfo, Postgres};
use sqlx::{ConnectOptions, Connection, Database};
use std::str::FromStr;
use tokio::sync::Mutex;

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    Json(Value),
}

impl PgBindValue {
    /// Strings bind as TEXT.
    pub fn from_json(v: &Value) -> Self {
        Self::convert(v, false)
    }

    /// Like [`PgBindValue::from_json`], but strings that parse as a UUID bind as `UUID`.
    pub fn from_json_detecting_uuids(v: &Value) -> Self {
        Self::convert(v, true)
    }

    fn convert(v: &Value, detect_uuids: bool) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) if detect_uuids => match uuid::Uuid::parse_str(s) {
                Ok(u) => PgBindValue::Uuid(u),
                Err(_) => PgBindValue::String(s.clone()),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf)?,
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => PgTypeInfo::with_name("TEXT"),
            PgBindValue::Bool(_) => PgTypeInfo::with_name("BOOL"),
            PgBindValue::I64(_) => PgTypeInfo::with_name("INT8"),
            PgBindValue::F64(_) => PgTypeInfo::with_name("FLOAT8"),
            PgBindValue::Uuid(_) => PgTypeInfo::with_name("UUID"),
            PgBindValue::Json(_) => PgTypeInfo::with_name("JSONB"),
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

/// Holds at most one live connection; `connect` replaces it, `close` drops it.
pub struct PgDriver {
    url: String,
    conn: Mutex<Option<PgConnection>>,
    detect_uuids: bool,
}

impl PgDriver {
    pub fn new(url: impl Into<String>) -> Self {
        PgDriver {
            url: url.into(),
            conn: Mutex::new(None),
            detect_uuids: false,
        }
    }

    /// Bind UUID-shaped strings as `UUID`, for schemas keyed by uuid columns.
    /// Comparing such a string against a text column then fails, so this is opt-in.
    pub fn detect_uuids(mut self, on: bool) -> Self {
        self.detect_uuids = on;
        self
    }

    fn bind_value(&self, v: &Value) -> PgBindValue {
        if self.detect_uuids {
            PgBindValue::from_json_detecting_uuids(v)
        } else {
            PgBindValue::from_json(v)
        }
    }

    async fn run(&self, sql: &str) -> Result<(), OrmError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(OrmError::NotConnected)?;
        tracing::debug!(sql = %sql, "statement");
        sqlx::query(sql).execute(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl Driver for PgDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&self) -> Result<(), OrmError> {
        let opts = PgConnectOptions::from_str(&self.url)
            .map_err(|e| OrmError::Driver(format!("invalid postgres url: {}", e)))?;
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
            query = query.bind(self.bind_value(p));
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
            query = query.bind(self.bind_value(p));
        }
        let done = query.execute(&mut *conn).await.map_err(|e| {
            tracing::warn!(sql = %sql, error = %e, "execute failed");
            e
        })?;
        Ok(ExecResult {
            rows_affected: done.rows_affected(),
            last_insert_id: None,
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

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    // NUMERIC: aggregates such as SUM(bigint) and AVG(..) come back as this.
    if let Ok(Some(d)) = row.try_get::<Option<rust_decimal::Decimal>, _>(name) {
        if d.fract().is_zero() {
            if let Some(i) = d.to_i64() {
                return Value::Number(i.into());
            }
        }
        if let Some(n) = d.to_f64().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
        return Value::String(d.to_string());
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bind_values_follow_json_shape() {
        assert!(matches!(PgBindValue::from_json(&json!(null)), PgBindValue::Null));
        assert!(matches!(PgBindValue::from_json(&json!(7)), PgBindValue::I64(7)));
        assert!(matches!(PgBindValue::from_json(&json!(1.5)), PgBindValue::F64(_)));
        assert!(matches!(PgBindValue::from_json(&json!("Lamp")), PgBindValue::String(_)));
        assert!(matches!(
            PgBindValue::from_json(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8")),
            PgBindValue::String(_)
        ));
        assert!(matches!(PgBindValue::from_json(&json!({"a": 1})), PgBindValue::Json(_)));
    }

    #[test]
    fn uuid_strings_bind_as_uuid_only_when_enabled() {
        let id = json!("67e55044-10b1-426f-9247-bb680e5fe0c8");
        let plain = PgDriver::new("postgres://localhost/skyorm");
        assert!(matches!(plain.bind_value(&id), PgBindValue::String(_)));

        let keyed = PgDriver::new("postgres://localhost/skyorm").detect_uuids(true);
        assert!(matches!(keyed.bind_value(&id), PgBindValue::Uuid(_)));
        assert!(matches!(keyed.bind_value(&json!("Lamp")), PgBindValue::String(_)));
    }

    #[tokio::test]
    async fn queries_before_connect_fail() {
        let driver = PgDriver::new("postgres://localhost/skyorm");
        let err = driver.query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::NotConnected));
    }
}
