//! Per-engine literal generation: placeholders, pagination clause, inserted-key reporting.

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// `?` placeholders, `LIMIT offset, count` with string-typed bounds.
    MySql,
    /// `$n` placeholders, `LIMIT count OFFSET offset`, keys via `RETURNING`.
    Postgres,
    /// `?` placeholders, `LIMIT offset, count` with integer bounds.
    Sqlite,
}

impl Dialect {
    /// Placeholder for the `n`-th parameter (1-based).
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", n),
        }
    }

    /// Pagination clause given already-rendered placeholders for offset and count.
    pub fn limit_offset(&self, offset_ph: &str, count_ph: &str) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => format!("LIMIT {}, {}", offset_ph, count_ph),
            Dialect::Postgres => format!("LIMIT {} OFFSET {}", count_ph, offset_ph),
        }
    }

    /// Bound value for a pagination bound.
    pub fn pagination_value(&self, n: u64) -> Value {
        match self {
            Dialect::MySql => Value::String(n.to_string()),
            Dialect::Postgres | Dialect::Sqlite => Value::Number(n.into()),
        }
    }

    /// Whether an INSERT should ask for its key back with `RETURNING`.
    pub fn returns_inserted_key(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}
