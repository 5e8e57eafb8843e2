//! Page envelope and page arithmetic.

use crate::driver::Row;
use crate::error::OrmError;
use crate::model::Entity;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub data: Vec<Entity>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    /// Rows on this page.
    pub count: u64,
}

impl Page {
    pub fn new(data: Vec<Entity>, total: u64, per_page: u64, current_page: u64) -> Self {
        let count = data.len() as u64;
        Page {
            data,
            total,
            per_page,
            current_page,
            last_page: last_page(total, per_page),
            count,
        }
    }
}

/// Rejects pages below 1 and empty pages; returns the row offset.
pub fn offset(page: u64, per_page: u64) -> Result<u64, OrmError> {
    if page < 1 {
        return Err(OrmError::Validation(format!("page must be 1 or greater. Received: {}", page)));
    }
    if per_page < 1 {
        return Err(OrmError::Validation(format!("per_page must be 1 or greater. Received: {}", per_page)));
    }
    (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| OrmError::Validation("page offset overflows".into()))
}

pub fn last_page(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

/// Reads the `total` column of a COUNT row; engines report it as an integer, a decimal or a string.
pub fn read_total(row: Option<&Row>) -> Result<u64, OrmError> {
    let value = row.and_then(|r| r.get("total")).unwrap_or(&Value::Null);
    let total = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    total.ok_or_else(|| OrmError::Driver(format!("unexpected COUNT result: {}", value)))
}
