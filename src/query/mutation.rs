//! INSERT/UPDATE/DELETE by primary key and the handles returned for follow-up reads.

use crate::database::Database;
use crate::driver::Row;
use crate::error::OrmError;
use crate::model::{Entity, Model, ModelMeta};
use crate::sql::{compile, ident, CompileMode, Conditions, Delete, Fragment, Insert, Limit, Select, SetValue, Update};
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

/// Serializes `data` to an object and checks every key. Key order is preserved.
pub(crate) fn assignments(data: impl Serialize) -> Result<Vec<(String, Value)>, OrmError> {
    let obj = match serde_json::to_value(data)? {
        Value::Object(obj) => obj,
        other => {
            return Err(OrmError::Validation(format!("data must be an object, got {}", other)));
        }
    };
    if obj.is_empty() {
        return Err(OrmError::Validation("To create a new registry you must provide data.".into()));
    }
    for key in obj.keys() {
        ident::check_bare(key)?;
    }
    Ok(obj.into_iter().collect())
}

/// Runs the INSERT and returns the new row's key.
pub(crate) async fn insert(db: &Database, meta: &ModelMeta, data: impl Serialize) -> Result<Value, OrmError> {
    let pairs = assignments(data)?;
    let explicit_key = pairs
        .iter()
        .find(|(c, v)| *c == meta.primary_key && !v.is_null())
        .map(|(_, v)| v.clone());
    let dialect = db.dialect();
    let stmt = Insert {
        table: meta.table.clone(),
        columns: pairs.iter().map(|(c, _)| c.clone()).collect(),
        values: pairs.into_iter().map(|(_, v)| v).collect(),
        returning: dialect.returns_inserted_key().then(|| meta.primary_key.clone()),
    };
    let q = stmt.render(dialect);
    let reported = if stmt.returning.is_some() {
        let rows = db.driver().query(&q.sql, &q.params).await?;
        rows.into_iter().next().and_then(|mut r| r.shift_remove(&meta.primary_key))
    } else {
        db.driver().execute(&q.sql, &q.params).await?.last_insert_id
    };
    let key = explicit_key.or(reported).unwrap_or(Value::Null);
    tracing::debug!(table = %meta.table, key = %key, "inserted");
    Ok(key)
}

fn key_filter(meta: &ModelMeta, key: &Value) -> Result<Fragment, OrmError> {
    compile(
        &Conditions::new().eq(meta.primary_key.clone(), key.clone()),
        &meta.table,
        CompileMode::Where,
    )
}

/// Current values of `columns` for the row with `key`; `None` when the row is gone.
async fn select_columns(db: &Database, meta: &ModelMeta, key: &Value, columns: &[&str]) -> Result<Option<Row>, OrmError> {
    if columns.is_empty() {
        return Err(OrmError::Validation("at least one column must be selected".into()));
    }
    let mut select = Select::new(meta.table.clone());
    for c in columns {
        ident::check_or_star(c)?;
        select.columns.push(Fragment::sql(meta.qualify(c)));
    }
    select.filter.push(key_filter(meta, key)?);
    select.limit = Some(Limit::Count(1));
    let q = select.render(db.dialect());
    Ok(db.driver().query(&q.sql, &q.params).await?.into_iter().next())
}

async fn update_by_key(db: &Database, meta: &ModelMeta, key: &Value, sets: Vec<(String, SetValue)>) -> Result<u64, OrmError> {
    let stmt = Update {
        table: meta.table.clone(),
        sets,
        filter: vec![key_filter(meta, key)?],
        or_filter: Vec::new(),
    };
    let q = stmt.render(db.dialect());
    Ok(db.driver().execute(&q.sql, &q.params).await?.rows_affected)
}

/// Returned by `create`: the new key plus the connection it was written on.
pub struct CreateHandle<M: Model> {
    db: Database,
    meta: ModelMeta,
    key: Value,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> CreateHandle<M> {
    pub(crate) fn new(db: Database, key: Value) -> Self {
        CreateHandle {
            db,
            meta: ModelMeta::of::<M>(),
            key,
            _model: PhantomData,
        }
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    /// Re-reads the whole row.
    pub async fn reload(&self) -> Result<Option<Entity>, OrmError> {
        self.db.query::<M>().find(self.key.clone(), &["*"]).await
    }

    pub async fn get_values(&self, columns: &[&str]) -> Result<Option<Entity>, OrmError> {
        Ok(select_columns(&self.db, &self.meta, &self.key, columns).await?.map(Entity::new))
    }

    /// Captures the old values of the touched columns, then updates.
    pub async fn update(&self, data: impl Serialize) -> Result<UpdateHandle<M>, OrmError> {
        let pairs = assignments(data)?;
        let columns: Vec<&str> = pairs.iter().map(|(c, _)| c.as_str()).collect();
        let old_values = select_columns(&self.db, &self.meta, &self.key, &columns)
            .await?
            .unwrap_or_default();
        let sets = pairs.into_iter().map(|(c, v)| (c, SetValue::Param(v))).collect();
        let rows_affected = update_by_key(&self.db, &self.meta, &self.key, sets).await?;
        Ok(UpdateHandle {
            db: self.db.clone(),
            meta: self.meta.clone(),
            key: self.key.clone(),
            rows_affected,
            old_values,
            _model: PhantomData,
        })
    }

    pub async fn delete(&self) -> Result<u64, OrmError> {
        let stmt = Delete {
            table: self.meta.table.clone(),
            filter: vec![key_filter(&self.meta, &self.key)?],
            or_filter: Vec::new(),
        };
        let q = stmt.render(self.db.dialect());
        Ok(self.db.driver().execute(&q.sql, &q.params).await?.rows_affected)
    }

    /// Stamps the deleted-at column with the current time.
    pub async fn soft_delete(&self) -> Result<u64, OrmError> {
        let sets = vec![(self.meta.deleted_at.clone(), SetValue::Raw("CURRENT_TIMESTAMP"))];
        update_by_key(&self.db, &self.meta, &self.key, sets).await
    }

    /// Clears the deleted-at column.
    pub async fn restore(&self) -> Result<u64, OrmError> {
        let sets = vec![(self.meta.deleted_at.clone(), SetValue::Raw("NULL"))];
        update_by_key(&self.db, &self.meta, &self.key, sets).await
    }
}

pub struct UpdateHandle<M: Model> {
    db: Database,
    meta: ModelMeta,
    key: Value,
    rows_affected: u64,
    old_values: Row,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> UpdateHandle<M> {
    /// True when the UPDATE touched at least one row.
    pub fn status(&self) -> bool {
        self.rows_affected > 0
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    /// Values the updated columns held before the UPDATE.
    pub fn old_values(&self) -> &Row {
        &self.old_values
    }

    pub async fn get_values(&self, columns: &[&str]) -> Result<Option<Entity>, OrmError> {
        Ok(select_columns(&self.db, &self.meta, &self.key, columns).await?.map(Entity::new))
    }

    pub async fn reload(&self) -> Result<Option<Entity>, OrmError> {
        self.db.query::<M>().find(self.key.clone(), &["*"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assignments_keep_order_and_check_keys() {
        let pairs = assignments(json!({"name": "Lamp", "price": 10})).unwrap();
        assert_eq!(pairs, vec![("name".to_string(), json!("Lamp")), ("price".to_string(), json!(10))]);
        assert!(assignments(json!({})).unwrap_err().is_validation());
        assert!(assignments(json!({"name; DROP": 1})).unwrap_err().is_validation());
        assert!(assignments(json!([1, 2])).unwrap_err().is_validation());
    }
}
