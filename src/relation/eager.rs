//! Batched loading for hasMany, hasOne and belongsToMany.
//!
//! One `IN (...)` query per relation covers the whole parent set (two for belongsToMany).
//! Children come back ordered by the related primary key; parents keep their order.

use crate::driver::{Driver, Row};
use crate::error::OrmError;
use crate::model::Entity;
use crate::relation::{RelationDescriptor, RelationKind};
use crate::sql::{compile, CompileMode, Conditions, Direction, Fragment, OrderBy, Select};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Match key for a column value. Numbers and numeric strings compare equal.
fn match_key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn distinct_keys<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for v in values.flatten() {
        if let Some(k) = match_key(v) {
            if seen.insert(k) {
                out.push(v.clone());
            }
        }
    }
    out
}

/// Select list for the related table, plus the extra column matching needs when the caller did not ask for it.
fn related_columns(rel: &RelationDescriptor, needed: &str) -> (Vec<Fragment>, bool) {
    let star = rel.columns.iter().any(|c| c == "*");
    let mut cols: Vec<Fragment> = rel
        .columns
        .iter()
        .map(|c| Fragment::sql(format!("{}.{}", rel.related_table, c)))
        .collect();
    let added = !star && !rel.columns.iter().any(|c| c == needed);
    if added {
        cols.push(Fragment::sql(format!("{}.{}", rel.related_table, needed)));
    }
    (cols, added)
}

async fn fetch_in(
    driver: &dyn Driver,
    table: &str,
    columns: Vec<Fragment>,
    column: &str,
    keys: Vec<Value>,
    order_by: Option<&str>,
) -> Result<Vec<Row>, OrmError> {
    let mut select = Select::new(table);
    select.columns = columns;
    select
        .filter
        .push(compile(&Conditions::new().is_in(column, keys), table, CompileMode::Where)?);
    select.order_by = order_by.map(|c| OrderBy {
        column: format!("{}.{}", table, c),
        direction: Direction::Asc,
    });
    let q = select.render(driver.dialect());
    driver.query(&q.sql, &q.params).await
}

pub async fn load(driver: &dyn Driver, relations: &[RelationDescriptor], parents: &mut [Entity]) -> Result<(), OrmError> {
    for rel in relations {
        match rel.kind {
            RelationKind::BelongsTo => {}
            RelationKind::HasMany | RelationKind::HasOne => load_children(driver, rel, parents).await?,
            RelationKind::BelongsToMany => load_through_pivot(driver, rel, parents).await?,
        }
    }
    Ok(())
}

fn attach(rel: &RelationDescriptor, parent: &mut Entity, children: Vec<Row>) {
    let value = if rel.kind == RelationKind::HasOne {
        children.into_iter().next().map(Value::Object).unwrap_or(Value::Null)
    } else {
        Value::Array(children.into_iter().map(Value::Object).collect())
    };
    parent.set(rel.attach_key(), value);
}

async fn load_children(driver: &dyn Driver, rel: &RelationDescriptor, parents: &mut [Entity]) -> Result<(), OrmError> {
    let keys = distinct_keys(parents.iter().map(|p| p.get(&rel.local_key)));
    let mut grouped: HashMap<String, Vec<Row>> = HashMap::new();
    if !keys.is_empty() {
        let (columns, strip) = related_columns(rel, &rel.foreign_key);
        let rows = fetch_in(driver, &rel.related_table, columns, &rel.foreign_key, keys, Some(&rel.primary_key)).await?;
        for mut row in rows {
            let key = row.get(&rel.foreign_key).and_then(match_key);
            if strip {
                row.shift_remove(&rel.foreign_key);
            }
            if let Some(k) = key {
                grouped.entry(k).or_default().push(row);
            }
        }
    }
    for parent in parents.iter_mut() {
        let children = parent
            .get(&rel.local_key)
            .and_then(match_key)
            .and_then(|k| grouped.get(&k).cloned())
            .unwrap_or_default();
        attach(rel, parent, children);
    }
    Ok(())
}

async fn load_through_pivot(driver: &dyn Driver, rel: &RelationDescriptor, parents: &mut [Entity]) -> Result<(), OrmError> {
    let (pivot, pivot_fk, pivot_rk) = match (&rel.pivot_table, &rel.pivot_foreign_key, &rel.pivot_related_key) {
        (Some(t), Some(f), Some(r)) => (t.as_str(), f.as_str(), r.as_str()),
        _ => return Err(OrmError::Validation(format!("relation {} needs a pivot table", rel.name))),
    };
    let keys = distinct_keys(parents.iter().map(|p| p.get(&rel.local_key)));

    // owner key -> linked related keys
    let mut links: HashMap<String, HashSet<String>> = HashMap::new();
    let mut related_by_key: HashMap<String, Row> = HashMap::new();
    let mut related_order: Vec<String> = Vec::new();

    if !keys.is_empty() {
        let pivot_cols = vec![
            Fragment::sql(format!("{}.{}", pivot, pivot_fk)),
            Fragment::sql(format!("{}.{}", pivot, pivot_rk)),
        ];
        let pivot_rows = fetch_in(driver, pivot, pivot_cols, pivot_fk, keys, None).await?;
        let related_keys = distinct_keys(pivot_rows.iter().map(|r| r.get(pivot_rk)));
        for row in &pivot_rows {
            if let (Some(owner), Some(related)) = (
                row.get(pivot_fk).and_then(match_key),
                row.get(pivot_rk).and_then(match_key),
            ) {
                links.entry(owner).or_default().insert(related);
            }
        }
        if !related_keys.is_empty() {
            let (columns, strip) = related_columns(rel, &rel.primary_key);
            let rows = fetch_in(
                driver,
                &rel.related_table,
                columns,
                &rel.primary_key,
                related_keys,
                Some(&rel.primary_key),
            )
            .await?;
            for mut row in rows {
                let key = row.get(&rel.primary_key).and_then(match_key);
                if strip {
                    row.shift_remove(&rel.primary_key);
                }
                if let Some(k) = key {
                    related_order.push(k.clone());
                    related_by_key.insert(k, row);
                }
            }
        }
    }

    for parent in parents.iter_mut() {
        let linked = parent.get(&rel.local_key).and_then(match_key).and_then(|k| links.get(&k));
        let children = match linked {
            Some(set) => related_order
                .iter()
                .filter(|k| set.contains(*k))
                .filter_map(|k| related_by_key.get(k).cloned())
                .collect(),
            None => Vec::new(),
        };
        attach(rel, parent, children);
    }
    Ok(())
}
