//! Rows to entities: belongsTo alias columns fold into a nested object, other relations load in batches.

use crate::driver::{Driver, Row};
use crate::error::OrmError;
use crate::model::Entity;
use crate::relation::{eager, RelationDescriptor, RelationKind};
use serde_json::{Map, Value};

/// Moves `singular_col` columns under `singular`. A null related key (no joined row) attaches `null`;
/// rows without the key column fall back to treating all-null columns as no match.
pub fn nest_belongs_to(rel: &RelationDescriptor, entity: &mut Entity) {
    let matched = entity.remove(&rel.key_alias()).map(|key| !key.is_null());
    let mut nested = Map::new();
    for column in &rel.columns {
        let value = entity.remove(&rel.column_alias(column)).unwrap_or(Value::Null);
        nested.insert(column.clone(), value);
    }
    let matched = matched.unwrap_or_else(|| !nested.values().all(Value::is_null));
    let value = if matched { Value::Object(nested) } else { Value::Null };
    entity.set(rel.attach_key(), value);
}

/// Build entities from rows, attach every relation, then drop columns only selected for matching.
pub async fn materialize(
    driver: &dyn Driver,
    relations: &[RelationDescriptor],
    rows: Vec<Row>,
    synthetic: &[String],
) -> Result<Vec<Entity>, OrmError> {
    let mut entities: Vec<Entity> = rows.into_iter().map(Entity::new).collect();
    for rel in relations.iter().filter(|r| r.kind == RelationKind::BelongsTo) {
        for entity in entities.iter_mut() {
            nest_belongs_to(rel, entity);
        }
    }
    if !entities.is_empty() {
        eager::load(driver, relations, &mut entities).await?;
    }
    for entity in entities.iter_mut() {
        for column in synthetic {
            entity.remove(column);
        }
    }
    Ok(entities)
}
