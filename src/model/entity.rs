//! Row-shaped model instances. Every fetch builds fresh, unlinked values.

use crate::driver::Row;
use crate::error::OrmError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    attributes: Row,
}

impl Entity {
    pub fn new(attributes: Row) -> Self {
        Entity { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    pub fn into_attributes(self) -> Row {
        self.attributes
    }

    /// Deserialize into a typed struct, nested relations included.
    pub fn into_model<T: DeserializeOwned>(self) -> Result<T, OrmError> {
        Ok(serde_json::from_value(Value::Object(self.attributes))?)
    }
}

impl From<Row> for Entity {
    fn from(attributes: Row) -> Self {
        Entity { attributes }
    }
}

impl From<Entity> for Value {
    fn from(e: Entity) -> Self {
        Value::Object(e.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Category {
        name: String,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Product {
        id: i64,
        name: String,
        category: Option<Category>,
    }

    fn row(v: Value) -> Row {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn converts_into_typed_model() {
        let e = Entity::new(row(json!({"id": 1, "name": "Lamp", "category": {"name": "Home"}})));
        let p: Product = e.into_model().unwrap();
        assert_eq!(
            p,
            Product { id: 1, name: "Lamp".into(), category: Some(Category { name: "Home".into() }) }
        );
    }

    #[test]
    fn remove_keeps_column_order() {
        let mut e = Entity::new(row(json!({"id": 1, "category_name": "Home", "name": "Lamp"})));
        assert_eq!(e.remove("category_name"), Some(json!("Home")));
        assert_eq!(e.attributes().keys().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(serde_json::to_value(&e).unwrap(), json!({"id": 1, "name": "Lamp"}));
    }
}
