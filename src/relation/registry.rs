//! Named relation factories, registered by each model in `Model::relations`.

use crate::model::{Model, ModelMeta, TableRef};
use crate::relation::RelationDescriptor;
use std::sync::Arc;

pub type RelationFactory = Arc<dyn Fn(&ModelMeta) -> RelationDescriptor + Send + Sync>;

#[derive(Clone, Default)]
pub struct RelationRegistry {
    entries: Vec<(String, RelationFactory)>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        RelationRegistry { entries: Vec::new() }
    }

    /// Register a factory under `name`, replacing an earlier one with the same name.
    pub fn define<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&ModelMeta) -> RelationDescriptor + Send + Sync + 'static,
    {
        let factory: RelationFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name.to_string(), factory)),
        }
        self
    }

    pub fn belongs_to<R: Model>(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        let columns = owned(columns);
        self.define(name, move |owner| {
            RelationDescriptor::belongs_to(owner, TableRef::of::<R>(), &borrowed(&columns))
        })
    }

    pub fn has_many<R: Model>(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        let columns = owned(columns);
        self.define(name, move |owner| {
            RelationDescriptor::has_many(owner, TableRef::of::<R>(), &borrowed(&columns))
        })
    }

    pub fn has_one<R: Model>(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        let columns = owned(columns);
        self.define(name, move |owner| {
            RelationDescriptor::has_one(owner, TableRef::of::<R>(), &borrowed(&columns))
        })
    }

    pub fn belongs_to_many<R: Model>(&mut self, name: &str, pivot_table: &str, columns: &[&str]) -> &mut Self {
        let columns = owned(columns);
        let pivot_table = pivot_table.to_string();
        self.define(name, move |owner| {
            RelationDescriptor::belongs_to_many(owner, TableRef::of::<R>(), &pivot_table, &borrowed(&columns))
        })
    }

    pub fn get(&self, name: &str) -> Option<&RelationFactory> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }
}

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

fn borrowed(columns: &[String]) -> Vec<&str> {
    columns.iter().map(String::as_str).collect()
}
