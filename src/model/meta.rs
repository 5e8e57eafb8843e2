//! Per-model static facts: table, primary key, soft-delete column and declared relations.

use crate::model::naming::table_name_for;
use crate::relation::RelationRegistry;

/// Implemented by each application model type.
///
/// ```ignore
/// struct Product;
/// impl Model for Product {
///     const NAME: &'static str = "Product";
///     fn relations(r: &mut RelationRegistry) {
///         r.belongs_to::<Category>("category", &["name"]);
///     }
/// }
/// ```
pub trait Model: 'static {
    const NAME: &'static str;
    /// Explicit table name; derived from `NAME` when absent.
    const TABLE: Option<&'static str> = None;
    const PRIMARY_KEY: &'static str = "id";
    const DELETED_AT: &'static str = "deleted_at";

    fn relations(_registry: &mut RelationRegistry) {}

    fn table() -> String {
        Self::TABLE.map(str::to_string).unwrap_or_else(|| table_name_for(Self::NAME))
    }
}

/// Table and key of a model, enough to point a relation at it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub primary_key: String,
}

impl TableRef {
    pub fn of<M: Model>() -> Self {
        TableRef {
            table: M::table(),
            primary_key: M::PRIMARY_KEY.to_string(),
        }
    }
}

/// Metadata snapshot built fresh for every query.
#[derive(Clone)]
pub struct ModelMeta {
    pub name: &'static str,
    pub table: String,
    pub primary_key: String,
    pub deleted_at: String,
    pub relations: RelationRegistry,
}

impl ModelMeta {
    pub fn of<M: Model>() -> Self {
        let mut relations = RelationRegistry::new();
        M::relations(&mut relations);
        ModelMeta {
            name: M::NAME,
            table: M::table(),
            primary_key: M::PRIMARY_KEY.to_string(),
            deleted_at: M::DELETED_AT.to_string(),
            relations,
        }
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef {
            table: self.table.clone(),
            primary_key: self.primary_key.clone(),
        }
    }

    /// `table.column`, or the column as given when it is already qualified.
    pub fn qualify(&self, column: &str) -> String {
        crate::sql::ident::qualify(&self.table, column)
    }
}

impl std::fmt::Debug for ModelMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelMeta")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("relations", &self.relations.names())
            .finish()
    }
}
