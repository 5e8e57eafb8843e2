//! Turns relation names into descriptors by registry lookup. Nothing is cached between calls.

use crate::error::OrmError;
use crate::model::ModelMeta;
use crate::relation::RelationDescriptor;

pub fn resolve(meta: &ModelMeta, names: &[&str]) -> Result<Vec<RelationDescriptor>, OrmError> {
    names
        .iter()
        .map(|name| {
            let factory = meta.relations.get(name).ok_or_else(|| {
                OrmError::Validation(format!("relation \"{}\" is not defined on {}", name, meta.name))
            })?;
            let mut descriptor = factory(meta);
            descriptor.name = name.to_string();
            descriptor.validate()?;
            Ok(descriptor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::relation::{RelationKind, RelationRegistry};

    struct Category;
    impl Model for Category {
        const NAME: &'static str = "Category";
    }

    struct Tag;
    impl Model for Tag {
        const NAME: &'static str = "Tag";
    }

    struct Product;
    impl Model for Product {
        const NAME: &'static str = "Product";
        fn relations(r: &mut RelationRegistry) {
            r.belongs_to::<Category>("category", &["name"])
                .belongs_to_many::<Tag>("tags", "product_tag", &["id", "name"])
                .define("maker", |owner| {
                    RelationDescriptor::belongs_to(owner, crate::model::TableRef::of::<Category>(), &["name"])
                        .with_foreign_key("maker_id")
                });
        }
    }

    #[test]
    fn resolves_registered_relations_in_order() {
        let meta = ModelMeta::of::<Product>();
        let rels = resolve(&meta, &["tags", "category", "maker"]).unwrap();
        assert_eq!(rels[0].kind, RelationKind::BelongsToMany);
        assert_eq!(rels[0].name, "tags");
        assert_eq!(rels[1].foreign_key, "category_id");
        assert_eq!(rels[2].foreign_key, "maker_id");
    }

    #[test]
    fn unknown_relation_is_rejected() {
        let meta = ModelMeta::of::<Product>();
        let err = resolve(&meta, &["supplier"]).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("supplier"));
    }
}
