mod common;

use common::{sqlite, Category, OrderModel, Product};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::{json, Value};
use skyorm::{Database, OrmError};

async fn seed_catalog(db: &Database) {
    db.execute("INSERT INTO categories (name) VALUES ('Home'), ('Garden')", &[])
        .await
        .unwrap();
    db.execute(
        "INSERT INTO products (name, price, category_id) VALUES ('Lamp', 30, 1), ('Rug', 80, 1), ('Hose', 15, 2), ('Orphan', 5, NULL)",
        &[],
    )
    .await
    .unwrap();
    db.execute("INSERT INTO reviews (product_id, rating) VALUES (1, 5), (1, 4), (3, 2)", &[])
        .await
        .unwrap();
    db.execute("INSERT INTO tags (label) VALUES ('indoor'), ('sale')", &[])
        .await
        .unwrap();
    db.execute(
        "INSERT INTO product_tag (product_id, tag_id) VALUES (1, 2), (1, 1), (2, 1)",
        &[],
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn create_then_find_round_trips() {
    let db = sqlite().await;
    let created = db
        .query::<Product>()
        .create(json!({"name": "A", "price": 10}), None)
        .await
        .unwrap();
    assert_eq!(created.key(), &json!(1));

    let found = db.query::<Product>().find(created.key().clone(), &["*"]).await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&json!("A")));
    assert_eq!(found.get("price"), Some(&json!(10)));

    assert!(db.query::<Product>().find(999, &["*"]).await.unwrap().is_none());
}

#[tokio::test]
async fn pagination_reports_page_metadata() {
    let db = sqlite().await;
    for i in 1..=25 {
        db.query::<Product>()
            .create(json!({"name": format!("P{}", i), "price": i}), None)
            .await
            .unwrap();
    }

    let first = db.query::<Product>().paginate(1, 10, &["*"]).await.unwrap();
    assert_eq!(first.total, 25);
    assert_eq!(first.last_page, 3);
    assert_eq!(first.count, 10);
    assert_eq!(first.data[0].get("name"), Some(&json!("P1")));

    let last = db.query::<Product>().paginate(3, 10, &["id"]).await.unwrap();
    assert_eq!(last.count, 5);
    assert_eq!(last.data[0].get("id"), Some(&json!(21)));

    let filtered = db
        .query::<Product>()
        .r#where(json!({"price": ["<=", 12]}))
        .unwrap()
        .paginate(2, 5, &["id"])
        .await
        .unwrap();
    assert_eq!((filtered.total, filtered.last_page, filtered.count), (12, 3, 5));
}

#[tokio::test]
async fn conditional_sum_counts_only_matching_rows() {
    let db = sqlite().await;
    db.execute(
        "INSERT INTO orders (amount, status) VALUES (10, 'paid'), (5, 'pending')",
        &[],
    )
    .await
    .unwrap();

    let row = db
        .query::<OrderModel>()
        .sum_with("amount", json!({"status": "paid"}), None)
        .unwrap()
        .aggregate()
        .await
        .unwrap();
    assert_eq!(row.get("sum_amount_0"), Some(&json!(10)));

    let row = db
        .query::<OrderModel>()
        .count("*")
        .unwrap()
        .count_with("id", json!({"status": "pending"}), Some("pending"))
        .unwrap()
        .aggregate()
        .await
        .unwrap();
    assert_eq!(row.get("count_0"), Some(&json!(2)));
    assert_eq!(row.get("pending"), Some(&json!(1)));

    let none = db
        .query::<OrderModel>()
        .sum_with("amount", json!({"status": "refunded"}), Some("refunded"))
        .unwrap()
        .aggregate()
        .await
        .unwrap();
    assert_eq!(none.get("refunded"), Some(&json!(0)));
}

#[derive(Debug, Deserialize, PartialEq)]
struct CategoryName {
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ProductWithCategory {
    id: i64,
    name: String,
    category: Option<CategoryName>,
}

#[tokio::test]
async fn belongs_to_nests_the_parent_row() {
    let db = sqlite().await;
    seed_catalog(&db).await;

    let lamp = db
        .query::<Product>()
        .with(&["category"])
        .unwrap()
        .find(1, &["id", "name"])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lamp.get("category"), Some(&json!({"name": "Home"})));
    assert!(!lamp.contains("category_name"));
    assert_eq!(
        lamp.into_model::<ProductWithCategory>().unwrap(),
        ProductWithCategory { id: 1, name: "Lamp".into(), category: Some(CategoryName { name: "Home".into() }) }
    );

    let orphan = db
        .query::<Product>()
        .with(&["category"])
        .unwrap()
        .r#where(json!({"name": "Orphan"}))
        .unwrap()
        .get_one(&["id", "name"])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orphan.get("category"), Some(&Value::Null));
    assert!(!orphan.contains("category_name"));
}

#[tokio::test]
async fn has_many_and_belongs_to_many_attach_children() {
    let db = sqlite().await;
    seed_catalog(&db).await;

    let products = db
        .query::<Product>()
        .with(&["reviews", "tags"])
        .unwrap()
        .r#where(json!({"id": ["IN", [1, 2, 3]]}))
        .unwrap()
        .get(&["id", "name"])
        .await
        .unwrap();

    let names: Vec<_> = products.iter().map(|p| p.get("name").cloned().unwrap()).collect();
    assert_eq!(names, vec![json!("Lamp"), json!("Rug"), json!("Hose")]);
    assert_eq!(
        products[0].get("reviews"),
        Some(&json!([{"id": 1, "rating": 5}, {"id": 2, "rating": 4}]))
    );
    assert_eq!(products[1].get("reviews"), Some(&json!([])));
    assert_eq!(
        products[0].get("tags"),
        Some(&json!([{"id": 1, "label": "indoor"}, {"id": 2, "label": "sale"}]))
    );
    assert_eq!(products[1].get("tags"), Some(&json!([{"id": 1, "label": "indoor"}])));
    assert_eq!(products[2].get("tags"), Some(&json!([])));
}

#[tokio::test]
async fn exist_reports_presence_without_error() {
    let db = sqlite().await;
    seed_catalog(&db).await;
    assert!(db
        .query::<Product>()
        .r#where(json!({"name": "Lamp"}))
        .unwrap()
        .exist()
        .await
        .unwrap());
    assert!(!db
        .query::<Product>()
        .r#where(json!({"name": "Nothing"}))
        .unwrap()
        .exist()
        .await
        .unwrap());
}

#[tokio::test]
async fn group_by_relation_counts_per_parent() {
    let db = sqlite().await;
    seed_catalog(&db).await;
    let groups = db
        .query::<Product>()
        .count("*")
        .unwrap()
        .order_by("categories.name", "ASC")
        .unwrap()
        .group_by(&["category.name"])
        .await
        .unwrap();
    let groups: Vec<Value> = groups.into_iter().map(Value::from).collect();
    assert_eq!(
        groups,
        vec![
            json!({"category_name": "Garden", "count_0": 1}),
            json!({"category_name": "Home", "count_0": 2}),
        ]
    );
}

#[tokio::test]
async fn update_captures_old_values() {
    let db = sqlite().await;
    let created = db
        .query::<Product>()
        .create(json!({"name": "Lamp", "price": 10}), None)
        .await
        .unwrap();

    let updated = created.update(json!({"price": 12})).await.unwrap();
    assert!(updated.status());
    assert_eq!(Value::Object(updated.old_values().clone()), json!({"price": 10}));

    let now = updated.get_values(&["name", "price"]).await.unwrap().unwrap();
    assert_eq!(Value::from(now), json!({"name": "Lamp", "price": 12}));
    let reloaded = created.reload().await.unwrap().unwrap();
    assert_eq!(reloaded.get("price"), Some(&json!(12)));
}

#[tokio::test]
async fn soft_delete_restore_and_delete() {
    let db = sqlite().await;
    let created = db
        .query::<Product>()
        .create(json!({"name": "Lamp", "price": 10}), None)
        .await
        .unwrap();

    assert_eq!(created.soft_delete().await.unwrap(), 1);
    let row = created.get_values(&["deleted_at"]).await.unwrap().unwrap();
    assert!(row.get("deleted_at").map_or(false, |v| !v.is_null()));

    assert_eq!(created.restore().await.unwrap(), 1);
    let row = created.get_values(&["deleted_at"]).await.unwrap().unwrap();
    assert_eq!(row.get("deleted_at"), Some(&Value::Null));

    assert_eq!(created.delete().await.unwrap(), 1);
    assert!(created.reload().await.unwrap().is_none());
}

#[tokio::test]
async fn failed_transaction_rolls_back_its_writes() {
    let db = sqlite().await;

    let err = db
        .transaction(|tx| async move {
            tx.query::<Category>().create(json!({"name": "Temp"}), Some(&tx)).await?;
            Err::<(), _>(OrmError::Validation("stop".into()))
        })
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(!db
        .query::<Category>()
        .r#where(json!({"name": "Temp"}))
        .unwrap()
        .exist()
        .await
        .unwrap());

    let key = db
        .transaction(|tx| async move {
            let created = tx.query::<Category>().create(json!({"name": "Kept"}), Some(&tx)).await?;
            Ok(created.key().clone())
        })
        .await
        .unwrap();
    let kept = db.query::<Category>().find(key, &["name"]).await.unwrap().unwrap();
    assert_eq!(kept.get("name"), Some(&json!("Kept")));
}

#[tokio::test]
async fn raw_queries_bind_parameters() {
    let db = sqlite().await;
    seed_catalog(&db).await;
    let rows = db
        .raw_entities("SELECT name FROM products WHERE price > ? ORDER BY price", &[json!(20)])
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned().unwrap()).collect();
    assert_eq!(names, vec![json!("Lamp"), json!("Rug")]);
}
