//! Catalog demo: connects (SKYORM_* env or in-memory SQLite), creates a few tables, then exercises
//! eager loading, aggregates, pagination and a transaction.

use serde::Deserialize;
use serde_json::json;
use skyorm::{Database, DatabaseConfig, Model, RelationRegistry};
use tracing_subscriber::EnvFilter;

struct Category;
impl Model for Category {
    const NAME: &'static str = "Category";
}

struct Review;
impl Model for Review {
    const NAME: &'static str = "Review";
}

struct Tag;
impl Model for Tag {
    const NAME: &'static str = "Tag";
}

struct ProductModel;
impl Model for ProductModel {
    const NAME: &'static str = "ProductModel";

    fn relations(r: &mut RelationRegistry) {
        r.belongs_to::<Category>("category", &["name"])
            .has_many::<Review>("reviews", &["id", "rating"])
            .belongs_to_many::<Tag>("tags", "product_tag", &["id", "label"]);
    }
}

#[derive(Debug, Deserialize)]
struct ProductView {
    name: String,
    price: f64,
    category: Option<CategoryView>,
}

#[derive(Debug, Deserialize)]
struct CategoryView {
    name: String,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE categories (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL NOT NULL, \
     category_id INTEGER, deleted_at TEXT)",
    "CREATE TABLE reviews (id INTEGER PRIMARY KEY, product_id INTEGER NOT NULL, rating INTEGER NOT NULL)",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
    "CREATE TABLE product_tag (product_id INTEGER NOT NULL, tag_id INTEGER NOT NULL)",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("skyorm=info".parse()?))
        .init();

    let config = DatabaseConfig::from_env().unwrap_or_else(|_| DatabaseConfig::sqlite_memory());
    let db = Database::connect(&config).await?;
    for stmt in SCHEMA {
        db.execute(stmt, &[]).await?;
    }

    db.transaction(|tx| async move {
        tx.execute("INSERT INTO categories (name) VALUES (?), (?)", &[json!("Home"), json!("Garden")])
            .await?;
        for (name, price, category) in [("Lamp", 30.0, 1), ("Rug", 80.0, 1), ("Hose", 15.0, 2), ("Rake", 22.5, 2)] {
            tx.query::<ProductModel>()
                .create(json!({"name": name, "price": price, "category_id": category}), Some(&tx))
                .await?;
        }
        tx.execute("INSERT INTO reviews (product_id, rating) VALUES (1, 5), (1, 4), (3, 2)", &[])
            .await?;
        tx.execute("INSERT INTO tags (label) VALUES ('indoor'), ('outdoor')", &[]).await?;
        tx.execute("INSERT INTO product_tag (product_id, tag_id) VALUES (1, 1), (2, 1), (3, 2), (4, 2)", &[])
            .await?;
        Ok(())
    })
    .await?;

    let products = db
        .query::<ProductModel>()
        .with(&["category", "reviews", "tags"])?
        .order_by("price", "DESC")?
        .get(&["*"])
        .await?;
    for p in &products {
        tracing::info!(product = %serde_json::to_string(p)?, "loaded");
    }

    let typed: Vec<ProductView> = products
        .into_iter()
        .map(|p| p.into_model())
        .collect::<Result<_, _>>()?;
    for p in &typed {
        let category = p.category.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
        tracing::info!(name = %p.name, price = p.price, category, "typed");
    }

    let totals = db
        .query::<ProductModel>()
        .sum_with("price", json!({"category_id": 1}), Some("home_total"))?
        .aggregate()
        .await?;
    tracing::info!(totals = %serde_json::to_string(&totals)?, "aggregate");

    let per_category = db
        .query::<ProductModel>()
        .count("*")?
        .avg("price")?
        .group_by(&["category.name"])
        .await?;
    tracing::info!(groups = %serde_json::to_string(&per_category)?, "grouped");

    let page = db.query::<ProductModel>().paginate(2, 3, &["id", "name"]).await?;
    tracing::info!(page = %serde_json::to_string(&page)?, "page 2");

    let created = db
        .query::<ProductModel>()
        .create(json!({"name": "Vase", "price": 12.0, "category_id": 1}), None)
        .await?;
    let updated = created.update(json!({"price": 14.0})).await?;
    tracing::info!(key = %created.key(), changed = updated.status(), old = ?updated.old_values(), "updated");
    created.soft_delete().await?;

    db.close().await?;
    Ok(())
}
