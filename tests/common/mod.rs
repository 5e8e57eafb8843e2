#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use skyorm::{
    Database, DatabaseConfig, Dialect, Driver, ExecResult, Model, OrmError, RelationDescriptor, RelationRegistry, Row,
    TableRef,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Records every statement and answers queries from a queue of canned row sets.
pub struct RecordingDriver {
    dialect: Dialect,
    log: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
    fail_commit: AtomicBool,
}

impl RecordingDriver {
    pub fn new(dialect: Dialect) -> Self {
        RecordingDriver {
            dialect,
            log: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            fail_commit: AtomicBool::new(false),
        }
    }

    /// The next COMMIT is logged and then reported as failed.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn respond(&self, rows: Value) {
        let rows = match rows {
            Value::Array(items) => items
                .into_iter()
                .map(|r| match r {
                    Value::Object(m) => m,
                    other => panic!("row must be an object: {}", other),
                })
                .collect(),
            other => panic!("rows must be an array: {}", other),
        };
        self.responses.lock().unwrap().push_back(rows);
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(s, _)| s).collect()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn connect(&self) -> Result<(), OrmError> {
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, OrmError> {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, OrmError> {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: Some(Value::from(7)),
        })
    }

    async fn close(&self) -> Result<(), OrmError> {
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<(), OrmError> {
        self.log.lock().unwrap().push(("BEGIN".into(), Vec::new()));
        Ok(())
    }

    async fn commit(&self) -> Result<(), OrmError> {
        self.log.lock().unwrap().push(("COMMIT".into(), Vec::new()));
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(OrmError::Driver("commit rejected".into()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), OrmError> {
        self.log.lock().unwrap().push(("ROLLBACK".into(), Vec::new()));
        Ok(())
    }
}

pub async fn recording(dialect: Dialect) -> (Database, Arc<RecordingDriver>) {
    let driver = Arc::new(RecordingDriver::new(dialect));
    let db = Database::with_driver(driver.clone()).await.unwrap();
    (db, driver)
}

pub struct Category;
impl Model for Category {
    const NAME: &'static str = "Category";
}

pub struct Review;
impl Model for Review {
    const NAME: &'static str = "Review";
}

pub struct Tag;
impl Model for Tag {
    const NAME: &'static str = "Tag";
}

pub struct Product;
impl Model for Product {
    const NAME: &'static str = "Product";

    fn relations(r: &mut RelationRegistry) {
        r.belongs_to::<Category>("category", &["name"])
            .has_many::<Review>("reviews", &["id", "rating"])
            .has_one::<Review>("first_review", &["rating"])
            .belongs_to_many::<Tag>("tags", "product_tag", &["id", "label"])
            .define("maker", |owner| {
                RelationDescriptor::belongs_to(owner, TableRef::of::<Category>(), &["name"]).with_foreign_key("maker_id")
            });
    }
}

pub struct OrderModel;
impl Model for OrderModel {
    const NAME: &'static str = "OrderModel";
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE categories (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price INTEGER NOT NULL, \
     category_id INTEGER, deleted_at TEXT)",
    "CREATE TABLE reviews (id INTEGER PRIMARY KEY, product_id INTEGER NOT NULL, rating INTEGER NOT NULL)",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
    "CREATE TABLE product_tag (product_id INTEGER NOT NULL, tag_id INTEGER NOT NULL)",
    "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL, status TEXT NOT NULL)",
];

/// In-memory SQLite database with the catalog schema.
pub async fn sqlite() -> Database {
    let db = Database::connect(&DatabaseConfig::sqlite_memory()).await.unwrap();
    for stmt in SCHEMA {
        db.execute(stmt, &[]).await.unwrap();
    }
    db
}
