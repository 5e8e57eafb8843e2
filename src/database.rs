//! Process-wide database handle. One logical connection, shared by every query built from it.

use crate::config::{DatabaseConfig, DriverKind};
use crate::driver::{Driver, ExecResult, PgDriver, Row, SqliteDriver};
use crate::error::{ConfigError, OrmError};
use crate::model::{Entity, Model};
use crate::query::QueryBuilder;
use crate::sql::Dialect;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct Database {
    driver: Arc<dyn Driver>,
    /// Rollback queued by an abandoned transaction; awaited before the next BEGIN.
    pending_rollback: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Database {
    /// Build the bundled driver for `config` and connect it.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, OrmError> {
        let driver: Arc<dyn Driver> = match config.driver {
            DriverKind::Postgres => Arc::new(PgDriver::new(config.url())),
            DriverKind::Sqlite => Arc::new(SqliteDriver::new(config.url())),
            DriverKind::Mysql => return Err(ConfigError::UnsupportedDriver(config.driver.to_string()).into()),
        };
        tracing::info!(driver = %config.driver, "connecting");
        Self::with_driver(driver).await
    }

    /// Connect a caller-supplied driver.
    pub async fn with_driver(driver: Arc<dyn Driver>) -> Result<Self, OrmError> {
        driver.connect().await?;
        Ok(Database {
            driver,
            pending_rollback: Arc::new(Mutex::new(None)),
        })
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn query<M: Model>(&self) -> QueryBuilder<M> {
        QueryBuilder::new(self.clone())
    }

    /// Run SQL as written; values are always bound, never spliced.
    pub async fn raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, OrmError> {
        self.driver.query(sql, params).await
    }

    pub async fn raw_entities(&self, sql: &str, params: &[Value]) -> Result<Vec<Entity>, OrmError> {
        Ok(self.raw(sql, params).await?.into_iter().map(Entity::new).collect())
    }

    /// Statement that returns no rows (DDL, bulk writes).
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, OrmError> {
        self.driver.execute(sql, params).await
    }

    pub async fn close(&self) -> Result<(), OrmError> {
        self.driver.close().await
    }

    /// BEGIN, run `work`, then COMMIT on `Ok` or ROLLBACK on `Err`. The error from `work` is returned as is.
    ///
    /// A failed COMMIT is followed by a ROLLBACK and reported. If `work` panics or the
    /// future is dropped mid-flight, the rollback is queued and runs before the next BEGIN.
    pub async fn transaction<F, Fut, T>(&self, work: F) -> Result<T, OrmError>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, OrmError>>,
    {
        self.settle_pending_rollback().await;
        self.driver.begin_transaction().await?;
        tracing::debug!("transaction started");
        let mut scope = TransactionScope {
            db: self.clone(),
            completed: false,
        };
        let outcome = work(Transaction { db: self.clone() }).await;
        match outcome {
            Ok(value) => match self.driver.commit().await {
                Ok(()) => {
                    scope.completed = true;
                    tracing::debug!("transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "commit failed");
                    scope.rollback().await;
                    Err(e)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "transaction rolled back");
                scope.rollback().await;
                Err(e)
            }
        }
    }

    async fn settle_pending_rollback(&self) {
        let pending = match self.pending_rollback.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = pending {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "queued rollback did not finish");
            }
        }
    }
}

/// Open transaction on the shared connection. Rolls back on drop unless COMMIT or ROLLBACK went through.
struct TransactionScope {
    db: Database,
    completed: bool,
}

impl TransactionScope {
    async fn rollback(&mut self) {
        match self.db.driver.rollback().await {
            Ok(()) => self.completed = true,
            Err(e) => tracing::warn!(error = %e, "rollback failed"),
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.completed {
            tracing::debug!(dialect = ?self.db.dialect(), "transaction scope released");
            return;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("transaction abandoned outside a runtime; connection left open in transaction");
                return;
            }
        };
        tracing::warn!("transaction abandoned; queueing rollback");
        let driver = Arc::clone(&self.db.driver);
        let handle = runtime.spawn(async move {
            if let Err(e) = driver.rollback().await {
                tracing::warn!(error = %e, "queued rollback failed");
            }
        });
        match self.db.pending_rollback.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }
}

/// Connection handle passed into a [`Database::transaction`] closure.
#[derive(Clone)]
pub struct Transaction {
    db: Database,
}

impl Transaction {
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn query<M: Model>(&self) -> QueryBuilder<M> {
        self.db.query::<M>()
    }

    pub async fn raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, OrmError> {
        self.db.raw(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, OrmError> {
        self.db.execute(sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mysql_has_no_bundled_driver() {
        let mut config = DatabaseConfig::sqlite_memory();
        config.driver = DriverKind::Mysql;
        let err = Database::connect(&config).await.err().unwrap();
        assert!(matches!(err, OrmError::Config(ConfigError::UnsupportedDriver(_))));
    }

    #[tokio::test]
    async fn transaction_commits_or_rolls_back() {
        let db = Database::connect(&DatabaseConfig::sqlite_memory()).await.unwrap();
        db.execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", &[]).await.unwrap();

        db.transaction(|tx| async move {
            tx.execute("INSERT INTO notes (body) VALUES (?)", &[Value::from("kept")]).await?;
            Ok(())
        })
        .await
        .unwrap();

        let err = db
            .transaction(|tx| async move {
                tx.execute("INSERT INTO notes (body) VALUES (?)", &[Value::from("dropped")]).await?;
                Err::<(), _>(OrmError::State("abort".into()))
            })
            .await
            .unwrap_err();
        assert!(err.is_state());

        let rows = db.raw("SELECT body FROM notes", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["body"], Value::from("kept"));
    }

    #[tokio::test]
    async fn rejected_commit_leaves_the_connection_usable() {
        let db = Database::connect(&DatabaseConfig::sqlite_memory()).await.unwrap();
        db.execute("PRAGMA foreign_keys = ON", &[]).await.unwrap();
        db.execute("CREATE TABLE parents (id INTEGER PRIMARY KEY)", &[]).await.unwrap();
        db.execute(
            "CREATE TABLE children (id INTEGER PRIMARY KEY, \
             parent_id INTEGER REFERENCES parents(id) DEFERRABLE INITIALLY DEFERRED)",
            &[],
        )
        .await
        .unwrap();

        let err = db
            .transaction(|tx| async move {
                tx.execute("INSERT INTO children (parent_id) VALUES (99)", &[]).await?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Db(_)));

        db.transaction(|tx| async move {
            tx.execute("INSERT INTO parents (id) VALUES (1)", &[]).await?;
            tx.execute("INSERT INTO children (parent_id) VALUES (1)", &[]).await?;
            Ok(())
        })
        .await
        .unwrap();

        let rows = db.raw("SELECT parent_id FROM children", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["parent_id"], Value::from(1));
    }
}
