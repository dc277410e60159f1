use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use trellis_core::{Connection, Engine, Error, Item, Result, Schema, TableDef, Value};

pub use trellis_core::{
    Direction, IndexDef, IndexKeyPath, Key, KeyRange, MemoryEngine, TxnMode,
    Error as TrellisError, Value as TrellisValue,
};

pub mod query;
pub use query::QueryContext;

pub mod read;
pub use read::{ReadKind, ReadResult};

pub mod write;
pub mod delete;

mod txn;

/// Trellis database handle
///
/// Owns the lazily opened connection for its lifetime. The first `open()`
/// starts the engine open; calls arriving before it completes await the same
/// in-flight operation, so the engine is asked to open exactly once.
pub struct Database {
    name: String,
    schema: Schema,
    engine: Arc<dyn Engine>,
    conn: OnceCell<Arc<dyn Connection>>,
}

impl Database {
    /// Create a handle from table definitions (normalized and validated here)
    pub fn new(
        engine: Arc<dyn Engine>,
        name: impl Into<String>,
        tables: Vec<TableDef>,
    ) -> Result<Self> {
        Ok(Self::with_schema(engine, name, Schema::new(tables)?))
    }

    /// Create a handle from an already normalized schema
    pub fn with_schema(engine: Arc<dyn Engine>, name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            engine,
            conn: OnceCell::new(),
        }
    }

    /// Shorthand: a sequence of table names, surrogate keys, no indexes
    pub fn from_names<I, S>(engine: Arc<dyn Engine>, name: impl Into<String>, tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::with_schema(engine, name, Schema::from_names(tables)?))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Open (or return the cached) connection.
    ///
    /// Idempotent and safe under concurrent invocation. An open or upgrade
    /// failure is fatal; no retry is attempted here.
    pub async fn open(&self) -> Result<Arc<dyn Connection>> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!(database = %self.name, "opening database");
                match self.engine.open(&self.name, &self.schema).await {
                    Ok(result) => result.map_err(|e| match e {
                        Error::Connection(_) => e,
                        other => Error::Connection(other.to_string()),
                    }),
                    Err(_) => Err(Error::Connection(
                        "engine dropped the open request".into(),
                    )),
                }
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    /// Start a query against a named table
    pub fn table(&self, name: impl Into<String>) -> QueryContext<'_> {
        self.context().table(name)
    }

    /// Start a query against the default table (first declared)
    pub fn context(&self) -> QueryContext<'_> {
        QueryContext::new(self)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("open", &self.conn.initialized())
            .finish()
    }
}

/// Helper to build items
pub struct ItemBuilder {
    item: HashMap<String, Value>,
}

impl ItemBuilder {
    pub fn new() -> Self {
        Self {
            item: HashMap::new(),
        }
    }

    pub fn string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.item.insert(key.into(), Value::string(value.into()));
        self
    }

    pub fn number(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.item.insert(key.into(), Value::number(value));
        self
    }

    pub fn bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.item.insert(key.into(), Value::Bool(value));
        self
    }

    pub fn build(self) -> Item {
        self.item
    }
}

impl Default for ItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::MemoryEngine;

    fn users_db() -> Database {
        let engine = Arc::new(MemoryEngine::new());
        Database::new(
            engine,
            "test",
            vec![TableDef::new("users")
                .key_path("id")
                .index(IndexDef::new("by_name", "name"))],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = users_db();
        assert!(format!("{:?}", db).contains("open: false"));
        let first = db.open().await.unwrap();
        let second = db.open().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(format!("{:?}", db).contains("open: true"));
    }

    #[tokio::test]
    async fn test_concurrent_open_single_flight() {
        let db = Arc::new(users_db());
        let a = {
            let db = Arc::clone(&db);
            tokio::spawn(async move { db.open().await.map(|c| Arc::as_ptr(&c) as *const () as usize) })
        };
        let b = {
            let db = Arc::clone(&db);
            tokio::spawn(async move { db.open().await.map(|c| Arc::as_ptr(&c) as *const () as usize) })
        };
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_schema_error_at_construction() {
        let engine = Arc::new(MemoryEngine::new());
        let err = Database::new(
            engine,
            "test",
            vec![TableDef::new("users"), TableDef::new("users")],
        )
        .unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_item_builder() {
        let item = ItemBuilder::new()
            .string("name", "Alice")
            .number("age", 30)
            .bool("active", true)
            .build();
        assert_eq!(item.get("name"), Some(&Value::string("Alice")));
        assert_eq!(item.get("age"), Some(&Value::number(30)));
        assert_eq!(item.get("active"), Some(&Value::Bool(true)));
    }
}
