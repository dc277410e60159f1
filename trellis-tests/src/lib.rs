/// Test utilities and helpers for Trellis testing
///
/// Provides a pre-wired in-memory database and record generators to simplify
/// writing integration tests.
use std::sync::Arc;
use trellis_api::{Database, IndexDef, ItemBuilder};
use trellis_core::{Item, MemoryEngine, TableDef, Value};

/// The schema most tests run against: keyed users with name/email indexes
/// plus a surrogate-keyed event log.
pub fn test_schema() -> Vec<TableDef> {
    vec![
        TableDef::new("users")
            .key_path("id")
            .index(IndexDef::new("by_name", "name"))
            .index(IndexDef::new("by_email", "email").unique())
            .index(IndexDef::composite(
                "by_state",
                vec!["state".to_string(), "id".to_string()],
            )),
        TableDef::new("events"),
    ]
}

/// Test database wrapper holding its own in-memory engine
pub struct TestDatabase {
    pub db: Database,
    pub engine: Arc<MemoryEngine>,
}

impl TestDatabase {
    /// Create a test database with the standard schema
    pub fn new() -> Self {
        Self::with_tables(test_schema())
    }

    /// Create a test database with a caller-provided schema
    pub fn with_tables(tables: Vec<TableDef>) -> Self {
        init_tracing();
        let engine = Arc::new(MemoryEngine::new());
        let db = Database::new(engine.clone(), "test", tables)
            .expect("schema is valid");
        Self { db, engine }
    }

    /// Insert the given users, panicking on failure
    pub async fn seed_users(&self, users: Vec<Item>) {
        self.db
            .table("users")
            .add_all(users)
            .await
            .expect("seeding users");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the tracing subscriber for test output; honors `RUST_LOG`.
/// Safe to call from every test, only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a user record for the standard schema
pub fn user(id: i64, name: &str) -> Item {
    ItemBuilder::new()
        .number("id", id)
        .string("name", name)
        .string("email", format!("{}@example.com", name))
        .string("state", "active")
        .build()
}

/// Build a user record with an explicit state
pub fn user_in_state(id: i64, name: &str, state: &str) -> Item {
    ItemBuilder::new()
        .number("id", id)
        .string("name", name)
        .string("email", format!("{}@example.com", name))
        .string("state", state)
        .build()
}

/// Assert that a record's field holds the expected string
pub fn assert_string_field(item: &Item, field: &str, expected: &str) {
    match item.get(field) {
        Some(Value::S(s)) => assert_eq!(s, expected, "field {}", field),
        other => panic!("expected string field {}, got {:?}", field, other),
    }
}

/// Collect the string value of `field` from each record
pub fn field_strings(items: &[Item], field: &str) -> Vec<String> {
    items
        .iter()
        .map(|item| match item.get(field) {
            Some(Value::S(s)) => s.clone(),
            other => panic!("expected string field {}, got {:?}", field, other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_api::{ReadKind, ReadResult};

    #[tokio::test]
    async fn test_database_helper() {
        let t = TestDatabase::new();
        t.seed_users(vec![user(1, "alice"), user(2, "bob")]).await;

        let result = t.db.table("users").get(ReadKind::Count).await.unwrap();
        assert_eq!(result, ReadResult::Count(2));
    }

    #[test]
    fn test_record_helpers() {
        let u = user(7, "carol");
        assert_string_field(&u, "name", "carol");
        assert_string_field(&u, "email", "carol@example.com");

        let s = user_in_state(8, "dan", "idle");
        assert_string_field(&s, "state", "idle");
    }
}
