/// Schema declaration and normalization
///
/// A schema lists the stores (tables) a database materializes on first open,
/// each with an optional primary key path and a set of secondary indexes.
/// Declaration order is significant: the first declared table is the default
/// target when a query names none.
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Key path of a secondary index
///
/// A composite path indexes several fields as one ordered key; all
/// components are compared in the one scan direction (per-component
/// direction mixing is not expressible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKeyPath {
    Single(String),
    Composite(Vec<String>),
}

/// Secondary index definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name (unique per table)
    pub name: String,
    /// Field path(s) the index key is extracted from
    pub key_path: IndexKeyPath,
    /// Reject two records with the same index key
    pub unique: bool,
}

impl IndexDef {
    /// Create a single-field, non-unique index
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: IndexKeyPath::Single(key_path.into()),
            unique: false,
        }
    }

    /// Create a composite index over several fields
    pub fn composite(name: impl Into<String>, key_paths: Vec<String>) -> Self {
        Self {
            name: name.into(),
            key_path: IndexKeyPath::Composite(key_paths),
            unique: false,
        }
    }

    /// Mark the index unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Table (store) definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name (unique per schema)
    pub name: String,
    /// Primary key field; `None` means the store assigns a surrogate
    /// auto-incrementing key not present on the stored value
    pub key_path: Option<String>,
    /// Secondary indexes
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Create a table with a surrogate auto-increment key
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: None,
            indexes: Vec::new(),
        }
    }

    /// Declare the primary key field
    pub fn key_path(mut self, path: impl Into<String>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Add a secondary index
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up an index by name
    pub fn get_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|idx| idx.name == name)
    }
}

/// Normalized database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    tables: Vec<TableDef>,
}

impl Schema {
    /// Normalize and validate a set of table definitions.
    ///
    /// Fails with `Error::Schema` when a table name repeats, an index
    /// definition is malformed (empty name or key path), or an index name
    /// repeats within a table.
    pub fn new(tables: Vec<TableDef>) -> Result<Self> {
        if tables.is_empty() {
            return Err(Error::Schema("schema declares no tables".into()));
        }

        let mut seen = HashSet::new();
        for table in &tables {
            if table.name.is_empty() {
                return Err(Error::Schema("empty table name".into()));
            }
            if !seen.insert(table.name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate table name: {}",
                    table.name
                )));
            }
            if let Some(path) = &table.key_path {
                if path.is_empty() {
                    return Err(Error::Schema(format!(
                        "table {} declares an empty key path",
                        table.name
                    )));
                }
            }

            let mut index_names = HashSet::new();
            for index in &table.indexes {
                if index.name.is_empty() {
                    return Err(Error::Schema(format!(
                        "table {} declares an unnamed index",
                        table.name
                    )));
                }
                if !index_names.insert(index.name.as_str()) {
                    return Err(Error::Schema(format!(
                        "duplicate index name on table {}: {}",
                        table.name, index.name
                    )));
                }
                match &index.key_path {
                    IndexKeyPath::Single(path) if path.is_empty() => {
                        return Err(Error::Schema(format!(
                            "index {} on table {} has an empty key path",
                            index.name, table.name
                        )));
                    }
                    IndexKeyPath::Composite(paths)
                        if paths.is_empty() || paths.iter().any(String::is_empty) =>
                    {
                        return Err(Error::Schema(format!(
                            "index {} on table {} has an empty composite key path",
                            index.name, table.name
                        )));
                    }
                    _ => {}
                }
            }
        }

        Ok(Self { tables })
    }

    /// Shorthand: a sequence of table names expands to surrogate-keyed,
    /// index-less tables.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(|n| TableDef::new(n)).collect())
    }

    /// Tables in declaration order
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Look up a table by name
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// The default table: first in declaration order
    pub fn first_table(&self) -> &TableDef {
        &self.tables[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_normalize() {
        let schema = Schema::new(vec![
            TableDef::new("users")
                .key_path("id")
                .index(IndexDef::new("by_name", "name"))
                .index(IndexDef::composite(
                    "by_state",
                    vec!["state".into(), "updated".into()],
                )),
            TableDef::new("events"),
        ])
        .unwrap();

        assert_eq!(schema.tables().len(), 2);
        assert_eq!(schema.first_table().name, "users");
        let users = schema.get_table("users").unwrap();
        assert_eq!(users.key_path.as_deref(), Some("id"));
        assert!(users.get_index("by_name").is_some());
        assert!(users.get_index("missing").is_none());
        assert!(schema.get_table("events").unwrap().key_path.is_none());
    }

    #[test]
    fn test_schema_from_names() {
        let schema = Schema::from_names(["a", "b", "c"]).unwrap();
        assert_eq!(schema.tables().len(), 3);
        assert!(schema.tables().iter().all(|t| t.key_path.is_none()));
        assert!(schema.tables().iter().all(|t| t.indexes.is_empty()));
    }

    #[test]
    fn test_schema_duplicate_table() {
        let err = Schema::new(vec![TableDef::new("users"), TableDef::new("users")]).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_schema_duplicate_index() {
        let err = Schema::new(vec![TableDef::new("users")
            .index(IndexDef::new("by_name", "name"))
            .index(IndexDef::new("by_name", "email"))])
        .unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_schema_malformed_index() {
        let err =
            Schema::new(vec![TableDef::new("users").index(IndexDef::new("", "name"))]).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");

        let err = Schema::new(vec![
            TableDef::new("users").index(IndexDef::composite("by_nothing", vec![]))
        ])
        .unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_schema_empty() {
        assert!(Schema::new(vec![]).is_err());
    }

    #[test]
    fn test_unique_builder() {
        let idx = IndexDef::new("by_email", "email").unique();
        assert!(idx.unique);
    }

    #[test]
    fn test_schema_survives_json() {
        let schema = Schema::new(vec![TableDef::new("users")
            .key_path("id")
            .index(IndexDef::new("by_email", "email").unique())])
        .unwrap();

        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
