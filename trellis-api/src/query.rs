/// Fluent query context
///
/// An immutable configuration value: each builder call returns a new context
/// derived from the previous one with one field replaced, so contexts are
/// safely shareable and reusable across concurrent operations. Builder calls
/// never fail; invalid selections (unknown table, inverted range) surface as
/// errors when a terminal operation executes.
use crate::Database;
use trellis_core::{Direction, Error, Key, KeyRange, Result, TableDef};

/// Immutable, chainable query configuration
#[derive(Clone)]
pub struct QueryContext<'a> {
    db: &'a Database,
    table: Option<String>,
    range: KeyRange,
    limit: Option<usize>,
    order: Direction,
}

impl<'a> QueryContext<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self {
            db,
            table: None,
            range: KeyRange::Unbounded,
            limit: None,
            order: Direction::Forward,
        }
    }

    /// Select the table to operate on (default: first declared table)
    pub fn table(&self, name: impl Into<String>) -> Self {
        Self {
            table: Some(name.into()),
            ..self.clone()
        }
    }

    /// Select exactly one key
    pub fn where_key(&self, key: impl Into<Key>) -> Self {
        Self {
            range: KeyRange::only(key),
            ..self.clone()
        }
    }

    /// Select a key range from optional bounds; `inclusive` applies to both.
    ///
    /// Both bounds absent selects everything. An inverted range is reported
    /// as a usage error when the terminal operation runs.
    pub fn where_range(&self, lo: Option<Key>, hi: Option<Key>, inclusive: bool) -> Self {
        Self {
            range: KeyRange::between(lo, hi, inclusive),
            ..self.clone()
        }
    }

    /// Set an explicit range
    pub fn where_in(&self, range: KeyRange) -> Self {
        Self {
            range,
            ..self.clone()
        }
    }

    /// Bound the number of results (default: unbounded)
    pub fn limit(&self, n: usize) -> Self {
        Self {
            limit: Some(n),
            ..self.clone()
        }
    }

    /// Set the iteration order (default: forward)
    pub fn order(&self, direction: Direction) -> Self {
        Self {
            order: direction,
            ..self.clone()
        }
    }

    pub(crate) fn db(&self) -> &'a Database {
        self.db
    }

    pub(crate) fn range(&self) -> &KeyRange {
        &self.range
    }

    pub(crate) fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub(crate) fn order_value(&self) -> Direction {
        self.order
    }

    /// Resolve the target table against the schema.
    pub(crate) fn resolved_table(&self) -> Result<&'a TableDef> {
        let schema = self.db.schema();
        match &self.table {
            Some(name) => schema
                .get_table(name)
                .ok_or_else(|| Error::Usage(format!("unknown table: {}", name))),
            None => Ok(schema.first_table()),
        }
    }

    /// Resolve the named index on the target table.
    pub(crate) fn resolved_index(&self, name: &str) -> Result<&'a TableDef> {
        let table = self.resolved_table()?;
        if table.get_index(name).is_none() {
            return Err(Error::Usage(format!(
                "unknown index on table {}: {}",
                table.name, name
            )));
        }
        Ok(table)
    }
}
