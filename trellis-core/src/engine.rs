/// Storage capability traits
///
/// The query layer is engine-agnostic: any ordered, transactional KV store
/// with secondary indexes and cursors can sit behind these traits. Requests
/// are issued synchronously inside a transaction; open and commit complete
/// through events, bridged to the caller as oneshot receivers so the fluent
/// layer can await them.
use crate::{Direction, Item, Key, KeyRange, Result, Schema};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Transaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    ReadOnly,
    ReadWrite,
}

/// Handle to a cursor opened inside a transaction
pub type CursorId = u64;

/// One entry visited by a cursor
#[derive(Debug, Clone)]
pub struct CursorEntry {
    /// Primary key of the visited record
    pub primary_key: Key,
    /// Index key the cursor is positioned on (index cursors only)
    pub index_key: Option<Key>,
    /// The record itself
    pub value: Item,
}

/// A storage engine: opens named databases against a schema.
///
/// Opening materializes every declared store and index not already present.
/// Completion is evented; the receiver resolves once the open (and any
/// upgrade) finishes, or carries the engine's error.
pub trait Engine: Send + Sync {
    fn open(&self, name: &str, schema: &Schema)
        -> oneshot::Receiver<Result<Arc<dyn Connection>>>;
}

/// An opened database connection.
///
/// Never implicitly closed; the handle lives as long as its owner.
pub trait Connection: Send + Sync {
    /// Begin a transaction scoped to `tables`.
    ///
    /// Transactions begin at creation: relative ordering across concurrently
    /// created transactions follows creation order, not the order their
    /// individual requests are issued.
    fn begin(&self, tables: &[&str], mode: TxnMode) -> Result<Box<dyn Transaction>>;
}

/// An open transaction.
///
/// Every request either succeeds or fails the whole transaction; there is no
/// partial recovery. Write requests against a read-only transaction fail
/// with a store error.
pub trait Transaction: Send {
    /// First record whose primary key falls in `range`.
    fn get(&mut self, table: &str, range: &KeyRange) -> Result<Option<Item>>;

    /// Records in primary-key order, bounded by `limit`.
    fn get_all(&mut self, table: &str, range: &KeyRange, limit: Option<usize>)
        -> Result<Vec<Item>>;

    /// Primary keys in order, bounded by `limit`.
    fn get_all_keys(
        &mut self,
        table: &str,
        range: &KeyRange,
        limit: Option<usize>,
    ) -> Result<Vec<Key>>;

    /// Count of records in `range`.
    fn count(&mut self, table: &str, range: &KeyRange) -> Result<u64>;

    /// Insert a record; fails if the key already exists.
    ///
    /// `key` must be given for surrogate-key tables updating a known key and
    /// must be absent for tables with a declared key path (the key is
    /// extracted from the value). `None` on a surrogate-key table assigns
    /// the next auto-increment key.
    fn add(&mut self, table: &str, value: Item, key: Option<Key>) -> Result<Key>;

    /// Insert or overwrite a record. Same key rules as `add`.
    fn put(&mut self, table: &str, value: Item, key: Option<Key>) -> Result<Key>;

    /// Delete every record whose primary key falls in `range`.
    fn delete(&mut self, table: &str, range: &KeyRange) -> Result<()>;

    /// Delete every record in the table.
    fn clear(&mut self, table: &str) -> Result<()>;

    /// Open a cursor over the store (`index` = None) or one of its indexes.
    fn open_cursor(
        &mut self,
        table: &str,
        index: Option<&str>,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<CursorId>;

    /// Advance the cursor; `None` at exhaustion.
    fn cursor_next(&mut self, cursor: CursorId) -> Result<Option<CursorEntry>>;

    /// Replace the record at the cursor's current position.
    fn cursor_update(&mut self, cursor: CursorId, value: Item) -> Result<()>;

    /// Delete the record at the cursor's current position.
    fn cursor_delete(&mut self, cursor: CursorId) -> Result<()>;

    /// Commit; the receiver resolves on the completion event, or carries the
    /// abort error. All requests issued in the transaction become visible
    /// together, or not at all.
    fn commit(self: Box<Self>) -> oneshot::Receiver<Result<()>>;

    /// Abort; every request issued in the transaction is discarded.
    fn abort(self: Box<Self>);
}
