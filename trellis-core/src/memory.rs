/// In-memory reference engine
///
/// Implements the storage capability traits over `BTreeMap` tables with
/// maintained secondary index maps. Intended for tests and embedded use; all
/// data is lost when the engine is dropped.
///
/// Read-write transactions take a working copy of their scoped tables at
/// creation and swap it back in on commit, so a transaction's requests
/// become visible together or not at all. Under the cooperative
/// single-threaded model two read-write transactions never interleave their
/// bodies; commit order follows creation order.
use crate::{
    engine::{Connection, CursorEntry, CursorId, Engine, Transaction, TxnMode},
    extract_composite_key, extract_key,
    schema::{IndexDef, IndexKeyPath, Schema, TableDef},
    Direction, Error, Item, Key, KeyRange, Result,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// In-memory storage engine holding one database per name
#[derive(Clone, Default)]
pub struct MemoryEngine {
    databases: Arc<Mutex<HashMap<String, Arc<MemoryDb>>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for MemoryEngine {
    fn open(
        &self,
        name: &str,
        schema: &Schema,
    ) -> oneshot::Receiver<Result<Arc<dyn Connection>>> {
        let (tx, rx) = oneshot::channel();
        let mut databases = self.databases.lock();
        let db = databases
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryDb::default()));
        let result = db.upgrade(schema).map(|()| {
            debug!(database = name, "opened in-memory database");
            Arc::clone(db) as Arc<dyn Connection>
        });
        // Receiver dropped means the caller went away; nothing to deliver.
        let _ = tx.send(result);
        rx
    }
}

/// One opened database: named tables behind a single lock
#[derive(Default)]
struct MemoryDb {
    tables: Arc<RwLock<HashMap<String, TableState>>>,
}

impl MemoryDb {
    /// Materialize stores and indexes the schema declares but the database
    /// does not yet hold. Existing tables gain missing indexes (backfilled);
    /// nothing is ever dropped.
    fn upgrade(&self, schema: &Schema) -> Result<()> {
        let mut tables = self.tables.write();
        for def in schema.tables() {
            match tables.get_mut(&def.name) {
                None => {
                    trace!(table = %def.name, "creating store");
                    tables.insert(def.name.clone(), TableState::new(def.clone()));
                }
                Some(state) => {
                    for index in &def.indexes {
                        if !state.indexes.contains_key(&index.name) {
                            trace!(table = %def.name, index = %index.name, "creating index");
                            state.create_index(index.clone())?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Connection for MemoryDb {
    fn begin(&self, tables: &[&str], mode: TxnMode) -> Result<Box<dyn Transaction>> {
        let all = self.tables.read();
        let mut working = HashMap::with_capacity(tables.len());
        for &name in tables {
            let state = all
                .get(name)
                .ok_or_else(|| Error::Store(format!("no such table: {}", name)))?;
            working.insert(name.to_string(), state.clone());
        }
        Ok(Box::new(MemoryTxn {
            tables: Arc::clone(&self.tables),
            mode,
            working,
            cursors: HashMap::new(),
            next_cursor: 0,
        }))
    }
}

/// One table: ordered rows plus maintained index maps
#[derive(Clone)]
struct TableState {
    def: TableDef,
    next_auto_key: i64,
    rows: BTreeMap<Key, Item>,
    /// index name -> ordered (index key, primary key) entries
    indexes: HashMap<String, BTreeSet<(Key, Key)>>,
}

impl TableState {
    fn new(def: TableDef) -> Self {
        let indexes = def
            .indexes
            .iter()
            .map(|idx| (idx.name.clone(), BTreeSet::new()))
            .collect();
        Self {
            def,
            next_auto_key: 1,
            rows: BTreeMap::new(),
            indexes,
        }
    }

    fn index_key_of(index: &IndexDef, item: &Item) -> Option<Key> {
        match &index.key_path {
            IndexKeyPath::Single(path) => extract_key(item, path),
            IndexKeyPath::Composite(paths) => extract_composite_key(item, paths),
        }
    }

    /// Add a declared index and backfill it from existing rows.
    fn create_index(&mut self, index: IndexDef) -> Result<()> {
        let mut entries = BTreeSet::new();
        for (pk, item) in &self.rows {
            if let Some(ik) = Self::index_key_of(&index, item) {
                if index.unique && entries.iter().any(|(k, _): &(Key, Key)| *k == ik) {
                    return Err(Error::Store(format!(
                        "unique index {} violated during backfill",
                        index.name
                    )));
                }
                entries.insert((ik, pk.clone()));
            }
        }
        self.indexes.insert(index.name.clone(), entries);
        self.def.indexes.push(index);
        Ok(())
    }

    /// Resolve the primary key for an incoming value.
    ///
    /// Declared key path: the key lives in the value and an explicit key is
    /// an engine error. Surrogate key: an explicit key is used as-is,
    /// otherwise the auto-increment counter assigns one.
    fn resolve_key(&mut self, value: &Item, explicit: Option<Key>) -> Result<Key> {
        match &self.def.key_path {
            Some(path) => {
                if explicit.is_some() {
                    return Err(Error::Store(format!(
                        "table {} declares key path {}; an explicit key is not allowed",
                        self.def.name, path
                    )));
                }
                extract_key(value, path).ok_or_else(|| {
                    Error::Store(format!(
                        "value has no usable key at path {} (table {})",
                        path, self.def.name
                    ))
                })
            }
            None => Ok(match explicit {
                Some(key) => {
                    if let Key::Int(n) = key {
                        self.next_auto_key = self.next_auto_key.max(n + 1);
                    }
                    key
                }
                None => {
                    let key = Key::Int(self.next_auto_key);
                    self.next_auto_key += 1;
                    key
                }
            }),
        }
    }

    /// Insert or replace a row, maintaining every index.
    fn write_row(&mut self, key: Key, value: Item) -> Result<()> {
        // Unique checks before any mutation so a violation leaves the table
        // untouched.
        for index in &self.def.indexes {
            if !index.unique {
                continue;
            }
            if let Some(ik) = Self::index_key_of(index, &value) {
                let entries = &self.indexes[&index.name];
                let taken = entries
                    .iter()
                    .any(|(k, pk)| *k == ik && *pk != key);
                if taken {
                    return Err(Error::Store(format!(
                        "unique index {} violated on table {}",
                        index.name, self.def.name
                    )));
                }
            }
        }

        if let Some(old) = self.rows.get(&key) {
            let old = old.clone();
            self.unindex_row(&key, &old);
        }
        for index in &self.def.indexes {
            if let Some(ik) = Self::index_key_of(index, &value) {
                if let Some(entries) = self.indexes.get_mut(&index.name) {
                    entries.insert((ik, key.clone()));
                }
            }
        }
        self.rows.insert(key, value);
        Ok(())
    }

    fn remove_row(&mut self, key: &Key) {
        if let Some(old) = self.rows.remove(key) {
            self.unindex_row(key, &old);
        }
    }

    fn unindex_row(&mut self, key: &Key, old: &Item) {
        for index in &self.def.indexes {
            if let Some(ik) = Self::index_key_of(index, old) {
                if let Some(entries) = self.indexes.get_mut(&index.name) {
                    entries.remove(&(ik, key.clone()));
                }
            }
        }
    }

    /// Primary keys in `range`, in key order.
    fn keys_in_range(&self, range: &KeyRange) -> Vec<Key> {
        self.rows
            .keys()
            .filter(|k| range.contains(k))
            .cloned()
            .collect()
    }
}

/// Cursor position snapshot: (index key, primary key) pairs in traversal order
struct CursorState {
    table: String,
    entries: Vec<(Option<Key>, Key)>,
    pos: usize,
    /// Entry most recently returned by `cursor_next`
    current: Option<(Option<Key>, Key)>,
}

struct MemoryTxn {
    tables: Arc<RwLock<HashMap<String, TableState>>>,
    mode: TxnMode,
    working: HashMap<String, TableState>,
    cursors: HashMap<CursorId, CursorState>,
    next_cursor: u64,
}

impl MemoryTxn {
    fn table(&self, name: &str) -> Result<&TableState> {
        self.working
            .get(name)
            .ok_or_else(|| Error::Store(format!("table {} is not in this transaction's scope", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableState> {
        if self.mode == TxnMode::ReadOnly {
            return Err(Error::Store("write request in a read-only transaction".into()));
        }
        self.working
            .get_mut(name)
            .ok_or_else(|| Error::Store(format!("table {} is not in this transaction's scope", name)))
    }
}

impl Transaction for MemoryTxn {
    fn get(&mut self, table: &str, range: &KeyRange) -> Result<Option<Item>> {
        let state = self.table(table)?;
        if let KeyRange::Only(key) = range {
            return Ok(state.rows.get(key).cloned());
        }
        Ok(state
            .rows
            .iter()
            .find(|(k, _)| range.contains(k))
            .map(|(_, v)| v.clone()))
    }

    fn get_all(
        &mut self,
        table: &str,
        range: &KeyRange,
        limit: Option<usize>,
    ) -> Result<Vec<Item>> {
        let state = self.table(table)?;
        Ok(state
            .rows
            .iter()
            .filter(|(k, _)| range.contains(k))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn get_all_keys(
        &mut self,
        table: &str,
        range: &KeyRange,
        limit: Option<usize>,
    ) -> Result<Vec<Key>> {
        let state = self.table(table)?;
        Ok(state
            .keys_in_range(range)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn count(&mut self, table: &str, range: &KeyRange) -> Result<u64> {
        let state = self.table(table)?;
        Ok(state.rows.keys().filter(|k| range.contains(k)).count() as u64)
    }

    fn add(&mut self, table: &str, value: Item, key: Option<Key>) -> Result<Key> {
        let state = self.table_mut(table)?;
        let key = state.resolve_key(&value, key)?;
        if state.rows.contains_key(&key) {
            return Err(Error::Store(format!(
                "key {:?} already exists in table {}",
                key, table
            )));
        }
        state.write_row(key.clone(), value)?;
        Ok(key)
    }

    fn put(&mut self, table: &str, value: Item, key: Option<Key>) -> Result<Key> {
        let state = self.table_mut(table)?;
        let key = state.resolve_key(&value, key)?;
        state.write_row(key.clone(), value)?;
        Ok(key)
    }

    fn delete(&mut self, table: &str, range: &KeyRange) -> Result<()> {
        let state = self.table_mut(table)?;
        for key in state.keys_in_range(range) {
            state.remove_row(&key);
        }
        Ok(())
    }

    fn clear(&mut self, table: &str) -> Result<()> {
        let state = self.table_mut(table)?;
        state.rows.clear();
        for entries in state.indexes.values_mut() {
            entries.clear();
        }
        Ok(())
    }

    fn open_cursor(
        &mut self,
        table: &str,
        index: Option<&str>,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<CursorId> {
        let state = self.table(table)?;
        let mut entries: Vec<(Option<Key>, Key)> = match index {
            None => state
                .keys_in_range(range)
                .into_iter()
                .map(|pk| (None, pk))
                .collect(),
            Some(name) => {
                let index_entries = state.indexes.get(name).ok_or_else(|| {
                    Error::Store(format!("no such index on table {}: {}", table, name))
                })?;
                index_entries
                    .iter()
                    .filter(|(ik, _)| range.contains(ik))
                    .map(|(ik, pk)| (Some(ik.clone()), pk.clone()))
                    .collect()
            }
        };

        if !direction.is_forward() {
            entries.reverse();
        }
        if direction.is_unique() {
            let mut last: Option<Option<Key>> = None;
            entries.retain(|(ik, _)| {
                let keep = last.as_ref() != Some(ik);
                last = Some(ik.clone());
                keep
            });
        }

        let id = self.next_cursor;
        self.next_cursor += 1;
        self.cursors.insert(
            id,
            CursorState {
                table: table.to_string(),
                entries,
                pos: 0,
                current: None,
            },
        );
        Ok(id)
    }

    fn cursor_next(&mut self, cursor: CursorId) -> Result<Option<CursorEntry>> {
        loop {
            let state = self
                .cursors
                .get_mut(&cursor)
                .ok_or_else(|| Error::Store("unknown cursor".into()))?;
            let Some((index_key, pk)) = state.entries.get(state.pos).cloned() else {
                state.current = None;
                return Ok(None);
            };
            state.pos += 1;
            let table = state.table.clone();
            // A record deleted earlier in this transaction may still be in
            // the snapshot; skip it.
            match self.table(&table)?.rows.get(&pk).cloned() {
                Some(value) => {
                    let state = self.cursors.get_mut(&cursor).expect("cursor exists");
                    state.current = Some((index_key.clone(), pk.clone()));
                    return Ok(Some(CursorEntry {
                        primary_key: pk,
                        index_key,
                        value,
                    }));
                }
                None => continue,
            }
        }
    }

    fn cursor_update(&mut self, cursor: CursorId, value: Item) -> Result<()> {
        let state = self
            .cursors
            .get(&cursor)
            .ok_or_else(|| Error::Store("unknown cursor".into()))?;
        let (_, pk) = state
            .current
            .clone()
            .ok_or_else(|| Error::Store("cursor has no current record".into()))?;
        let table = state.table.clone();

        let table_state = self.table_mut(&table)?;
        if let Some(path) = table_state.def.key_path.clone() {
            match extract_key(&value, &path) {
                Some(ref new_key) if *new_key == pk => {}
                _ => {
                    return Err(Error::Store(
                        "cursor update must keep the record's primary key".into(),
                    ))
                }
            }
        }
        table_state.write_row(pk, value)
    }

    fn cursor_delete(&mut self, cursor: CursorId) -> Result<()> {
        let state = self
            .cursors
            .get(&cursor)
            .ok_or_else(|| Error::Store("unknown cursor".into()))?;
        let (_, pk) = state
            .current
            .clone()
            .ok_or_else(|| Error::Store("cursor has no current record".into()))?;
        let table = state.table.clone();
        self.table_mut(&table)?.remove_row(&pk);
        Ok(())
    }

    fn commit(self: Box<Self>) -> oneshot::Receiver<Result<()>> {
        let (tx, rx) = oneshot::channel();
        {
            let mut tables = self.tables.write();
            for (name, state) in self.working {
                tables.insert(name, state);
            }
        }
        trace!("transaction committed");
        let _ = tx.send(Ok(()));
        rx
    }

    fn abort(self: Box<Self>) {
        trace!("transaction aborted");
        // Working copy is dropped; the database never saw the requests.
    }
}
