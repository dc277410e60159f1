/// Write dispatch: inserts and upserts
///
/// `add`/`add_all` insert; a batch is issued inside one transaction so a
/// single failure aborts every insert in it. `set`/`set_with` upsert through
/// the primary key; `set_index` updates existing records through an index
/// cursor and never creates.
use crate::{query::QueryContext, txn};
use trellis_core::{extract_key, Error, Item, Key, KeyRange, Result, TxnMode};

impl<'a> QueryContext<'a> {
    /// Insert one record. Fails if the primary key already exists.
    pub async fn add(&self, record: Item) -> Result<()> {
        self.add_all(vec![record]).await
    }

    /// Insert a batch of records atomically: one bad element means no
    /// element is retained.
    pub async fn add_all(&self, records: Vec<Item>) -> Result<()> {
        let table = self.resolved_table()?;
        let conn = self.db().open().await?;
        txn::run(&conn, &[table.name.as_str()], TxnMode::ReadWrite, move |txn| {
            for record in records {
                txn.add(&table.name, record, None)?;
            }
            Ok(())
        })
        .await
    }

    /// Upsert a plain value at `key` (primary mode).
    pub async fn set(&self, key: impl Into<Key>, value: Item) -> Result<()> {
        self.set_with(key, move |_| value).await
    }

    /// Upsert through an updater (primary mode).
    ///
    /// The updater receives the existing record, or `None` when the key is
    /// absent, and returns the new value. Tables with a declared key path
    /// must embed the (unchanged) key in the new value; the key is never
    /// passed to the store explicitly for them. Surrogate-key tables get the
    /// key passed explicitly, since the store cannot place the value
    /// otherwise.
    pub async fn set_with(
        &self,
        key: impl Into<Key>,
        updater: impl FnOnce(Option<Item>) -> Item,
    ) -> Result<()> {
        let table = self.resolved_table()?;
        let key = key.into();
        let conn = self.db().open().await?;
        txn::run(&conn, &[table.name.as_str()], TxnMode::ReadWrite, move |txn| {
            let existing = txn.get(&table.name, &KeyRange::Only(key.clone()))?;
            let value = updater(existing);
            match &table.key_path {
                Some(path) => {
                    match extract_key(&value, path) {
                        Some(ref embedded) if *embedded == key => {}
                        Some(_) => {
                            return Err(Error::Usage(format!(
                                "set must not alter the primary key ({} on table {})",
                                path, table.name
                            )))
                        }
                        None => {
                            return Err(Error::Usage(format!(
                                "new value must embed the primary key at {} (table {})",
                                path, table.name
                            )))
                        }
                    }
                    txn.put(&table.name, value, None)?;
                }
                None => {
                    txn.put(&table.name, value, Some(key))?;
                }
            }
            Ok(())
        })
        .await
    }

    /// Update existing records through an index cursor.
    ///
    /// Visits entries matching the context range in the context order; each
    /// visited record is replaced by `updater(record, index_key)`. Stops
    /// after `count` updates, or at cursor exhaustion when `count` is `None`.
    pub async fn set_index(
        &self,
        index: &str,
        mut updater: impl FnMut(Item, &Key) -> Item,
        count: Option<usize>,
    ) -> Result<()> {
        let table = self.resolved_index(index)?;
        self.range().validate()?;
        let conn = self.db().open().await?;
        let range = self.range().clone();
        let order = self.order_value();
        txn::run(&conn, &[table.name.as_str()], TxnMode::ReadWrite, move |txn| {
            let cursor = txn.open_cursor(&table.name, Some(index), &range, order)?;
            let mut updated = 0usize;
            while let Some(entry) = txn.cursor_next(cursor)? {
                let key = entry
                    .index_key
                    .unwrap_or_else(|| entry.primary_key.clone());
                let value = updater(entry.value, &key);
                txn.cursor_update(cursor, value)?;
                updated += 1;
                if count.is_some_and(|n| updated == n) {
                    break;
                }
            }
            Ok(())
        })
        .await
    }
}
