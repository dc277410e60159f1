/// Delete dispatch
///
/// Primary mode removes one exact key; clear removes every record in the
/// table; index mode cursor-iterates the context range and deletes visited
/// entries, optionally predicate-filtered and counter-bounded. A failure
/// mid-iteration aborts the whole transaction, so no deletions from that
/// call are retained.
use crate::{query::QueryContext, txn};
use trellis_core::{Item, Key, KeyRange, Result, TxnMode};

impl<'a> QueryContext<'a> {
    /// Delete the record at exactly `key`.
    pub async fn delete(&self, key: impl Into<Key>) -> Result<()> {
        let table = self.resolved_table()?;
        let key = key.into();
        let conn = self.db().open().await?;
        txn::run(&conn, &[table.name.as_str()], TxnMode::ReadWrite, move |txn| {
            txn.delete(&table.name, &KeyRange::Only(key))
        })
        .await
    }

    /// Delete every record in the table.
    pub async fn clear(&self) -> Result<()> {
        let table = self.resolved_table()?;
        let conn = self.db().open().await?;
        txn::run(&conn, &[table.name.as_str()], TxnMode::ReadWrite, move |txn| {
            txn.clear(&table.name)
        })
        .await
    }

    /// Delete records through an index cursor.
    ///
    /// Visits entries matching the context range in the context order,
    /// deleting each; stops after `count` deletions or at exhaustion.
    pub async fn delete_index(&self, index: &str, count: Option<usize>) -> Result<()> {
        self.delete_index_where(index, count, |_, _| true).await
    }

    /// Index-cursor delete with a predicate: only entries the predicate
    /// accepts are deleted (and counted). The predicate receives each
    /// record and the index key the cursor is positioned on.
    pub async fn delete_index_where(
        &self,
        index: &str,
        count: Option<usize>,
        predicate: impl Fn(&Item, &Key) -> bool,
    ) -> Result<()> {
        let table = self.resolved_index(index)?;
        self.range().validate()?;
        let conn = self.db().open().await?;
        let range = self.range().clone();
        let order = self.order_value();
        txn::run(&conn, &[table.name.as_str()], TxnMode::ReadWrite, move |txn| {
            let cursor = txn.open_cursor(&table.name, Some(index), &range, order)?;
            let mut deleted = 0usize;
            while let Some(entry) = txn.cursor_next(cursor)? {
                let key = entry.index_key.as_ref().unwrap_or(&entry.primary_key);
                if predicate(&entry.value, key) {
                    txn.cursor_delete(cursor)?;
                    deleted += 1;
                }
                if count.is_some_and(|n| deleted == n) {
                    break;
                }
            }
            Ok(())
        })
        .await
    }
}
