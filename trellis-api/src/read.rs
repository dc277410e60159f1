/// Read dispatch
///
/// Translates a query context plus a read kind into the right store call or
/// cursor loop. Only the index path honors ordering and the predicate: the
/// plain store operations provide neither, which is an engine limitation,
/// not a silent choice. `SingleKey` is a key-cursor peek and does honor the
/// configured direction.
use crate::{query::QueryContext, txn};
use trellis_core::{Error, Item, Key, Result, TxnMode};

/// Shape of a read operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadKind {
    /// First record in range (primary key order); ignores order and predicate
    Single,
    /// Records in range, primary key order, bounded by the context limit
    Multiple,
    /// First primary key in range, honoring direction
    SingleKey,
    /// Primary keys in range, bounded by the context limit
    MultipleKeys,
    /// Count of records in range
    Count,
    /// Index scan honoring range, order, limit and predicate
    Index(String),
}

/// Result of a read operation
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    Record(Option<Item>),
    Records(Vec<Item>),
    Key(Option<Key>),
    Keys(Vec<Key>),
    Count(u64),
}

impl ReadResult {
    pub fn into_record(self) -> Result<Option<Item>> {
        match self {
            ReadResult::Record(r) => Ok(r),
            other => Err(Error::Usage(format!("expected a record result, got {:?}", other))),
        }
    }

    pub fn into_records(self) -> Result<Vec<Item>> {
        match self {
            ReadResult::Records(r) => Ok(r),
            other => Err(Error::Usage(format!("expected a records result, got {:?}", other))),
        }
    }

    pub fn into_key(self) -> Result<Option<Key>> {
        match self {
            ReadResult::Key(k) => Ok(k),
            other => Err(Error::Usage(format!("expected a key result, got {:?}", other))),
        }
    }

    pub fn into_keys(self) -> Result<Vec<Key>> {
        match self {
            ReadResult::Keys(k) => Ok(k),
            other => Err(Error::Usage(format!("expected a keys result, got {:?}", other))),
        }
    }

    pub fn into_count(self) -> Result<u64> {
        match self {
            ReadResult::Count(n) => Ok(n),
            other => Err(Error::Usage(format!("expected a count result, got {:?}", other))),
        }
    }
}

impl<'a> QueryContext<'a> {
    /// Execute a read of the given shape against the context selection.
    pub async fn get(&self, kind: ReadKind) -> Result<ReadResult> {
        self.read(kind, None).await
    }

    /// Index-scan read with a record predicate.
    ///
    /// The predicate receives each visited record and the index key the
    /// cursor is positioned on. It only applies to `ReadKind::Index`; other
    /// kinds ignore it.
    pub async fn get_filtered(
        &self,
        kind: ReadKind,
        predicate: impl Fn(&Item, &Key) -> bool,
    ) -> Result<ReadResult> {
        self.read(kind, Some(&predicate)).await
    }

    async fn read(
        &self,
        kind: ReadKind,
        predicate: Option<&dyn Fn(&Item, &Key) -> bool>,
    ) -> Result<ReadResult> {
        let table = match &kind {
            ReadKind::Index(name) => self.resolved_index(name)?,
            _ => self.resolved_table()?,
        };
        self.range().validate()?;

        let conn = self.db().open().await?;
        let range = self.range().clone();
        let limit = self.limit_value();
        let order = self.order_value();

        txn::run(&conn, &[table.name.as_str()], TxnMode::ReadOnly, move |txn| {
            match kind {
                ReadKind::Single => txn.get(&table.name, &range).map(ReadResult::Record),
                ReadKind::Multiple => txn
                    .get_all(&table.name, &range, limit)
                    .map(ReadResult::Records),
                ReadKind::SingleKey => {
                    let cursor = txn.open_cursor(&table.name, None, &range, order)?;
                    Ok(ReadResult::Key(
                        txn.cursor_next(cursor)?.map(|e| e.primary_key),
                    ))
                }
                ReadKind::MultipleKeys => txn
                    .get_all_keys(&table.name, &range, limit)
                    .map(ReadResult::Keys),
                ReadKind::Count => txn.count(&table.name, &range).map(ReadResult::Count),
                ReadKind::Index(ref index) => {
                    let cursor =
                        txn.open_cursor(&table.name, Some(index.as_str()), &range, order)?;
                    let mut records = Vec::new();
                    while let Some(entry) = txn.cursor_next(cursor)? {
                        let key = entry.index_key.as_ref().unwrap_or(&entry.primary_key);
                        let keep = predicate
                            .map(|p| p(&entry.value, key))
                            .unwrap_or(true);
                        if keep {
                            records.push(entry.value);
                        }
                        if limit.is_some_and(|n| records.len() == n) {
                            break;
                        }
                    }
                    Ok(ReadResult::Records(records))
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_accessors() {
        assert_eq!(ReadResult::Count(3).into_count().unwrap(), 3);
        assert!(ReadResult::Count(3).into_records().is_err());
        assert_eq!(ReadResult::Record(None).into_record().unwrap(), None);
        assert!(ReadResult::Keys(vec![]).into_keys().unwrap().is_empty());
        let err = ReadResult::Key(None).into_count().unwrap_err();
        assert_eq!(err.code(), "USAGE_ERROR");
    }
}
