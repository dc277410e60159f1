/// Transaction runner
///
/// One transaction per terminal operation: begin, invoke the body
/// synchronously in the same turn the transaction is created, then await the
/// commit completion event. A body error aborts the transaction, discarding
/// every request issued inside it.
use std::sync::Arc;
use tracing::trace;
use trellis_core::{Connection, Error, Result, Transaction, TxnMode};

pub(crate) async fn run<T>(
    conn: &Arc<dyn Connection>,
    tables: &[&str],
    mode: TxnMode,
    body: impl FnOnce(&mut dyn Transaction) -> Result<T>,
) -> Result<T> {
    let mut txn = conn.begin(tables, mode)?;
    match body(txn.as_mut()) {
        Ok(value) => match txn.commit().await {
            Ok(Ok(())) => Ok(value),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Store(
                "engine dropped the transaction before completion".into(),
            )),
        },
        Err(err) => {
            trace!(error = %err, "aborting transaction");
            txn.abort();
            Err(err)
        }
    }
}
