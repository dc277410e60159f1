pub mod engine;
pub mod error;
pub mod memory;
pub mod range;
pub mod schema;
pub mod types;

pub use engine::{Connection, CursorEntry, CursorId, Engine, Transaction, TxnMode};
pub use error::{Error, Result};
pub use memory::MemoryEngine;
pub use range::{Direction, KeyRange};
pub use schema::{IndexDef, IndexKeyPath, Schema, TableDef};
pub use types::{extract_composite_key, extract_key, Item, Key, Value};
