/// Key range and scan direction types
///
/// A `KeyRange` is the declarative bound a query places on a store or index
/// scan; the engines translate it into cursor positioning. Both bounds of a
/// bounded range share one inclusivity flag.
use crate::types::Key;
use serde::{Deserialize, Serialize};

/// Declarative key bound for store and index scans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KeyRange {
    /// Exactly one key
    Only(Key),
    /// Keys >= (or >) the bound
    LowerBound(Key, bool),
    /// Keys <= (or <) the bound
    UpperBound(Key, bool),
    /// Keys between the two bounds
    Bounded {
        lo: Key,
        hi: Key,
        lo_open: bool,
        hi_open: bool,
    },
    /// Every key
    #[default]
    Unbounded,
}

impl KeyRange {
    /// Range matching exactly `key`.
    pub fn only(key: impl Into<Key>) -> Self {
        KeyRange::Only(key.into())
    }

    /// Build a range from optional bounds, one inclusivity flag for both.
    ///
    /// Both bounds absent yields the unbounded range. A bounded range with
    /// `lo > hi` is accepted here and rejected at execution time.
    pub fn between(lo: Option<Key>, hi: Option<Key>, inclusive: bool) -> Self {
        match (lo, hi) {
            (Some(lo), Some(hi)) => KeyRange::Bounded {
                lo,
                hi,
                lo_open: !inclusive,
                hi_open: !inclusive,
            },
            (Some(lo), None) => KeyRange::LowerBound(lo, inclusive),
            (None, Some(hi)) => KeyRange::UpperBound(hi, inclusive),
            (None, None) => KeyRange::Unbounded,
        }
    }

    /// Check that the range is well-formed (`lo <= hi` for bounded ranges).
    pub fn validate(&self) -> crate::Result<()> {
        if let KeyRange::Bounded { lo, hi, .. } = self {
            if lo > hi {
                return Err(crate::Error::Usage(format!(
                    "inverted range: {:?} > {:?}",
                    lo, hi
                )));
            }
        }
        Ok(())
    }

    /// Whether `key` falls inside the range.
    pub fn contains(&self, key: &Key) -> bool {
        match self {
            KeyRange::Only(k) => key == k,
            KeyRange::LowerBound(lo, inclusive) => {
                if *inclusive {
                    key >= lo
                } else {
                    key > lo
                }
            }
            KeyRange::UpperBound(hi, inclusive) => {
                if *inclusive {
                    key <= hi
                } else {
                    key < hi
                }
            }
            KeyRange::Bounded {
                lo,
                hi,
                lo_open,
                hi_open,
            } => {
                let above = if *lo_open { key > lo } else { key >= lo };
                let below = if *hi_open { key < hi } else { key <= hi };
                above && below
            }
            KeyRange::Unbounded => true,
        }
    }
}

impl From<Key> for KeyRange {
    fn from(key: Key) -> Self {
        KeyRange::Only(key)
    }
}

/// Cursor traversal direction
///
/// The `*Unique` variants visit one entry per distinct index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    ForwardUnique,
    Backward,
    BackwardUnique,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        matches!(self, Direction::Forward | Direction::ForwardUnique)
    }

    pub fn is_unique(self) -> bool {
        matches!(self, Direction::ForwardUnique | Direction::BackwardUnique)
    }
}
