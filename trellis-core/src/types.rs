use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Number (stored as string for precision)
    N(String),
    /// String
    S(String),
    /// Binary
    B(Bytes),
    /// Boolean
    Bool(bool),
    /// Null
    Null,
    /// List
    L(Vec<Value>),
    /// Map
    M(HashMap<String, Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::S(s.into())
    }

    pub fn number(n: impl ToString) -> Self {
        Value::N(n.to_string())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        Value::B(b.into())
    }

    pub fn list(l: Vec<Value>) -> Self {
        Value::L(l)
    }

    pub fn map(m: HashMap<String, Value>) -> Self {
        Value::M(m)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::N(n) => n.parse().ok(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::M(m) => Some(m),
            _ => None,
        }
    }
}

/// Item - a map of attribute names to values
pub type Item = HashMap<String, Value>;

/// Ordering key for stores and indexes.
///
/// Variant order is the cross-type sort order: integers before strings
/// before composites. Composite keys compare component-wise; every
/// component of a composite key follows the one scan direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Int(i64),
    Str(String),
    Composite(Vec<Key>),
}

impl Key {
    pub fn int(n: i64) -> Self {
        Key::Int(n)
    }

    pub fn str(s: impl Into<String>) -> Self {
        Key::Str(s.into())
    }

    /// Convert an attribute value into a key, if the value is indexable.
    ///
    /// Booleans, nulls, maps and binary values are not indexable; numbers
    /// must be integral. Records holding a non-indexable value at an index
    /// key path are absent from that index, which is not an error.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::N(n) => n.parse().ok().map(Key::Int),
            Value::S(s) => Some(Key::Str(s.clone())),
            Value::L(parts) => parts
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Composite),
            _ => None,
        }
    }

    /// Convert the key back into an attribute value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(n) => Value::N(n.to_string()),
            Key::Str(s) => Value::S(s.clone()),
            Key::Composite(parts) => Value::L(parts.iter().map(Key::to_value).collect()),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

/// Extract a key from an item by a (top-level) key path.
pub fn extract_key(item: &Item, path: &str) -> Option<Key> {
    item.get(path).and_then(Key::from_value)
}

/// Extract a composite key from an item by a list of key paths.
pub fn extract_composite_key(item: &Item, paths: &[String]) -> Option<Key> {
    paths
        .iter()
        .map(|p| extract_key(item, p))
        .collect::<Option<Vec<_>>>()
        .map(Key::Composite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_helpers() {
        let s = Value::string("hello");
        assert_eq!(s.as_string(), Some("hello"));

        let n = Value::number(42);
        assert_eq!(n.as_number(), Some(42));

        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::string("Alice"));
        let v = Value::map(map);
        assert!(v.as_map().is_some());
    }

    #[test]
    fn test_key_ordering() {
        // Integers sort numerically, strings lexically, ints before strings
        assert!(Key::Int(2) < Key::Int(10));
        assert!(Key::Str("a".into()) < Key::Str("b".into()));
        assert!(Key::Int(i64::MAX) < Key::Str("".into()));

        // Composite keys compare component-wise
        let a = Key::Composite(vec![Key::Str("active".into()), Key::Int(1)]);
        let b = Key::Composite(vec![Key::Str("active".into()), Key::Int(2)]);
        let c = Key::Composite(vec![Key::Str("done".into()), Key::Int(0)]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(Key::from_value(&Value::number(7)), Some(Key::Int(7)));
        assert_eq!(
            Key::from_value(&Value::string("x")),
            Some(Key::Str("x".into()))
        );
        // Booleans cannot be indexed
        assert_eq!(Key::from_value(&Value::Bool(true)), None);
        assert_eq!(Key::from_value(&Value::Null), None);
        // A list with a non-indexable component is not indexable
        let l = Value::L(vec![Value::string("a"), Value::Bool(false)]);
        assert_eq!(Key::from_value(&l), None);
    }

    #[test]
    fn test_extract_keys() {
        let mut item = Item::new();
        item.insert("id".to_string(), Value::number(1));
        item.insert("state".to_string(), Value::string("open"));

        assert_eq!(extract_key(&item, "id"), Some(Key::Int(1)));
        assert_eq!(extract_key(&item, "missing"), None);

        let composite =
            extract_composite_key(&item, &["state".to_string(), "id".to_string()]).unwrap();
        assert_eq!(
            composite,
            Key::Composite(vec![Key::Str("open".into()), Key::Int(1)])
        );
    }
}
