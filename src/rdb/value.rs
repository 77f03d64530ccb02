use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use ordered_float::OrderedFloat;

/// A fully decoded value.
///
/// The on-wire sub-encoding (ziplist, listpack, intset, ...) is not
/// observable: a list stored as a quicklist and one stored element by element
/// decode to the same `Value::List`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(Bytes),
    /// Elements in stored order.
    List(Vec<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    /// Member/score pairs in stored order.
    SortedSet(Vec<(Bytes, OrderedFloat<f64>)>),
}

impl Value {
    /// Logical type name (`string`, `list`, `hash`, `set`, `zset`).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::SortedSet(_) => "zset",
        }
    }

    /// Byte length for strings, element count for collections.
    pub fn len(&self) -> usize {
        match self {
            Self::String(s) => s.len(),
            Self::List(l) => l.len(),
            Self::Hash(h) => h.len(),
            Self::Set(s) => s.len(),
            Self::SortedSet(z) => z.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One key with its value and per-key metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Bytes,
    pub value: Value,
    /// Absolute expiry, Unix milliseconds.
    pub expire_at_ms: Option<i64>,
    /// Database selected when the key was read (0 before any selector).
    pub db_index: u64,
    /// LRU idle time in seconds.
    pub idle: Option<u64>,
    /// LFU access frequency.
    pub freq: Option<u8>,
}

impl KeyValue {
    /// A key with an expiry at or before `now_ms` is already expired.
    pub fn is_expired_at(
        &self,
        now_ms: i64,
    ) -> bool {
        self.expire_at_ms.is_some_and(|at| at <= now_ms)
    }
}

/// One logical record produced by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Subsequent keys belong to database `index`.
    SelectDb { index: u64 },
    /// Expected number of keys and of keys with an expiry in the current
    /// database.
    ResizeHint { key_count: u64, expire_count: u64 },
    /// Auxiliary metadata field (writer version, creation time, ...).
    Aux { key: Bytes, value: Bytes },
    /// Source code of a function library.
    Function { code: Bytes },
    KeyValue(KeyValue),
    /// Terminal entry; the footer has been validated.
    EndOfStream,
}

impl Entry {
    pub fn as_key_value(&self) -> Option<&KeyValue> {
        match self {
            Self::KeyValue(kv) => Some(kv),
            _ => None,
        }
    }

    pub fn into_key_value(self) -> Option<KeyValue> {
        match self {
            Self::KeyValue(kv) => Some(kv),
            _ => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}
