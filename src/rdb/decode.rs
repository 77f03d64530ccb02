//! Value decoders, one per type tag.
//!
//! Plain encodings are read element by element from the cursor. Packed
//! encodings are read as a single string blob and handed to the pure decoders
//! in [`packed`](super::packed). Either way the result is the same
//! encoding-agnostic [`Value`].

use std::{
    collections::{hash_map, HashMap, HashSet},
    io::Read,
};

use bytes::Bytes;
use ordered_float::OrderedFloat;
use rdbstream_error::{RdbError, RdbResult};

use super::{
    compression::Decompressor,
    cursor::ByteCursor,
    options::DecoderOptions,
    packed::{self, PackedEntry, PackedError},
    primitive,
    tags::{TypeTag, QUICKLIST_NODE_PACKED, QUICKLIST_NODE_PLAIN},
    value::Value,
};

/// Collections never pre-allocate more than this many slots from a declared
/// count; the rest grows as elements actually arrive.
const PREALLOC_LIMIT: usize = 4096;

/// How sorted-set scores are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreFormat {
    Text,
    Binary,
}

/// Borrowed decoding context for one value.
pub(crate) struct ValueReader<'a, R, D: ?Sized> {
    cursor: &'a mut ByteCursor<R>,
    decompressor: &'a D,
    options: &'a DecoderOptions,
}

impl<'a, R: Read, D: Decompressor + ?Sized> ValueReader<'a, R, D> {
    pub fn new(
        cursor: &'a mut ByteCursor<R>,
        decompressor: &'a D,
        options: &'a DecoderOptions,
    ) -> Self {
        Self {
            cursor,
            decompressor,
            options,
        }
    }

    pub fn read_string(&mut self) -> RdbResult<Bytes> {
        primitive::read_string(self.cursor, self.decompressor, self.options.max_string_len)
    }

    pub fn read_length(&mut self) -> RdbResult<u64> {
        primitive::read_length(self.cursor)
    }

    /// Dispatches on the type tag and reads the whole value.
    pub fn read_value(
        &mut self,
        tag: TypeTag,
    ) -> RdbResult<Value> {
        match tag {
            TypeTag::String => Ok(Value::String(self.read_string()?)),
            TypeTag::List => self.read_list(),
            TypeTag::Set => self.read_set(),
            TypeTag::ZSet => self.read_zset(ScoreFormat::Text),
            TypeTag::ZSet2 => self.read_zset(ScoreFormat::Binary),
            TypeTag::Hash => self.read_hash(),
            TypeTag::HashZipmap => self.read_hash_zipmap(),
            TypeTag::ListZiplist => {
                let (_, entries) = self.read_packed(packed::ziplist::decode)?;
                Ok(Value::List(
                    entries.into_iter().map(PackedEntry::into_bytes).collect(),
                ))
            }
            TypeTag::SetIntset => self.read_set_intset(),
            TypeTag::ZSetZiplist => {
                let (offset, entries) = self.read_packed(packed::ziplist::decode)?;
                zset_from_entries(offset, entries, "ziplist")
            }
            TypeTag::HashZiplist => {
                let (offset, entries) = self.read_packed(packed::ziplist::decode)?;
                hash_from_entries(offset, entries, "ziplist")
            }
            TypeTag::ListQuicklist => self.read_quicklist(),
            TypeTag::HashListpack => {
                let (offset, entries) = self.read_packed(packed::listpack::decode)?;
                hash_from_entries(offset, entries, "listpack")
            }
            TypeTag::ZSetListpack => {
                let (offset, entries) = self.read_packed(packed::listpack::decode)?;
                zset_from_entries(offset, entries, "listpack")
            }
            TypeTag::ListQuicklist2 => self.read_quicklist2(),
            TypeTag::SetListpack => {
                let (offset, entries) = self.read_packed(packed::listpack::decode)?;
                let mut set = HashSet::with_capacity(entries.len());
                for entry in entries {
                    insert_member(&mut set, entry.into_bytes(), offset)?;
                }
                Ok(Value::Set(set))
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Plain encodings
    ////////////////////////////////////////////////////////////////////////////

    fn read_count(
        &mut self,
        what: &str,
    ) -> RdbResult<usize> {
        let offset = self.cursor.offset();
        let n = self.read_length()?;
        primitive::bounded(offset, n, self.options.max_collection_len, what)
    }

    fn read_list(&mut self) -> RdbResult<Value> {
        let n = self.read_count("list length")?;
        let mut list = Vec::with_capacity(n.min(PREALLOC_LIMIT));
        for _ in 0..n {
            list.push(self.read_string()?);
        }
        Ok(Value::List(list))
    }

    fn read_set(&mut self) -> RdbResult<Value> {
        let n = self.read_count("set size")?;
        let mut set = HashSet::with_capacity(n.min(PREALLOC_LIMIT));
        for _ in 0..n {
            let offset = self.cursor.offset();
            let member = self.read_string()?;
            insert_member(&mut set, member, offset)?;
        }
        Ok(Value::Set(set))
    }

    fn read_hash(&mut self) -> RdbResult<Value> {
        let n = self.read_count("hash size")?;
        let mut hash = HashMap::with_capacity(n.min(PREALLOC_LIMIT));
        for _ in 0..n {
            let offset = self.cursor.offset();
            let field = self.read_string()?;
            let value = self.read_string()?;
            insert_field(&mut hash, field, value, offset)?;
        }
        Ok(Value::Hash(hash))
    }

    fn read_zset(
        &mut self,
        format: ScoreFormat,
    ) -> RdbResult<Value> {
        let n = self.read_count("sorted set size")?;
        let mut pairs = Vec::with_capacity(n.min(PREALLOC_LIMIT));
        let mut seen = HashSet::with_capacity(n.min(PREALLOC_LIMIT));
        for _ in 0..n {
            let offset = self.cursor.offset();
            let member = self.read_string()?;
            let score = match format {
                ScoreFormat::Text => primitive::read_text_double(self.cursor)?,
                ScoreFormat::Binary => primitive::read_binary_double(self.cursor)?,
            };
            insert_member(&mut seen, member.clone(), offset)?;
            pairs.push((member, OrderedFloat(score)));
        }
        Ok(Value::SortedSet(pairs))
    }

    ////////////////////////////////////////////////////////////////////////////
    // Packed encodings
    ////////////////////////////////////////////////////////////////////////////

    /// Reads one blob and runs a packed decoder over it. Returns the stream
    /// offset of the blob alongside the result so callers can report
    /// higher-level problems at the same place.
    fn read_packed<T>(
        &mut self,
        decode: fn(&Bytes) -> Result<T, PackedError>,
    ) -> RdbResult<(u64, T)> {
        let offset = self.cursor.offset();
        let blob = self.read_string()?;
        let out = decode(&blob).map_err(|e| packed_error(offset, e))?;
        Ok((offset, out))
    }

    fn read_hash_zipmap(&mut self) -> RdbResult<Value> {
        let (offset, pairs) = self.read_packed(packed::zipmap::decode)?;
        let mut hash = HashMap::with_capacity(pairs.len());
        for (field, value) in pairs {
            insert_field(&mut hash, field, value, offset)?;
        }
        Ok(Value::Hash(hash))
    }

    fn read_set_intset(&mut self) -> RdbResult<Value> {
        let (_, members) = self.read_packed(packed::intset::decode)?;
        // Strict ordering already rules out duplicates.
        Ok(Value::Set(
            members.into_iter().map(primitive::int_to_bytes).collect(),
        ))
    }

    /// LIST_QUICKLIST: a count followed by that many ziplist nodes. An empty
    /// node contributes nothing.
    fn read_quicklist(&mut self) -> RdbResult<Value> {
        let nodes = self.read_count("quicklist node count")?;
        let mut list = Vec::new();
        for _ in 0..nodes {
            let (_, entries) = self.read_packed(packed::ziplist::decode)?;
            list.extend(entries.into_iter().map(PackedEntry::into_bytes));
        }
        Ok(Value::List(list))
    }

    /// LIST_QUICKLIST_2: each node carries a container kind, either a single
    /// plain element or a listpack of elements. Empty listpack nodes are
    /// skipped, the same as empty ziplist nodes in LIST_QUICKLIST.
    fn read_quicklist2(&mut self) -> RdbResult<Value> {
        let nodes = self.read_count("quicklist node count")?;
        let mut list = Vec::new();
        for _ in 0..nodes {
            let offset = self.cursor.offset();
            match self.read_length()? {
                QUICKLIST_NODE_PLAIN => list.push(self.read_string()?),
                QUICKLIST_NODE_PACKED => {
                    let (_, entries) = self.read_packed(packed::listpack::decode)?;
                    list.extend(entries.into_iter().map(PackedEntry::into_bytes));
                }
                other => {
                    return Err(RdbError::corrupt(
                        offset,
                        format!("unknown quicklist container {other}"),
                    ))
                }
            }
        }
        Ok(Value::List(list))
    }
}

fn packed_error(
    offset: u64,
    err: PackedError,
) -> RdbError {
    RdbError::corrupt(offset, err.to_string())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn insert_member(
    set: &mut HashSet<Bytes>,
    member: Bytes,
    offset: u64,
) -> RdbResult<()> {
    if set.contains(&member) {
        return Err(RdbError::corrupt(
            offset,
            format!("duplicate member {:?}", lossy(&member)),
        ));
    }
    set.insert(member);
    Ok(())
}

fn insert_field(
    hash: &mut HashMap<Bytes, Bytes>,
    field: Bytes,
    value: Bytes,
    offset: u64,
) -> RdbResult<()> {
    match hash.entry(field) {
        hash_map::Entry::Occupied(e) => Err(RdbError::corrupt(
            offset,
            format!("duplicate hash field {:?}", lossy(e.key())),
        )),
        hash_map::Entry::Vacant(e) => {
            e.insert(value);
            Ok(())
        }
    }
}

fn hash_from_entries(
    offset: u64,
    entries: Vec<PackedEntry>,
    structure: &'static str,
) -> RdbResult<Value> {
    let pairs = packed::into_pairs(entries, structure).map_err(|e| packed_error(offset, e))?;
    let mut hash = HashMap::with_capacity(pairs.len());
    for (field, value) in pairs {
        insert_field(&mut hash, field.into_bytes(), value.into_bytes(), offset)?;
    }
    Ok(Value::Hash(hash))
}

/// Member/score pairs in stored order. Scores may be integers or decimal text.
fn zset_from_entries(
    offset: u64,
    entries: Vec<PackedEntry>,
    structure: &'static str,
) -> RdbResult<Value> {
    let pairs = packed::into_pairs(entries, structure).map_err(|e| packed_error(offset, e))?;
    let mut seen = HashSet::with_capacity(pairs.len());
    let mut out = Vec::with_capacity(pairs.len());
    for (member, score) in pairs {
        let score = score.to_f64().ok_or_else(|| {
            RdbError::corrupt(offset, format!("invalid score in {structure}: {score:?}"))
        })?;
        let member = member.into_bytes();
        insert_member(&mut seen, member.clone(), offset)?;
        out.push((member, OrderedFloat(score)));
    }
    Ok(Value::SortedSet(out))
}
