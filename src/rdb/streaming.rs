//! SAX-style driver over [`Decoder`].
//!
//! The parser pulls entries one at a time and hands each one to a
//! [`ParseHandler`] as a [`ParseEvent`]:
//! - `Header` once, with the dump version;
//! - one event per decoded record (`Entry` for keys, the others for metadata);
//! - `End` after the footer was validated;
//! - `Error` right before a failure is returned.
//!
//! Nothing is buffered beyond the current entry, so handlers decide what to
//! keep in memory.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Read,
};

use bytes::Bytes;
use rdbstream_error::{RdbError, ResultExt, StackError, StackResult};
use serde::Serialize;
use tracing::debug;

use super::{
    compression::{Decompressor, Lzf},
    loader::Decoder,
    value::{Entry, KeyValue},
};

/// Receives parse events.
pub trait ParseHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> StackResult<()>;

    /// Called once after `End`.
    fn finalize(&mut self) -> StackResult<()> {
        Ok(())
    }
}

/// Events emitted by [`StreamingParser::parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    Header {
        version: u32,
    },
    SelectDb {
        index: u64,
    },
    ResizeHint {
        key_count: u64,
        expire_count: u64,
    },
    Aux {
        key: Bytes,
        value: Bytes,
    },
    Function {
        code: Bytes,
    },
    Entry(KeyValue),
    /// Footer validated; `checksum` is the running value before the footer.
    End {
        checksum: u64,
        bytes_read: u64,
    },
    /// Decoding failed; the error is returned right after this event.
    Error {
        error: String,
        key: Option<String>,
        offset: Option<u64>,
    },
}

/// Counters collected while parsing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseStats {
    pub bytes_read: u64,
    /// Key/value records decoded.
    pub records_parsed: u64,
    pub aux_fields: u64,
    pub functions: u64,
    pub databases: BTreeSet<u64>,
    pub errors_count: u64,
    pub version: Option<u32>,
}

/// Event-driven parser over one dump.
pub struct StreamingParser<R, D = Lzf> {
    decoder: Decoder<R, D>,
    stats: ParseStats,
}

/// Collects every key in memory, along with aux fields and function
/// libraries.
#[derive(Debug, Default)]
pub struct CollectHandler {
    items: Vec<KeyValue>,
    aux: Vec<(Bytes, Bytes)>,
    functions: Vec<Bytes>,
}

/// Summarizes a dump without keeping any value.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CountHandler {
    version: Option<u32>,
    total_keys: u64,
    keys_with_expiry: u64,
    aux_fields: u64,
    functions: u64,
    by_type: BTreeMap<&'static str, u64>,
    by_db: BTreeMap<u64, u64>,
    #[serde(skip)]
    key_bytes: u64,
}

/// Keeps only the keys accepted by a predicate.
pub struct FilterHandler<F>
where
    F: Fn(&KeyValue) -> bool,
{
    predicate: F,
    items: Vec<KeyValue>,
}

/// Calls a closure for every key.
pub struct CallbackHandler<F>
where
    F: FnMut(KeyValue) -> StackResult<()>,
{
    callback: F,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl<R: Read> StreamingParser<R, Lzf> {
    /// Opens the dump and validates its header.
    pub fn new(reader: R) -> StackResult<Self> {
        let decoder = Decoder::open(reader).context("Failed to read dump header")?;
        Ok(Self::from_decoder(decoder))
    }
}

impl<R: Read, D: Decompressor> StreamingParser<R, D> {
    pub fn from_decoder(decoder: Decoder<R, D>) -> Self {
        let stats = ParseStats {
            version: Some(decoder.version()),
            bytes_read: decoder.offset(),
            ..ParseStats::default()
        };
        Self { decoder, stats }
    }

    /// Parses the rest of the dump, calling `handler` for each event.
    pub fn parse<H: ParseHandler>(
        &mut self,
        handler: &mut H,
    ) -> StackResult<()> {
        handler.handle_event(ParseEvent::Header {
            version: self.decoder.version(),
        })?;

        loop {
            let offset = self.decoder.offset();
            let entry = match self.decoder.next_entry() {
                Ok(entry) => entry,
                Err(err) => {
                    self.stats.errors_count += 1;
                    self.stats.bytes_read = self.decoder.offset();
                    return Err(self.report(handler, err, offset));
                }
            };
            self.stats.bytes_read = self.decoder.offset();

            let event = match entry {
                Entry::EndOfStream => break,
                Entry::SelectDb { index } => {
                    self.stats.databases.insert(index);
                    ParseEvent::SelectDb { index }
                }
                Entry::ResizeHint {
                    key_count,
                    expire_count,
                } => ParseEvent::ResizeHint {
                    key_count,
                    expire_count,
                },
                Entry::Aux { key, value } => {
                    self.stats.aux_fields += 1;
                    ParseEvent::Aux { key, value }
                }
                Entry::Function { code } => {
                    self.stats.functions += 1;
                    ParseEvent::Function { code }
                }
                Entry::KeyValue(kv) => {
                    self.stats.records_parsed += 1;
                    self.stats.databases.insert(kv.db_index);
                    ParseEvent::Entry(kv)
                }
            };

            if let Err(err) = handler.handle_event(event) {
                handler.handle_event(ParseEvent::Error {
                    error: err.to_string(),
                    key: None,
                    offset: Some(offset),
                })?;
                return Err(err.context_at(offset, "Handler rejected entry"));
            }
        }

        handler.handle_event(ParseEvent::End {
            checksum: self.decoder.checksum(),
            bytes_read: self.decoder.offset(),
        })?;
        handler.finalize()?;

        debug!(
            records = self.stats.records_parsed,
            bytes = self.stats.bytes_read,
            "streaming parse finished"
        );
        Ok(())
    }

    fn report<H: ParseHandler>(
        &self,
        handler: &mut H,
        err: RdbError,
        offset: u64,
    ) -> StackError {
        let key = match &err {
            RdbError::CorruptPayload { key, .. } => key.clone(),
            _ => None,
        };
        let event = ParseEvent::Error {
            error: err.to_string(),
            key,
            offset: err.offset().or(Some(offset)),
        };
        if let Err(handler_err) = handler.handle_event(event) {
            return handler_err;
        }
        StackError::from(err).context_at(offset, "Failed to decode entry")
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn version(&self) -> u32 {
        self.decoder.version()
    }

    pub fn into_decoder(self) -> Decoder<R, D> {
        self.decoder
    }
}

impl CollectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[KeyValue] {
        &self.items
    }

    pub fn into_items(self) -> Vec<KeyValue> {
        self.items
    }

    pub fn aux(&self) -> &[(Bytes, Bytes)] {
        &self.aux
    }

    pub fn functions(&self) -> &[Bytes] {
        &self.functions
    }
}

impl CountHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_keys(&self) -> u64 {
        self.total_keys
    }

    pub fn keys_with_expiry(&self) -> u64 {
        self.keys_with_expiry
    }

    /// Key count per logical type name.
    pub fn by_type(&self) -> &BTreeMap<&'static str, u64> {
        &self.by_type
    }

    /// Key count per database index.
    pub fn by_db(&self) -> &BTreeMap<u64, u64> {
        &self.by_db
    }

    pub fn aux_fields(&self) -> u64 {
        self.aux_fields
    }

    pub fn functions(&self) -> u64 {
        self.functions
    }

    pub fn avg_key_length(&self) -> f64 {
        if self.total_keys == 0 {
            0.0
        } else {
            self.key_bytes as f64 / self.total_keys as f64
        }
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }
}

impl<F> FilterHandler<F>
where
    F: Fn(&KeyValue) -> bool,
{
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[KeyValue] {
        &self.items
    }

    pub fn into_items(self) -> Vec<KeyValue> {
        self.items
    }
}

impl<F> CallbackHandler<F>
where
    F: FnMut(KeyValue) -> StackResult<()>,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

/// Reads a whole dump into memory and returns its keys.
pub fn read_entries<R: Read>(reader: R) -> StackResult<Vec<KeyValue>> {
    let mut parser = StreamingParser::new(reader)?;
    let mut handler = CollectHandler::new();
    parser.parse(&mut handler)?;
    Ok(handler.into_items())
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations
////////////////////////////////////////////////////////////////////////////////

impl ParseHandler for CollectHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> StackResult<()> {
        match event {
            ParseEvent::Entry(kv) => self.items.push(kv),
            ParseEvent::Aux { key, value } => self.aux.push((key, value)),
            ParseEvent::Function { code } => self.functions.push(code),
            _ => {}
        }
        Ok(())
    }
}

impl ParseHandler for CountHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> StackResult<()> {
        match event {
            ParseEvent::Header { version } => self.version = Some(version),
            ParseEvent::Aux { .. } => self.aux_fields += 1,
            ParseEvent::Function { .. } => self.functions += 1,
            ParseEvent::Entry(kv) => {
                self.total_keys += 1;
                self.key_bytes += kv.key.len() as u64;
                if kv.expire_at_ms.is_some() {
                    self.keys_with_expiry += 1;
                }
                *self.by_type.entry(kv.value.type_name()).or_default() += 1;
                *self.by_db.entry(kv.db_index).or_default() += 1;
            }
            _ => {}
        }
        Ok(())
    }
}

impl<F> ParseHandler for FilterHandler<F>
where
    F: Fn(&KeyValue) -> bool,
{
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> StackResult<()> {
        if let ParseEvent::Entry(kv) = event {
            if (self.predicate)(&kv) {
                self.items.push(kv);
            }
        }
        Ok(())
    }
}

impl<F> ParseHandler for CallbackHandler<F>
where
    F: FnMut(KeyValue) -> StackResult<()>,
{
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> StackResult<()> {
        if let ParseEvent::Entry(kv) = event {
            (self.callback)(kv)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rdbstream_error::{GenericError, StatusCode};

    use super::*;
    use crate::rdb::{checksum::Crc64, value::Value};

    /// Version 11 dump with an aux field, db 0 string keys and one key in
    /// db 3 that expires.
    fn dump(keys: &[(&str, &str)]) -> Vec<u8> {
        let mut out = b"REDIS0011".to_vec();
        out.extend_from_slice(b"\xfa\x05ctime\xc2\x00\x00\x00\x65");
        for (k, v) in keys {
            out.push(0x00);
            out.push(k.len() as u8);
            out.extend_from_slice(k.as_bytes());
            out.push(v.len() as u8);
            out.extend_from_slice(v.as_bytes());
        }
        out.extend_from_slice(b"\xfe\x03\xfc");
        out.extend_from_slice(&1000i64.to_le_bytes());
        out.extend_from_slice(b"\x01\x04list\x02\x01a\x01b");
        out.push(0xFF);
        let crc = Crc64::checksum(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<ParseEvent>,
        finalized: bool,
    }

    impl ParseHandler for Recorder {
        fn handle_event(
            &mut self,
            event: ParseEvent,
        ) -> StackResult<()> {
            self.events.push(event);
            Ok(())
        }

        fn finalize(&mut self) -> StackResult<()> {
            self.finalized = true;
            Ok(())
        }
    }

    #[test]
    fn test_collect_handler() {
        let bytes = dump(&[("k1", "v1"), ("k2", "v2")]);
        let mut parser = StreamingParser::new(Cursor::new(bytes)).unwrap();
        let mut handler = CollectHandler::new();
        parser.parse(&mut handler).unwrap();

        assert_eq!(handler.items().len(), 3);
        assert_eq!(&handler.items()[0].key[..], b"k1");
        assert_eq!(handler.aux().len(), 1);
        assert_eq!(&handler.aux()[0].1[..], b"1694498816");
        let list = &handler.items()[2];
        assert_eq!(list.db_index, 3);
        assert_eq!(list.expire_at_ms, Some(1000));
    }

    #[test]
    fn test_filter_handler() {
        let bytes = dump(&[("user:1", "a"), ("post:1", "b"), ("user:2", "c")]);
        let mut parser = StreamingParser::new(Cursor::new(bytes)).unwrap();
        let mut handler = FilterHandler::new(|kv: &KeyValue| kv.key.starts_with(b"user:"));
        parser.parse(&mut handler).unwrap();

        assert_eq!(handler.items().len(), 2);
        assert!(handler.items().iter().all(|kv| kv.key.starts_with(b"user:")));
    }

    #[test]
    fn test_count_handler() {
        let bytes = dump(&[("a", "1"), ("bb", "2"), ("ccc", "3")]);
        let mut parser = StreamingParser::new(Cursor::new(bytes)).unwrap();
        let mut handler = CountHandler::new();
        parser.parse(&mut handler).unwrap();

        assert_eq!(handler.total_keys(), 4);
        assert_eq!(handler.keys_with_expiry(), 1);
        assert_eq!(handler.by_type().get("string"), Some(&3));
        assert_eq!(handler.by_type().get("list"), Some(&1));
        assert_eq!(handler.by_db().get(&3), Some(&1));
        assert_eq!(handler.aux_fields(), 1);
        assert_eq!(handler.avg_key_length(), 10.0 / 4.0);
        assert_eq!(handler.version(), Some(11));
    }

    #[test]
    fn test_callback_handler_error_stops_parse() {
        let bytes = dump(&[("a", "1"), ("b", "2")]);
        let mut parser = StreamingParser::new(Cursor::new(bytes)).unwrap();
        let mut seen = Vec::new();
        let mut handler = CallbackHandler::new(|kv: KeyValue| {
            seen.push(kv.key.clone());
            if seen.len() == 2 {
                return Err(GenericError::new(StatusCode::InvalidState, "stop").into());
            }
            Ok(())
        });

        let err = parser.parse(&mut handler).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidState);
        assert_eq!(err.contexts()[0].message, "Handler rejected entry");
        assert!(err.offset().is_some());
        drop(handler);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_event_order_and_stats() {
        let mut parser = StreamingParser::new(Cursor::new(dump(&[("k", "v")]))).unwrap();
        let mut rec = Recorder::default();
        parser.parse(&mut rec).unwrap();

        assert!(rec.finalized);
        assert_eq!(rec.events[0], ParseEvent::Header { version: 11 });
        assert!(matches!(rec.events[1], ParseEvent::Aux { .. }));
        assert!(matches!(rec.events[2], ParseEvent::Entry(_)));
        assert_eq!(rec.events[3], ParseEvent::SelectDb { index: 3 });
        assert!(matches!(rec.events.last(), Some(ParseEvent::End { .. })));

        let stats = parser.stats();
        assert_eq!(stats.records_parsed, 2);
        assert_eq!(stats.aux_fields, 1);
        assert_eq!(stats.errors_count, 0);
        assert_eq!(stats.databases.iter().copied().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(stats.bytes_read, dump(&[("k", "v")]).len() as u64);
    }

    #[test]
    fn test_decode_error_emits_error_event() {
        let mut bytes = dump(&[("k", "v")]);
        let n = bytes.len();
        bytes[n - 3] ^= 0xFF;
        let mut parser = StreamingParser::new(Cursor::new(bytes)).unwrap();
        let mut rec = Recorder::default();

        let err = parser.parse(&mut rec).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ChecksumMismatch);
        assert_eq!(err.offset(), Some(n as u64 - 8));
        assert_eq!(err.contexts()[0].message, "Failed to decode entry");
        assert!(!rec.finalized);
        assert!(matches!(rec.events.last(), Some(ParseEvent::Error { .. })));
        assert_eq!(parser.stats().errors_count, 1);
    }

    #[test]
    fn test_read_entries() {
        let keys = read_entries(Cursor::new(dump(&[("x", "y")]))).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].value, Value::String(Bytes::from_static(b"y")));
    }

    #[test]
    fn test_bad_header_has_context() {
        let err = StreamingParser::new(Cursor::new(b"NOTRDB000".to_vec())).err().unwrap();
        assert_eq!(err.status_code(), StatusCode::InvalidMagic);
        assert_eq!(err.contexts()[0].message, "Failed to read dump header");
    }
}
