//! Streaming decoder for RDB dumps.
//!
//! Layers, leaves first:
//!
//! - `checksum`: running CRC-64 over consumed bytes.
//! - `cursor`: byte source wrapper tracking offset and checksum together.
//! - `primitive`: length prefixes, encoded strings, doubles.
//! - `compression`: pluggable decompression of compressed strings.
//! - `packed`: ziplist, listpack, intset and zipmap blobs.
//! - `decode`: value decoders dispatched by type tag.
//! - `file`: header and footer validation.
//! - `loader`: the opcode state machine, [`Decoder`].
//! - `streaming`: event handlers on top of the decoder.

pub mod checksum;
pub mod compression;
pub mod cursor;
pub(crate) mod decode;
pub mod file;
pub mod loader;
pub mod options;
pub mod packed;
pub mod primitive;
pub mod streaming;
pub mod tags;
pub mod value;

pub use checksum::Crc64;
pub use compression::{DecompressError, Decompressor, Lzf};
pub use cursor::ByteCursor;
pub use file::{Header, MAGIC, MAX_SUPPORTED_VERSION};
pub use loader::Decoder;
pub use options::DecoderOptions;
pub use streaming::{
    read_entries, CallbackHandler, CollectHandler, CountHandler, FilterHandler, ParseEvent,
    ParseHandler, ParseStats, StreamingParser,
};
pub use tags::{Opcode, TypeTag};
pub use value::{Entry, KeyValue, Value};
