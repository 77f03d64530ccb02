/// Settings loading (defaults, optional file, environment).
pub mod config;
/// Structured logging setup on top of `tracing-subscriber`.
pub mod logging;
/// RDB dump decoding: cursor, codecs, packed formats, entry state machine.
pub mod rdb;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Settings and logging configuration.
pub use crate::config::Settings;
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Decoder, entries and values.
pub use rdb::{
    read_entries, CallbackHandler, CollectHandler, CountHandler, Decoder, DecoderOptions,
    Decompressor, Entry, FilterHandler, KeyValue, Lzf, ParseEvent, ParseHandler, ParseStats,
    StreamingParser, Value, MAX_SUPPORTED_VERSION,
};
/// Error types and result aliases.
pub use rdbstream_error::{RdbError, RdbResult, StackError, StackResult, StatusCode};
