//! Opcode-driven entry state machine.

use std::{io::Read, iter::FusedIterator};

use rdbstream_error::{RdbError, RdbResult};
use tracing::{debug, trace, warn};

use super::{
    compression::{Decompressor, Lzf},
    cursor::ByteCursor,
    decode::ValueReader,
    file::{self, Header},
    options::DecoderOptions,
    primitive,
    tags::{Opcode, TypeTag},
    value::{Entry, KeyValue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Ready to read the next opcode.
    Reading,
    /// End of stream returned and footer validated.
    Done,
    /// A previous call failed; the stream position is meaningless.
    Failed,
}

/// Per-key metadata announced by opcodes that precede the key.
#[derive(Debug, Default, Clone, Copy)]
struct Pending {
    expire_at_ms: Option<i64>,
    idle: Option<u64>,
    freq: Option<u8>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.expire_at_ms.is_none() && self.idle.is_none() && self.freq.is_none()
    }
}

/// Streaming decoder of one RDB dump.
///
/// Construction validates the header. Each call to
/// [`next_entry`](Self::next_entry) reads exactly as many bytes as the next
/// logical entry needs and returns it fully decoded. The footer is validated
/// in the same call that reaches the end-of-stream opcode, before
/// [`Entry::EndOfStream`] is returned.
///
/// Any error is terminal: the format has no resynchronization marker, so
/// every later call returns [`RdbError::AlreadyFinished`].
///
/// ```no_run
/// use rdbstream::{Decoder, Entry};
///
/// let file = std::io::BufReader::new(std::fs::File::open("dump.rdb")?);
/// let mut decoder = Decoder::open(file)?;
/// loop {
///     match decoder.next_entry()? {
///         Entry::KeyValue(kv) => println!("{:?} => {}", kv.key, kv.value.type_name()),
///         Entry::EndOfStream => break,
///         _ => {}
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Decoder<R, D = Lzf> {
    cursor: ByteCursor<R>,
    header: Header,
    decompressor: D,
    options: DecoderOptions,
    state: State,
    db_index: u64,
    pending: Pending,
    keys_read: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl<R: Read> Decoder<R, Lzf> {
    /// Opens a dump with default options and LZF decompression.
    pub fn open(reader: R) -> RdbResult<Self> {
        Self::with_options(reader, DecoderOptions::default(), Lzf)
    }
}

impl<R: Read, D: Decompressor> Decoder<R, D> {
    pub fn with_options(
        reader: R,
        options: DecoderOptions,
        decompressor: D,
    ) -> RdbResult<Self> {
        let mut cursor = ByteCursor::new(reader);
        let header = file::parse_header(&mut cursor)?;
        debug!(
            version = header.version,
            footer = header.has_footer(),
            verify_checksum = options.verify_checksum,
            "dump header parsed"
        );
        Ok(Self {
            cursor,
            header,
            decompressor,
            options,
            state: State::Reading,
            db_index: 0,
            pending: Pending::default(),
            keys_read: 0,
        })
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn header(&self) -> Header {
        self.header
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Running checksum of the bytes consumed so far, footer excluded.
    pub fn checksum(&self) -> u64 {
        self.cursor.checksum()
    }

    /// Currently selected database.
    pub fn db_index(&self) -> u64 {
        self.db_index
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// True once the end of stream was returned or a call failed.
    pub fn is_finished(&self) -> bool {
        self.state != State::Reading
    }

    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }

    /// Reads the next logical entry.
    pub fn next_entry(&mut self) -> RdbResult<Entry> {
        if self.state != State::Reading {
            return Err(RdbError::AlreadyFinished);
        }
        match self.step() {
            Ok(entry) => {
                if entry.is_end() {
                    self.state = State::Done;
                    debug!(
                        keys = self.keys_read,
                        bytes = self.cursor.offset(),
                        "dump fully decoded"
                    );
                }
                Ok(entry)
            }
            Err(err) => {
                self.state = State::Failed;
                debug!(error = %err, "dump decoding aborted");
                Err(err)
            }
        }
    }

    fn step(&mut self) -> RdbResult<Entry> {
        let version = self.header.version;
        loop {
            let offset = self.cursor.offset();
            let byte = self.cursor.read_u8()?;

            let Ok(opcode) = Opcode::try_from(byte) else {
                let tag = TypeTag::try_from(byte)
                    .ok()
                    .filter(|tag| version >= tag.min_version())
                    .ok_or(RdbError::UnknownOpcode {
                        offset,
                        opcode: byte,
                        version,
                    })?;
                return self.read_key_value(tag);
            };

            if version < opcode.min_version() {
                return Err(RdbError::UnknownOpcode {
                    offset,
                    opcode: byte,
                    version,
                });
            }

            match opcode {
                Opcode::Eof => {
                    if !self.pending.is_empty() {
                        warn!(offset, "key metadata without a following key");
                    }
                    file::verify_footer(
                        &mut self.cursor,
                        &self.header,
                        self.options.verify_checksum,
                    )?;
                    return Ok(Entry::EndOfStream);
                }
                Opcode::SelectDb => {
                    let index = primitive::read_length(&mut self.cursor)?;
                    self.db_index = index;
                    trace!(index, "select db");
                    return Ok(Entry::SelectDb { index });
                }
                Opcode::ResizeDb => {
                    let key_count = primitive::read_length(&mut self.cursor)?;
                    let expire_count = primitive::read_length(&mut self.cursor)?;
                    return Ok(Entry::ResizeHint {
                        key_count,
                        expire_count,
                    });
                }
                Opcode::Aux => {
                    let mut reader = self.value_reader();
                    let key = reader.read_string()?;
                    let value = reader.read_string()?;
                    trace!(key = %String::from_utf8_lossy(&key), "aux field");
                    return Ok(Entry::Aux { key, value });
                }
                Opcode::Function2 => {
                    let code = self.value_reader().read_string()?;
                    return Ok(Entry::Function { code });
                }
                Opcode::ExpireTime => {
                    let secs = self.cursor.read_i32_le()?;
                    self.pending.expire_at_ms = Some(i64::from(secs) * 1000);
                }
                Opcode::ExpireTimeMs => {
                    let ms = self.cursor.read_i64_le()?;
                    self.pending.expire_at_ms = Some(ms);
                }
                Opcode::Idle => {
                    let idle = primitive::read_length(&mut self.cursor)?;
                    self.pending.idle = Some(idle);
                }
                Opcode::Freq => {
                    let freq = self.cursor.read_u8()?;
                    self.pending.freq = Some(freq);
                }
            }
        }
    }

    fn read_key_value(
        &mut self,
        tag: TypeTag,
    ) -> RdbResult<Entry> {
        // Metadata belongs to this key whether or not it decodes.
        let pending = std::mem::take(&mut self.pending);
        let db_index = self.db_index;

        let mut reader = self.value_reader();
        let key = reader.read_string()?;
        let value = reader
            .read_value(tag)
            .map_err(|err| err.with_key(&key))?;

        self.keys_read += 1;
        trace!(
            key = %String::from_utf8_lossy(&key),
            kind = tag.name(),
            db = db_index,
            "key decoded"
        );

        Ok(Entry::KeyValue(KeyValue {
            key,
            value,
            expire_at_ms: pending.expire_at_ms,
            db_index,
            idle: pending.idle,
            freq: pending.freq,
        }))
    }

    fn value_reader(&mut self) -> ValueReader<'_, R, D> {
        ValueReader::new(&mut self.cursor, &self.decompressor, &self.options)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations
////////////////////////////////////////////////////////////////////////////////

/// Yields every entry up to and including [`Entry::EndOfStream`], then
/// `None`. After an error the iterator is exhausted.
impl<R: Read, D: Decompressor> Iterator for Decoder<R, D> {
    type Item = RdbResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != State::Reading {
            return None;
        }
        Some(self.next_entry())
    }
}

impl<R: Read, D: Decompressor> FusedIterator for Decoder<R, D> {}

impl<R, D> std::fmt::Debug for Decoder<R, D> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("version", &self.header.version)
            .field("state", &self.state)
            .field("db_index", &self.db_index)
            .field("keys_read", &self.keys_read)
            .finish_non_exhaustive()
    }
}
