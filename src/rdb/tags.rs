//! Opcode and value-type bytes of the dump format.
//!
//! Both sets are closed: a byte that is not listed here, or that is listed but
//! newer than the dump's version, is reported as an unknown opcode.

use num_enum::TryFromPrimitive;

/// Opcodes in the closed set. 0xF6 (pre-release functions) and 0xF7 (module
/// aux data) are absent and surface as unknown opcodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum Opcode {
    Function2 = 0xF5,
    Idle = 0xF8,
    Freq = 0xF9,
    Aux = 0xFA,
    ResizeDb = 0xFB,
    ExpireTimeMs = 0xFC,
    ExpireTime = 0xFD,
    SelectDb = 0xFE,
    Eof = 0xFF,
}

impl Opcode {
    /// First dump version that may contain this opcode.
    pub const fn min_version(self) -> u32 {
        match self {
            Self::Eof | Self::SelectDb | Self::ExpireTime => 1,
            Self::ExpireTimeMs => 3,
            Self::Aux | Self::ResizeDb => 7,
            Self::Idle | Self::Freq => 9,
            Self::Function2 => 10,
        }
    }
}

/// Value type byte preceding a key.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum TypeTag {
    String = 0,
    List = 1,
    Set = 2,
    ZSet = 3,
    Hash = 4,
    /// Sorted set with binary scores.
    ZSet2 = 5,
    HashZipmap = 9,
    ListZiplist = 10,
    SetIntset = 11,
    ZSetZiplist = 12,
    HashZiplist = 13,
    ListQuicklist = 14,
    HashListpack = 16,
    ZSetListpack = 17,
    ListQuicklist2 = 18,
    SetListpack = 20,
}

impl TypeTag {
    pub const fn min_version(self) -> u32 {
        match self {
            Self::String | Self::List | Self::Set | Self::ZSet | Self::Hash => 1,
            Self::HashZipmap | Self::ListZiplist | Self::SetIntset | Self::ZSetZiplist => 2,
            Self::HashZiplist => 4,
            Self::ListQuicklist => 7,
            Self::ZSet2 => 8,
            Self::HashListpack | Self::ZSetListpack | Self::ListQuicklist2 => 10,
            Self::SetListpack => 11,
        }
    }

    /// Wire name, used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::ZSet => "zset",
            Self::Hash => "hash",
            Self::ZSet2 => "zset_2",
            Self::HashZipmap => "hash_zipmap",
            Self::ListZiplist => "list_ziplist",
            Self::SetIntset => "set_intset",
            Self::ZSetZiplist => "zset_ziplist",
            Self::HashZiplist => "hash_ziplist",
            Self::ListQuicklist => "list_quicklist",
            Self::HashListpack => "hash_listpack",
            Self::ZSetListpack => "zset_listpack",
            Self::ListQuicklist2 => "list_quicklist_2",
            Self::SetListpack => "set_listpack",
        }
    }
}

/// Node container kinds of LIST_QUICKLIST_2.
pub const QUICKLIST_NODE_PLAIN: u64 = 1;
pub const QUICKLIST_NODE_PACKED: u64 = 2;
