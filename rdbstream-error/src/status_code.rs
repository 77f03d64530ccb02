use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Status codes used to categorize errors.
///
/// # Ranges
/// - 0xxx: success
/// - 1xxx: general errors
/// - 2xxx: data integrity errors
/// - 6xxx: I/O
/// - 8xxx: dump format errors
///
/// `num_enum::TryFromPrimitive` provides `TryFrom<u32>`, which the CLI uses to
/// turn exit reports back into codes.
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: success ===
    Success = 0,

    // === 1xxx: general ===
    Unknown = 1000,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    InvalidState = 1005,

    // === 2xxx: data integrity ===
    CorruptedData = 2001,
    ChecksumMismatch = 2002,

    // === 6xxx: I/O ===
    Io = 6000,
    Timeout = 6001,
    UnexpectedEof = 6002,

    // === 8xxx: dump format ===
    InvalidMagic = 8000,
    InvalidVersion = 8001,
    UnsupportedVersion = 8002,
    UnknownOpcode = 8003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Returns `None` when `v` is not a known code.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Whether re-reading the same source might succeed.
    ///
    /// Only transport-level failures qualify: a corrupt dump stays corrupt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Timeout)
    }

    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Data integrity failures (2xxx).
    pub fn is_integrity_error(&self) -> bool {
        (2000..=2999).contains(&self.code())
    }

    /// Dump format errors (8xxx).
    pub fn is_format_error(&self) -> bool {
        (8000..=8999).contains(&self.code())
    }

    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::Internal | Self::CorruptedData | Self::ChecksumMismatch
        )
    }

    /// Suggested log level for an error with this code.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::InvalidArgs | Self::InvalidState => LogLevel::Info,
            Self::Io | Self::Timeout | Self::UnexpectedEof => LogLevel::Warn,
            Self::Internal | Self::CorruptedData | Self::ChecksumMismatch => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// Process exit code used by the CLI harness.
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            0 => 0,
            2000..=2999 => 3,
            6000..=6999 => 4,
            8000..=8999 => 5,
            _ => 1,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}
