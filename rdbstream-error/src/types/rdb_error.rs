use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Failure while decoding an RDB dump.
///
/// Every variant except [`RdbError::AlreadyFinished`] aborts the load: the
/// format has no resynchronization point, so nothing after the failure is
/// usable.
#[derive(Debug, Error)]
pub enum RdbError {
    /// The first five bytes are not `REDIS`.
    #[error("invalid magic: expected \"REDIS\", got {:?}", String::from_utf8_lossy(found))]
    BadMagic { found: [u8; 5] },

    /// The four version bytes are not ASCII digits.
    #[error("invalid version field {:?}", String::from_utf8_lossy(raw))]
    BadVersion { raw: [u8; 4] },

    #[error("unsupported dump version {version} (supported: 1..={max})")]
    UnsupportedVersion { version: u32, max: u32 },

    /// The source ended before a declared field was complete.
    #[error("truncated stream at offset {offset:#x}: needed {needed} bytes, got {available}")]
    TruncatedStream {
        offset: u64,
        needed: usize,
        available: usize,
    },

    /// A structurally invalid value, length or packed blob.
    #[error("corrupt payload at offset {offset:#x}: {reason}{}", key_suffix(key.as_deref()))]
    CorruptPayload {
        offset: u64,
        reason: String,
        key: Option<String>,
    },

    /// A byte that is neither a known opcode nor a type tag valid for the
    /// dump version.
    #[error("unknown opcode 0x{opcode:02X} at offset {offset:#x} (dump version {version})")]
    UnknownOpcode { offset: u64, opcode: u8, version: u32 },

    /// The footer does not match the checksum of the preceding bytes.
    #[error(
        "checksum mismatch at offset {offset:#x}: computed {expected:#018x}, footer {found:#018x}"
    )]
    ChecksumMismatch {
        offset: u64,
        expected: u64,
        found: u64,
    },

    /// The decoder was polled after it finished or failed.
    #[error("decoder already finished")]
    AlreadyFinished,

    /// The byte source failed for a reason other than running out of data.
    #[error("read failed at offset {offset:#x}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
}

fn key_suffix(key: Option<&str>) -> String {
    key.map(|k| format!(" [key: {k}]")).unwrap_or_default()
}

impl RdbError {
    pub fn corrupt(
        offset: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self::CorruptPayload {
            offset,
            reason: reason.into(),
            key: None,
        }
    }

    /// Attaches the key being decoded. Only payload errors carry a key.
    pub fn with_key(
        mut self,
        key: &[u8],
    ) -> Self {
        if let Self::CorruptPayload { key: k, .. } = &mut self {
            *k = Some(String::from_utf8_lossy(key).into_owned());
        }
        self
    }

    /// Byte offset the error refers to, when it has one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::TruncatedStream { offset, .. }
            | Self::CorruptPayload { offset, .. }
            | Self::UnknownOpcode { offset, .. }
            | Self::ChecksumMismatch { offset, .. }
            | Self::Io { offset, .. } => Some(*offset),
            Self::BadMagic { .. } | Self::BadVersion { .. } | Self::UnsupportedVersion { .. } => {
                Some(0)
            }
            Self::AlreadyFinished => None,
        }
    }

    /// Header-stage failures: nothing past the prologue was read.
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. } | Self::BadVersion { .. } | Self::UnsupportedVersion { .. }
        )
    }

    /// The payload parsed but its bytes were altered.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }

    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::BadMagic { .. } | Self::BadVersion { .. } => Some("Source is not an RDB dump"),
            Self::UnsupportedVersion { .. } => {
                Some("Dump was written by a newer server; upgrade the decoder")
            }
            Self::TruncatedStream { .. } => Some("Dump is incomplete; re-fetch the full snapshot"),
            Self::CorruptPayload { .. } | Self::ChecksumMismatch { .. } => {
                Some("Dump is damaged; load a snapshot from another replica")
            }
            Self::UnknownOpcode { .. } => {
                Some("Dump uses a value type or module this decoder does not support")
            }
            Self::Io { .. } => Some("Check the byte source and retry"),
            Self::AlreadyFinished => None,
        }
    }
}

impl ErrorExt for RdbError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadMagic { .. } => StatusCode::InvalidMagic,
            Self::BadVersion { .. } => StatusCode::InvalidVersion,
            Self::UnsupportedVersion { .. } => StatusCode::UnsupportedVersion,
            Self::TruncatedStream { .. } => StatusCode::UnexpectedEof,
            Self::CorruptPayload { .. } => StatusCode::CorruptedData,
            Self::UnknownOpcode { .. } => StatusCode::UnknownOpcode,
            Self::ChecksumMismatch { .. } => StatusCode::ChecksumMismatch,
            Self::AlreadyFinished => StatusCode::InvalidState,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::TimedOut => {
                StatusCode::Timeout
            }
            Self::Io { .. } => StatusCode::Io,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::BadMagic { .. } | Self::BadVersion { .. } => "Not an RDB dump".to_string(),
            Self::UnsupportedVersion { version, .. } => {
                format!("Unsupported RDB version {version}")
            }
            Self::TruncatedStream { .. } => "Dump is truncated".to_string(),
            Self::CorruptPayload { .. } => "Dump is corrupted".to_string(),
            Self::UnknownOpcode { opcode, .. } => format!("Unknown RDB opcode 0x{opcode:02X}"),
            Self::ChecksumMismatch { .. } => "Dump checksum mismatch".to_string(),
            Self::AlreadyFinished => "Decoder already finished".to_string(),
            Self::Io { .. } => "Failed to read dump".to_string(),
        }
    }

    fn log_message(&self) -> String {
        match self.recovery_hint() {
            Some(hint) => format!("{self:?} | Hint: {hint}"),
            None => format!("{self:?}"),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ];
        match self {
            Self::UnknownOpcode { opcode, .. } => {
                tags.push(("opcode", format!("0x{opcode:02X}")));
            }
            Self::UnsupportedVersion { version, .. } => {
                tags.push(("version", version.to_string()));
            }
            _ => {}
        }
        if let Some(offset) = self.offset() {
            tags.push(("offset", offset.to_string()));
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_key_only_touches_payload_errors() {
        let err = RdbError::corrupt(7, "bad ziplist").with_key(b"user:1");
        assert!(err.to_string().contains("[key: user:1]"));

        let err = RdbError::AlreadyFinished.with_key(b"ignored");
        assert_eq!(err.to_string(), "decoder already finished");
    }

    #[test]
    fn test_offsets() {
        let err = RdbError::TruncatedStream {
            offset: 0x20,
            needed: 4,
            available: 1,
        };
        assert_eq!(err.offset(), Some(0x20));
        assert!(err.to_string().contains("0x20"));
        assert_eq!(RdbError::AlreadyFinished.offset(), None);
    }

    #[test]
    fn test_display_bad_magic_is_readable() {
        let err = RdbError::BadMagic { found: *b"RADIS" };
        assert!(err.to_string().contains("RADIS"));
        assert!(err.is_header_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RdbError::ChecksumMismatch {
                offset: 0,
                expected: 1,
                found: 2
            }
            .status_code(),
            StatusCode::ChecksumMismatch
        );
        let timeout = RdbError::Io {
            offset: 3,
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"),
        };
        assert_eq!(timeout.status_code(), StatusCode::Timeout);
        assert!(timeout.status_code().is_retryable());
    }

    /// Checksum mismatches are distinguishable from structural corruption.
    #[test]
    fn test_integrity_vs_structure() {
        let mismatch = RdbError::ChecksumMismatch {
            offset: 0,
            expected: 1,
            found: 2,
        };
        assert!(mismatch.is_integrity_failure());
        assert!(!RdbError::corrupt(0, "x").is_integrity_failure());
    }

    #[test]
    fn test_metrics_tags_include_opcode() {
        let err = RdbError::UnknownOpcode {
            offset: 9,
            opcode: 0xF7,
            version: 9,
        };
        let tags = err.metrics_tags();
        assert!(tags.contains(&("opcode", "0xF7".to_string())));
        assert!(tags.contains(&("offset", "9".to_string())));
    }
}
