use std::{fmt, panic::Location, sync::Arc};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{ErrorExt, LogLevel, RdbError, StatusCode};

/// Root error plus the frames attached while it travelled up from the
/// decoder.
///
/// Frames may carry the stream offset they refer to. [`StackError::offset`]
/// prefers the offset reported by the root [`RdbError`] and falls back to the
/// most recent frame that has one.
#[derive(Clone)]
pub struct StackError {
    inner: Arc<dyn ErrorExt>,
    contexts: Vec<ErrorContext>,
}

/// One context frame.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    /// Stream offset the frame refers to, if any.
    pub offset: Option<u64>,
    pub location: Option<&'static Location<'static>>,
}

/// Serializable error report (feature = "serde").
#[cfg(feature = "serde")]
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl ErrorContext {
    fn render(&self) -> String {
        match self.offset {
            Some(offset) => format!("{} at offset {offset:#x}", self.message),
            None => self.message.clone(),
        }
    }
}

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            inner: Arc::new(err),
            contexts: Vec::new(),
        }
    }

    /// Attaches a context message.
    #[track_caller]
    pub fn context(
        self,
        msg: impl Into<String>,
    ) -> Self {
        self.push(msg.into(), None, Location::caller())
    }

    /// Attaches a context message tied to a stream offset.
    #[track_caller]
    pub fn context_at(
        self,
        offset: u64,
        msg: impl Into<String>,
    ) -> Self {
        self.push(msg.into(), Some(offset), Location::caller())
    }

    fn push(
        mut self,
        message: String,
        offset: Option<u64>,
        location: &'static Location<'static>,
    ) -> Self {
        self.contexts.push(ErrorContext {
            message,
            offset,
            location: Some(location),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status_code()
    }

    pub fn client_message(&self) -> String {
        self.inner.client_message()
    }

    /// Frames in the order they were attached, innermost first.
    pub fn contexts(&self) -> &[ErrorContext] {
        &self.contexts
    }

    /// Downcasts the root error to a concrete type.
    pub fn downcast_ref<T: ErrorExt + 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// Root decoder error, when the chain started in the decoder.
    pub fn rdb_error(&self) -> Option<&RdbError> {
        self.downcast_ref::<RdbError>()
    }

    /// Offset of the failure in the dump.
    pub fn offset(&self) -> Option<u64> {
        self.rdb_error()
            .and_then(RdbError::offset)
            .or_else(|| self.contexts.iter().rev().find_map(|c| c.offset))
    }

    pub fn log_level(&self) -> LogLevel {
        self.status_code().log_level()
    }

    /// Detailed line for logs: root error, hint and frame locations.
    pub fn log_message(&self) -> String {
        let mut line = self.inner.log_message();
        for frame in &self.contexts {
            line.push_str(" | ");
            line.push_str(&frame.render());
            if let Some(loc) = frame.location {
                line.push_str(&format!(" ({}:{})", loc.file(), loc.line()));
            }
        }
        line
    }

    /// Builds a serializable report. Context frames are only included in
    /// debug builds.
    #[cfg(feature = "serde")]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.status_code().code(),
            message: self.client_message(),
            offset: self.offset(),
            hint: self
                .rdb_error()
                .and_then(RdbError::recovery_hint)
                .map(str::to_string),
            #[cfg(debug_assertions)]
            contexts: Some(self.contexts.iter().map(ErrorContext::render).collect()),
            #[cfg(not(debug_assertions))]
            contexts: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StackError")
            .field("inner", &self.inner.to_string())
            .field("status_code", &self.status_code())
            .field("offset", &self.offset())
            .field("contexts", &self.contexts)
            .finish()
    }
}

/// Outermost frame first, then the root error: `dump: Failed to decode entry
/// at offset 0x1f: truncated stream ...`.
impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.contexts.iter().rev() {
            write!(f, "{}: ", frame.render())?;
        }
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}
