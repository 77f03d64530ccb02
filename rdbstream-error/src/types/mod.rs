pub mod rdb_error;

pub use rdb_error::*;

use crate::{ErrorExt, StatusCode};

/// Error with an arbitrary status code and message.
#[derive(Debug, Clone)]
pub struct GenericError {
    code: StatusCode,
    message: String,
}

impl GenericError {
    pub fn new(
        code: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GenericError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GenericError {}

impl ErrorExt for GenericError {
    fn status_code(&self) -> StatusCode {
        self.code
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// I/O failures outside the decoder (opening files, writing reports).
impl From<std::io::Error> for crate::StackError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::TimedOut => StatusCode::Timeout,
            std::io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
            std::io::ErrorKind::InvalidInput => StatusCode::InvalidArgs,
            _ => StatusCode::Io,
        };
        crate::StackError::new(GenericError::new(code, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_generic_error_basic() {
        let err = GenericError::new(StatusCode::InvalidArgs, "test message");
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
        assert_eq!(err.to_string(), "test message");
    }

    #[test]
    fn test_generic_error_as_any_downcast() {
        let err = GenericError::new(StatusCode::Io, "disk");
        let down = err.as_any().downcast_ref::<GenericError>();
        assert_eq!(down.map(|d| d.status_code()), Some(StatusCode::Io));
    }

    /// `io::ErrorKind` maps onto the I/O status codes without losing the
    /// message.
    #[test]
    fn test_io_error_kind_mapping() {
        let cases = [
            (io::ErrorKind::TimedOut, StatusCode::Timeout, "timeout"),
            (io::ErrorKind::UnexpectedEof, StatusCode::UnexpectedEof, "eof"),
            (io::ErrorKind::InvalidInput, StatusCode::InvalidArgs, "bad path"),
            (io::ErrorKind::NotFound, StatusCode::Io, "file not found"),
        ];

        for (kind, expected_code, msg) in cases {
            let stack: crate::StackError = io::Error::new(kind, msg).into();
            assert_eq!(stack.status_code(), expected_code, "kind={kind:?}");
            assert!(stack.to_string().contains(msg));
        }
    }
}
