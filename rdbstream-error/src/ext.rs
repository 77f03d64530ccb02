use std::{any::Any, error::Error};

use crate::StatusCode;

/// Object-safe extension implemented by every error type of the workspace.
///
/// Gives uniform access to:
/// - a numeric status code,
/// - a message that is safe to show to an operator,
/// - a detailed message for logs,
/// - key/value tags for metrics.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Status code of the error. Defaults to [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Returns the error as [`Any`] so it can be downcast to its concrete
    /// type.
    fn as_any(&self) -> &dyn Any;

    /// Short message without internal details.
    ///
    /// Internal errors collapse to `"Internal error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Detailed message for logs.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Tags for metrics and structured logs.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Short type name of the error (last path segment).
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, error::Error, fmt};

    use super::*;

    #[derive(Debug)]
    struct DefaultError(pub &'static str);

    impl fmt::Display for DefaultError {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "DefaultError: {}", self.0)
        }
    }

    impl Error for DefaultError {}

    impl ErrorExt for DefaultError {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct TruncatedError(pub &'static str);

    impl fmt::Display for TruncatedError {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "Truncated: {}", self.0)
        }
    }

    impl Error for TruncatedError {}

    impl ErrorExt for TruncatedError {
        fn status_code(&self) -> StatusCode {
            StatusCode::UnexpectedEof
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Default status code is `Internal`.
    #[test]
    fn test_default_status_code_is_internal() {
        assert_eq!(DefaultError("oops").status_code(), StatusCode::Internal);
    }

    /// Internal errors never leak their message.
    #[test]
    fn test_client_message_internal() {
        let e = DefaultError("sensitive");
        assert_eq!(e.client_message(), "Internal error");
    }

    /// Non-internal errors use their `Display` output.
    #[test]
    fn test_client_message_non_internal() {
        let e = TruncatedError("footer");
        assert_eq!(e.client_message(), e.to_string());
    }

    #[test]
    fn test_as_any_downcast() {
        let e = TruncatedError("x");
        let down = e.as_any().downcast_ref::<TruncatedError>();
        assert_eq!(down.map(|d| d.0), Some("x"));
    }

    #[test]
    fn test_metrics_tags_contains_expected_pairs() {
        let tags = TruncatedError("t").metrics_tags();
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "error_type" && v.ends_with("TruncatedError")));
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "status_code" && *v == StatusCode::UnexpectedEof.to_string()));
    }
}
