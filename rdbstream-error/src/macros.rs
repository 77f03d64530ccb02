/// Returns early with an error converted into [`StackError`](crate::StackError).
///
/// Forms:
/// - `bail!(err)` takes any `ErrorExt` type;
/// - `bail!(code, "msg")` builds a `GenericError`;
/// - `bail!(code, "fmt {}", arg)` formats the message.
///
/// ```ignore
/// use rdbstream_error::{bail, StatusCode};
///
/// fn check_db(index: u64) -> rdbstream_error::StackResult<()> {
///     if index > 15 {
///         bail!(StatusCode::InvalidArgs, "database {} out of range", index);
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Calls [`bail!`] when the condition does not hold.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
    ($cond:expr, $code:expr, $msg:expr) => {
        if !($cond) {
            $crate::bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $fmt, $($arg)*);
        }
    };
}

/// Context helpers on `Result`.
///
/// Converts the error into [`StackError`](crate::StackError) and pushes a
/// context frame onto it.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Lazy variant: the closure only runs on the error path.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;

    /// Frame tied to the stream offset the failing read started at.
    fn context_at<C>(
        self,
        offset: u64,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(ctx)),
        }
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(f())),
        }
    }

    #[track_caller]
    fn context_at<C>(
        self,
        offset: u64,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context_at(offset, ctx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenericError, RdbError, StackResult, StatusCode};

    #[test]
    fn test_bail_domain_error() {
        fn example() -> StackResult<()> {
            bail!(RdbError::AlreadyFinished);
        }

        let err = example().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidState);
    }

    #[test]
    fn test_bail_with_format() {
        fn example(value: i32) -> StackResult<()> {
            bail!(StatusCode::InvalidArgs, "Invalid value: {}", value);
        }

        let err = example(42).unwrap_err();
        assert!(err.to_string().contains("Invalid value: 42"));
    }

    #[test]
    fn test_ensure() {
        fn validate(x: i32) -> StackResult<()> {
            ensure!(x > 0, StatusCode::InvalidArgs, "Value must be positive");
            ensure!(x < 100, StatusCode::InvalidArgs, "Value too large: {}", x);
            Ok(())
        }

        assert!(validate(50).is_ok());
        assert!(validate(-1).is_err());
        assert!(validate(150).is_err());
    }

    #[test]
    fn test_result_ext() {
        fn inner() -> Result<(), RdbError> {
            Err(RdbError::AlreadyFinished)
        }

        fn outer() -> StackResult<()> {
            inner().context("outer context")?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.contexts().len(), 1);
        assert_eq!(err.contexts()[0].message, "outer context");
    }

    #[test]
    fn test_with_context_lazy() {
        fn example(success: bool) -> StackResult<()> {
            let result: Result<(), GenericError> = if success {
                Ok(())
            } else {
                Err(GenericError::new(StatusCode::Internal, "error"))
            };

            result.with_context(|| format!("attempt {}", 1))?;
            Ok(())
        }

        assert!(example(true).is_ok());
        let err = example(false).unwrap_err();
        assert_eq!(err.contexts()[0].message, "attempt 1");
    }

    #[test]
    fn test_context_at_records_offset_and_caller() {
        let res: Result<(), RdbError> = Err(RdbError::AlreadyFinished);
        let err = res.context_at(0x1f, "next entry").unwrap_err();
        let frame = &err.contexts()[0];
        assert_eq!(frame.offset, Some(0x1f));
        assert!(frame.location.is_some_and(|loc| loc.file().ends_with("macros.rs")));
        assert_eq!(err.offset(), Some(0x1f));
    }
}
