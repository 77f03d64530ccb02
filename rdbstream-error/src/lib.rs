//! Centralized error handling for rdbstream.
//!
//! The core decoder returns [`RdbError`] directly; layers above it (streaming
//! handlers, the CLI) wrap errors into [`StackError`] to attach context as the
//! error travels up the call stack.

pub mod ext;
pub mod macros;
pub mod stack;
pub mod status_code;
pub mod types;

// Publicly re-export all error types and functions from the submodules to
// simplify access from external code.
pub use ext::*;
pub use macros::*;
pub use stack::*;
pub use status_code::*;
pub use types::*;

/// Result of the context-chaining layer.
pub type StackResult<T> = Result<T, StackError>;

/// Result of the core decoder.
pub type RdbResult<T> = Result<T, RdbError>;
