//! Shared error classification.
//!
//! Every module owns its own `thiserror` enum; this trait gives callers a
//! stable machine-readable code and a retry hint without matching on the
//! concrete type.

/// Stable error code and retry hint for an error type.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
