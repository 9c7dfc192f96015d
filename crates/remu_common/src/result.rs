//! Common result and error types for the REMU toolchain.

/// The standard result type for operations that can only fail on a tool bug.
///
/// User-facing problems (bad netlists, unsupported devices) have their own
/// error enums in the crates that detect them. `InternalError` is reserved for
/// broken internal invariants, such as a dangling arena index.
pub type RemuResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in REMU, not a problem with the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("dangling signal id 7");
        assert_eq!(format!("{err}"), "internal error: dangling signal id 7");
    }

    #[test]
    fn question_mark_propagates() {
        fn inner() -> RemuResult<u32> {
            Err(InternalError::new("boom"))
        }
        fn outer() -> RemuResult<u32> {
            let v = inner()?;
            Ok(v + 1)
        }
        assert_eq!(outer().unwrap_err().message, "boom");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }
}
