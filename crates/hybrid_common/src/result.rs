//! Common result and error types for the transpiler.

/// The standard result type for fallible internal operations.
///
/// `Ok` carries the (possibly degraded) output of a stage. `Err` means an
/// unrecoverable internal error, which is a bug in the transpiler and never a
/// problem with the user's C++ input. Input problems are reported as
/// diagnostics and the stage still returns `Ok`.
pub type HybridResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in the transpiler, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal transpiler error: {message}")]
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
        let err = InternalError::new("generator state corrupted");
        assert_eq!(
            format!("{err}"),
            "internal transpiler error: generator state corrupted"
        );
    }

    #[test]
    fn err_path() {
        let r: HybridResult<i32> = Err(InternalError::new("bad"));
        assert_eq!(r.err().map(|e| e.message), Some("bad".to_string()));
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }
}
