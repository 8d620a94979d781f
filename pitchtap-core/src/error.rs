/// Crate-level error type for the PitchTap core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration or settings value is out of range.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Configuration file could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for the expected shape.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// Convenience Result type for PitchTap operations.
pub type Result<T> = std::result::Result<T, Error>;
