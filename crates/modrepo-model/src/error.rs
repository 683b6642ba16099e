//! Error types for modrepo-model

/// Result type for model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building model values from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Version string could not be parsed
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Version range string could not be parsed
    #[error("invalid version range '{range}': {reason}")]
    InvalidVersionRange { range: String, reason: String },

    /// Malformed LDAP-style filter expression
    #[error("invalid filter syntax in '{filter}' at position {position}: {reason}")]
    InvalidFilterSyntax {
        filter: String,
        position: usize,
        reason: String,
    },
}
