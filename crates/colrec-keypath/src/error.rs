use thiserror::Error;

/// Errors from keypath configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeypathError {
    /// Separator is empty or contains the artifact's hierarchy delimiter.
    #[error("invalid keypath separator {0:?}: must be non-empty and must not contain '/'")]
    InvalidSeparator(String),

    #[error("group name cannot be empty")]
    EmptyGroupName,

    #[error("empty keypath in group {group}")]
    EmptyKeypath { group: String },

    #[error("group not configured: {0}")]
    UnknownGroup(String),
}

pub type KeypathResult<T> = Result<T, KeypathError>;
