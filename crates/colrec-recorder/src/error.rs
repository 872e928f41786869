use std::fmt;
use std::path::PathBuf;

use colrec_keypath::KeypathError;
use colrec_store::StoreError;

/// Errors from the recording controller and its filter.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Invalid configuration or parameters.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("start requested while already recording")]
    AlreadyRecording,

    #[error("stop requested while not recording")]
    NotRecording,

    /// The pending filename matches the previous session's.
    #[error("filename collision for {filename}")]
    Collision { filename: String },

    #[error("group not configured: {0}")]
    UnknownGroup(String),

    #[error("start command requires an id")]
    MissingId,

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Finalizing the session file failed; the session stays open.
    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The recorder actor has shut down.
    #[error("recorder actor is closed")]
    Closed,
}

/// Coarse classification used for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Collision,
    AlreadyRecording,
    NotRecording,
    UnknownGroup,
    UnsupportedType,
    EmptyArray,
    TypeMismatch,
    ShapeMismatch,
    Conversion,
    Command,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "ConfigError",
            Self::Collision => "CollisionError",
            Self::AlreadyRecording => "AlreadyRecordingError",
            Self::NotRecording => "NotRecordingError",
            Self::UnknownGroup => "UnknownGroupError",
            Self::UnsupportedType => "UnsupportedTypeError",
            Self::EmptyArray => "EmptyArrayError",
            Self::TypeMismatch => "TypeMismatchError",
            Self::ShapeMismatch => "ShapeMismatchError",
            Self::Conversion => "ConversionError",
            Self::Command => "CommandError",
            Self::Io => "IOError",
        };
        f.write_str(name)
    }
}

impl RecorderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::AlreadyRecording => ErrorKind::AlreadyRecording,
            Self::NotRecording => ErrorKind::NotRecording,
            Self::Collision { .. } => ErrorKind::Collision,
            Self::UnknownGroup(_) => ErrorKind::UnknownGroup,
            Self::MissingId | Self::InvalidCommand(_) => ErrorKind::Command,
            Self::Rename { .. } | Self::Io(_) | Self::Closed => ErrorKind::Io,
            Self::Store(err) => match err.root() {
                StoreError::UnknownGroup(_) => ErrorKind::UnknownGroup,
                StoreError::UnsupportedType(_) => ErrorKind::UnsupportedType,
                StoreError::EmptyArray => ErrorKind::EmptyArray,
                StoreError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
                StoreError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
                StoreError::Conversion(_) => ErrorKind::Conversion,
                StoreError::InvalidName(_) | StoreError::Config(_) => ErrorKind::Config,
                _ => ErrorKind::Io,
            },
        }
    }

    /// True for session-level failures (commands, collisions, I/O).
    /// The other kinds abort a single record and leave the session running.
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Collision
                | ErrorKind::AlreadyRecording
                | ErrorKind::NotRecording
                | ErrorKind::Io
                | ErrorKind::Command
        )
    }
}

impl From<KeypathError> for RecorderError {
    fn from(err: KeypathError) -> Self {
        match err {
            KeypathError::UnknownGroup(group) => Self::UnknownGroup(group),
            other => Self::Config(other.to_string()),
        }
    }
}

pub type RecorderResult<T> = Result<T, RecorderError>;
