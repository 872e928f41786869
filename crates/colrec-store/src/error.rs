use std::path::PathBuf;

use colrec_types::{ElementType, Shape, TypeError};

/// Errors from dataset store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error while opening, writing, closing or scanning the artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation that needs an open artifact was called while closed.
    #[error("no artifact is open")]
    NotOpen,

    /// Group and dataset names must be non-empty and free of '/'.
    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error("group not configured: {0}")]
    UnknownGroup(String),

    #[error("dataset not found: {group}/{field}")]
    UnknownDataset { group: String, field: String },

    #[error("unsupported value type: {0}")]
    UnsupportedType(String),

    #[error("cannot create a dataset from an empty array")]
    EmptyArray,

    #[error("conversion error: {0}")]
    Conversion(String),

    #[error("type mismatch: dataset holds {expected}, value is {found}")]
    TypeMismatch {
        expected: ElementType,
        found: ElementType,
    },

    #[error("shape mismatch: dataset holds {expected}, value is {found}")]
    ShapeMismatch { expected: Shape, found: Shape },

    /// A failure while writing one field of a record.
    #[error("field {group}/{field}: {source}")]
    Field {
        group: String,
        field: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("invalid artifact magic in {path}: {actual:?}")]
    InvalidMagic { path: PathBuf, actual: Vec<u8> },

    #[error("unsupported artifact version: {0}")]
    UnsupportedVersion(u32),

    /// A frame passed its checksum but contradicts the artifact layout.
    #[error("corrupt artifact at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// The innermost error, looking through [`StoreError::Field`].
    pub fn root(&self) -> &StoreError {
        match self {
            Self::Field { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for per-value failures that leave the artifact untouched.
    pub fn is_value_error(&self) -> bool {
        matches!(
            self.root(),
            Self::UnsupportedType(_)
                | Self::EmptyArray
                | Self::Conversion(_)
                | Self::TypeMismatch { .. }
                | Self::ShapeMismatch { .. }
        )
    }

    pub(crate) fn in_field(self, group: &str, field: &str) -> Self {
        Self::Field {
            group: group.to_string(),
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::UnsupportedType { found } => Self::UnsupportedType(found),
            TypeError::EmptyArray => Self::EmptyArray,
            err @ TypeError::Conversion { .. } => Self::Conversion(err.to_string()),
            TypeError::TypeMismatch { expected, found } => Self::TypeMismatch { expected, found },
            TypeError::ShapeMismatch { expected, found } => Self::ShapeMismatch { expected, found },
        }
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_errors_map_to_store_kinds() {
        let err: StoreError = TypeError::EmptyArray.into();
        assert!(matches!(err, StoreError::EmptyArray));
        let err: StoreError = TypeError::ShapeMismatch {
            expected: Shape::Row { width: 3 },
            found: Shape::Row { width: 2 },
        }
        .into();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
        assert!(err.is_value_error());
    }

    #[test]
    fn root_looks_through_field_context() {
        let err = StoreError::EmptyArray.in_field("g", "f");
        assert!(matches!(err.root(), StoreError::EmptyArray));
        assert!(err.is_value_error());
        assert_eq!(err.to_string(), "field g/f: cannot create a dataset from an empty array");
    }

    #[test]
    fn io_is_not_value_error() {
        let err = StoreError::Io(std::io::Error::other("disk full"));
        assert!(!err.is_value_error());
    }
}
