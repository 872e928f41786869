use thiserror::Error;

use crate::schema::{ElementType, Shape};

/// Errors produced while inferring or checking field values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// The value has a JSON kind that cannot be stored (object, boolean, null).
    #[error("unsupported value type: {found}")]
    UnsupportedType { found: String },

    /// Arrays must carry at least one element to fix a row width.
    #[error("cannot infer a row from an empty array")]
    EmptyArray,

    /// An element cannot be converted to the row's element type.
    #[error("cannot convert {found} to {expected}{}", at_index(.position))]
    Conversion {
        position: Option<usize>,
        expected: ElementType,
        found: String,
    },

    /// Element type differs from the dataset's fixed element type.
    #[error("type mismatch: dataset holds {expected}, value is {found}")]
    TypeMismatch {
        expected: ElementType,
        found: ElementType,
    },

    /// Shape kind or row width differs from the dataset's fixed shape.
    #[error("shape mismatch: dataset holds {expected}, value is {found}")]
    ShapeMismatch { expected: Shape, found: Shape },
}

fn at_index(position: &Option<usize>) -> String {
    position.map(|p| format!(" at index {p}")).unwrap_or_default()
}
