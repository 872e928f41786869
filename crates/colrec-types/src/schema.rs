use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Float64,
    Int64,
    /// Variable-length UTF-8 strings.
    Utf8,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float64 => write!(f, "float64"),
            Self::Int64 => write!(f, "int64"),
            Self::Utf8 => write!(f, "utf8"),
        }
    }
}

/// Per-row shape of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// One element per row; the dataset is one-dimensional.
    Scalar,
    /// Exactly `width` elements per row; the dataset is two-dimensional.
    Row { width: usize },
}

impl Shape {
    /// Number of elements stored for each row.
    pub fn values_per_row(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Row { width } => *width,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Row { width } => write!(f, "row[{width}]"),
        }
    }
}

/// Element type and shape of a dataset, fixed by its first write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub element: ElementType,
    pub shape: Shape,
}

impl DatasetSchema {
    pub fn new(element: ElementType, shape: Shape) -> Self {
        Self { element, shape }
    }

    pub fn scalar(element: ElementType) -> Self {
        Self::new(element, Shape::Scalar)
    }

    pub fn row(element: ElementType, width: usize) -> Self {
        Self::new(element, Shape::Row { width })
    }
}

impl fmt::Display for DatasetSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.element, self.shape)
    }
}
