use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::schema::{ElementType, Shape};
use crate::value::FieldValue;

/// A typed buffer of rows, flattened row-major.
///
/// This is the unit persisted in a chunk. Strings stay variable-length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    Utf8(Vec<String>),
}

impl ColumnData {
    /// An empty buffer for the given element type.
    pub fn empty(element: ElementType) -> Self {
        Self::with_capacity(element, 0)
    }

    pub fn with_capacity(element: ElementType, capacity: usize) -> Self {
        match element {
            ElementType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            ElementType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            ElementType::Utf8 => Self::Utf8(Vec::with_capacity(capacity)),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Float64(_) => ElementType::Float64,
            Self::Int64(_) => ElementType::Int64,
            Self::Utf8(_) => ElementType::Utf8,
        }
    }

    /// Number of elements (not rows).
    pub fn value_count(&self) -> usize {
        match self {
            Self::Float64(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value_count() == 0
    }

    /// Number of complete rows for the given shape.
    pub fn row_count(&self, shape: Shape) -> usize {
        match shape.values_per_row() {
            0 => 0,
            n => self.value_count() / n,
        }
    }

    /// Append one row. The value's element type must match the buffer.
    pub fn push(&mut self, value: FieldValue) -> Result<(), TypeError> {
        match (self, value) {
            (Self::Float64(buf), FieldValue::Float64(v)) => buf.push(v),
            (Self::Float64(buf), FieldValue::Float64Row(v)) => buf.extend(v),
            (Self::Int64(buf), FieldValue::Int64(v)) => buf.push(v),
            (Self::Int64(buf), FieldValue::Int64Row(v)) => buf.extend(v),
            (Self::Utf8(buf), FieldValue::Utf8(v)) => buf.push(v),
            (Self::Utf8(buf), FieldValue::Utf8Row(v)) => buf.extend(v),
            (this, value) => {
                return Err(TypeError::TypeMismatch {
                    expected: this.element_type(),
                    found: value.element_type(),
                })
            }
        }
        Ok(())
    }

    /// Append every element of `other`.
    pub fn extend(&mut self, other: ColumnData) -> Result<(), TypeError> {
        match (self, other) {
            (Self::Float64(buf), Self::Float64(v)) => buf.extend(v),
            (Self::Int64(buf), Self::Int64(v)) => buf.extend(v),
            (Self::Utf8(buf), Self::Utf8(v)) => buf.extend(v),
            (this, other) => {
                return Err(TypeError::TypeMismatch {
                    expected: this.element_type(),
                    found: other.element_type(),
                })
            }
        }
        Ok(())
    }

    /// Drop everything past the first `values` elements.
    pub fn truncate(&mut self, values: usize) {
        match self {
            Self::Float64(v) => v.truncate(values),
            Self::Int64(v) => v.truncate(values),
            Self::Utf8(v) => v.truncate(values),
        }
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Row `index`, shaped per `shape`.
    pub fn row(&self, shape: Shape, index: usize) -> Option<FieldValue> {
        let n = shape.values_per_row();
        let start = index.checked_mul(n)?;
        let end = start.checked_add(n)?;
        if n == 0 || end > self.value_count() {
            return None;
        }
        Some(match (self, shape) {
            (Self::Float64(v), Shape::Scalar) => FieldValue::Float64(v[start]),
            (Self::Int64(v), Shape::Scalar) => FieldValue::Int64(v[start]),
            (Self::Utf8(v), Shape::Scalar) => FieldValue::Utf8(v[start].clone()),
            (Self::Float64(v), Shape::Row { .. }) => FieldValue::Float64Row(v[start..end].to_vec()),
            (Self::Int64(v), Shape::Row { .. }) => FieldValue::Int64Row(v[start..end].to_vec()),
            (Self::Utf8(v), Shape::Row { .. }) => FieldValue::Utf8Row(v[start..end].to_vec()),
        })
    }

    /// All complete rows, in order.
    pub fn rows(&self, shape: Shape) -> Vec<FieldValue> {
        (0..self.row_count(shape))
            .filter_map(|i| self.row(shape, i))
            .collect()
    }
}
