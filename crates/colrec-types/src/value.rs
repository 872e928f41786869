use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::schema::{DatasetSchema, ElementType, Shape};

/// A single row, typed and ready to be appended to a dataset.
///
/// Scalars and fixed-width rows over the three element types. Arrays take
/// their element type from the first element; the remaining elements are
/// converted (or rejected) when the value is built, never while writing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Float64(f64),
    Int64(i64),
    Utf8(String),
    Float64Row(Vec<f64>),
    Int64Row(Vec<i64>),
    Utf8Row(Vec<String>),
}

impl FieldValue {
    /// Infer a typed value from JSON.
    ///
    /// - floating numbers → `Float64`, integral numbers → `Int64`
    /// - strings → `Utf8`
    /// - non-empty arrays → a row typed by the first element
    /// - empty arrays → [`TypeError::EmptyArray`]
    /// - objects, booleans, null → [`TypeError::UnsupportedType`]
    pub fn from_json(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Number(_) => match element_type_of(value) {
                Some(ElementType::Int64) => int64(value, None).map(Self::Int64),
                _ => float64(value, None).map(Self::Float64),
            },
            Value::String(s) => Ok(Self::Utf8(s.clone())),
            Value::Array(items) => Self::row_from_json(items),
            other => Err(TypeError::UnsupportedType {
                found: json_kind(other).into(),
            }),
        }
    }

    fn row_from_json(items: &[Value]) -> Result<Self, TypeError> {
        let first = items.first().ok_or(TypeError::EmptyArray)?;
        match element_type_of(first) {
            Some(ElementType::Float64) => items
                .iter()
                .enumerate()
                .map(|(i, v)| float64(v, Some(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Float64Row),
            Some(ElementType::Int64) => items
                .iter()
                .enumerate()
                .map(|(i, v)| int64(v, Some(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Int64Row),
            Some(ElementType::Utf8) => items
                .iter()
                .enumerate()
                .map(|(i, v)| match v {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(TypeError::Conversion {
                        position: Some(i),
                        expected: ElementType::Utf8,
                        found: json_kind(other).into(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Utf8Row),
            None => Err(TypeError::UnsupportedType {
                found: format!("array of {}", json_kind(first)),
            }),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Float64(_) | Self::Float64Row(_) => ElementType::Float64,
            Self::Int64(_) | Self::Int64Row(_) => ElementType::Int64,
            Self::Utf8(_) | Self::Utf8Row(_) => ElementType::Utf8,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Float64(_) | Self::Int64(_) | Self::Utf8(_) => Shape::Scalar,
            Self::Float64Row(v) => Shape::Row { width: v.len() },
            Self::Int64Row(v) => Shape::Row { width: v.len() },
            Self::Utf8Row(v) => Shape::Row { width: v.len() },
        }
    }

    /// The schema a dataset created from this value would get.
    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema::new(self.element_type(), self.shape())
    }

    /// Check that this value may be appended to a dataset with `schema`.
    ///
    /// Shape (kind, then width) is checked before element type.
    pub fn check_against(&self, schema: &DatasetSchema) -> Result<(), TypeError> {
        let shape = self.shape();
        if shape != schema.shape {
            return Err(TypeError::ShapeMismatch {
                expected: schema.shape,
                found: shape,
            });
        }
        let element = self.element_type();
        if element != schema.element {
            return Err(TypeError::TypeMismatch {
                expected: schema.element,
                found: element,
            });
        }
        Ok(())
    }

    /// JSON rendering of this row.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Float64(v) => Value::from(*v),
            Self::Int64(v) => Value::from(*v),
            Self::Utf8(v) => Value::from(v.as_str()),
            Self::Float64Row(v) => Value::from(v.clone()),
            Self::Int64Row(v) => Value::from(v.clone()),
            Self::Utf8Row(v) => Value::from(v.clone()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Utf8(v)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Float64Row(v)
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Int64Row(v)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        Self::Utf8Row(v)
    }
}

/// Name of a JSON value's kind, for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Element type selected by a JSON leaf, if it is storable.
fn element_type_of(value: &Value) -> Option<ElementType> {
    match value {
        Value::Number(n) if n.is_f64() => Some(ElementType::Float64),
        Value::Number(_) => Some(ElementType::Int64),
        Value::String(_) => Some(ElementType::Utf8),
        _ => None,
    }
}

fn float64(value: &Value, position: Option<usize>) -> Result<f64, TypeError> {
    value.as_f64().ok_or_else(|| TypeError::Conversion {
        position,
        expected: ElementType::Float64,
        found: json_kind(value).into(),
    })
}

fn int64(value: &Value, position: Option<usize>) -> Result<i64, TypeError> {
    let conversion = || TypeError::Conversion {
        position,
        expected: ElementType::Int64,
        found: value.to_string(),
    };
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    // Unsigned values above i64::MAX do not fit.
    if value.is_u64() {
        return Err(conversion());
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(conversion()),
    }
}
