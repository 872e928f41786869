//! Foundation types for colrec.
//!
//! Every value that reaches a dataset passes through [`FieldValue`], an
//! explicit tagged union over the six storable shapes. Type inference from
//! JSON happens exactly once, in [`FieldValue::from_json`], so nothing
//! downstream inspects runtime types.
//!
//! # Key Types
//!
//! - [`ElementType`]: Float64, Int64 or Utf8
//! - [`Shape`]: one scalar per row, or a fixed-width row
//! - [`DatasetSchema`]: element type + shape, immutable after creation
//! - [`FieldValue`]: a single row ready to be appended
//! - [`ColumnData`]: a typed, row-major buffer of many rows

pub mod column;
pub mod error;
pub mod schema;
pub mod value;

pub use column::ColumnData;
pub use error::TypeError;
pub use schema::{DatasetSchema, ElementType, Shape};
pub use value::FieldValue;
