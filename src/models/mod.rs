//! Core data types shared across the pipeline.

mod field;
mod property;

pub use field::{Field, FieldKind, FieldMap, FieldValue};
pub use property::{PropertyRecord, ReviewStatus};
