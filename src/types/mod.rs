//! Value model for decoded TOON documents.
//!
//! This module provides:
//! - `StructuredValue`, the tagged tree every traversal matches on
//! - `ValueType`, the type tag exposed by the tree projection

mod value;

pub use value::{ObjectMap, StructuredValue, ValueType};
