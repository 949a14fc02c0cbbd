//! Shared naming primitives.
//!
//! - [`identifier`]: identifier validation and quoting, and the
//!   [`TargetSchema`](identifier::TargetSchema) every converted statement is
//!   qualified with.

pub mod identifier;
