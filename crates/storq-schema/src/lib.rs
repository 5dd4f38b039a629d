//! Typed JSON Schema fragments for stored-query parameters.
//!
//! Stored queries never author general-purpose schemas; they declare the
//! handful of keywords needed to type-check and validate parameter values.
//! This crate owns that fragment model, the `#/parameters/<name>` reference
//! form, and the black-box `validate_value` capability consumed by the
//! core's static validator and resolver.

pub mod param;
pub mod schema;
pub mod validate;

pub use param::{ParameterValue, SchemaOrRef};
pub use schema::{ParamSchema, SchemaType};
pub use validate::{SchemaError, validate_value};

/// Prefix every local parameter reference must carry.
pub const PARAMETERS_REF_PREFIX: &str = "#/parameters/";
