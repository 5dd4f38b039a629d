//! Parameterized stored queries: the document model, parameter collection,
//! store-time validation, request-time resolution, and the repository that
//! gates writes behind validation and optimistic concurrency.
//!
//! The lifecycle this crate implements:
//!
//! 1. An author writes a [`StoredQueryDocument`] whose query sites hold
//!    either literals or `$parameter` placeholders.
//! 2. On write, [`collect`] derives the effective parameter table and
//!    [`validate`] rejects documents whose placeholders can never resolve.
//! 3. On execution, [`resolve`] binds caller-supplied values (or schema
//!    defaults) against each placeholder's schema and produces a fully
//!    literal [`ResolvedQuery`].

pub mod collect;
pub mod document;
pub mod param;
pub mod resolve;
pub mod store;
pub mod trace;
pub mod validate;
pub mod value;

#[cfg(test)]
mod property;

pub use collect::{ExpectedKind, Usage, collect, refresh, walk_parameters};
pub use document::{ResolvedQuery, ResolvedSubQuery, StoredQueryDocument, SubQuery};
pub use param::{FilterOp, StringListOrParam, StringOrParam, ValueOrParameter};
pub use resolve::{ResolveError, ResolveRequest, resolve, resolve_with_trace};
pub use store::{
    Precondition, PreconditionMode, QueryRepository, RepositoryConfig, RepositoryError, Revision,
};
pub use trace::{BindingSource, RecordingTraceSink, ResolveTraceEvent, ResolveTraceSink};
pub use validate::{ValidationError, ValidationLevel, validate, validate_with};
pub use value::ParamValue;

///
/// Error
///
/// Top-level error for callers who drive the whole lifecycle and want a
/// single failure type.
///

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

///
/// Prelude
///
/// Domain vocabulary only; errors and the repository are imported where
/// they are handled.
///

pub mod prelude {
    pub use crate::{
        document::{ResolvedQuery, StoredQueryDocument, SubQuery},
        param::{FilterOp, StringListOrParam, StringOrParam, ValueOrParameter},
        resolve::ResolveRequest,
        value::ParamValue,
    };
    pub use storq_schema::{ParamSchema, ParameterValue, SchemaType};
}
