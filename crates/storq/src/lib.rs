//! Parameterized stored queries.
//!
//! ## Crate layout
//! - `core`: the document model, parameter collection, validation, the
//!   resolver, and the repository.
//! - `filter`: the filter-expression AST and its parameter plumbing.
//! - `schema`: typed JSON Schema fragments for parameter declarations.
//!
//! The `prelude` module mirrors the vocabulary needed to author and resolve
//! stored queries; repositories and error types are imported explicitly
//! where they are handled.

pub use storq_core as core;
pub use storq_filter as filter;
pub use storq_schema as schema;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use core::{Error, QueryRepository, RepositoryConfig, resolve, validate};

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        core::prelude::*,
        filter::{CompareOp, Expr, Operand, Scalar},
    };
    pub use serde::{Deserialize, Serialize};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::{QueryRepository, resolve};

    // End-to-end: author, store, and resolve a parameterized query.
    #[test]
    fn lifecycle_round_trip() {
        let mut doc = StoredQueryDocument::new("obs-by-station");
        doc.collections = vec![StringOrParam::from("observations".to_string())];
        doc.filter = Some(Expr::eq(
            "station",
            Operand::Parameter(ParameterValue::inline(
                "station",
                ParamSchema::string(),
            )),
        ));
        doc.limit = Some(ValueOrParameter::inline(
            "limit",
            ParamSchema::integer().with_default(10.into()),
        ));

        let mut repo = QueryRepository::default();
        repo.put(doc, 1_000).unwrap();

        let stored = repo.get("obs-by-station").unwrap();
        let request = ResolveRequest::default().with_value("station", "KSFO");
        let resolved = resolve(stored, &request).unwrap();

        assert_eq!(resolved.collections, vec!["observations".to_string()]);
        assert_eq!(resolved.limit, Some(10));
        assert!(matches!(
            resolved.filter,
            Some(Expr::Compare { op: CompareOp::Eq, .. })
        ));
    }
}
