//! Filter-expression AST for stored queries.
//!
//! The stored-query core treats this tree as opaque beyond two operations:
//! [`extract_parameters`] walks the tree and reports every parameter leaf in
//! depth-first order, and [`substitute`] produces a structural copy with
//! every parameter leaf replaced by a literal. Everything else (grammar,
//! evaluation, index planning) belongs to the execution engine.

pub mod ast;
pub mod params;

pub use ast::{CompareOp, Expr, Operand, Scalar};
pub use params::{Substitution, SubstituteError, extract_parameters, substitute};
