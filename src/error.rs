//! Error types for graph construction and the folding pass.

use crate::dtype::DType;
use thiserror::Error;

/// Fatal errors raised by graph construction, inference, and rewriting.
///
/// Any of these escaping [`crate::fold::ConstantFolding::run`] indicates a
/// logic bug; the caller should discard the graph rather than attempt partial
/// recovery, since node replacement is not transactional.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// A replacement node's output count differs from the replaced node's.
    #[error("output arity mismatch: expected {expected}, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// Incompatible or malformed shapes at construction or inference time.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Incompatible element types at construction or inference time.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An operation received the wrong number of inputs.
    #[error("{op} expects {expected} inputs, got {found}")]
    InputArity {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    /// An evaluator result disagreed with the inferred descriptor, or an
    /// internal invariant was violated.
    #[error("consistency error: {0}")]
    Consistency(String),
}

/// Recoverable reasons to leave a fold candidate untouched.
///
/// These are absorbed inside the pass loop and never surface to callers;
/// they only decide which nodes fold.
#[derive(Debug, Error, PartialEq)]
pub enum FoldSkip {
    /// A required dimension is still unknown at fold time.
    #[error("shape is not fully static")]
    NotStatic,

    /// No reference kernel exists for the observed element type.
    #[error("no kernel for element type {0}")]
    UnsupportedType(DType),
}

/// Evaluator outcome: either a benign skip or a fatal graph error.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    Skip(#[from] FoldSkip),
    #[error(transparent)]
    Graph(#[from] GraphError),
}
