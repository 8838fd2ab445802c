//! The closed set of graph operations.

use crate::dtype::DType;
use crate::shape::{AutoBroadcast, Shape};
use crate::tensor::Literal;

/// Relations computed by the elementwise comparison family.
///
/// Floating-point inputs follow IEEE ordering: NaN makes every ordered
/// relation and equality false, and inequality true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

/// Monoid used by the boolean reduction family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceKind {
    And,
    Or,
}

impl ReduceKind {
    /// The identity element, which a reduction over a zero-volume slice
    /// yields: `true` for And, `false` for Or.
    pub fn identity(&self) -> bool {
        matches!(self, ReduceKind::And)
    }
}

/// An enumeration of all node operations.
///
/// Ops are inspected through the narrowing accessors below rather than any
/// open reflection mechanism; unhandled kinds simply pass through rewrites.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    /// A leaf holding a statically known tensor value.
    Constant(Literal),
    /// A leaf whose value is only available at runtime.
    Input { dtype: DType, shape: Shape },
    /// Broadcast-aware binary elementwise comparison; boolean output.
    Compare {
        kind: CompareKind,
        broadcast: AutoBroadcast,
    },
    /// Logical And/Or over a boolean tensor along a set of axes. Inputs are
    /// the data tensor and a 1-D i64 constant listing the reduction axes.
    ReduceLogical { kind: ReduceKind, keep_dims: bool },
}

impl GraphOp {
    pub fn name(&self) -> &'static str {
        match self {
            GraphOp::Constant(_) => "Constant",
            GraphOp::Input { .. } => "Input",
            GraphOp::Compare { kind, .. } => match kind {
                CompareKind::Equal => "Equal",
                CompareKind::NotEqual => "NotEqual",
                CompareKind::Less => "Less",
                CompareKind::LessEq => "LessEq",
                CompareKind::Greater => "Greater",
                CompareKind::GreaterEq => "GreaterEq",
            },
            GraphOp::ReduceLogical { kind, .. } => match kind {
                ReduceKind::And => "ReduceLogicalAnd",
                ReduceKind::Or => "ReduceLogicalOr",
            },
        }
    }

    /// Number of inputs the op expects.
    pub fn input_arity(&self) -> usize {
        match self {
            GraphOp::Constant(_) | GraphOp::Input { .. } => 0,
            GraphOp::Compare { .. } | GraphOp::ReduceLogical { .. } => 2,
        }
    }

    /// Number of outputs the op produces. Every current kind produces one;
    /// [`crate::graph::Graph::replace`] checks this so multi-output kinds
    /// cannot be swapped for single-output ones unnoticed.
    pub fn output_arity(&self) -> usize {
        1
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, GraphOp::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&Literal> {
        match self {
            GraphOp::Constant(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn compare_kind(&self) -> Option<CompareKind> {
        match self {
            GraphOp::Compare { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn reduce_kind(&self) -> Option<ReduceKind> {
        match self {
            GraphOp::ReduceLogical { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn keep_dims(&self) -> Option<bool> {
        match self {
            GraphOp::ReduceLogical { keep_dims, .. } => Some(*keep_dims),
            _ => None,
        }
    }
}
