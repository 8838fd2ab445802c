//! Lyra: a graph-level tensor IR with pattern-driven constant folding.
//!
//! Lyra models tensor computations as an arena-based DAG of typed operation
//! nodes and pre-evaluates subgraphs whose inputs are statically known,
//! replacing them with literal constant tensors before the graph reaches an
//! execution backend.
//!
//! # Architecture
//!
//! - **dtype / shape / tensor**: element types, shapes with possibly-unknown
//!   dimensions, and owned constant buffers
//! - **op / graph**: the closed operation set and the arena graph with
//!   shape/type inference
//! - **eval**: type-dispatched pure reference kernels
//! - **pattern**: declarative sub-graph templates and the matcher
//! - **fold**: the fixed-point constant-folding pass
//!
//! # Example
//!
//! ```
//! use lyra::prelude::*;
//!
//! let mut graph = Graph::new();
//! let lhs = graph.add_constant(Literal::from_vec::<i32>(vec![3].into(), vec![1, 5, 3]).unwrap());
//! let rhs = graph.add_constant(Literal::from_vec::<i32>(vec![3].into(), vec![2, 5, 1]).unwrap());
//! let cmp = graph
//!     .add_op(
//!         GraphOp::Compare {
//!             kind: CompareKind::GreaterEq,
//!             broadcast: AutoBroadcast::Numpy,
//!         },
//!         vec![lhs, rhs],
//!     )
//!     .unwrap();
//! graph.set_output(cmp);
//!
//! run_constant_folding(&mut graph).unwrap();
//!
//! let out = graph.outputs()[0];
//! let folded = graph.get(out).unwrap().op.as_constant().unwrap();
//! assert_eq!(folded.bools().unwrap(), vec![false, true, true]);
//! ```

pub mod dtype;
pub mod error;
pub mod eval;
pub mod fold;
pub mod graph;
pub mod op;
pub mod pattern;
pub mod shape;
pub mod tensor;

pub use dtype::DType;
pub use error::{EvalError, FoldSkip, GraphError};
pub use fold::{run_constant_folding, ConstantFolding};
pub use graph::{Graph, NodeData, NodeId};
pub use op::{CompareKind, GraphOp, ReduceKind};
pub use shape::{AutoBroadcast, Dim, Shape};
pub use tensor::{Element, Literal, TensorDesc};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::GraphError;
    pub use crate::fold::{run_constant_folding, ConstantFolding};
    pub use crate::graph::{Graph, NodeId};
    pub use crate::op::{CompareKind, GraphOp, ReduceKind};
    pub use crate::pattern::{matches, Match, Pattern};
    pub use crate::shape::{AutoBroadcast, Dim, Shape};
    pub use crate::tensor::{Literal, TensorDesc};
}
