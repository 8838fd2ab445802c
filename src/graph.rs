//! The arena-based computation graph.
//!
//! Nodes live in a flat vector addressed by stable [`NodeId`]s; a node's
//! `src` list names the ids of its inputs, so consumer edges are derived by
//! scanning. The arena is append-only during a pass and every node's inputs
//! precede it, which keeps the graph acyclic by construction. Unreachable
//! nodes are removed by a deferred [`Graph::sweep_unreachable`] pass.

use crate::dtype::DType;
use crate::error::GraphError;
use crate::op::GraphOp;
use crate::shape::{broadcast_shape, reduce_shape, resolve_axes, Shape};
use crate::tensor::Literal;

/// A unique identifier for a node within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// The data associated with a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// The operation performed by this node.
    pub op: GraphOp,
    /// The ids of the input nodes, in operand order.
    pub src: Vec<NodeId>,
    /// Inferred element type of the output tensor.
    pub dtype: DType,
    /// Inferred shape of the output tensor.
    pub shape: Shape,
    /// Friendly name, preserved across rewrites.
    pub name: String,
    /// When set, the folding pass leaves this node untouched.
    pub fold_disabled: bool,
}

/// Owns all the nodes of a computation graph.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<NodeData>,
    outputs: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    fn push(&mut self, op: GraphOp, src: Vec<NodeId>, dtype: DType, shape: Shape) -> NodeId {
        let id = NodeId(self.nodes.len());
        let name = format!("{}_{}", op.name(), id.0);
        self.nodes.push(NodeData {
            op,
            src,
            dtype,
            shape,
            name,
            fold_disabled: false,
        });
        id
    }

    /// Adds a constant leaf holding `literal`.
    pub fn add_constant(&mut self, literal: Literal) -> NodeId {
        let dtype = literal.dtype();
        let shape = literal.shape().clone();
        self.push(GraphOp::Constant(literal), Vec::new(), dtype, shape)
    }

    /// Adds a runtime input leaf.
    pub fn add_input(&mut self, dtype: DType, shape: Shape) -> NodeId {
        self.push(
            GraphOp::Input {
                dtype,
                shape: shape.clone(),
            },
            Vec::new(),
            dtype,
            shape,
        )
    }

    /// Adds an operation node, running shape/type inference on its inputs.
    pub fn add_op(&mut self, op: GraphOp, src: Vec<NodeId>) -> Result<NodeId, GraphError> {
        let (dtype, shape) = self.infer(&op, &src)?;
        Ok(self.push(op, src, dtype, shape))
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids currently in the arena, in topological (insertion) order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Declares a node as a graph output.
    pub fn set_output(&mut self, id: NodeId) {
        self.outputs.push(id);
    }

    pub fn dtype(&self, id: NodeId) -> DType {
        self.nodes[id.0].dtype
    }

    pub fn shape(&self, id: NodeId) -> &Shape {
        &self.nodes[id.0].shape
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.nodes[id.0].name = name.into();
    }

    pub fn set_fold_disabled(&mut self, id: NodeId, disabled: bool) {
        self.nodes[id.0].fold_disabled = disabled;
    }

    /// Every node that lists `id` among its inputs.
    pub fn consumers(&self, id: NodeId) -> Vec<NodeId> {
        self.node_ids()
            .filter(|&n| self.nodes[n.0].src.contains(&id))
            .collect()
    }

    /// Rewires every consumer edge (and output slot) from `old` to `new`.
    ///
    /// The two nodes must produce the same number of outputs; otherwise the
    /// graph would be left with dangling operand positions, so this fails
    /// with [`GraphError::ArityMismatch`].
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), GraphError> {
        let expected = self.nodes[old.0].op.output_arity();
        let found = self.nodes[new.0].op.output_arity();
        if expected != found {
            return Err(GraphError::ArityMismatch { expected, found });
        }
        for node in &mut self.nodes {
            for s in &mut node.src {
                if *s == old {
                    *s = new;
                }
            }
        }
        for out in &mut self.outputs {
            if *out == old {
                *out = new;
            }
        }
        Ok(())
    }

    /// Re-runs shape/type inference for `id` against its current inputs and
    /// updates the cached descriptor. Inputs may have become constant since
    /// construction, so the pass calls this before attempting a fold.
    pub fn revalidate(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = &self.nodes[id.0];
        let (dtype, shape) = self.infer(&node.op, &node.src)?;
        let node = &mut self.nodes[id.0];
        node.dtype = dtype;
        node.shape = shape;
        Ok(())
    }

    /// True when the node's output shape and all of its input shapes are
    /// fully static.
    pub fn is_fully_static(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        node.shape.is_static() && node.src.iter().all(|s| self.nodes[s.0].shape.is_static())
    }

    /// Removes every node unreachable from the declared outputs, compacting
    /// the arena and remapping ids. Returns the number of nodes removed.
    ///
    /// Run after a rewrite pass completes; any `NodeId` held across this
    /// call is invalidated.
    pub fn sweep_unreachable(&mut self) -> usize {
        let mut live = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self.outputs.clone();
        while let Some(id) = stack.pop() {
            if live[id.0] {
                continue;
            }
            live[id.0] = true;
            stack.extend(&self.nodes[id.0].src);
        }

        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut kept = 0;
        for (i, &is_live) in live.iter().enumerate() {
            if is_live {
                remap[i] = kept;
                kept += 1;
            }
        }
        let removed = self.nodes.len() - kept;
        if removed == 0 {
            return 0;
        }

        let mut i = 0;
        self.nodes.retain(|_| {
            let keep = live[i];
            i += 1;
            keep
        });
        for node in &mut self.nodes {
            for s in &mut node.src {
                *s = NodeId(remap[s.0]);
            }
        }
        for out in &mut self.outputs {
            *out = NodeId(remap[out.0]);
        }
        removed
    }

    /// Shape/type inference for one node from its current inputs.
    fn infer(&self, op: &GraphOp, src: &[NodeId]) -> Result<(DType, Shape), GraphError> {
        let found = src.len();
        let expected = op.input_arity();
        if found != expected {
            return Err(GraphError::InputArity {
                op: op.name(),
                expected,
                found,
            });
        }
        match op {
            GraphOp::Constant(lit) => Ok((lit.dtype(), lit.shape().clone())),
            GraphOp::Input { dtype, shape } => Ok((*dtype, shape.clone())),
            GraphOp::Compare { broadcast, .. } => {
                let lhs = &self.nodes[src[0].0];
                let rhs = &self.nodes[src[1].0];
                if lhs.dtype != rhs.dtype {
                    return Err(GraphError::TypeMismatch(format!(
                        "comparison operands differ: {} vs {}",
                        lhs.dtype, rhs.dtype
                    )));
                }
                let shape = broadcast_shape(&lhs.shape, &rhs.shape, broadcast)?;
                Ok((DType::Bool, shape))
            }
            GraphOp::ReduceLogical { keep_dims, .. } => {
                let data = &self.nodes[src[0].0];
                if data.dtype != DType::Bool {
                    return Err(GraphError::TypeMismatch(format!(
                        "logical reduction requires a boolean input, got {}",
                        data.dtype
                    )));
                }
                let axes = self.reduction_axes(src[1], data.shape.rank())?;
                let shape = reduce_shape(&data.shape, &axes, *keep_dims);
                Ok((DType::Bool, shape))
            }
        }
    }

    /// Reads and normalizes the axis list of a reduction node's second input,
    /// which must be a 1-D (or scalar) i64 constant.
    pub(crate) fn reduction_axes(
        &self,
        axes_id: NodeId,
        data_rank: usize,
    ) -> Result<Vec<usize>, GraphError> {
        let axes_node = &self.nodes[axes_id.0];
        let lit = axes_node.op.as_constant().ok_or_else(|| {
            GraphError::TypeMismatch("reduction axes must be a constant".to_string())
        })?;
        if lit.shape().rank() > 1 {
            return Err(GraphError::ShapeMismatch(format!(
                "reduction axes must be a scalar or vector, got {}",
                lit.shape()
            )));
        }
        let raw = lit.to_vec::<i64>()?;
        resolve_axes(&raw, data_rank)
    }
}
