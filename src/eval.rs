//! Reference evaluation of graph nodes over constant inputs.
//!
//! Dispatch is two-level: the op kind selects a kernel family, then the
//! observed element type selects a concrete kernel within it. A missing
//! type case is a recoverable [`FoldSkip::UnsupportedType`], not an error;
//! the folding pass simply leaves such nodes in place.
//!
//! Kernels are pure and allocate their own output buffer, so they are
//! reentrant and safe to run on independent graphs concurrently.

use crate::dtype::DType;
use crate::error::{EvalError, FoldSkip, GraphError};
use crate::graph::{Graph, NodeId};
use crate::op::{CompareKind, GraphOp, ReduceKind};
use crate::shape::{broadcast_strides, resolve_pdpd_axis, AutoBroadcast};
use crate::tensor::{Element, Literal, TensorDesc};
use half::f16;

/// Evaluates the node at `id`, whose inputs must all be constants, and
/// returns the resulting literal. The caller is responsible for checking
/// the result descriptor against the node's inferred descriptor.
pub fn evaluate(graph: &Graph, id: NodeId) -> Result<Literal, EvalError> {
    let node = graph
        .get(id)
        .ok_or_else(|| GraphError::Consistency(format!("evaluate of unknown node {}", id.0)))?;
    let inputs = node
        .src
        .iter()
        .map(|&s| {
            graph
                .get(s)
                .and_then(|n| n.op.as_constant())
                .ok_or_else(|| {
                    GraphError::Consistency(format!(
                        "evaluate of '{}' requires constant inputs",
                        node.name
                    ))
                })
        })
        .collect::<Result<Vec<&Literal>, _>>()?;

    match &node.op {
        GraphOp::Compare { kind, broadcast } => {
            let out_shape = node.shape.to_static().ok_or(FoldSkip::NotStatic)?;
            evaluate_compare(*kind, broadcast, inputs[0], inputs[1], &out_shape)
        }
        GraphOp::ReduceLogical { kind, keep_dims } => {
            let axes = graph
                .reduction_axes(node.src[1], inputs[0].shape().rank())
                .map_err(EvalError::Graph)?;
            evaluate_logical_reduction(*kind, inputs[0], &axes, *keep_dims)
        }
        // Kernel families must stay consistent with the patterns the folding
        // pass registers; reaching here for any other kind is a logic bug.
        other => Err(GraphError::Consistency(format!(
            "no reference kernel family for op {}",
            other.name()
        ))
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Elementwise comparison
// ---------------------------------------------------------------------------

fn relation<T: PartialOrd>(kind: CompareKind, a: T, b: T) -> bool {
    match kind {
        CompareKind::Equal => a == b,
        CompareKind::NotEqual => a != b,
        CompareKind::Less => a < b,
        CompareKind::LessEq => a <= b,
        CompareKind::Greater => a > b,
        CompareKind::GreaterEq => a >= b,
    }
}

fn evaluate_compare(
    kind: CompareKind,
    broadcast: &AutoBroadcast,
    lhs: &Literal,
    rhs: &Literal,
    out_shape: &[usize],
) -> Result<Literal, EvalError> {
    let lhs_dims = lhs.shape().to_static().ok_or(FoldSkip::NotStatic)?;
    let rhs_dims = rhs.shape().to_static().ok_or(FoldSkip::NotStatic)?;

    // One case per supported element type; anything else skips the fold.
    macro_rules! type_case {
        ($ty:ty) => {
            compare_kernel::<$ty>(
                kind,
                &lhs.decode::<$ty>(),
                &rhs.decode::<$ty>(),
                &lhs_dims,
                &rhs_dims,
                out_shape,
                broadcast,
            )?
        };
    }
    let out = match lhs.dtype() {
        DType::Bool => type_case!(u8),
        DType::I32 => type_case!(i32),
        DType::I64 => type_case!(i64),
        DType::U32 => type_case!(u32),
        DType::U64 => type_case!(u64),
        DType::F16 => type_case!(f16),
        DType::F32 => type_case!(f32),
        DType::F64 => type_case!(f64),
        other => return Err(FoldSkip::UnsupportedType(other).into()),
    };

    Literal::new(
        TensorDesc::new(DType::Bool, out_shape.to_vec().into()),
        out,
    )
    .map_err(EvalError::Graph)
}

/// Pads `dims` to `rank` under the given broadcast spec, yielding a shape
/// whose positions line up with the output shape.
fn align_dims(
    dims: &[usize],
    rank: usize,
    spec: &AutoBroadcast,
    other_rank: usize,
) -> Result<Vec<usize>, GraphError> {
    match spec {
        AutoBroadcast::None => Ok(dims.to_vec()),
        AutoBroadcast::Numpy => {
            let mut aligned = vec![1; rank];
            aligned[rank - dims.len()..].copy_from_slice(dims);
            Ok(aligned)
        }
        AutoBroadcast::Pdpd { axis } => {
            if dims.len() == rank {
                return Ok(dims.to_vec());
            }
            let start = resolve_pdpd_axis(*axis, other_rank.max(rank), dims.len())?;
            let mut aligned = vec![1; rank];
            aligned[start..start + dims.len()].copy_from_slice(dims);
            Ok(aligned)
        }
    }
}

fn compare_kernel<T: Element>(
    kind: CompareKind,
    lhs: &[T],
    rhs: &[T],
    lhs_dims: &[usize],
    rhs_dims: &[usize],
    out_dims: &[usize],
    spec: &AutoBroadcast,
) -> Result<Vec<u8>, GraphError> {
    let rank = out_dims.len();
    let lhs_aligned = align_dims(lhs_dims, rank, spec, rhs_dims.len())?;
    let rhs_aligned = align_dims(rhs_dims, rank, spec, lhs_dims.len())?;
    let lhs_strides = broadcast_strides(&lhs_aligned);
    let rhs_strides = broadcast_strides(&rhs_aligned);

    let count: usize = out_dims.iter().product();
    let mut out = Vec::with_capacity(count);
    let mut coord = vec![0usize; rank];
    for _ in 0..count {
        let mut a = 0;
        let mut b = 0;
        for i in 0..rank {
            a += coord[i] * lhs_strides[i];
            b += coord[i] * rhs_strides[i];
        }
        out.push(relation(kind, lhs[a], rhs[b]) as u8);
        // Row-major odometer increment.
        for i in (0..rank).rev() {
            coord[i] += 1;
            if coord[i] < out_dims[i] {
                break;
            }
            coord[i] = 0;
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Logical reduction
// ---------------------------------------------------------------------------

fn evaluate_logical_reduction(
    kind: ReduceKind,
    data: &Literal,
    axes: &[usize],
    keep_dims: bool,
) -> Result<Literal, EvalError> {
    if data.dtype() != DType::Bool {
        return Err(FoldSkip::UnsupportedType(data.dtype()).into());
    }
    let in_dims = data.shape().to_static().ok_or(FoldSkip::NotStatic)?;
    let out_shape = crate::shape::reduce_shape(data.shape(), axes, keep_dims);
    let out_dims = out_shape
        .to_static()
        .ok_or_else(|| GraphError::Consistency("reduced shape must be static".to_string()))?;

    // Start from the monoid identity so zero-volume slices reduce to it.
    let identity = kind.identity() as u8;
    let out_count: usize = out_dims.iter().product();
    let mut out = vec![identity; out_count];

    let out_strides = broadcast_strides(&out_dims);
    let in_count: usize = in_dims.iter().product();
    let mut coord = vec![0usize; in_dims.len()];
    let values = data.bytes();
    for flat in 0..in_count {
        // Project the input coordinate onto the output: reduced axes either
        // disappear or pin to index 0 when kept as size 1.
        let mut out_flat = 0;
        let mut out_dim = 0;
        for (i, &c) in coord.iter().enumerate() {
            if axes.contains(&i) {
                if keep_dims {
                    out_dim += 1;
                }
                continue;
            }
            out_flat += c * out_strides[out_dim];
            out_dim += 1;
        }
        let v = values[flat] != 0;
        out[out_flat] = match kind {
            ReduceKind::And => out[out_flat] & (v as u8),
            ReduceKind::Or => out[out_flat] | (v as u8),
        };
        for i in (0..coord.len()).rev() {
            coord[i] += 1;
            if coord[i] < in_dims[i] {
                break;
            }
            coord[i] = 0;
        }
    }

    Literal::new(
        TensorDesc::new(DType::Bool, out_shape),
        out,
    )
    .map_err(EvalError::Graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    fn fold_compare<T: Element>(
        kind: CompareKind,
        spec: AutoBroadcast,
        lhs: (Vec<usize>, Vec<T>),
        rhs: (Vec<usize>, Vec<T>),
    ) -> Literal {
        let mut g = Graph::new();
        let a = g.add_constant(Literal::from_vec(lhs.0.into(), lhs.1).unwrap());
        let b = g.add_constant(Literal::from_vec(rhs.0.into(), rhs.1).unwrap());
        let cmp = g
            .add_op(
                GraphOp::Compare {
                    kind,
                    broadcast: spec,
                },
                vec![a, b],
            )
            .unwrap();
        evaluate(&g, cmp).unwrap()
    }

    #[test]
    fn greater_eq_elementwise() {
        let out = fold_compare::<i32>(
            CompareKind::GreaterEq,
            AutoBroadcast::None,
            (vec![3], vec![1, 5, 3]),
            (vec![3], vec![2, 5, 1]),
        );
        assert_eq!(out.dtype(), DType::Bool);
        assert_eq!(out.bools().unwrap(), vec![false, true, true]);
    }

    #[test]
    fn numpy_broadcast_row_against_matrix() {
        let out = fold_compare::<i32>(
            CompareKind::Less,
            AutoBroadcast::Numpy,
            (vec![2, 3], vec![1, 2, 3, 4, 5, 6]),
            (vec![3], vec![2, 2, 2]),
        );
        assert_eq!(out.shape(), &Shape::from(vec![2, 3]));
        assert_eq!(
            out.bools().unwrap(),
            vec![true, false, false, false, false, false]
        );
    }

    #[test]
    fn explicit_axis_broadcast_aligns_second_input() {
        let out = fold_compare::<i32>(
            CompareKind::Less,
            AutoBroadcast::Pdpd { axis: 1 },
            (vec![2, 3], vec![1, 2, 3, 4, 5, 6]),
            (vec![3], vec![2, 2, 2]),
        );
        assert_eq!(out.shape(), &Shape::from(vec![2, 3]));
        assert_eq!(
            out.bools().unwrap(),
            vec![true, false, false, false, false, false]
        );
    }

    #[test]
    fn explicit_axis_broadcast_at_a_leading_axis() {
        // rhs pins axis 0, so each row of lhs compares against one value.
        let out = fold_compare::<i32>(
            CompareKind::GreaterEq,
            AutoBroadcast::Pdpd { axis: 0 },
            (vec![2, 2], vec![1, 2, 3, 4]),
            (vec![2], vec![2, 3]),
        );
        assert_eq!(out.bools().unwrap(), vec![false, true, true, true]);
    }

    #[test]
    fn explicit_negative_axis_aligns_trailing_dims() {
        let out = fold_compare::<i32>(
            CompareKind::Equal,
            AutoBroadcast::Pdpd { axis: -1 },
            (vec![2, 2], vec![1, 2, 3, 2]),
            (vec![2], vec![1, 2]),
        );
        assert_eq!(out.bools().unwrap(), vec![true, true, false, true]);
    }

    #[test]
    fn nan_is_unordered() {
        for kind in [
            CompareKind::Less,
            CompareKind::LessEq,
            CompareKind::Greater,
            CompareKind::GreaterEq,
            CompareKind::Equal,
        ] {
            let out = fold_compare::<f32>(
                kind,
                AutoBroadcast::None,
                (vec![1], vec![f32::NAN]),
                (vec![1], vec![f32::NAN]),
            );
            assert_eq!(out.bools().unwrap(), vec![false], "{kind:?}");
        }
        let out = fold_compare::<f32>(
            CompareKind::NotEqual,
            AutoBroadcast::None,
            (vec![1], vec![f32::NAN]),
            (vec![1], vec![1.0]),
        );
        assert_eq!(out.bools().unwrap(), vec![true]);
    }

    #[test]
    fn unsupported_type_is_a_skip() {
        let mut g = Graph::new();
        let a = g.add_constant(Literal::from_vec::<i8>(vec![2].into(), vec![1, 2]).unwrap());
        let b = g.add_constant(Literal::from_vec::<i8>(vec![2].into(), vec![3, 0]).unwrap());
        let cmp = g
            .add_op(
                GraphOp::Compare {
                    kind: CompareKind::Equal,
                    broadcast: AutoBroadcast::None,
                },
                vec![a, b],
            )
            .unwrap();
        assert_eq!(
            evaluate(&g, cmp),
            Err(EvalError::Skip(FoldSkip::UnsupportedType(DType::I8)))
        );
    }

    fn fold_reduction(
        kind: ReduceKind,
        dims: Vec<usize>,
        values: &[bool],
        axes: Vec<i64>,
        keep_dims: bool,
    ) -> Literal {
        let mut g = Graph::new();
        let data = g.add_constant(Literal::from_bools(dims.into(), values).unwrap());
        let axes_len = axes.len();
        let axes = g.add_constant(Literal::from_vec(vec![axes_len].into(), axes).unwrap());
        let reduce = g
            .add_op(GraphOp::ReduceLogical { kind, keep_dims }, vec![data, axes])
            .unwrap();
        evaluate(&g, reduce).unwrap()
    }

    #[test]
    fn reduce_and_along_columns() {
        let out = fold_reduction(
            ReduceKind::And,
            vec![2, 3],
            &[true, true, true, true, false, true],
            vec![1],
            false,
        );
        assert_eq!(out.shape(), &Shape::from(vec![2]));
        assert_eq!(out.bools().unwrap(), vec![true, false]);
    }

    #[test]
    fn reduce_or_keep_dims() {
        let out = fold_reduction(
            ReduceKind::Or,
            vec![2, 2],
            &[false, false, false, true],
            vec![0],
            true,
        );
        assert_eq!(out.shape(), &Shape::from(vec![1, 2]));
        assert_eq!(out.bools().unwrap(), vec![false, true]);
    }

    #[test]
    fn zero_volume_slice_reduces_to_identity() {
        // Reducing over an empty axis leaves nothing to accumulate, so each
        // output position holds the monoid identity.
        let and = fold_reduction(ReduceKind::And, vec![3, 0], &[], vec![1], false);
        assert_eq!(and.bools().unwrap(), vec![true, true, true]);

        let or = fold_reduction(ReduceKind::Or, vec![3, 0], &[], vec![1], false);
        assert_eq!(or.bools().unwrap(), vec![false, false, false]);
    }

    #[test]
    fn reduce_all_axes_to_scalar() {
        let out = fold_reduction(
            ReduceKind::And,
            vec![2, 2],
            &[true, true, true, true],
            vec![0, 1],
            false,
        );
        assert_eq!(out.shape(), &Shape::scalar());
        assert_eq!(out.bools().unwrap(), vec![true]);
    }
}
