//! Tensor shapes with possibly-unknown dimensions, and the broadcasting
//! rules used by binary elementwise ops.

use crate::error::GraphError;
use std::fmt;

/// A single dimension: statically known or unknown until runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    Static(usize),
    Dynamic,
}

impl Dim {
    pub fn as_static(&self) -> Option<usize> {
        match self {
            Dim::Static(n) => Some(*n),
            Dim::Dynamic => None,
        }
    }
}

impl From<usize> for Dim {
    fn from(n: usize) -> Self {
        Dim::Static(n)
    }
}

/// An ordered sequence of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<Dim>);

impl Shape {
    pub fn new(dims: Vec<Dim>) -> Self {
        Shape(dims)
    }

    /// A fully static shape from concrete dimension sizes.
    pub fn from_static(dims: &[usize]) -> Self {
        Shape(dims.iter().map(|&d| Dim::Static(d)).collect())
    }

    /// The scalar shape (rank zero, one element).
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    /// True when every dimension is statically known.
    pub fn is_static(&self) -> bool {
        self.0.iter().all(|d| matches!(d, Dim::Static(_)))
    }

    /// Concrete dimension sizes, or `None` if any dimension is dynamic.
    pub fn to_static(&self) -> Option<Vec<usize>> {
        self.0.iter().map(|d| d.as_static()).collect()
    }

    /// Total element count, or `None` if any dimension is dynamic.
    pub fn num_elements(&self) -> Option<usize> {
        self.0
            .iter()
            .try_fold(1usize, |acc, d| d.as_static().map(|n| acc * n))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match d {
                Dim::Static(n) => write!(f, "{n}")?,
                Dim::Dynamic => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::from_static(&dims)
    }
}

/// How a binary elementwise op aligns mismatched input shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoBroadcast {
    /// Inputs must have exactly equal shapes.
    None,
    /// Numpy-style trailing-dimension broadcast.
    Numpy,
    /// The second input aligns against the first starting at `axis`
    /// (negative means "align the trailing dimensions").
    Pdpd { axis: i64 },
}

fn merge_dim(a: Dim, b: Dim, lhs: &Shape, rhs: &Shape) -> Result<Dim, GraphError> {
    match (a, b) {
        (Dim::Static(1), d) | (d, Dim::Static(1)) => Ok(d),
        (Dim::Static(x), Dim::Static(y)) if x == y => Ok(Dim::Static(x)),
        (Dim::Static(_), Dim::Static(_)) => Err(GraphError::ShapeMismatch(format!(
            "cannot broadcast {lhs} with {rhs}"
        ))),
        // A dynamic dimension is assumed to resolve compatibly; the result
        // stays dynamic unless the other side pins it above one.
        (Dim::Dynamic, Dim::Dynamic) => Ok(Dim::Dynamic),
        (Dim::Dynamic, Dim::Static(n)) | (Dim::Static(n), Dim::Dynamic) => {
            if n > 1 {
                Ok(Dim::Static(n))
            } else {
                Ok(Dim::Dynamic)
            }
        }
    }
}

/// Computes the output shape of a broadcast binary op, or a `ShapeMismatch`
/// if the inputs cannot be aligned under the given spec.
pub fn broadcast_shape(
    lhs: &Shape,
    rhs: &Shape,
    spec: &AutoBroadcast,
) -> Result<Shape, GraphError> {
    match spec {
        AutoBroadcast::None => {
            if lhs == rhs {
                Ok(lhs.clone())
            } else {
                Err(GraphError::ShapeMismatch(format!(
                    "broadcast disabled but shapes differ: {lhs} vs {rhs}"
                )))
            }
        }
        AutoBroadcast::Numpy => {
            let rank = lhs.rank().max(rhs.rank());
            let mut out = Vec::with_capacity(rank);
            for i in 0..rank {
                // Align trailing dimensions; missing leading dims act as 1.
                let a = pad_dim(lhs, rank, i);
                let b = pad_dim(rhs, rank, i);
                out.push(merge_dim(a, b, lhs, rhs)?);
            }
            Ok(Shape::new(out))
        }
        AutoBroadcast::Pdpd { axis } => {
            let start = resolve_pdpd_axis(*axis, lhs.rank(), rhs.rank())?;
            if start + rhs.rank() > lhs.rank() {
                return Err(GraphError::ShapeMismatch(format!(
                    "axis {axis} places {rhs} outside {lhs}"
                )));
            }
            // Explicit-axis broadcast is one-directional: the output shape is
            // always the first input's, so each second-input dimension must
            // equal the aligned first-input dimension or be 1. The symmetric
            // numpy merge would wrongly accept a size-1 lhs dim here.
            for (i, &b) in rhs.dims().iter().enumerate() {
                let a = lhs.dims()[start + i];
                match (a, b) {
                    (_, Dim::Static(1)) => {}
                    (Dim::Static(x), Dim::Static(y)) if x == y => {}
                    (Dim::Dynamic, _) | (_, Dim::Dynamic) => {}
                    _ => {
                        return Err(GraphError::ShapeMismatch(format!(
                            "cannot broadcast {rhs} into {lhs} at axis {axis}"
                        )))
                    }
                }
            }
            Ok(lhs.clone())
        }
    }
}

fn pad_dim(shape: &Shape, rank: usize, i: usize) -> Dim {
    let offset = rank - shape.rank();
    if i < offset {
        Dim::Static(1)
    } else {
        shape.dims()[i - offset]
    }
}

pub(crate) fn resolve_pdpd_axis(
    axis: i64,
    lhs_rank: usize,
    rhs_rank: usize,
) -> Result<usize, GraphError> {
    if axis < 0 {
        lhs_rank.checked_sub(rhs_rank).ok_or_else(|| {
            GraphError::ShapeMismatch(format!(
                "second input rank {rhs_rank} exceeds first input rank {lhs_rank}"
            ))
        })
    } else if axis as usize > lhs_rank {
        Err(GraphError::ShapeMismatch(format!(
            "broadcast axis {axis} out of range for rank {lhs_rank}"
        )))
    } else {
        Ok(axis as usize)
    }
}

/// Normalizes possibly-negative reduction axes against `rank`, deduplicated
/// and sorted ascending.
pub fn resolve_axes(axes: &[i64], rank: usize) -> Result<Vec<usize>, GraphError> {
    let mut out = Vec::with_capacity(axes.len());
    for &a in axes {
        let resolved = if a < 0 { a + rank as i64 } else { a };
        if resolved < 0 || resolved as usize >= rank {
            return Err(GraphError::ShapeMismatch(format!(
                "reduction axis {a} out of range for rank {rank}"
            )));
        }
        out.push(resolved as usize);
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// The output shape of a reduction: reduced axes removed, or kept as size 1.
pub fn reduce_shape(input: &Shape, axes: &[usize], keep_dims: bool) -> Shape {
    let dims = input
        .dims()
        .iter()
        .enumerate()
        .filter_map(|(i, &d)| {
            if axes.contains(&i) {
                keep_dims.then_some(Dim::Static(1))
            } else {
                Some(d)
            }
        })
        .collect();
    Shape::new(dims)
}

/// Row-major strides for a shape, with stride zero on size-1 dimensions so
/// the same index arithmetic walks both full and broadcast inputs.
pub(crate) fn broadcast_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc = 1;
    for i in (0..dims.len()).rev() {
        if dims[i] != 1 {
            strides[i] = acc;
        }
        acc *= dims[i];
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![2, 3], vec![3], vec![2, 3])]
    #[case(vec![2, 3], vec![2, 1], vec![2, 3])]
    #[case(vec![2, 3], vec![2, 3], vec![2, 3])]
    #[case(vec![4, 1, 5], vec![3, 1], vec![4, 3, 5])]
    #[case(vec![], vec![2, 2], vec![2, 2])]
    fn numpy_broadcast_ok(
        #[case] lhs: Vec<usize>,
        #[case] rhs: Vec<usize>,
        #[case] expected: Vec<usize>,
    ) {
        let out = broadcast_shape(&lhs.into(), &rhs.into(), &AutoBroadcast::Numpy).unwrap();
        assert_eq!(out, Shape::from(expected));
    }

    #[test]
    fn numpy_broadcast_incompatible() {
        let err = broadcast_shape(
            &vec![2, 3].into(),
            &vec![4].into(),
            &AutoBroadcast::Numpy,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::ShapeMismatch(_)));
    }

    #[test]
    fn none_broadcast_requires_equal_shapes() {
        assert!(broadcast_shape(
            &vec![2, 3].into(),
            &vec![2, 3].into(),
            &AutoBroadcast::None
        )
        .is_ok());
        assert!(broadcast_shape(
            &vec![2, 3].into(),
            &vec![3].into(),
            &AutoBroadcast::None
        )
        .is_err());
    }

    #[test]
    fn pdpd_broadcast_aligns_at_axis() {
        let out = broadcast_shape(
            &vec![2, 3, 4, 5].into(),
            &vec![3, 4].into(),
            &AutoBroadcast::Pdpd { axis: 1 },
        )
        .unwrap();
        assert_eq!(out, Shape::from(vec![2, 3, 4, 5]));

        let out = broadcast_shape(
            &vec![2, 3, 4].into(),
            &vec![3, 4].into(),
            &AutoBroadcast::Pdpd { axis: -1 },
        )
        .unwrap();
        assert_eq!(out, Shape::from(vec![2, 3, 4]));
    }

    #[test]
    fn pdpd_broadcast_is_one_directional() {
        // A size-1 first-input dim cannot stretch to the second input's;
        // the output is always the first input's shape.
        let err = broadcast_shape(
            &vec![2, 1].into(),
            &vec![3].into(),
            &AutoBroadcast::Pdpd { axis: 1 },
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::ShapeMismatch(_)));

        // The mirrored pair is fine: 1 broadcasts into 3.
        let out = broadcast_shape(
            &vec![2, 3].into(),
            &vec![1].into(),
            &AutoBroadcast::Pdpd { axis: 1 },
        )
        .unwrap();
        assert_eq!(out, Shape::from(vec![2, 3]));
    }

    #[test]
    fn dynamic_dims_stay_dynamic_under_broadcast() {
        let lhs = Shape::new(vec![Dim::Dynamic, Dim::Static(3)]);
        let rhs = Shape::from(vec![3]);
        let out = broadcast_shape(&lhs, &rhs, &AutoBroadcast::Numpy).unwrap();
        assert_eq!(out.dims()[0], Dim::Dynamic);
        assert_eq!(out.dims()[1], Dim::Static(3));
        assert!(!out.is_static());
        assert_eq!(out.num_elements(), None);
    }

    #[rstest]
    #[case(vec![0, 1], 3, vec![0, 1])]
    #[case(vec![-1], 3, vec![2])]
    #[case(vec![1, 1, -2], 3, vec![1])]
    fn axes_resolution(#[case] axes: Vec<i64>, #[case] rank: usize, #[case] expected: Vec<usize>) {
        assert_eq!(resolve_axes(&axes, rank).unwrap(), expected);
    }

    #[test]
    fn axes_out_of_range() {
        assert!(resolve_axes(&[3], 3).is_err());
        assert!(resolve_axes(&[-4], 3).is_err());
    }

    #[rstest]
    #[case(vec![2, 3], vec![1], false, vec![2])]
    #[case(vec![2, 3], vec![1], true, vec![2, 1])]
    #[case(vec![2, 3], vec![0, 1], false, vec![])]
    fn reduce_shape_law(
        #[case] input: Vec<usize>,
        #[case] axes: Vec<usize>,
        #[case] keep_dims: bool,
        #[case] expected: Vec<usize>,
    ) {
        let out = reduce_shape(&input.into(), &axes, keep_dims);
        assert_eq!(out, Shape::from(expected));
    }
}
