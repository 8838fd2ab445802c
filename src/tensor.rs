//! Tensor descriptors and owned constant buffers.

use crate::dtype::DType;
use crate::error::GraphError;
use crate::shape::Shape;
use half::f16;

/// A scalar type that can live in a constant buffer.
///
/// The set of implementors mirrors the [`DType`] enum; booleans are stored
/// as `u8` and handled through [`Literal::from_bools`] / [`Literal::bools`].
pub trait Element: bytemuck::Pod + PartialOrd + Copy + std::fmt::Debug {
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$variant;
            }
        )*
    };
}

impl_element!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f16 => F16,
    f32 => F32,
    f64 => F64,
);

/// Element type plus shape: everything needed to size and interpret a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorDesc {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        TensorDesc { dtype, shape }
    }

    /// Buffer size in bytes, or `None` if the shape has dynamic dimensions.
    pub fn byte_size(&self) -> Option<usize> {
        self.shape.num_elements().map(|n| n * self.dtype.size())
    }
}

/// An immutable constant tensor value: a descriptor plus an owned byte
/// buffer of exactly `element_count * element_width` bytes, reinterpreted
/// per element type. There is no implicit cross-type conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    desc: TensorDesc,
    data: Vec<u8>,
}

impl Literal {
    /// Builds a literal from raw bytes, validating the buffer size against
    /// the descriptor. The shape must be fully static.
    pub fn new(desc: TensorDesc, data: Vec<u8>) -> Result<Self, GraphError> {
        let expected = desc.byte_size().ok_or_else(|| {
            GraphError::ShapeMismatch(format!(
                "constant shape {} must be fully static",
                desc.shape
            ))
        })?;
        if data.len() != expected {
            return Err(GraphError::ShapeMismatch(format!(
                "buffer holds {} bytes but {} of type {} needs {expected}",
                data.len(),
                desc.shape,
                desc.dtype
            )));
        }
        Ok(Literal { desc, data })
    }

    /// Builds a literal from typed values.
    pub fn from_vec<T: Element>(shape: Shape, values: Vec<T>) -> Result<Self, GraphError> {
        let data = bytemuck::cast_slice(&values).to_vec();
        Literal::new(TensorDesc::new(T::DTYPE, shape), data)
    }

    /// Builds a boolean literal; each value is stored as one byte, 0 or 1.
    pub fn from_bools(shape: Shape, values: &[bool]) -> Result<Self, GraphError> {
        let data = values.iter().map(|&b| b as u8).collect();
        Literal::new(TensorDesc::new(DType::Bool, shape), data)
    }

    /// A rank-0 literal holding a single value.
    pub fn scalar<T: Element>(value: T) -> Self {
        // One element always matches its descriptor, so no validation.
        Literal {
            desc: TensorDesc::new(T::DTYPE, Shape::scalar()),
            data: bytemuck::bytes_of(&value).to_vec(),
        }
    }

    pub fn desc(&self) -> &TensorDesc {
        &self.desc
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decodes the buffer as values of `T`, checking the element type.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, GraphError> {
        if self.desc.dtype != T::DTYPE {
            return Err(GraphError::TypeMismatch(format!(
                "constant holds {}, requested {}",
                self.desc.dtype,
                T::DTYPE
            )));
        }
        Ok(self.decode())
    }

    /// Decodes the buffer as booleans (any non-zero byte is `true`).
    pub fn bools(&self) -> Result<Vec<bool>, GraphError> {
        if self.desc.dtype != DType::Bool {
            return Err(GraphError::TypeMismatch(format!(
                "constant holds {}, requested bool",
                self.desc.dtype
            )));
        }
        Ok(self.data.iter().map(|&b| b != 0).collect())
    }

    /// Decodes without a dtype check; kernels call this after dispatching on
    /// the element type (booleans decode as `u8`).
    pub(crate) fn decode<T: Element>(&self) -> Vec<T> {
        // The buffer is byte-aligned, so read elements unaligned.
        self.data
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_typed_values() {
        let lit = Literal::from_vec::<i32>(vec![2, 2].into(), vec![1, 2, 3, 4]).unwrap();
        assert_eq!(lit.dtype(), DType::I32);
        assert_eq!(lit.bytes().len(), 16);
        assert_eq!(lit.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn size_validation() {
        let desc = TensorDesc::new(DType::F32, vec![3].into());
        assert!(Literal::new(desc, vec![0u8; 11]).is_err());
    }

    #[test]
    fn cross_type_read_is_rejected() {
        let lit = Literal::from_vec::<u16>(vec![2].into(), vec![1, 2]).unwrap();
        assert!(matches!(
            lit.to_vec::<i16>(),
            Err(GraphError::TypeMismatch(_))
        ));
    }

    #[test]
    fn scalar_literal_is_rank_zero() {
        let lit = Literal::scalar(2.5f32);
        assert_eq!(lit.shape(), &Shape::scalar());
        assert!(lit.dtype().is_float());
        assert!(!lit.dtype().is_integer());
        assert_eq!(lit.to_vec::<f32>().unwrap(), vec![2.5]);
    }

    #[test]
    fn bool_storage_is_one_byte() {
        let lit = Literal::from_bools(vec![3].into(), &[true, false, true]).unwrap();
        assert_eq!(lit.bytes(), &[1, 0, 1]);
        assert_eq!(lit.bools().unwrap(), vec![true, false, true]);
    }
}
